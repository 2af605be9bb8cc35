//! Monolithic proof of a shuffle (PoS, Terelius-Wikström; spec.md §4.J):
//! combines permutation commitment and re-encryption proof in a single
//! step, used on the non-precomputed path where no `PermutationCommitment`
//! was published ahead of time.
//!
//! Reuses `ccpos.rs`'s combined-equation machinery verbatim: a PoS
//! instance is exactly a CCPoS instance where the permutation commitment
//! `u` is generated fresh as part of this same proving call instead of
//! having been published (and PoSC-proved) in an earlier round.

use crate::bytetree::{decode_group, encode_group, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::challenger::Challenger;
use crate::config::GlobalParams;
use crate::elgamal::Ciphertext;
use crate::error::{InputFormatError, ProofRejected};
use crate::group::GroupElement;
use crate::permutation::ccpos::{self, CcposCommitment, CcposReply};
use crate::permutation::{Permutation, PermutationCommitment};
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::permutation::pos";

/// The monolithic proof: the freshly generated permutation commitment `u`
/// plus the CCPoS-shaped commitment/reply tying it to the re-encryption.
#[derive(Clone, Debug)]
pub struct PosProof<C: GroupElement> {
    pub u: Vec<C>,
    pub commitment: CcposCommitment<C>,
    pub reply: CcposReply<C>,
}

impl<C: GroupElement> ByteTreeEncode for PosProof<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![
            ByteTree::node(self.u.iter().map(encode_group).collect()),
            self.commitment.encode(),
            self.reply.encode(),
        ])
    }
}

impl<C: GroupElement> ByteTreeDecode for PosProof<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 3 {
            return Err(InputFormatError::Decode("PosProof expects exactly 3 children".into()));
        }
        let u = children[0]
            .as_node()?
            .iter()
            .map(decode_group)
            .collect::<Result<Vec<C>, _>>()?;
        let commitment = CcposCommitment::decode(&children[1])?;
        let reply = CcposReply::decode(&children[2])?;
        Ok(Self { u, commitment, reply })
    }
}

/// Output of the prover side: the secret permutation sampled for this
/// shuffle (kept for the caller's own bookkeeping), the re-encrypted and
/// permuted output list `w'` (published alongside the proof), and the
/// proof itself.
pub struct PosOutput<C: GroupElement> {
    pub permutation: Permutation,
    pub output: Vec<Ciphertext<C>>,
    pub proof: PosProof<C>,
}

/// Prove a full shuffle `w -> w'` without a pre-existing permutation
/// commitment: sample a fresh permutation, commit to it, and run the
/// combined PoSC+re-encryption argument in one shot.
pub fn prove<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    w: &[Ciphertext<C>],
    rng: &mut impl RngCore,
) -> PosOutput<C> {
    let n = w.len();
    let permutation_commitment = PermutationCommitment::generate(g, h, n, params.rho, rng);
    let s: Vec<C::ScalarField> = (0..n)
        .map(|_| Ciphertext::<C>::sample_reencryption_exponent(rng))
        .collect();
    let reencrypted: Vec<Ciphertext<C>> = w.iter().zip(&s).map(|(ct, s_i)| ct.reencrypt(g, pk, *s_i)).collect();
    let w_prime = permutation_commitment.permutation.permute(&reencrypted);

    let (commitment, reply) = ccpos::prove(
        challenger,
        params,
        g,
        pk,
        h,
        &permutation_commitment,
        w,
        &w_prime,
        &s,
        rng,
    );

    tracing::debug!(target: LOG_TARGET, n, "monolithic PoS generated");
    PosOutput {
        permutation: permutation_commitment.permutation.clone(),
        output: w_prime,
        proof: PosProof {
            u: permutation_commitment.u.clone(),
            commitment,
            reply,
        },
    }
}

/// Verify a monolithic PoS proof against the public `(g, pk, h, w, w')`.
pub fn verify<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    w: &[Ciphertext<C>],
    w_prime: &[Ciphertext<C>],
    proof: &PosProof<C>,
) -> Result<(), ProofRejected> {
    if proof.u.len() != h.len() {
        return Err(ProofRejected::Pos { party: 0 });
    }
    ccpos::verify(
        challenger,
        params,
        g,
        pk,
        h,
        &proof.u,
        w,
        w_prime,
        &proof.commitment,
        &proof.reply,
    )
    .map_err(|_| ProofRejected::Pos { party: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;

    #[test]
    fn monolithic_proof_verifies() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let x = Fr::from(77u64);
        let pk = g * x;
        let n = 4;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 31) as u64)).collect();
        let messages: Vec<G> = (1..=n as u64).map(|i| g * Fr::from(i)).collect();
        let w: Vec<Ciphertext<G>> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Ciphertext::encrypt(g, pk, *m, Fr::from((i + 5) as u64)))
            .collect();

        let out = prove(&challenger, &params, g, pk, &h, &w, &mut rng);
        assert!(verify(&challenger, &params, g, pk, &h, &w, &out.output, &out.proof).is_ok());
    }

    #[test]
    fn tampered_output_is_rejected() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let x = Fr::from(77u64);
        let pk = g * x;
        let n = 3;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 31) as u64)).collect();
        let messages: Vec<G> = (1..=n as u64).map(|i| g * Fr::from(i)).collect();
        let w: Vec<Ciphertext<G>> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Ciphertext::encrypt(g, pk, *m, Fr::from((i + 5) as u64)))
            .collect();

        let mut out = prove(&challenger, &params, g, pk, &h, &w, &mut rng);
        out.output[0].v = out.output[0].v + g;
        assert!(verify(&challenger, &params, g, pk, &h, &w, &out.output, &out.proof).is_err());
    }

    #[test]
    fn proof_byte_tree_round_trips() {
        let mut rng = ark_std::test_rng();
        let params = GlobalParams::test_default(3, 2);
        let challenger = Challenger::new(&params);
        let g = G::generator();
        let pk = g * Fr::from(77u64);
        let n = 3;
        let h: Vec<G> = (0..n).map(|i| g * Fr::from((i + 31) as u64)).collect();
        let messages: Vec<G> = (1..=n as u64).map(|i| g * Fr::from(i)).collect();
        let w: Vec<Ciphertext<G>> = messages
            .iter()
            .enumerate()
            .map(|(i, m)| Ciphertext::encrypt(g, pk, *m, Fr::from((i + 5) as u64)))
            .collect();

        let out = prove(&challenger, &params, g, pk, &h, &w, &mut rng);
        let decoded: PosProof<G> = PosProof::decode(&out.proof.encode()).unwrap();
        assert_eq!(decoded.u, out.proof.u);
        assert_eq!(decoded.reply.k_f, out.proof.reply.k_f);
    }
}
