//! Distributed ElGamal: key generation via Pedersen-sequential VSS, public
//! key publication, and threshold decryption with per-party proofs of
//! correct decryption factors (spec.md §4.F, partially promoted to §4.G by
//! the component table).
//!
//! Grounded on the `chaum_pedersen::native::ChaumPedersenProof` pattern
//! (equality of discrete logs, Fiat-Shamir via a sponge transcript) and
//! `pedersen_commitment::native::msm_ciphertexts` (batched linear
//! combination over ciphertext arrays), generalized from one fixed curve
//! and one decryptor to an arbitrary group and a `t`-of-`k` committee with
//! per-party correct-decryption proofs and Lagrange recombination.

pub mod ciphertext;

use crate::bytetree::{decode_group, encode_group, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::challenger::Challenger;
use crate::error::{InputFormatError, ProtocolError};
use crate::group::GroupElement;
use crate::polyexp::lagrange_coefficients_at_zero;
use crate::vss::sequential::SequentialVss;
pub use ciphertext::Ciphertext;

use ark_ff::UniformRand;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::elgamal";

/// The distributed public key `y = prod_{l=1..t} y_l` published after key
/// generation, together with the generator it's defined relative to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey<C: GroupElement> {
    pub generator: C,
    pub y: C,
}

impl<C: GroupElement> ByteTreeEncode for PublicKey<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![encode_group(&self.generator), encode_group(&self.y)])
    }
}

impl<C: GroupElement> ByteTreeDecode for PublicKey<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 2 {
            return Err(InputFormatError::Decode(
                "PublicKey expects exactly 2 children".into(),
            ));
        }
        Ok(Self {
            generator: decode_group(&children[0])?,
            y: decode_group(&children[1])?,
        })
    }
}

/// Derive the distributed public key from a completed Pedersen-sequential
/// run (spec.md §4.F: "Secret key is shared by the collapsed
/// Pedersen-sequential instance").
pub fn derive_public_key<C: GroupElement>(
    generator: C,
    vss: &SequentialVss<C>,
) -> PublicKey<C> {
    PublicKey {
        generator,
        y: vss.constant_element_product(),
    }
}

/// A Chaum-Pedersen-style equal-discrete-log proof batched over `n`
/// ciphertexts, proving `log_g(y_l) = log_{u_i}(df_l[i])` for every `i`
/// simultaneously (spec.md §4.F step 2, the "CR (correct-decryption)
/// proof"). Generalizes the single-pair-of-bases `ChaumPedersenProof<C>`
/// pattern to a batched relation via the challenger's batching vector.
///
/// Split on disk into [`DecryptionFactorCommitment`] (`DFCommitment<LL>.bt`)
/// and [`DecryptionFactorReply`] (`DFReply<LL>.bt`) per spec.md §6, matching
/// the commitment/reply file pairs every other Sigma-protocol in this crate
/// writes (`PoSCCommitment`/`PoSCReply`, `CCPoSCommitment`/`CCPoSReply`).
#[derive(Clone, Debug)]
pub struct DecryptionFactorProof<C: GroupElement> {
    pub commitment_g: C,
    pub commitment_batched_u: C,
    pub response: C::ScalarField,
}

/// The proof's first-move commitment half, `DFCommitment<LL>.bt`.
#[derive(Clone, Debug)]
pub struct DecryptionFactorCommitment<C: GroupElement> {
    pub commitment_g: C,
    pub commitment_batched_u: C,
}

/// The proof's reply half, `DFReply<LL>.bt`.
#[derive(Clone, Debug)]
pub struct DecryptionFactorReply<C: GroupElement> {
    pub response: C::ScalarField,
}

impl<C: GroupElement> DecryptionFactorProof<C> {
    pub fn commitment(&self) -> DecryptionFactorCommitment<C> {
        DecryptionFactorCommitment {
            commitment_g: self.commitment_g,
            commitment_batched_u: self.commitment_batched_u,
        }
    }

    pub fn reply(&self) -> DecryptionFactorReply<C> {
        DecryptionFactorReply { response: self.response }
    }

    pub fn from_parts(commitment: DecryptionFactorCommitment<C>, reply: DecryptionFactorReply<C>) -> Self {
        Self {
            commitment_g: commitment.commitment_g,
            commitment_batched_u: commitment.commitment_batched_u,
            response: reply.response,
        }
    }
}

impl<C: GroupElement> ByteTreeEncode for DecryptionFactorCommitment<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![encode_group(&self.commitment_g), encode_group(&self.commitment_batched_u)])
    }
}

impl<C: GroupElement> ByteTreeDecode for DecryptionFactorCommitment<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 2 {
            return Err(InputFormatError::Decode(
                "DecryptionFactorCommitment expects exactly 2 children".into(),
            ));
        }
        Ok(Self {
            commitment_g: decode_group(&children[0])?,
            commitment_batched_u: decode_group(&children[1])?,
        })
    }
}

impl<C: GroupElement> ByteTreeEncode for DecryptionFactorReply<C> {
    fn encode(&self) -> ByteTree {
        crate::bytetree::encode_ring(&self.response)
    }
}

impl<C: GroupElement> ByteTreeDecode for DecryptionFactorReply<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        Ok(Self {
            response: crate::bytetree::decode_ring(tree)?,
        })
    }
}

/// The combined encoding, used where a [`DecryptionFactorProof`] travels as
/// part of a larger in-memory transcript (e.g. [`DecryptionFactors`]) rather
/// than as the two standalone on-disk files `proofdir.rs` writes.
impl<C: GroupElement> ByteTreeEncode for DecryptionFactorProof<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![self.commitment().encode(), self.reply().encode()])
    }
}

impl<C: GroupElement> ByteTreeDecode for DecryptionFactorProof<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 2 {
            return Err(InputFormatError::Decode(
                "DecryptionFactorProof expects exactly 2 children".into(),
            ));
        }
        let commitment = DecryptionFactorCommitment::decode(&children[0])?;
        let reply = DecryptionFactorReply::decode(&children[1])?;
        Ok(Self::from_parts(commitment, reply))
    }
}

/// Party `l`'s published decryption factors `df_l[i] = u_i^{x_l}` for every
/// ciphertext `i`, plus the proof they were computed with the same `x_l`
/// that produced `y_l`.
#[derive(Clone, Debug)]
pub struct DecryptionFactors<C: GroupElement> {
    pub party: usize,
    pub factors: Vec<C>,
    pub proof: DecryptionFactorProof<C>,
}

impl<C: GroupElement> ByteTreeEncode for DecryptionFactors<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![
            ByteTree::Leaf((self.party as u64).to_be_bytes().to_vec()),
            ByteTree::node(self.factors.iter().map(encode_group).collect()),
            self.proof.encode(),
        ])
    }
}

impl<C: GroupElement> ByteTreeDecode for DecryptionFactors<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 3 {
            return Err(InputFormatError::Decode(
                "DecryptionFactors expects exactly 3 children".into(),
            ));
        }
        let party_bytes = children[0].as_leaf()?;
        if party_bytes.len() != 8 {
            return Err(InputFormatError::Decode(
                "DecryptionFactors party index must be 8 bytes".into(),
            ));
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(party_bytes);
        let party = u64::from_be_bytes(buf) as usize;
        let factors = children[1]
            .as_node()?
            .iter()
            .map(decode_group)
            .collect::<Result<Vec<C>, _>>()?;
        let proof = DecryptionFactorProof::decode(&children[2])?;
        Ok(Self { party, factors, proof })
    }
}

fn transcript_bytes<C: GroupElement>(y_l: C, factors: &[C]) -> Vec<u8> {
    let mut tree_children = vec![encode_group(&y_l)];
    tree_children.extend(factors.iter().map(encode_group));
    ByteTree::node(tree_children).to_bytes()
}

/// Party `l` computes and proves its decryption factors for ciphertext
/// list `cts` under its secret share `x_l` (whose public counterpart is
/// `y_l = g^{x_l}`). The batching vector `e` used to collapse the
/// per-ciphertext relations into one equation is re-derived by the
/// verifier from the same Fiat-Shamir transcript, so no separate
/// interaction round is needed.
pub fn compute_and_prove_decryption_factors<C: GroupElement>(
    challenger: &Challenger,
    generator: C,
    party: usize,
    x_l: C::ScalarField,
    y_l: C,
    cts: &[Ciphertext<C>],
    rng: &mut impl RngCore,
) -> DecryptionFactors<C> {
    let factors: Vec<C> = cts.iter().map(|ct| ct.u * x_l).collect();
    let transcript = transcript_bytes(y_l, &factors);
    let min_seed = 32;
    let e: Vec<C::ScalarField> =
        challenger.derive_batch_vector(&transcript, cts.len(), 128, min_seed);

    let batched_u: C = cts
        .iter()
        .zip(&e)
        .map(|(ct, e_i)| ct.u * e_i)
        .fold(C::zero(), |acc, x| acc + x);

    let w = C::ScalarField::rand(rng);
    let commitment_g = generator * w;
    let commitment_batched_u = batched_u * w;

    let mut challenge_transcript = transcript.clone();
    challenge_transcript.extend(encode_group(&commitment_g).to_bytes());
    challenge_transcript.extend(encode_group(&commitment_batched_u).to_bytes());
    let challenge = challenger.integer_challenge(&challenge_transcript, 128);
    let challenge_scalar = crate::challenger::biguint_to_scalar::<C::ScalarField>(&challenge);

    let response = w + challenge_scalar * x_l;

    tracing::debug!(target: LOG_TARGET, party, n = cts.len(), "computed decryption factors + CR proof");

    DecryptionFactors {
        party,
        factors,
        proof: DecryptionFactorProof {
            commitment_g,
            commitment_batched_u,
            response,
        },
    }
}

/// Verify party `l`'s correct-decryption proof (spec.md §4.F step 2/3).
pub fn verify_decryption_factors<C: GroupElement>(
    challenger: &Challenger,
    generator: C,
    y_l: C,
    cts: &[Ciphertext<C>],
    df: &DecryptionFactors<C>,
) -> bool {
    if df.factors.len() != cts.len() {
        return false;
    }
    let transcript = transcript_bytes(y_l, &df.factors);
    let min_seed = 32;
    let e: Vec<C::ScalarField> =
        challenger.derive_batch_vector(&transcript, cts.len(), 128, min_seed);

    let batched_u: C = cts
        .iter()
        .zip(&e)
        .map(|(ct, e_i)| ct.u * e_i)
        .fold(C::zero(), |acc, x| acc + x);
    let batched_df: C = df
        .factors
        .iter()
        .zip(&e)
        .map(|(f, e_i)| *f * e_i)
        .fold(C::zero(), |acc, x| acc + x);

    let mut challenge_transcript = transcript.clone();
    challenge_transcript.extend(encode_group(&df.proof.commitment_g).to_bytes());
    challenge_transcript.extend(encode_group(&df.proof.commitment_batched_u).to_bytes());
    let challenge = challenger.integer_challenge(&challenge_transcript, 128);
    let challenge_scalar = crate::challenger::biguint_to_scalar::<C::ScalarField>(&challenge);

    let lhs1 = generator * df.proof.response;
    let rhs1 = df.proof.commitment_g + y_l * challenge_scalar;
    let lhs2 = batched_u * df.proof.response;
    let rhs2 = df.proof.commitment_batched_u + batched_df * challenge_scalar;

    lhs1 == rhs1 && lhs2 == rhs2
}

/// Threshold-decrypt `cts` from the submitted [`DecryptionFactors`] of
/// every committee member, verifying each member's proof, keeping only
/// those whose proof checks out, and recombining via Lagrange
/// interpolation over any threshold-size subset of correct parties
/// (spec.md §4.F steps 3-5).
pub fn threshold_decrypt<C: GroupElement>(
    challenger: &Challenger,
    generator: C,
    y_ls: &[(usize, C)],
    cts: &[Ciphertext<C>],
    submissions: &[DecryptionFactors<C>],
    t: usize,
) -> Result<(Vec<C>, Vec<bool>), ProtocolError> {
    let max_party = y_ls.iter().map(|(l, _)| *l).max().unwrap_or(0);
    let mut correct = vec![false; max_party + 1];

    for df in submissions {
        let Some((_, y_l)) = y_ls.iter().find(|(l, _)| *l == df.party) else {
            continue;
        };
        if verify_decryption_factors(challenger, generator, *y_l, cts, df) {
            correct[df.party] = true;
        }
    }

    let correct_parties: Vec<usize> = (1..correct.len()).filter(|&l| correct[l]).collect();
    if correct_parties.len() < t {
        return Err(ProtocolError::InsufficientHonestParties {
            correct: correct_parties.len(),
            threshold: t,
        });
    }

    let subset = &correct_parties[..t];
    let xs: Vec<C::ScalarField> = subset.iter().map(|&l| C::ScalarField::from(l as u64)).collect();
    let lambdas = lagrange_coefficients_at_zero(&xs);

    let mut plaintexts = Vec::with_capacity(cts.len());
    for (i, ct) in cts.iter().enumerate() {
        let mut d = C::zero();
        for (&l, lambda) in subset.iter().zip(&lambdas) {
            let df = submissions.iter().find(|s| s.party == l).expect("correct party submitted");
            d += df.factors[i] * lambda;
        }
        plaintexts.push(ct.decrypt_with_factor(d));
    }

    tracing::info!(
        target: LOG_TARGET,
        n_correct = correct_parties.len(),
        t,
        "threshold decryption combined"
    );

    Ok((plaintexts, correct))
}
