//! Proof of a shuffle of commitments (PoSC, Terelius-Wikström; spec.md
//! §4.H): a 4-move Sigma-protocol proving that a permutation commitment
//! `u` opens to *some* permutation of the generator vector `h`.
//!
//! The batching vector `e` (spec.md §4.B use 1) collapses the `n`
//! relations `u_i = g^{r_{pi^-1(i)}} h_{pi^-1(i)}` into the single
//! aggregate equation `A := prod u_i^{e_i} = g^{<r,e'>} * prod h_i^{e'_i}`
//! for `e' = e o pi`. The remaining proof is then a generalized Schnorr
//! proof of knowledge of a *representation* of `A` with respect to the
//! independent bases `(g, h_1, ..., h_n)` — exponents `(rho, e'_1, ..., e'_n)`
//! with `rho = <r, e'>` — which is exactly as hard as the discrete-log
//! relation problem those bases are chosen to be hard under. This mirrors
//! the `ChaumPedersenProof` commit/challenge/respond pattern (verified
//! via `g^z == T * alpha^c`), generalized from two bases to `n+1`.

use crate::bytetree::{decode_group, decode_ring, encode_group, encode_ring, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::challenger::{biguint_to_scalar, Challenger};
use crate::config::GlobalParams;
use crate::error::{InputFormatError, ProofRejected};
use crate::group::GroupElement;
use crate::permutation::PermutationCommitment;
use ark_ff::UniformRand;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::permutation::posc";

/// Prover's first-move commitment: a Pedersen-style commitment `B = g^beta
/// * prod h_i^{alpha_i}` to the blinding vector `alpha` and blinding
/// scalar `beta`.
#[derive(Clone, Debug)]
pub struct PoscCommitment<C: GroupElement> {
    pub b: C,
}

impl<C: GroupElement> ByteTreeEncode for PoscCommitment<C> {
    fn encode(&self) -> ByteTree {
        encode_group(&self.b)
    }
}

impl<C: GroupElement> ByteTreeDecode for PoscCommitment<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        Ok(Self { b: decode_group(tree)? })
    }
}

/// Prover's reply to the integer challenge `v`: `k_e[i] = alpha_i + v *
/// e'_i` (vector) and `k_f = beta + v * rho` (scalar), named `k_E`/`k_F`
/// per spec.md §4.H's (k_A..k_F) naming convention.
#[derive(Clone, Debug)]
pub struct PoscReply<C: GroupElement> {
    pub k_e: Vec<C::ScalarField>,
    pub k_f: C::ScalarField,
}

impl<C: GroupElement> ByteTreeEncode for PoscReply<C> {
    fn encode(&self) -> ByteTree {
        let mut children: Vec<ByteTree> = self.k_e.iter().map(encode_ring).collect();
        children.push(encode_ring(&self.k_f));
        ByteTree::node(children)
    }
}

impl<C: GroupElement> ByteTreeDecode for PoscReply<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.is_empty() {
            return Err(InputFormatError::Decode("PoscReply requires at least k_f".into()));
        }
        let (k_f_tree, k_e_trees) = children.split_last().expect("checked non-empty");
        let k_e = k_e_trees.iter().map(decode_ring).collect::<Result<Vec<_>, _>>()?;
        let k_f = decode_ring(k_f_tree)?;
        Ok(Self { k_e, k_f })
    }
}

/// Witness the prover retains between the commitment and reply moves.
struct PoscState<C: GroupElement> {
    alpha: Vec<C::ScalarField>,
    beta: C::ScalarField,
    e_prime: Vec<C::ScalarField>,
    rho: C::ScalarField,
}

fn transcript_for_challenge<C: GroupElement>(g: C, h: &[C], u: &[C]) -> Vec<u8> {
    let mut tree = vec![encode_group(&g)];
    tree.extend(h.iter().map(encode_group));
    tree.extend(u.iter().map(encode_group));
    crate::bytetree::ByteTree::node(tree).to_bytes()
}

fn derive_batch_vector<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    h: &[C],
    u: &[C],
) -> Vec<C::ScalarField> {
    let transcript = transcript_for_challenge(g, h, u);
    let min_seed = crate::config::min_seed_bytes(&params.prg_descriptor).unwrap_or(32);
    challenger.derive_batch_vector(&transcript, u.len(), params.n_e as usize, min_seed)
}

/// Permute the public batch vector `e` by the prover's secret permutation:
/// `e'_i = e_{pi(i)}`.
fn permuted_batch_vector<C: GroupElement>(
    e: &[C::ScalarField],
    pi: &crate::permutation::Permutation,
) -> Vec<C::ScalarField> {
    (0..e.len()).map(|i| e[pi.map(i)]).collect()
}

fn commit<C: GroupElement>(
    g: C,
    h: &[C],
    commitment: &PermutationCommitment<C>,
    e: &[C::ScalarField],
    rng: &mut impl RngCore,
) -> (PoscState<C>, PoscCommitment<C>) {
    let n = h.len();
    let e_prime = permuted_batch_vector::<C>(e, &commitment.permutation);
    let rho = commitment
        .r
        .iter()
        .zip(&e_prime)
        .map(|(r_i, e_i)| *r_i * e_i)
        .fold(C::ScalarField::from(0u64), |a, b| a + b);

    let alpha: Vec<C::ScalarField> = (0..n).map(|_| C::ScalarField::rand(rng)).collect();
    let beta = C::ScalarField::rand(rng);
    let b = h
        .iter()
        .zip(&alpha)
        .map(|(h_i, a_i)| *h_i * a_i)
        .fold(g * beta, |acc, x| acc + x);

    (
        PoscState {
            alpha,
            beta,
            e_prime,
            rho,
        },
        PoscCommitment { b },
    )
}

fn respond<C: GroupElement>(state: &PoscState<C>, v: C::ScalarField) -> PoscReply<C> {
    let k_e = state
        .alpha
        .iter()
        .zip(&state.e_prime)
        .map(|(a, e)| *a + v * e)
        .collect();
    let k_f = state.beta + v * state.rho;
    PoscReply { k_e, k_f }
}

/// Run the full prover side: derive `e` from the Fiat-Shamir transcript,
/// commit, derive the integer challenge `v`, and reply.
pub fn prove<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    h: &[C],
    commitment: &PermutationCommitment<C>,
    rng: &mut impl RngCore,
) -> (PoscCommitment<C>, PoscReply<C>) {
    let e = derive_batch_vector(challenger, params, g, h, &commitment.u);
    let (state, comm) = commit(g, h, commitment, &e, rng);

    let mut challenge_transcript = transcript_for_challenge(g, h, &commitment.u);
    challenge_transcript.extend(encode_group(&comm.b).to_bytes());
    let v = challenger.integer_challenge(&challenge_transcript, params.n_v as usize);
    let v_scalar = biguint_to_scalar::<C::ScalarField>(&v);

    let reply = respond(&state, v_scalar);
    tracing::debug!(target: LOG_TARGET, n = h.len(), "PoSC proof generated");
    (comm, reply)
}

/// Verify a PoSC proof against public `(g, h, u)`. On rejection the caller
/// is responsible for substituting the trivial permutation commitment
/// (spec.md §4.H "on reject the verifier replaces the prover's permutation
/// commitment with a trivial one equal to the generator vector").
pub fn verify<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    h: &[C],
    u: &[C],
    commitment: &PoscCommitment<C>,
    reply: &PoscReply<C>,
) -> Result<(), ProofRejected> {
    if reply.k_e.len() != h.len() {
        return Err(ProofRejected::Posc { party: 0 });
    }
    let e = derive_batch_vector(challenger, params, g, h, u);

    let mut challenge_transcript = transcript_for_challenge(g, h, u);
    challenge_transcript.extend(encode_group(&commitment.b).to_bytes());
    let v = challenger.integer_challenge(&challenge_transcript, params.n_v as usize);
    let v_scalar = biguint_to_scalar::<C::ScalarField>(&v);

    let a: C = u
        .iter()
        .zip(&e)
        .map(|(u_i, e_i)| *u_i * e_i)
        .fold(C::zero(), |acc, x| acc + x);

    let lhs = h
        .iter()
        .zip(&reply.k_e)
        .map(|(h_i, k_i)| *h_i * k_i)
        .fold(g * reply.k_f, |acc, x| acc + x);
    let rhs = commitment.b + a * v_scalar;

    if lhs == rhs {
        Ok(())
    } else {
        Err(ProofRejected::Posc { party: 0 })
    }
}
