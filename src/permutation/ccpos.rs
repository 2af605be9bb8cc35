//! Commitment-consistent proof of a shuffle (CCPoS, Wikström; spec.md
//! §4.I): assumes a prior PoSC over the same generators `h` and
//! permutation commitment `u`, and additionally proves that a
//! re-encrypted, permuted ciphertext list `w'` is consistent with that
//! same permutation.
//!
//! Extends `posc.rs`'s representation-proof technique with two more
//! equations over the re-encryption relation (one per ciphertext
//! component), sharing the same blinding vector `alpha` (and hence the same
//! response vector `k_e`) across all three equations so a single `v` ties
//! the permutation commitment proof to the re-encryption proof.
//!
//! Each equation follows the same source/image shape as `posc.rs`'s single
//! one: the *image* array (`u` for the permutation, `w'` for the
//! ciphertexts) is batched with the plain challenge vector `e`, while the
//! *source* array (`h`, `w`) is batched with the permuted vector `e'` and
//! carries the response `k_e` in the verification equation. `w'_i` is
//! `reenc(w_{pi^-1(i)}, s_{pi^-1(i)})`, so the re-encryption exponents `s`
//! (indexed like `w`, pre-permutation) pair with `e'` for the same reason
//! the permutation commitment's `r` does.

use crate::bytetree::{decode_group, decode_ring, encode_group, encode_ring, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::challenger::{biguint_to_scalar, Challenger};
use crate::config::GlobalParams;
use crate::elgamal::Ciphertext;
use crate::error::{InputFormatError, ProofRejected};
use crate::group::GroupElement;
use crate::permutation::{Permutation, PermutationCommitment};
use ark_ff::UniformRand;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::permutation::ccpos";

#[derive(Clone, Debug)]
pub struct CcposCommitment<C: GroupElement> {
    pub b1: C,
    pub b2_u: C,
    pub b2_v: C,
}

impl<C: GroupElement> ByteTreeEncode for CcposCommitment<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![encode_group(&self.b1), encode_group(&self.b2_u), encode_group(&self.b2_v)])
    }
}

impl<C: GroupElement> ByteTreeDecode for CcposCommitment<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 3 {
            return Err(InputFormatError::Decode("CcposCommitment expects exactly 3 children".into()));
        }
        Ok(Self {
            b1: decode_group(&children[0])?,
            b2_u: decode_group(&children[1])?,
            b2_v: decode_group(&children[2])?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CcposReply<C: GroupElement> {
    pub k_e: Vec<C::ScalarField>,
    pub k_f: C::ScalarField,
    pub k_g: C::ScalarField,
}

impl<C: GroupElement> ByteTreeEncode for CcposReply<C> {
    fn encode(&self) -> ByteTree {
        let mut children: Vec<ByteTree> = self.k_e.iter().map(encode_ring).collect();
        children.push(encode_ring(&self.k_f));
        children.push(encode_ring(&self.k_g));
        ByteTree::node(children)
    }
}

impl<C: GroupElement> ByteTreeDecode for CcposReply<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() < 2 {
            return Err(InputFormatError::Decode("CcposReply requires at least k_f, k_g".into()));
        }
        let (k_g_tree, rest) = children.split_last().expect("checked len >= 2");
        let (k_f_tree, k_e_trees) = rest.split_last().expect("checked len >= 2");
        let k_e = k_e_trees.iter().map(decode_ring).collect::<Result<Vec<_>, _>>()?;
        let k_f = decode_ring(k_f_tree)?;
        let k_g = decode_ring(k_g_tree)?;
        Ok(Self { k_e, k_f, k_g })
    }
}

struct CcposState<C: GroupElement> {
    alpha: Vec<C::ScalarField>,
    beta: C::ScalarField,
    gamma: C::ScalarField,
    e_prime: Vec<C::ScalarField>,
    rho: C::ScalarField,
    sigma: C::ScalarField,
}

fn transcript_for_challenge<C: GroupElement>(
    g: C,
    pk: C,
    h: &[C],
    u: &[C],
    w: &[Ciphertext<C>],
    w_prime: &[Ciphertext<C>],
) -> Vec<u8> {
    let mut tree = vec![encode_group(&g), encode_group(&pk)];
    tree.extend(h.iter().map(encode_group));
    tree.extend(u.iter().map(encode_group));
    for ct in w {
        tree.push(encode_group(&ct.u));
        tree.push(encode_group(&ct.v));
    }
    for ct in w_prime {
        tree.push(encode_group(&ct.u));
        tree.push(encode_group(&ct.v));
    }
    crate::bytetree::ByteTree::node(tree).to_bytes()
}

fn derive_batch_vector<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    transcript: &[u8],
    n: usize,
) -> Vec<C::ScalarField> {
    let min_seed = crate::config::min_seed_bytes(&params.prg_descriptor).unwrap_or(32);
    challenger.derive_batch_vector(transcript, n, params.n_e as usize, min_seed)
}

fn permuted_batch_vector<C: GroupElement>(e: &[C::ScalarField], pi: &Permutation) -> Vec<C::ScalarField> {
    (0..e.len()).map(|i| e[pi.map(i)]).collect()
}

/// Prove CCPoS for a ciphertext re-encryption `w -> w'` under permutation
/// `pi` (already committed to via `commitment`) with re-encryption
/// exponents `s`.
#[allow(clippy::too_many_arguments)]
pub fn prove<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    commitment: &PermutationCommitment<C>,
    w: &[Ciphertext<C>],
    w_prime: &[Ciphertext<C>],
    s: &[C::ScalarField],
    rng: &mut impl RngCore,
) -> (CcposCommitment<C>, CcposReply<C>) {
    let n = h.len();
    let transcript = transcript_for_challenge(g, pk, h, &commitment.u, w, w_prime);
    let e = derive_batch_vector::<C>(challenger, params, &transcript, n);
    let e_prime = permuted_batch_vector::<C>(&e, &commitment.permutation);

    let rho = commitment
        .r
        .iter()
        .zip(&e_prime)
        .map(|(r_i, e_i)| *r_i * e_i)
        .fold(C::ScalarField::from(0u64), |a, b| a + b);
    // sigma pairs with e', not the plain e: w'_i is built from the *source*
    // ciphertext w_{pi^-1(i)}, so the batched re-encryption identity (like
    // rho above) only closes when s is weighted by the permuted vector.
    let sigma = s
        .iter()
        .zip(&e_prime)
        .map(|(s_i, e_i)| *s_i * e_i)
        .fold(C::ScalarField::from(0u64), |a, b| a + b);

    let alpha: Vec<C::ScalarField> = (0..n).map(|_| C::ScalarField::rand(rng)).collect();
    let beta = C::ScalarField::rand(rng);
    let gamma = C::ScalarField::rand(rng);

    let b1 = h
        .iter()
        .zip(&alpha)
        .map(|(h_i, a_i)| *h_i * a_i)
        .fold(g * beta, |acc, x| acc + x);
    // Built from the source array w (mirrors b1's use of h, not u): the
    // commitment proves a representation with respect to w's bases, the
    // same way b1 proves one with respect to h's bases.
    let b2_u = w
        .iter()
        .zip(&alpha)
        .map(|(ct, a_i)| ct.u * a_i)
        .fold(g * gamma, |acc, x| acc + x);
    let b2_v = w
        .iter()
        .zip(&alpha)
        .map(|(ct, a_i)| ct.v * a_i)
        .fold(pk * gamma, |acc, x| acc + x);

    let state = CcposState {
        alpha,
        beta,
        gamma,
        e_prime,
        rho,
        sigma,
    };
    let comm = CcposCommitment { b1, b2_u, b2_v };

    let mut challenge_transcript = transcript.clone();
    challenge_transcript.extend(encode_group(&comm.b1).to_bytes());
    challenge_transcript.extend(encode_group(&comm.b2_u).to_bytes());
    challenge_transcript.extend(encode_group(&comm.b2_v).to_bytes());
    let v = challenger.integer_challenge(&challenge_transcript, params.n_v as usize);
    let v_scalar = biguint_to_scalar::<C::ScalarField>(&v);

    let k_e = state
        .alpha
        .iter()
        .zip(&state.e_prime)
        .map(|(a, e)| *a + v_scalar * e)
        .collect();
    let k_f = state.beta + v_scalar * state.rho;
    let k_g = state.gamma + v_scalar * state.sigma;

    tracing::debug!(target: LOG_TARGET, n, "CCPoS proof generated");
    (comm, CcposReply { k_e, k_f, k_g })
}

/// Verify a CCPoS proof: the permutation-commitment equation (`b1`/`rhs1`,
/// identical to `posc::verify`'s single equation) plus the two
/// re-encryption-consistency equations over the ciphertext `u`/`v`
/// components, checked independently against the same challenge `v`.
#[allow(clippy::too_many_arguments)]
pub fn verify<C: GroupElement>(
    challenger: &Challenger,
    params: &GlobalParams,
    g: C,
    pk: C,
    h: &[C],
    u: &[C],
    w: &[Ciphertext<C>],
    w_prime: &[Ciphertext<C>],
    commitment: &CcposCommitment<C>,
    reply: &CcposReply<C>,
) -> Result<(), ProofRejected> {
    if reply.k_e.len() != h.len() || w.len() != w_prime.len() {
        return Err(ProofRejected::Ccpos { party: 0 });
    }
    let transcript = transcript_for_challenge(g, pk, h, u, w, w_prime);
    let e = derive_batch_vector::<C>(challenger, params, &transcript, h.len());

    let mut challenge_transcript = transcript.clone();
    challenge_transcript.extend(encode_group(&commitment.b1).to_bytes());
    challenge_transcript.extend(encode_group(&commitment.b2_u).to_bytes());
    challenge_transcript.extend(encode_group(&commitment.b2_v).to_bytes());
    let v = challenger.integer_challenge(&challenge_transcript, params.n_v as usize);
    let v_scalar = biguint_to_scalar::<C::ScalarField>(&v);

    let a: C = u.iter().zip(&e).map(|(u_i, e_i)| *u_i * e_i).fold(C::zero(), |acc, x| acc + x);
    // b_u/b_v are batched from the *image* array w' with the plain e (mirrors
    // `a` above being batched from the image array u with the plain e);
    // lhs2u/lhs2v pair the response k_e with the *source* array w (mirrors
    // lhs1 pairing k_e with the source array h).
    let b_u: C = w_prime.iter().zip(&e).map(|(ct, e_i)| ct.u * e_i).fold(C::zero(), |acc, x| acc + x);
    let b_v: C = w_prime.iter().zip(&e).map(|(ct, e_i)| ct.v * e_i).fold(C::zero(), |acc, x| acc + x);

    let lhs1 = h.iter().zip(&reply.k_e).map(|(h_i, k_i)| *h_i * k_i).fold(g * reply.k_f, |acc, x| acc + x);
    let rhs1 = commitment.b1 + a * v_scalar;

    let lhs2u = w.iter().zip(&reply.k_e).map(|(ct, k_i)| ct.u * k_i).fold(g * reply.k_g, |acc, x| acc + x);
    let rhs2u = commitment.b2_u + b_u * v_scalar;

    let lhs2v = w.iter().zip(&reply.k_e).map(|(ct, k_i)| ct.v * k_i).fold(pk * reply.k_g, |acc, x| acc + x);
    let rhs2v = commitment.b2_v + b_v * v_scalar;

    if lhs1 == rhs1 && lhs2u == rhs2u && lhs2v == rhs2v {
        Ok(())
    } else {
        Err(ProofRejected::Ccpos { party: 0 })
    }
}
