//! Fiat-Shamir challenger: the random oracle every Sigma-protocol in this
//! crate draws its coins from (spec.md §4.B).
//!
//! One common approach derives challenges from a `PoseidonSponge` seeded
//! per-proof (a `BgTranscript`-style construction). This module
//! generalizes that idea away from a single fixed curve: the challenger
//! hashes the canonical byte-tree encoding of the session parameters once
//! into a fixed prefix, then re-derives every challenge as
//! `H(prefix || transcript_bytes)`, exactly as spec.md §4.B specifies,
//! using `sha3::Shake256` as an arbitrary-output-length hash rather than a
//! fixed-width sponge so both challenge kinds (PRG seed, integer challenge)
//! share one code path.

use crate::bytetree::{ByteTree, ByteTreeEncode};
use crate::config::GlobalParams;
use num_bigint::BigUint;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

const LOG_TARGET: &str = "mixnet_engine::challenger";

/// A Fiat-Shamir random oracle bound to one session's global parameters.
///
/// Constructed once per session; `challenge` may be called arbitrarily many
/// times with different transcript prefixes (one per Sigma-protocol move).
#[derive(Clone)]
pub struct Challenger {
    /// `H(G || version || sid.auxsid || rho || n_v || n_e || PRG || G_q || H)`,
    /// computed once and prepended to every subsequent hash call.
    prefix: Vec<u8>,
}

impl Challenger {
    /// Build the challenger's fixed prefix from the session's global
    /// parameters (spec.md §4.B, §6 "byte-tree challenger global prefix").
    pub fn new(params: &GlobalParams) -> Self {
        let prefix_tree = ByteTree::node(vec![
            ByteTree::leaf(params.group_descriptor.as_bytes().to_vec()),
            ByteTree::leaf(params.version.as_bytes().to_vec()),
            ByteTree::leaf(format!("{}.{}", params.sid, params.auxsid).into_bytes()),
            (params.rho as u64).encode(),
            (params.n_v as u64).encode(),
            (params.n_e as u64).encode(),
            ByteTree::leaf(params.prg_descriptor.as_bytes().to_vec()),
            ByteTree::leaf(params.group_order_descriptor.as_bytes().to_vec()),
            ByteTree::leaf(params.hash_descriptor.as_bytes().to_vec()),
        ]);
        let prefix = prefix_tree.to_bytes();
        tracing::debug!(target: LOG_TARGET, prefix_len = prefix.len(), "challenger prefix derived");
        Self { prefix }
    }

    /// Derive up to `out_bits` bits from `H(prefix || transcript_bytes)`,
    /// with the top bits of the final byte masked so the output is exactly
    /// `out_bits` long, per spec.md §4.B.
    fn derive_bytes(&self, transcript_bytes: &[u8], out_bits: usize) -> Vec<u8> {
        let out_len = out_bits.div_ceil(8);
        let mut hasher = Shake256::default();
        hasher.update(&self.prefix);
        hasher.update(transcript_bytes);
        let mut reader = hasher.finalize_xof();
        let mut out = vec![0u8; out_len];
        reader.read(&mut out);
        if out_bits % 8 != 0 {
            let mask = 0xFFu8 >> (8 - out_bits % 8);
            if let Some(top) = out.first_mut() {
                *top &= mask;
            }
        }
        out
    }

    /// Batching-seed challenge: seeds a PRG that in turn derives the
    /// batching vector `e in F^n` (spec.md §4.B use 1). `min_seed_bytes` is
    /// the PRG's minimum seed length in bytes; the returned bytes are the
    /// seed, not yet expanded into the vector (expansion happens in
    /// `derive_batch_vector`).
    pub fn batching_seed(&self, transcript_bytes: &[u8], min_seed_bytes: usize) -> Vec<u8> {
        self.derive_bytes(transcript_bytes, min_seed_bytes * 8)
    }

    /// Integer challenge in `[0, 2^n_v)` (spec.md §4.B use 2).
    pub fn integer_challenge(&self, transcript_bytes: &[u8], n_v: usize) -> BigUint {
        let bytes = self.derive_bytes(transcript_bytes, n_v);
        BigUint::from_bytes_be(&bytes)
    }

    /// Derive the batching vector `e in F^n` with each component uniform
    /// over `[0, 2^n_e)`, by seeding a ChaCha-based PRG from the batching
    /// seed and drawing `n` independent `n_e`-bit integers from it.
    pub fn derive_batch_vector<F: ark_ff::PrimeField>(
        &self,
        transcript_bytes: &[u8],
        n: usize,
        n_e: usize,
        min_seed_bytes: usize,
    ) -> Vec<F> {
        use rand_chacha::rand_core::SeedableRng;
        use rand_chacha::ChaCha20Rng;

        let seed_bytes = self.batching_seed(transcript_bytes, min_seed_bytes);
        let mut seed = [0u8; 32];
        let take = seed_bytes.len().min(32);
        seed[..take].copy_from_slice(&seed_bytes[..take]);
        let mut rng = ChaCha20Rng::from_seed(seed);

        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            let byte_len = n_e.div_ceil(8);
            let mut raw = vec![0u8; byte_len];
            rand_core::RngCore::fill_bytes(&mut rng, &mut raw);
            if n_e % 8 != 0 {
                let mask = 0xFFu8 >> (8 - n_e % 8);
                if let Some(top) = raw.first_mut() {
                    *top &= mask;
                }
            }
            out.push(F::from_be_bytes_mod_order(&raw));
        }
        out
    }
}

/// Reinterpret a `BigUint` challenge (as produced by [`Challenger::integer_challenge`])
/// as a scalar-field element, reducing modulo the field's order.
pub fn biguint_to_scalar<F: ark_ff::PrimeField>(value: &BigUint) -> F {
    F::from_be_bytes_mod_order(&value.to_bytes_be())
}
