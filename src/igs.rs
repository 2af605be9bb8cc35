//! Independent generator source (spec.md §6): the contract for deriving
//! the `maxciph` generators `h_1..h_maxciph` used by permutation
//! commitments, such that no party (including the derivation process
//! itself) knows any discrete log relation among `g, h_1, ..., h_n`. The
//! internals of a cryptographically sound IGS (e.g. hash-to-curve with a
//! domain separator and a rejection sampling loop) are out of scope per
//! spec.md §1; this module only pins down the interface and supplies a
//! deterministic hash-to-curve construction built from Pedersen CRH, the
//! same primitive `vrf::native::hash_to_curve` uses to turn a VRF message
//! into a curve point rather than exponentiating a generator by a hash
//! output (the latter would publish the output's discrete log to every
//! party, including the prover).
//!
//! The Pedersen-CRH basis itself is derived once from a fixed, session-
//! independent domain separator, never from caller-supplied data: a
//! basis built from the session label would let whoever controls that
//! label bias the basis towards one it already knows a discrete-log
//! relation for.

use crate::group::GroupElement;
use ark_crypto_primitives::crh::{pedersen, CRHScheme};
use ark_ec::AffineRepr;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

const LOG_TARGET: &str = "mixnet_engine::igs";

/// Pedersen-CRH window large enough to hash a session label plus an 8-byte
/// index without truncation (1024 input bits), mirroring the window sizing
/// `vrf::VrfPedersenWindow` uses for its own hash-to-curve message.
#[derive(Clone)]
struct IgsWindow;

impl pedersen::Window for IgsWindow {
    const WINDOW_SIZE: usize = 4;
    const NUM_WINDOWS: usize = 256;
}

/// The fixed, public Pedersen-CRH basis every party derives independently
/// from a constant domain separator. Recomputed on every call rather than
/// cached, since `CRHScheme::setup` is cheap relative to the handful of
/// times per session this module is invoked.
fn igs_basis<C: GroupElement>() -> pedersen::Parameters<C> {
    let mut hasher = Shake256::default();
    hasher.update(b"mixnet-engine-igs-basis-v1");
    let mut reader = hasher.finalize_xof();
    let mut seed = [0u8; 32];
    reader.read(&mut seed);
    let mut rng = ChaCha20Rng::from_seed(seed);
    <pedersen::CRH<C, IgsWindow> as CRHScheme>::setup(&mut rng).expect("Pedersen CRH basis setup should not fail")
}

/// Derive `n` independent generators deterministically from a domain-
/// separating label, by hashing `label || index` directly to a curve point
/// via Pedersen CRH and clearing the cofactor. Unlike exponentiating a
/// fixed generator by a hash-derived scalar, nobody computing this (not
/// even the party running it) learns a discrete-log relation between the
/// output and `g`, since the output is never expressed as `g^scalar` for a
/// known `scalar`.
pub fn derive_generators<C: GroupElement>(label: &[u8], n: usize) -> Vec<C> {
    let params = igs_basis::<C>();
    (0..n)
        .map(|i| {
            let mut msg = Vec::with_capacity(label.len() + 16);
            msg.extend_from_slice(b"mixnet-engine-igs-v1");
            msg.extend_from_slice(label);
            msg.extend_from_slice(&(i as u64).to_be_bytes());
            let point = <pedersen::CRH<C, IgsWindow> as CRHScheme>::evaluate(&params, msg)
                .expect("Pedersen hash-to-curve should not fail");
            point.mul_by_cofactor().into()
        })
        .collect()
}
