//! A mix-net engine for ElGamal ciphertexts: distributed key generation via
//! Pedersen verifiable secret sharing, re-encryption shuffling proven by
//! universally-verifiable Sigma-protocols (PoSC, CCPoS, monolithic PoS), and
//! threshold decryption, all driven through a canonical byte-tree codec and
//! a Fiat-Shamir challenger so every step is independently verifiable from
//! the proof directory it writes.
//!
//! Module layout mirrors the leaf-first component table of the design this
//! crate implements: `bytetree`/`challenger` at the base, `polyexp`/`vss`
//! building distributed key generation, `permutation`/`shuffle` building the
//! shuffle engine, and `mixnet` composing both into one session.

pub mod bulletin;
pub mod bytetree;
pub mod challenger;
pub mod config;
pub mod elgamal;
pub mod error;
pub mod group;
pub mod igs;
pub mod mixnet;
pub mod permutation;
pub mod polyexp;
pub mod shuffle;
pub mod tokio_tools;
pub mod verifier;
pub mod vss;

pub use error::{MixnetError, Result};
