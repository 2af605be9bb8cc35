//! The abstract `Group`/`Ring`/`Homomorphism` boundary (spec.md §3).
//!
//! Big-integer and finite-field arithmetic are out of scope for this crate;
//! they are supplied by `ark_ff`/`ark_ec`. This module pins down the narrow
//! interface the protocol engine actually needs and wires it to any curve
//! group via a single blanket impl, the way `ElGamalCiphertext<C:
//! CurveGroup>` and `ChaumPedersenProof<C: CurveGroup>` are generic over the
//! concrete curve rather than hard-coding BN254 everywhere.

use ark_ec::CurveGroup;
use ark_ff::{PrimeField, UniformRand};
use ark_std::rand::RngCore;

/// The ring `R = Z/qZ` associated with a prime-order group `G` of order `q`.
///
/// Every scalar field of an `ark_ec::CurveGroup` is a `Ring` for free.
pub trait Ring: PrimeField {}
impl<F: PrimeField> Ring for F {}

/// A group element supporting the operations the protocol needs:
/// multiplication, exponentiation by a ring element, and inversion.
///
/// Every `ark_ec::CurveGroup` is a `Group` for free, with its `ScalarField`
/// as the associated `Ring`. Product groups `G^n` are modeled directly as
/// `Vec<C>` / `[C; N]` rather than as a distinct wrapper type, matching how
/// `Vec<ElGamalCiphertext<C>>` is threaded through the shuffle pipeline
/// instead of introducing a `ProductGroup` newtype.
pub trait GroupElement: CurveGroup<ScalarField: Ring> {}
impl<C: CurveGroup> GroupElement for C {}

/// A homomorphism `phi: R -> G` (or, for Pedersen-style commitments, a
/// two-argument `phi: R x R -> G`). `PolyInExp` (§4.C) is generic over this
/// trait so the same code serves both the plain exponential map used by VSS
/// and the Pedersen map used by permutation commitments.
pub trait Homomorphism<C: GroupElement>: Clone {
    /// Number of ring-element arguments this homomorphism takes (1 for the
    /// plain exponential map, 2 for Pedersen).
    fn arity(&self) -> usize;

    /// Apply the homomorphism to `args`. Panics if `args.len() != arity()`;
    /// this is an internal invariant violation, not a recoverable error.
    fn apply(&self, args: &[C::ScalarField]) -> C;
}

/// `phi(x) = g^x` for a fixed generator `g`.
#[derive(Clone, Debug)]
pub struct ExpHomomorphism<C: GroupElement> {
    pub generator: C,
}

impl<C: GroupElement> ExpHomomorphism<C> {
    pub fn new(generator: C) -> Self {
        Self { generator }
    }
}

impl<C: GroupElement> Homomorphism<C> for ExpHomomorphism<C> {
    fn arity(&self) -> usize {
        1
    }

    fn apply(&self, args: &[C::ScalarField]) -> C {
        assert_eq!(args.len(), 1, "ExpHomomorphism takes exactly one argument");
        self.generator * args[0]
    }
}

/// `phi(x, r) = g^x * h^r` for fixed generators `g`, `h`. Used by Pedersen
/// VSS (§4.D) where the committed value is paired with its blinding factor.
#[derive(Clone, Debug)]
pub struct PedersenHomomorphism<C: GroupElement> {
    pub g: C,
    pub h: C,
}

impl<C: GroupElement> PedersenHomomorphism<C> {
    pub fn new(g: C, h: C) -> Self {
        Self { g, h }
    }
}

impl<C: GroupElement> Homomorphism<C> for PedersenHomomorphism<C> {
    fn arity(&self) -> usize {
        2
    }

    fn apply(&self, args: &[C::ScalarField]) -> C {
        assert_eq!(args.len(), 2, "PedersenHomomorphism takes exactly two arguments");
        self.g * args[0] + self.h * args[1]
    }
}

/// Sample a uniformly random ring element, the building block for Shamir
/// polynomial coefficients, Pedersen blinding factors, and re-encryption
/// exponents throughout the engine.
pub fn random_scalar<F: Ring>(rng: &mut impl RngCore) -> F {
    F::rand(rng)
}
