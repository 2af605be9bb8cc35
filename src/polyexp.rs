//! Polynomial-in-exponent (spec.md §4.C): `PolyInExp(p) = (phi(c_i))_i` for
//! a Shamir polynomial `p(X) = sum c_i X^i` and homomorphism `phi: R -> G`.
//!
//! Grounded on the `ElGamalCiphertext`/`ChaumPedersenProof` pattern of
//! being generic over `C: CurveGroup` (rather than hard-coded to a single
//! curve), generalized here one step further to also be generic over the
//! homomorphism `phi` (plain exponential for plain VSS, Pedersen for
//! Pedersen VSS) via the `Homomorphism` trait in `group.rs`.

use crate::bytetree::{encode_group, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::error::InputFormatError;
use crate::group::{GroupElement, Homomorphism};
use ark_ff::Field;

/// `PolyInExp(p) = (phi(c_0), ..., phi(c_d))` for a degree-`d` polynomial
/// `p` with coefficients in `R^{arity}`. Canonical form trims trailing
/// identity coefficients so degree is unambiguous (spec.md §3).
#[derive(Clone, Debug)]
pub struct PolyInExp<C: GroupElement> {
    /// `coeffs[i]` is `phi` applied to the i-th coefficient vector.
    coeffs: Vec<C>,
}

impl<C: GroupElement> PolyInExp<C> {
    /// Build a `PolyInExp` from per-degree coefficient arguments (each of
    /// length `phi.arity()`), applying `phi` and then canonicalizing.
    pub fn from_coefficients<H: Homomorphism<C>>(
        phi: &H,
        coefficient_args: &[Vec<C::ScalarField>],
    ) -> Self {
        let coeffs = coefficient_args.iter().map(|args| phi.apply(args)).collect();
        Self::canonicalize(coeffs)
    }

    /// Construct directly from already-mapped group elements, canonicalizing.
    pub fn from_group_elements(coeffs: Vec<C>) -> Self {
        Self::canonicalize(coeffs)
    }

    fn canonicalize(mut coeffs: Vec<C>) -> Self {
        while coeffs.len() > 1 && coeffs.last() == Some(&C::zero()) {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(C::zero());
        }
        Self { coeffs }
    }

    /// Degree of the underlying polynomial (0 for the identity polynomial).
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn coefficients(&self) -> &[C] {
        &self.coeffs
    }

    /// `eval(x) = prod_i coeffs[i]^{x^i}`.
    pub fn eval(&self, x: C::ScalarField) -> C {
        let mut acc = C::zero();
        let mut power = C::ScalarField::ONE;
        for c in &self.coeffs {
            acc += *c * power;
            power *= x;
        }
        acc
    }

    /// Componentwise product, the exponent-domain equivalent of
    /// multiplying two polynomials' generating function when one side has
    /// degree 0 (used to combine two sharings of the same domain, spec.md
    /// §4.D "Aggregation"). For full polynomial multiplication the
    /// corresponding ring-side polynomials would need to be multiplied
    /// before applying `phi`; this engine only ever needs the additive
    /// (componentwise) combination, since VSS aggregation sums shares.
    pub fn mul(&self, other: &Self) -> Self {
        let len = self.coeffs.len().max(other.coeffs.len());
        let mut coeffs = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.coeffs.get(i).copied().unwrap_or(C::zero());
            let b = other.coeffs.get(i).copied().unwrap_or(C::zero());
            coeffs.push(a + b);
        }
        Self::canonicalize(coeffs)
    }

    /// The constant term `phi(c_0)`, i.e. `eval(0)`.
    pub fn constant_term(&self) -> C {
        self.coeffs.first().copied().unwrap_or(C::zero())
    }
}

impl<C: GroupElement> ByteTreeEncode for PolyInExp<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(self.coeffs.iter().map(encode_group).collect())
    }
}

impl<C: GroupElement> ByteTreeDecode for PolyInExp<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.is_empty() {
            return Err(InputFormatError::Decode(
                "PolyInExp must have at least one coefficient".into(),
            ));
        }
        let coeffs = children
            .iter()
            .map(crate::bytetree::decode_group)
            .collect::<Result<Vec<C>, _>>()?;
        Ok(Self::canonicalize(coeffs))
    }
}

/// Sample a uniformly random Shamir polynomial of degree `t - 1` with
/// `p(0) = secret`, returning its coefficients as ring elements (spec.md
/// §4.D "Deal"). Coefficient 0 is the secret; the rest are fresh random
/// scalars.
pub fn sample_sharing_polynomial<F: ark_ff::PrimeField>(
    secret: F,
    t: usize,
    rng: &mut impl rand_core::RngCore,
) -> Vec<F> {
    use ark_ff::UniformRand;
    let mut coeffs = Vec::with_capacity(t);
    coeffs.push(secret);
    for _ in 1..t {
        coeffs.push(F::rand(rng));
    }
    coeffs
}

/// Evaluate a Shamir polynomial (ring-side, not yet mapped through `phi`)
/// at `x`, using Horner's method.
pub fn eval_poly<F: ark_ff::PrimeField>(coeffs: &[F], x: F) -> F {
    let mut acc = F::zero();
    for c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

/// Lagrange interpolation at 0 from `(x_i, y_i)` pairs, used by VSS
/// `recover` (spec.md §4.D) and by threshold decryption's combination step
/// (spec.md §4.F step 4).
pub fn lagrange_coefficients_at_zero<F: ark_ff::PrimeField>(xs: &[F]) -> Vec<F> {
    let n = xs.len();
    let mut coeffs = Vec::with_capacity(n);
    for i in 0..n {
        let mut num = F::ONE;
        let mut den = F::ONE;
        for j in 0..n {
            if i == j {
                continue;
            }
            num *= -xs[j];
            den *= xs[i] - xs[j];
        }
        coeffs.push(num * den.inverse().expect("interpolation points must be distinct"));
    }
    coeffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ExpHomomorphism;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;
    use ark_std::UniformRand;

    #[test]
    fn eval_matches_ring_side_evaluation() {
        let mut rng = ark_std::test_rng();
        let g = G::generator();
        let phi = ExpHomomorphism::new(g);
        let coeffs: Vec<Fr> = vec![Fr::from(17u64), Fr::from(42u64)];
        let poly = PolyInExp::from_coefficients(&phi, &coeffs.iter().map(|c| vec![*c]).collect::<Vec<_>>());
        for x in [Fr::from(1u64), Fr::from(2u64), Fr::from(3u64)] {
            let expected = g * eval_poly(&coeffs, x);
            assert_eq!(poly.eval(x), expected);
        }
        let _ = &mut rng;
        let _ = Fr::rand(&mut ark_std::test_rng());
    }

    #[test]
    fn canonicalization_trims_trailing_identity() {
        let coeffs = vec![G::zero(), G::generator(), G::zero()];
        let poly: PolyInExp<G> = PolyInExp::from_group_elements(coeffs);
        assert_eq!(poly.degree(), 1);
    }

    #[test]
    fn lagrange_recovers_constant_term() {
        // p(X) = 17 + 42X mod 83 (the spec.md §8 seed scenario's own field
        // is smaller, but the Lagrange math is field-independent).
        let secret = Fr::from(17u64);
        let coeffs = vec![secret, Fr::from(42u64)];
        let xs = vec![Fr::from(1u64), Fr::from(2u64)];
        let ys: Vec<Fr> = xs.iter().map(|&x| eval_poly(&coeffs, x)).collect();
        let lambdas = lagrange_coefficients_at_zero(&xs);
        let recovered: Fr = lambdas.iter().zip(&ys).map(|(l, y)| *l * y).sum();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn byte_tree_round_trips() {
        let g = G::generator();
        let phi = ExpHomomorphism::new(g);
        let coeffs: Vec<Fr> = vec![Fr::from(3u64), Fr::from(5u64)];
        let poly = PolyInExp::from_coefficients(&phi, &coeffs.iter().map(|c| vec![*c]).collect::<Vec<_>>());
        let encoded = poly.encode();
        let decoded: PolyInExp<G> = PolyInExp::decode(&encoded).unwrap();
        assert_eq!(poly.coefficients(), decoded.coefficients());
    }
}
