//! Pedersen VSS basic state machine (spec.md §4.D): a single dealer shares
//! a secret among `k` receivers under threshold `t`, with no complaint
//! round. `orchestrated.rs` wraps this with the complaint/refutation round.

use crate::group::{GroupElement, Homomorphism};
use crate::polyexp::{eval_poly, sample_sharing_polynomial, PolyInExp};
use crate::vss::PedersenShare;
use ark_ff::PrimeField;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::vss::basic";

/// Lifecycle states of one dealer instance, per spec.md §4.D:
/// `INITIAL -> SHARING_COMPUTED (dealer) | VERIFICATION_POSSIBLE (receiver)
/// -> SECRET_RECOVERED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VssState {
    Initial,
    SharingComputed,
    VerificationPossible,
    SecretRecovered,
}

/// What the dealer publishes: the `PolyInExp` of the sharing polynomial and
/// the per-receiver encrypted shares. Encryption/labeling of the
/// per-receiver ciphertext is out of this crate's scope (spec.md §1, "Big-
/// integer arithmetic... PRG/hash primitives" are external collaborators);
/// this engine models the already-decrypted share each receiver holds
/// after an out-of-band labeled decryption, since the label-binding itself
/// is a property of the bulletin-board/transport layer, not of the VSS math.
#[derive(Clone, Debug)]
pub struct DealtShares<C: GroupElement> {
    pub poly: PolyInExp<C>,
    /// `shares[j]` is receiver `j`'s (1-indexed) cleartext share; `shares[0]`
    /// is unused padding to keep 1-based indexing throughout.
    pub shares: Vec<C::ScalarField>,
}

/// Deal a fresh Pedersen sharing of `secret` among `k` receivers with
/// threshold `t` (spec.md §4.D "Deal"). `phi` is the homomorphism the
/// coefficients are mapped through (plain exponential for the simplest
/// case; the orchestrated/Pedersen-proper variant uses the two-argument
/// Pedersen homomorphism over `(c_i, blinding_i)` pairs instead).
pub fn deal<C: GroupElement, H: Homomorphism<C>>(
    phi: &H,
    secret: C::ScalarField,
    k: usize,
    t: usize,
    rng: &mut impl RngCore,
) -> DealtShares<C> {
    let coeffs = sample_sharing_polynomial(secret, t, rng);
    let poly = PolyInExp::from_coefficients(phi, &coeffs.iter().map(|c| vec![*c]).collect::<Vec<_>>());
    let mut shares = vec![C::ScalarField::from(0u64)];
    for j in 1..=k {
        let x = C::ScalarField::from(j as u64);
        shares.push(eval_poly(&coeffs, x));
    }
    tracing::debug!(target: LOG_TARGET, k, t, degree = poly.degree(), "dealt Pedersen sharing");
    DealtShares { poly, shares }
}

/// Receiver-side verification (spec.md §4.D "Receive"): check
/// `phi(share) == poly.eval(j)` for some homomorphism `phi` applied to the
/// single received share. Returns `false` (raising a complaint, handled by
/// `orchestrated.rs`) rather than an error, since a failed check here is an
/// expected, locally-recoverable protocol outcome, not an invariant
/// violation.
pub fn verify_share<C: GroupElement, H: Homomorphism<C>>(
    phi: &H,
    share: C::ScalarField,
    poly: &PolyInExp<C>,
    receiver: usize,
) -> bool {
    let expected = poly.eval(C::ScalarField::from(receiver as u64));
    phi.apply(&[share]) == expected
}

/// Recover the dealt secret from `>= t` verified `(receiver_index, share)`
/// pairs via Lagrange interpolation at 0 (spec.md §4.D "Recover").
pub fn recover<F: PrimeField>(verified: &[(usize, F)], t: usize) -> Option<F> {
    if verified.len() < t {
        return None;
    }
    let subset = &verified[..t];
    let xs: Vec<F> = subset.iter().map(|(i, _)| F::from(*i as u64)).collect();
    let ys: Vec<F> = subset.iter().map(|(_, y)| *y).collect();
    let lambdas = crate::polyexp::lagrange_coefficients_at_zero(&xs);
    Some(lambdas.iter().zip(&ys).map(|(l, y)| *l * y).sum())
}

/// Wrap a dealt share and public polynomial as a [`PedersenShare`] for
/// receiver `j`.
pub fn share_for_receiver<C: GroupElement>(dealt: &DealtShares<C>, j: usize) -> PedersenShare<C> {
    PedersenShare {
        share: dealt.shares[j],
        poly: dealt.poly.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::ExpHomomorphism;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;

    #[test]
    fn happy_path_recovers_secret() {
        // spec.md §8 scenario 1 shape: k=3, t=2, secret s=17.
        let mut rng = ark_std::test_rng();
        let phi = ExpHomomorphism::new(G::generator());
        let secret = Fr::from(17u64);
        let dealt = deal::<G, _>(&phi, secret, 3, 2, &mut rng);

        for j in 1..=3 {
            let share = share_for_receiver(&dealt, j);
            assert!(verify_share(&phi, share.share, &share.poly, j));
        }

        let verified: Vec<(usize, Fr)> = (1..=2).map(|j| (j, dealt.shares[j])).collect();
        assert_eq!(recover(&verified, 2), Some(secret));
    }

    #[test]
    fn insufficient_shares_fail_to_recover() {
        let mut rng = ark_std::test_rng();
        let phi = ExpHomomorphism::new(G::generator());
        let dealt = deal::<G, _>(&phi, Fr::from(17u64), 3, 3, &mut rng);
        let verified: Vec<(usize, Fr)> = vec![(1, dealt.shares[1])];
        assert_eq!(recover(&verified, 3), None);
    }

    #[test]
    fn tampered_share_fails_verification() {
        let mut rng = ark_std::test_rng();
        let phi = ExpHomomorphism::new(G::generator());
        let dealt = deal::<G, _>(&phi, Fr::from(17u64), 3, 2, &mut rng);
        let tampered = dealt.shares[1] + Fr::from(1u64);
        assert!(!verify_share(&phi, tampered, &dealt.poly, 1));
    }
}
