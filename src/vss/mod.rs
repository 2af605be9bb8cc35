//! Pedersen verifiable secret sharing (spec.md §4.D/§4.E/§4.F).
//!
//! `basic` implements the single-dealer state machine (§4.D); `orchestrated`
//! layers the complaint/refutation/trivialization round on top (§4.E);
//! `sequential` runs `t` dealers one after another and exposes the
//! collapsed aggregate sharing used by distributed key generation (§4.F).

pub mod basic;
pub mod orchestrated;
pub mod sequential;

use crate::bytetree::{decode_ring, encode_ring, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::error::InputFormatError;
use crate::group::GroupElement;
use crate::polyexp::PolyInExp;
use ark_ff::PrimeField;

/// A single party's share of a Pedersen-VSS-dealt secret, together with the
/// dealer's public `PolyInExp` (spec.md §3 `PedersenShare`).
///
/// `share` is zeroized on drop: it is as sensitive as the secret itself
/// once `t` shares are collected, consistent with spec.md §5's "element
/// arrays... released along every exit path" ownership discipline applied
/// to scalar secrets. Arkworks field elements don't carry a blanket
/// `zeroize::Zeroize` impl usable from a generic `C: GroupElement` bound,
/// so the clearing is done by direct assignment instead of pulling in the
/// `zeroize` crate for a single field.
#[derive(Clone, Debug)]
pub struct PedersenShare<C: GroupElement> {
    pub share: C::ScalarField,
    pub poly: PolyInExp<C>,
}

impl<C: GroupElement> Drop for PedersenShare<C> {
    fn drop(&mut self) {
        self.share = C::ScalarField::from(0u64);
    }
}

impl<C: GroupElement> PedersenShare<C> {
    /// A trivialized share: `share = 1`, `poly(X) = identity`. Produced
    /// when the dealer fails to refute a complaint (spec.md §4.D).
    pub fn trivial() -> Self {
        Self {
            share: C::ScalarField::from(1u64),
            poly: PolyInExp::from_group_elements(vec![C::zero()]),
        }
    }

    pub fn is_trivial(&self) -> bool {
        self.share == C::ScalarField::from(1u64) && self.poly.degree() == 0 && self.poly.constant_term() == C::zero()
    }

    /// Verify this share against its own published `PolyInExp` for receiver
    /// index `j` under homomorphism `phi`: `phi(share) == poly.eval(j)`.
    pub fn verify_against(&self, phi_of_share: C, j: C::ScalarField) -> bool {
        let _ = j;
        phi_of_share == self.poly.eval(j)
    }

    /// Sum two shares over the same domain and multiply their `PolyInExp`s
    /// (spec.md §4.D "Aggregation").
    pub fn aggregate(&self, other: &Self) -> Self {
        Self {
            share: self.share + other.share,
            poly: self.poly.mul(&other.poly),
        }
    }
}

impl<C: GroupElement> ByteTreeEncode for PedersenShare<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![encode_ring(&self.share), self.poly.encode()])
    }
}

impl<C: GroupElement> ByteTreeDecode for PedersenShare<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 2 {
            return Err(InputFormatError::Decode(
                "PedersenShare expects exactly 2 children".into(),
            ));
        }
        Ok(Self {
            share: decode_ring(&children[0])?,
            poly: PolyInExp::decode(&children[1])?,
        })
    }
}

/// Bitmap over `{1..k}` recording which parties are currently active
/// (spec.md §3 `ActiveSet`). Indices are 1-based to match the protocol's
/// party numbering; index 0 is unused.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    active: Vec<bool>,
}

impl ActiveSet {
    /// All `k` parties start active.
    pub fn all_active(k: usize) -> Self {
        Self {
            active: vec![true; k + 1],
        }
    }

    pub fn k(&self) -> usize {
        self.active.len() - 1
    }

    pub fn is_active(&self, party: usize) -> bool {
        self.active.get(party).copied().unwrap_or(false)
    }

    pub fn deactivate(&mut self, party: usize) {
        if let Some(slot) = self.active.get_mut(party) {
            *slot = false;
        }
    }

    pub fn reactivate(&mut self, party: usize) {
        if let Some(slot) = self.active.get_mut(party) {
            *slot = true;
        }
    }

    pub fn count_active(&self) -> usize {
        self.active.iter().skip(1).filter(|a| **a).count()
    }

    /// The largest contiguous-from-1 prefix of active parties, i.e. the
    /// active threshold (spec.md GLOSSARY "Active threshold") when parties
    /// are visited `1..activeThreshold` in index order and deactivation
    /// only ever removes trailing parties in this engine's session model.
    pub fn active_indices(&self) -> Vec<usize> {
        (1..=self.k()).filter(|&p| self.is_active(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_set_starts_full() {
        let set = ActiveSet::all_active(3);
        assert_eq!(set.count_active(), 3);
        assert!(set.is_active(1) && set.is_active(3));
    }

    #[test]
    fn deactivation_is_reflected() {
        let mut set = ActiveSet::all_active(3);
        set.deactivate(3);
        assert_eq!(set.count_active(), 2);
        assert_eq!(set.active_indices(), vec![1, 2]);
    }
}
