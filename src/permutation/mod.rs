//! Permutation commitment (spec.md §4.G): a dealer's commitment to a
//! uniformly random permutation, together with its shrinking mechanism for
//! the pre-computation path (spec.md §4.K).

pub mod ccpos;
pub mod pos;
pub mod posc;

use crate::bytetree::{ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::error::{InputFormatError, ProtocolError};
use crate::group::GroupElement;
use ark_ff::UniformRand;
use rand_core::RngCore;

const LOG_TARGET: &str = "mixnet_engine::permutation";

/// A permutation over `{0,...,n-1}`, represented as its image array:
/// `perm.map[i]` is `pi(i)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    map: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self { map: (0..n).collect() }
    }

    pub fn from_map(map: Vec<usize>) -> Result<Self, InputFormatError> {
        let n = map.len();
        let mut seen = vec![false; n];
        for &v in &map {
            if v >= n || seen[v] {
                return Err(InputFormatError::Decode(
                    "permutation map is not a bijection".into(),
                ));
            }
            seen[v] = true;
        }
        Ok(Self { map })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn map(&self, i: usize) -> usize {
        self.map[i]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.map
    }

    /// `inv()`: the inverse permutation.
    pub fn inv(&self) -> Self {
        let mut inverse = vec![0usize; self.map.len()];
        for (i, &pi_i) in self.map.iter().enumerate() {
            inverse[pi_i] = i;
        }
        Self { map: inverse }
    }

    /// Restriction to the first `m` preimages (spec.md §3 `shrink(m)`).
    /// Only well-defined when `pi` maps `{0..m}` onto itself, which is the
    /// case for permutation commitments shrunk via a well-formed keepList.
    pub fn shrink(&self, m: usize) -> Self {
        Self {
            map: self.map[..m].to_vec(),
        }
    }

    /// Sample a permutation uniformly at random. `rho`, the statistical
    /// distance parameter from `GlobalParams`, governs the underlying
    /// group's randomness source in the Verificatum-style reference design
    /// but this crate's PRG collaborator always returns exact uniform
    /// samples (a Fisher-Yates shuffle), so `rho` only documents intent
    /// here rather than gating any approximation.
    pub fn sample_random(n: usize, rho: u32, rng: &mut impl RngCore) -> Self {
        let _ = rho;
        let mut map: Vec<usize> = (0..n).collect();
        for i in (1..n).rev() {
            let j = (rng.next_u64() as usize) % (i + 1);
            map.swap(i, j);
        }
        Self { map }
    }

    /// Apply the permutation to a slice: `out[pi(i)] = input[i]`, i.e. the
    /// element array `permute` operation from spec.md §3.
    pub fn permute<T: Clone>(&self, input: &[T]) -> Vec<T> {
        let mut out = input.to_vec();
        for (i, item) in input.iter().enumerate() {
            out[self.map[i]] = item.clone();
        }
        out
    }
}

/// A boolean `keepList` mask selecting the first `n'` real entries of a
/// pre-computed batch of size `n` (spec.md §4.G "Shrinking").
#[derive(Clone, Debug)]
pub struct KeepList {
    mask: Vec<bool>,
}

impl KeepList {
    /// The all-ones keepList for `|ciphertexts| == maxciph` (spec.md §8
    /// boundary behavior: shrinking is a no-op).
    pub fn all_kept(n: usize) -> Self {
        Self { mask: vec![true; n] }
    }

    /// Wrap an arbitrary boolean mask directly, e.g. a verifier's
    /// `CorrectIndices` vector, which needn't be a keep-prefix shape.
    pub fn from_mask(mask: Vec<bool>) -> Self {
        Self { mask }
    }

    pub fn prefix(n: usize, n_prime: usize) -> Self {
        let mut mask = vec![false; n];
        for slot in mask.iter_mut().take(n_prime) {
            *slot = true;
        }
        Self { mask }
    }

    pub fn count_kept(&self) -> usize {
        self.mask.iter().filter(|&&b| b).count()
    }

    pub fn len(&self) -> usize {
        self.mask.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }

    /// Validate structural well-formedness: correct length and exactly
    /// `n_prime` ones (spec.md §4.G "Dishonest keepList... trivialized").
    pub fn validate(&self, expected_len: usize, n_prime: usize) -> Result<(), ProtocolError> {
        if self.mask.len() != expected_len {
            return Err(ProtocolError::Invariant(format!(
                "keepList length {} != expected {}",
                self.mask.len(),
                expected_len
            )));
        }
        if self.count_kept() != n_prime {
            return Err(ProtocolError::Invariant(format!(
                "keepList has {} kept entries, expected {}",
                self.count_kept(),
                n_prime
            )));
        }
        Ok(())
    }

    /// Extract the kept entries, in order (element array `extract(keepMask)`).
    pub fn extract<T: Clone>(&self, input: &[T]) -> Vec<T> {
        input
            .iter()
            .zip(&self.mask)
            .filter_map(|(item, &keep)| keep.then(|| item.clone()))
            .collect()
    }
}

impl ByteTreeEncode for KeepList {
    fn encode(&self) -> ByteTree {
        let bytes: Vec<u8> = self.mask.iter().map(|&b| if b { 1u8 } else { 0u8 }).collect();
        ByteTree::leaf(bytes)
    }
}

impl ByteTreeDecode for KeepList {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let bytes = tree.as_leaf()?;
        let mask = bytes
            .iter()
            .map(|&b| match b {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(InputFormatError::Decode(format!(
                    "keepList byte must be 0 or 1, got {other}"
                ))),
            })
            .collect::<Result<Vec<bool>, _>>()?;
        Ok(Self { mask })
    }
}

/// A dealer's commitment to a permutation `pi` of size `n`, together with
/// the secret exponent vector that opens it (spec.md §3
/// `PermutationCommitment`).
#[derive(Clone, Debug)]
pub struct PermutationCommitment<C: GroupElement> {
    /// `u[i] = g^{r_{pi^-1(i)}} * h_{pi^-1(i)}`.
    pub u: Vec<C>,
    pub keep_list: Option<KeepList>,
    pub permutation: Permutation,
    pub r: Vec<C::ScalarField>,
}

impl<C: GroupElement> PermutationCommitment<C> {
    /// Generate a fresh permutation commitment of size `n` under generator
    /// `g` and independent generators `h` (spec.md §4.G).
    pub fn generate(g: C, h: &[C], n: usize, rho: u32, rng: &mut impl RngCore) -> Self {
        assert_eq!(h.len(), n, "need exactly n independent generators");
        let pi = Permutation::sample_random(n, rho, rng);
        let pi_inv = pi.inv();
        let r: Vec<C::ScalarField> = (0..n).map(|_| C::ScalarField::rand(rng)).collect();

        let mut u = vec![C::zero(); n];
        for i in 0..n {
            let src = pi_inv.map(i);
            u[i] = g * r[src] + h[src];
        }

        tracing::debug!(target: LOG_TARGET, n, "generated permutation commitment");
        Self {
            u,
            keep_list: None,
            permutation: pi,
            r,
        }
    }

    /// The trivial commitment equal to the generator vector, substituted
    /// in by a verifier on PoSC rejection (spec.md §4.H "Outputs... on
    /// reject the verifier replaces the prover's permutation commitment
    /// with a trivial one equal to the generator vector").
    pub fn trivial(h: &[C]) -> Vec<C> {
        h.to_vec()
    }

    /// Shrink `u` (and implicitly the caller's copy of `h`) to the first
    /// `n'` real entries using `keep_list`, after validating its
    /// well-formedness (spec.md §4.G/§4.K step 1).
    pub fn shrink(&self, keep_list: &KeepList, n_prime: usize) -> Result<Vec<C>, ProtocolError> {
        keep_list.validate(self.u.len(), n_prime)?;
        Ok(keep_list.extract(&self.u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective as G};
    use ark_ec::PrimeGroup;

    #[test]
    fn permutation_inverse_round_trips() {
        let pi = Permutation::from_map(vec![2, 4, 1, 3, 0]).unwrap();
        let inv = pi.inv();
        for i in 0..5 {
            assert_eq!(inv.map(pi.map(i)), i);
        }
    }

    #[test]
    fn permute_moves_elements_to_image() {
        let pi = Permutation::from_map(vec![1, 2, 0]).unwrap();
        let data = vec!["a", "b", "c"];
        let out = pi.permute(&data);
        assert_eq!(out, vec!["c", "a", "b"]);
    }

    #[test]
    fn keep_list_shrinks_correctly() {
        let mut rng = ark_std::test_rng();
        let g = G::generator();
        let h: Vec<G> = (0..5).map(|i| g * Fr::from((i + 2) as u64)).collect();
        let comm = PermutationCommitment::generate(g, &h, 5, 50, &mut rng);
        let kl = KeepList::prefix(5, 3);
        let shrunk = comm.shrink(&kl, 3).unwrap();
        assert_eq!(shrunk.len(), 3);
    }

    #[test]
    fn all_ones_keep_list_is_noop() {
        let kl = KeepList::all_kept(4);
        assert_eq!(kl.count_kept(), 4);
        assert!(kl.validate(4, 4).is_ok());
    }

    #[test]
    fn malformed_keep_list_rejected() {
        let kl = KeepList::prefix(5, 2);
        assert!(kl.validate(5, 3).is_err());
    }

    #[test]
    fn keep_list_byte_tree_round_trips() {
        let kl = KeepList::prefix(6, 4);
        let decoded = KeepList::decode(&kl.encode()).unwrap();
        assert_eq!(decoded.as_slice(), kl.as_slice());
    }
}
