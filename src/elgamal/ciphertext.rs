//! ElGamal ciphertext and re-encryption, generalized from a
//! `shuffling::data_structures::ElGamalCiphertext<C: CurveGroup>` (already
//! generic over the curve) to the arbitrary-group, threshold-key setting
//! this engine needs.

use crate::bytetree::{decode_group, encode_group, ByteTree, ByteTreeDecode, ByteTreeEncode};
use crate::error::InputFormatError;
use crate::group::GroupElement;
use ark_ff::UniformRand;
use rand_core::RngCore;

/// `(u, v) = (g^r, m * y^r)` under public key `y` (spec.md GLOSSARY).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ciphertext<C: GroupElement> {
    pub u: C,
    pub v: C,
}

impl<C: GroupElement> Ciphertext<C> {
    pub fn encrypt(
        generator: C,
        public_key: C,
        message: C,
        randomness: C::ScalarField,
    ) -> Self {
        Self {
            u: generator * randomness,
            v: message + public_key * randomness,
        }
    }

    /// Re-encrypt by multiplying with `(g^s, y^s)` for fresh `s`; preserves
    /// the encrypted plaintext (spec.md GLOSSARY "Re-encryption").
    pub fn reencrypt(&self, generator: C, public_key: C, s: C::ScalarField) -> Self {
        Self {
            u: self.u + generator * s,
            v: self.v + public_key * s,
        }
    }

    pub fn sample_reencryption_exponent(rng: &mut impl RngCore) -> C::ScalarField {
        C::ScalarField::rand(rng)
    }

    /// Decrypt given the combined decryption factor `d = u^x` for secret
    /// key `x` (spec.md §4.F step 5: `m = v / D`).
    pub fn decrypt_with_factor(&self, decryption_factor: C) -> C {
        self.v - decryption_factor
    }
}

impl<C: GroupElement> ByteTreeEncode for Ciphertext<C> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(vec![encode_group(&self.u), encode_group(&self.v)])
    }
}

impl<C: GroupElement> ByteTreeDecode for Ciphertext<C> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let children = tree.as_node()?;
        if children.len() != 2 {
            return Err(InputFormatError::Decode(
                "Ciphertext expects exactly 2 children".into(),
            ));
        }
        Ok(Self {
            u: decode_group(&children[0])?,
            v: decode_group(&children[1])?,
        })
    }
}
