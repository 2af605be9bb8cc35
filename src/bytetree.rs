//! Canonical byte-tree codec (spec.md §4.A).
//!
//! Every protocol object has exactly one byte-tree encoding: a leaf is a
//! length-prefixed byte string, an inner node is a length-prefixed sequence
//! of child byte-trees. Every Fiat-Shamir challenge, every on-disk proof
//! artifact, and the independent verifier's input all go through this
//! encoding, so it lives in its own module rather than folded into ad-hoc
//! transcript-building scattered per-proof. This module generalizes that
//! pattern into one canonical tree type shared by every component.

use crate::error::{InputFormatError, MixnetError};
use ark_ec::CurveGroup;
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};

const LOG_TARGET: &str = "mixnet_engine::bytetree";

/// Tag byte distinguishing a leaf from a node, written before the
/// length-prefixed body. Not strictly required for unambiguous decoding
/// (leaf/node is always known from the decoder's schema) but kept for
/// defense in depth against malformed on-disk input, matching the
/// belt-and-suspenders style of careful serialization wrappers.
const TAG_LEAF: u8 = 0x00;
const TAG_NODE: u8 = 0x01;

/// A canonical byte-tree: either a length-prefixed leaf or a length-prefixed
/// sequence of children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ByteTree {
    Leaf(Vec<u8>),
    Node(Vec<ByteTree>),
}

impl ByteTree {
    pub fn leaf(bytes: impl Into<Vec<u8>>) -> Self {
        ByteTree::Leaf(bytes.into())
    }

    pub fn node(children: Vec<ByteTree>) -> Self {
        ByteTree::Node(children)
    }

    /// Serialize to the bit-exact wire/file representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out);
        out
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            ByteTree::Leaf(bytes) => {
                out.push(TAG_LEAF);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            ByteTree::Node(children) => {
                out.push(TAG_NODE);
                out.extend_from_slice(&(children.len() as u32).to_be_bytes());
                for child in children {
                    child.write(out);
                }
            }
        }
    }

    /// Parse the bit-exact wire/file representation back into a `ByteTree`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, InputFormatError> {
        let (tree, rest) = Self::parse(bytes)?;
        if !rest.is_empty() {
            return Err(InputFormatError::Decode(format!(
                "{} trailing byte(s) after byte-tree",
                rest.len()
            )));
        }
        Ok(tree)
    }

    fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), InputFormatError> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| InputFormatError::Decode("empty byte-tree input".into()))?;
        if rest.len() < 4 {
            return Err(InputFormatError::Decode(
                "truncated byte-tree length prefix".into(),
            ));
        }
        let (len_bytes, rest) = rest.split_at(4);
        let len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
        match tag {
            TAG_LEAF => {
                if rest.len() < len {
                    return Err(InputFormatError::Decode(
                        "truncated byte-tree leaf body".into(),
                    ));
                }
                let (body, rest) = rest.split_at(len);
                Ok((ByteTree::Leaf(body.to_vec()), rest))
            }
            TAG_NODE => {
                let mut children = Vec::with_capacity(len);
                let mut cursor = rest;
                for _ in 0..len {
                    let (child, remainder) = Self::parse(cursor)?;
                    children.push(child);
                    cursor = remainder;
                }
                Ok((ByteTree::Node(children), cursor))
            }
            other => Err(InputFormatError::Decode(format!(
                "unknown byte-tree tag {other}"
            ))),
        }
    }

    pub fn as_leaf(&self) -> Result<&[u8], InputFormatError> {
        match self {
            ByteTree::Leaf(bytes) => Ok(bytes),
            ByteTree::Node(_) => Err(InputFormatError::Decode("expected leaf, found node".into())),
        }
    }

    pub fn as_node(&self) -> Result<&[ByteTree], InputFormatError> {
        match self {
            ByteTree::Node(children) => Ok(children),
            ByteTree::Leaf(_) => Err(InputFormatError::Decode("expected node, found leaf".into())),
        }
    }
}

/// Bijective encode/decode into/from the canonical byte-tree. Property
/// tested in `tests/`: `decode(encode(x)) == x` for every implementer.
pub trait ByteTreeEncode {
    fn encode(&self) -> ByteTree;
}

pub trait ByteTreeDecode: Sized {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError>;
}

/// Round-trip helper used throughout the engine and by the proof-directory
/// writer: encode to bytes directly, or decode from bytes directly.
pub fn encode_to_bytes(value: &impl ByteTreeEncode) -> Vec<u8> {
    value.encode().to_bytes()
}

pub fn decode_from_bytes<T: ByteTreeDecode>(bytes: &[u8]) -> Result<T, MixnetError> {
    let tree = ByteTree::from_bytes(bytes)?;
    T::decode(&tree).map_err(MixnetError::from)
}

// --- Primitive encodings ------------------------------------------------

impl ByteTreeEncode for u64 {
    fn encode(&self) -> ByteTree {
        ByteTree::leaf(self.to_be_bytes().to_vec())
    }
}

impl ByteTreeDecode for u64 {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let bytes = tree.as_leaf()?;
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| InputFormatError::Decode("u64 leaf must be 8 bytes".into()))?;
        Ok(u64::from_be_bytes(arr))
    }
}

impl ByteTreeEncode for String {
    fn encode(&self) -> ByteTree {
        ByteTree::leaf(self.as_bytes().to_vec())
    }
}

impl ByteTreeDecode for String {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        let bytes = tree.as_leaf()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| InputFormatError::Decode(format!("invalid utf8: {e}")))
    }
}

impl<T: ByteTreeEncode> ByteTreeEncode for Vec<T> {
    fn encode(&self) -> ByteTree {
        ByteTree::node(self.iter().map(ByteTreeEncode::encode).collect())
    }
}

impl<T: ByteTreeDecode> ByteTreeDecode for Vec<T> {
    fn decode(tree: &ByteTree) -> Result<Self, InputFormatError> {
        tree.as_node()?.iter().map(T::decode).collect()
    }
}

/// Encode a ring (scalar field) element as its big-endian byte representation.
pub fn encode_ring<F: PrimeField>(value: &F) -> ByteTree {
    ByteTree::leaf(value.into_bigint().to_bytes_be())
}

pub fn decode_ring<F: PrimeField>(tree: &ByteTree) -> Result<F, InputFormatError> {
    let bytes = tree.as_leaf()?;
    Ok(F::from_be_bytes_mod_order(bytes))
}

/// Encode a group element via arkworks' canonical compressed serialization,
/// wrapped as a byte-tree leaf (mirrors the usual
/// `point.serialize_compressed(&mut bytes)` calls throughout
/// `chaum_pedersen/native.rs` and `shuffling/bayer_groth/transcript.rs`, but
/// centralized so every component shares one encoding).
pub fn encode_group<C: CurveGroup>(value: &C) -> ByteTree {
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .expect("curve point serialization is infallible for a valid element");
    ByteTree::leaf(bytes)
}

pub fn decode_group<C: CurveGroup>(tree: &ByteTree) -> Result<C, InputFormatError> {
    let bytes = tree.as_leaf()?;
    C::deserialize_compressed(bytes)
        .map_err(|e| InputFormatError::Decode(format!("curve point decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trips() {
        let tree = ByteTree::leaf(vec![1, 2, 3, 4]);
        let bytes = tree.to_bytes();
        assert_eq!(ByteTree::from_bytes(&bytes).unwrap(), tree);
    }

    #[test]
    fn nested_node_round_trips() {
        let tree = ByteTree::node(vec![
            ByteTree::leaf(vec![]),
            ByteTree::node(vec![ByteTree::leaf(vec![9, 9]), ByteTree::leaf(vec![1])]),
        ]);
        let bytes = tree.to_bytes();
        assert_eq!(ByteTree::from_bytes(&bytes).unwrap(), tree);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let tree = ByteTree::leaf(vec![1, 2, 3]);
        let mut bytes = tree.to_bytes();
        bytes.truncate(bytes.len() - 1);
        assert!(ByteTree::from_bytes(&bytes).is_err());
    }

    #[test]
    fn string_round_trips() {
        let s = "session-id-42".to_string();
        let encoded = s.encode();
        let decoded = String::decode(&encoded).unwrap();
        assert_eq!(s, decoded);
    }

    #[test]
    fn vec_round_trips() {
        let v: Vec<u64> = vec![1, 2, 3, 42];
        let bytes = encode_to_bytes(&v);
        let decoded: Vec<u64> = decode_from_bytes(&bytes).unwrap();
        assert_eq!(v, decoded);
    }
}
