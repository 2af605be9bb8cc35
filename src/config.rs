//! Session configuration: `GlobalParams` (spec.md §3) and the
//! hash/PRG/group descriptor registry that replaces the "runtime reflection
//! of cryptographic objects" design note of spec.md §9 with a plain map
//! from stable string identifiers to constructor closures.

use crate::error::InputFormatError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable, session-wide parameters loaded before any protocol step
/// (spec.md §3). `k`/`t` bound the threshold scheme; `rho` is the
/// statistical-distance parameter for permutation sampling; `n_v`/`n_e` are
/// challenge/batching bit lengths (spec.md §4.B/§4.H).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlobalParams {
    pub k: usize,
    pub t: usize,
    pub rho: u32,
    pub n_v: u32,
    pub n_e: u32,
    pub prg_descriptor: String,
    pub hash_descriptor: String,
    pub group_descriptor: String,
    pub group_order_descriptor: String,
    pub sid: String,
    pub auxsid: String,
    pub version: String,
}

/// Lower bound below which the batched PoSC soundness error
/// `2^{-n_e + log2(n)}` (spec.md §4.H) is considered too weak for any
/// realistic batch size; used only as a sanity check in `validate`, not
/// enforced by the type system.
const MIN_RECOMMENDED_N_E: u32 = 40;

impl GlobalParams {
    /// Validate the structural invariants spec.md §3 attaches to
    /// `GlobalParams`: `1 <= t <= k`, `rho`/`n_v`/`n_e` positive, `sid` and
    /// `auxsid` alphanumeric.
    pub fn validate(&self) -> Result<(), InputFormatError> {
        if self.t == 0 || self.t > self.k {
            return Err(InputFormatError::OutOfRange {
                field: "t",
                value: self.t as i64,
                lo: 1,
                hi: self.k as i64,
            });
        }
        if self.rho == 0 {
            return Err(InputFormatError::OutOfRange {
                field: "rho",
                value: self.rho as i64,
                lo: 1,
                hi: i64::MAX,
            });
        }
        if self.n_v == 0 {
            return Err(InputFormatError::OutOfRange {
                field: "n_v",
                value: self.n_v as i64,
                lo: 1,
                hi: i64::MAX,
            });
        }
        if self.n_e == 0 {
            return Err(InputFormatError::OutOfRange {
                field: "n_e",
                value: self.n_e as i64,
                lo: 1,
                hi: i64::MAX,
            });
        }
        validate_alphanumeric("sid", &self.sid)?;
        validate_alphanumeric("auxsid", &self.auxsid)?;
        if self.n_e < MIN_RECOMMENDED_N_E {
            tracing::warn!(
                target: "mixnet_engine::config",
                n_e = self.n_e,
                "n_e below recommended margin; PoSC/CCPoS soundness error may be non-negligible for large batches"
            );
        }
        Ok(())
    }

    /// A fixed, deterministic `GlobalParams` for unit/integration tests:
    /// `k`, `t` as given, everything else pinned to stable descriptors.
    pub fn test_default(k: usize, t: usize) -> Self {
        Self {
            k,
            t,
            rho: 50,
            n_v: 128,
            n_e: 128,
            prg_descriptor: "ChaCha20".to_string(),
            hash_descriptor: "SHAKE-256".to_string(),
            group_descriptor: "BN254".to_string(),
            group_order_descriptor: "BN254-Fr".to_string(),
            sid: "testsession".to_string(),
            auxsid: "default".to_string(),
            version: "0.1.0".to_string(),
        }
    }
}

fn validate_alphanumeric(field: &'static str, value: &str) -> Result<(), InputFormatError> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(InputFormatError::InvalidIdentifier {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// A registry entry: a stable identifier plus a human-readable description.
/// Construction is left to the concrete adapter (the hash/PRG/group a
/// binary links against); this registry only validates that a requested
/// identifier is known, matching spec.md §9's "no dynamic class loading".
#[derive(Clone, Debug)]
pub struct DescriptorInfo {
    pub id: &'static str,
    pub description: &'static str,
}

static HASH_REGISTRY: Lazy<HashMap<&'static str, DescriptorInfo>> = Lazy::new(|| {
    [
        ("SHA-256", "SHA-256 (FIPS 180-4)"),
        ("SHA3-256", "SHA3-256 (FIPS 202)"),
        ("SHAKE-256", "SHAKE-256 extendable-output function (FIPS 202)"),
    ]
    .into_iter()
    .map(|(id, description)| (id, DescriptorInfo { id, description }))
    .collect()
});

static PRG_REGISTRY: Lazy<HashMap<&'static str, DescriptorInfo>> = Lazy::new(|| {
    [("ChaCha20", "ChaCha20 stream cipher as a PRG, 32-byte minimum seed")]
        .into_iter()
        .map(|(id, description)| (id, DescriptorInfo { id, description }))
        .collect()
});

static GROUP_REGISTRY: Lazy<HashMap<&'static str, DescriptorInfo>> = Lazy::new(|| {
    [
        ("BN254", "BN254 / alt_bn128 pairing-friendly curve group"),
        ("Grumpkin", "Grumpkin curve, cycle partner of BN254's scalar field"),
    ]
    .into_iter()
    .map(|(id, description)| (id, DescriptorInfo { id, description }))
    .collect()
});

/// Look up a hash descriptor by its stable identifier, e.g. `"SHA-256"`.
pub fn lookup_hash(id: &str) -> Result<DescriptorInfo, InputFormatError> {
    HASH_REGISTRY
        .get(id)
        .cloned()
        .ok_or_else(|| InputFormatError::Decode(format!("unknown hash descriptor '{id}'")))
}

/// Look up a PRG descriptor by its stable identifier, e.g. `"ChaCha20"`.
pub fn lookup_prg(id: &str) -> Result<DescriptorInfo, InputFormatError> {
    PRG_REGISTRY
        .get(id)
        .cloned()
        .ok_or_else(|| InputFormatError::Decode(format!("unknown PRG descriptor '{id}'")))
}

/// Look up a group descriptor by its stable identifier, e.g. `"BN254"`.
pub fn lookup_group(id: &str) -> Result<DescriptorInfo, InputFormatError> {
    GROUP_REGISTRY
        .get(id)
        .cloned()
        .ok_or_else(|| InputFormatError::Decode(format!("unknown group descriptor '{id}'")))
}

/// Minimum PRG seed length in bytes for the given descriptor, used by the
/// challenger's batching-seed derivation (spec.md §4.B use 1).
pub fn min_seed_bytes(prg_id: &str) -> Result<usize, InputFormatError> {
    lookup_prg(prg_id)?;
    match prg_id {
        "ChaCha20" => Ok(32),
        other => Err(InputFormatError::Decode(format!(
            "no known minimum seed length for PRG '{other}'"
        ))),
    }
}
