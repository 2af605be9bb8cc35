//! Error types for every layer of the engine, composed into [`MixnetError`].

use thiserror::Error;

/// A byte-tree or info-file value failed to decode, or a numeric range was violated.
#[derive(Debug, Error)]
pub enum InputFormatError {
    #[error("byte-tree decode failed: {0}")]
    Decode(String),
    #[error("numeric value {value} out of expected range {lo}..={hi} for {field}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        lo: i64,
        hi: i64,
    },
    #[error("{field} '{value}' is not alphanumeric")]
    InvalidIdentifier { field: &'static str, value: String },
    #[error("expected {expected} ciphertexts, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("empty ciphertext list")]
    EmptyCiphertextList,
}

/// An invariant was broken that cannot be locally recovered; the session aborts.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("fewer than {threshold} valid shuffle proofs ({valid} valid)")]
    InsufficientValidProofs { valid: usize, threshold: usize },
    #[error("fewer than {threshold} correct decryption factors ({correct} correct)")]
    InsufficientHonestParties { correct: usize, threshold: usize },
    #[error("session ({sid}, {auxsid}) already exists and reuse was not requested")]
    SessionReuse { sid: String, auxsid: String },
    #[error("declared {field} '{declared}' does not match expected '{expected}'")]
    Mismatch {
        field: &'static str,
        declared: String,
        expected: String,
    },
    #[error("active threshold recorded twice with conflicting values: {first} vs {second}")]
    ActiveThresholdConflict { first: usize, second: usize },
    #[error("pre-computation without a subsequent shuffle is invalid")]
    DanglingPrecomputation,
    #[error("invariant violated: {0}")]
    Invariant(String),
}

/// A Sigma-protocol verification equation failed. Locally recoverable: the
/// caller substitutes the party's input for its output and continues.
#[derive(Debug, Error)]
pub enum ProofRejected {
    #[error("PoSC verification failed for party {party}")]
    Posc { party: usize },
    #[error("CCPoS verification failed for party {party}")]
    Ccpos { party: usize },
    #[error("PoS verification failed for party {party}")]
    Pos { party: usize },
    #[error("correct-decryption proof failed for party {party}")]
    DecryptionFactor { party: usize },
    #[error("VSS share verification failed for receiver {receiver} of dealer {dealer}")]
    VssShare { dealer: usize, receiver: usize },
}

/// A referenced external collaborator (hash, PRG, group, IGS) reported failure.
#[derive(Debug, Error)]
pub enum ExternalProofFailure {
    #[error("hash function '{0}' failed")]
    Hash(String),
    #[error("PRG '{0}' failed to produce requested output length")]
    Prg(String),
    #[error("group operation failed: {0}")]
    Group(String),
    #[error("independent generator source failed: {0}")]
    Igs(String),
}

/// Requested by the operator (e.g. `-delete` without `-f`).
#[derive(Debug, Error)]
pub enum OperatorAbort {
    #[error("destructive operation '{op}' requires explicit confirmation (-f)")]
    ConfirmationRequired { op: String },
    #[error("operator aborted: {0}")]
    Other(String),
}

/// Top-level error type every public API returns.
#[derive(Debug, Error)]
pub enum MixnetError {
    #[error(transparent)]
    InputFormat(#[from] InputFormatError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    ProofRejected(#[from] ProofRejected),
    #[error(transparent)]
    ExternalProofFailure(#[from] ExternalProofFailure),
    #[error(transparent)]
    OperatorAbort(#[from] OperatorAbort),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MixnetError>;
