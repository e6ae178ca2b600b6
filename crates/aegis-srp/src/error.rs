//! Failure taxonomy of the SRP engine.

/// What went wrong inside an SRP computation.
///
/// Callers classify these further (telemetry, retryability): parameter and
/// calculation failures indicate corrupted input or a bug and are never
/// retryable; configuration failures require caller action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SrpError {
    /// A protocol value violated a hard SRP requirement (e.g. `B ≡ 0 mod N`
    /// or `u = 0`), which would make the exchange forgeable.
    #[error("illegal SRP parameter: {0}")]
    IllegalParameter(&'static str),

    /// A hex-encoded protocol value failed to parse.
    #[error("value is not valid hex: {0}")]
    InvalidHex(&'static str),

    /// Modular arithmetic or key derivation failed.
    #[error("SRP calculation failed: {0}")]
    Calculation(String),

    /// A dependency the engine needs (group parameters, RNG) is missing or
    /// malformed.
    #[error("SRP engine misconfigured: {0}")]
    Configuration(String),
}
