//! Error taxonomy
//!
//! Provider failures travel in-band on result structures and never cross the
//! engine boundary as `Err`. The variants here cover the remaining classes:
//! misconfiguration (fatal at construction only) and whole-batch fan-out
//! failure (surfaced as the solve's failure reason).

use thiserror::Error;

/// Library error type
#[derive(Debug, Error)]
pub enum MetisError {
    /// Invalid configuration. Only ever raised at construction time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every fan-out unit failed, so integration cannot proceed.
    #[error("all {total} sub-problems failed or returned empty solutions")]
    AggregateFailure { total: usize },

    /// A completion backend could not be constructed.
    #[error("provider unavailable: {0}")]
    Provider(String),
}
