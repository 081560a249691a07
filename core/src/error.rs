use thiserror::Error;

/// Failures callers branch on. Anything else travels as a plain
/// `anyhow::Error` and is treated as internal.
#[derive(Debug, Error)]
pub enum NutrilogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Not authorized to view this client")]
    NotAuthorized,

    #[error("Estimated item {index} cannot be logged: {reason}")]
    UnusableEstimate { index: usize, reason: String },
}

impl NutrilogError {
    /// True when `err` is, or wraps, a missing-row error.
    #[must_use]
    pub fn is_not_found(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<Self>(), Some(Self::NotFound(_)))
    }
}
