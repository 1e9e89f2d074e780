//! Error types for write operations on wrapped targets.
//!
//! Reads never fail: a read with no active computation simply skips tracking
//! and a read of the wrong shape yields [`Value::Undefined`](crate::Value).
//! Writes report refusals through [`ReactiveError`].

use thiserror::Error;

use crate::proxy::TargetKind;

/// Reasons a write through a wrapper was refused.
///
/// A refused write never touches the underlying target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The wrapper was created readonly.
    #[error("cannot write `{key}`: target is readonly")]
    Readonly { key: String },

    /// The operation does not exist for this kind of target,
    /// e.g. `push` on a set.
    #[error("`{operation}` is not supported on a {kind} target")]
    Unsupported {
        operation: &'static str,
        kind: TargetKind,
    },

    /// A sequence length that is negative, not an integer or too large.
    #[error("invalid sequence length: {0}")]
    InvalidLength(String),

    /// A sequence write too far past the end to pad densely.
    #[error("sequence index {index} is out of range (maximum length {max})")]
    IndexOutOfRange { index: usize, max: usize },
}

impl ReactiveError {
    pub(crate) fn readonly(key: impl Into<String>) -> Self {
        let key = key.into();
        tracing::warn!(%key, "write refused: target is readonly");
        Self::Readonly { key }
    }

    pub(crate) fn unsupported(operation: &'static str, kind: TargetKind) -> Self {
        Self::Unsupported { operation, kind }
    }
}

/// Result alias used by every fallible write.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_key_and_kind() {
        let err = ReactiveError::readonly("count");
        assert_eq!(err.to_string(), "cannot write `count`: target is readonly");

        let err = ReactiveError::unsupported("push", TargetKind::Set);
        assert_eq!(err.to_string(), "`push` is not supported on a set target");

        let err = ReactiveError::IndexOutOfRange { index: 20, max: 16 };
        assert_eq!(err.to_string(), "sequence index 20 is out of range (maximum length 16)");
    }
}
