//! Error types for the fee-payer relay

use thiserror::Error;

/// Main error type for the relay
#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query {query} failed: {message}")]
    Query {
        query: &'static str,
        message: String,
    },

    #[error("Envelope build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sequence mismatch ({codespace}/{code}): {raw_log}")]
    SequenceMismatch {
        code: u32,
        codespace: String,
        raw_log: String,
    },

    #[error("Transaction rejected ({codespace}/{code}): {raw_log}")]
    Rejected {
        code: u32,
        codespace: String,
        raw_log: String,
    },

    #[error("Relay worker is not running")]
    WorkerUnavailable,
}

/// Failures while turning a domain message into a signed envelope.
///
/// None of these go away by retrying the same input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("unsupported envelope variant: {0}")]
    UnsupportedVariant(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl RelayerError {
    /// Check if the node rejected the envelope because of a stale sequence
    pub fn is_sequence_mismatch(&self) -> bool {
        matches!(self, RelayerError::SequenceMismatch { .. })
    }

    /// Check if resubmitting the same message may succeed
    pub fn is_retryable_by_caller(&self) -> bool {
        matches!(
            self,
            RelayerError::Query { .. }
                | RelayerError::Transport(_)
                | RelayerError::SequenceMismatch { .. }
        )
    }

    /// Response code and codespace reported by the node, if any
    pub fn abci_code(&self) -> Option<(u32, &str)> {
        match self {
            RelayerError::SequenceMismatch {
                code, codespace, ..
            }
            | RelayerError::Rejected {
                code, codespace, ..
            } => Some((*code, codespace.as_str())),
            _ => None,
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            RelayerError::Config(_) => "config",
            RelayerError::Query { .. } => "query",
            RelayerError::Build(_) => "build",
            RelayerError::Transport(_) => "transport",
            RelayerError::SequenceMismatch { .. } => "sequence_mismatch",
            RelayerError::Rejected { .. } => "rejected",
            RelayerError::WorkerUnavailable => "unavailable",
        }
    }
}

/// Result type for relay operations
pub type RelayerResult<T> = Result<T, RelayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let mismatch = RelayerError::SequenceMismatch {
            code: 32,
            codespace: "sdk".to_string(),
            raw_log: "account sequence mismatch".to_string(),
        };
        assert!(mismatch.is_sequence_mismatch());
        assert!(mismatch.is_retryable_by_caller());
        assert_eq!(mismatch.abci_code(), Some((32, "sdk")));

        let build = RelayerError::from(BuildError::Signing("bad key".to_string()));
        assert!(!build.is_retryable_by_caller());
        assert_eq!(build.kind(), "build");
        assert_eq!(build.abci_code(), None);
    }
}
