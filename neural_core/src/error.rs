//! Error types for the neural core.

use game_bridge::AgentId;
use thiserror::Error;

/// Everything that can go wrong inside the brain.
///
/// Numeric faults normally never surface here: the orchestrator sanitizes
/// them or falls back to rule-based behavior. They appear only when a caller
/// drives the lower layers directly with a panic-free guard.
#[derive(Error, Debug)]
pub enum NeuralError {
    /// Invalid or inconsistent configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operand shapes do not line up.
    #[error("Dimension mismatch in {op}: expected {expected}, got {actual}")]
    DimensionMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A bounded pool or arena has no room left.
    #[error("{resource} exhausted (capacity {capacity})")]
    PoolExhausted {
        resource: &'static str,
        capacity: usize,
    },

    /// A handle outlived the slot it pointed to.
    #[error("Stale handle for slot {index}")]
    StaleHandle { index: usize },

    #[error("Agent {0} not found")]
    UnknownAgent(AgentId),

    #[error("Agent {0} already exists")]
    DuplicateAgent(AgentId),

    /// A Fisher entry points past the end of the parameter vector.
    #[error("Fisher index {index} out of range for {parameter_count} parameters")]
    FisherIndexOutOfRange { index: u32, parameter_count: usize },

    #[error("Snapshot version {found} is not supported (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Parameter count mismatch: expected {expected}, got {found}")]
    ParameterCountMismatch { expected: usize, found: usize },

    /// NaN or infinity detected by a numeric guard.
    #[error("Non-finite value at {site}")]
    NonFinite { site: &'static str },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for neural core operations.
pub type NeuralResult<T> = Result<T, NeuralError>;

impl NeuralError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn dimension(op: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            op,
            expected,
            actual,
        }
    }

    pub fn exhausted(resource: &'static str, capacity: usize) -> Self {
        Self::PoolExhausted { resource, capacity }
    }

    /// Whether the caller can retry after freeing capacity.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}

/// Check a length, producing a dimension error on mismatch.
pub(crate) fn expect_len(op: &'static str, expected: usize, actual: usize) -> NeuralResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(NeuralError::dimension(op, expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NeuralError::dimension("matvec", 8, 7);
        assert_eq!(err.to_string(), "Dimension mismatch in matvec: expected 8, got 7");

        let err = NeuralError::exhausted("agent pool", 16);
        assert!(err.is_capacity());
        assert_eq!(err.to_string(), "agent pool exhausted (capacity 16)");
    }

    #[test]
    fn test_expect_len() {
        assert!(expect_len("dot", 3, 3).is_ok());
        assert!(matches!(
            expect_len("dot", 3, 4),
            Err(NeuralError::DimensionMismatch { expected: 3, actual: 4, .. })
        ));
    }
}
