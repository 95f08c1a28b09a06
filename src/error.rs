//! Domain-specific error types for flowcraft

use thiserror::Error;

/// Main error type for the flowcraft pipeline
///
/// Pipeline stages never hand these to callers: each stage absorbs them into
/// its fallback value and records the degradation in `PipelineMetrics`.
#[derive(Error, Debug)]
pub enum FlowcraftError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Transport error ({service}): {message}")]
    Transport { service: String, message: String },

    #[error("Timeout error: {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Malformed model output: {message}")]
    MalformedOutput { message: String },

    #[error("Pattern store error: {message}")]
    Store { message: String },

    #[error("Budget exhausted before {stage}")]
    BudgetExhausted { stage: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl FlowcraftError {
    /// True for failures of an external collaborator (network, timeout).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FlowcraftError::Transport { .. } | FlowcraftError::Timeout { .. }
        )
    }

    /// Transport failure or an exhausted budget: the collaborator was never
    /// consulted successfully.
    pub fn is_unavailable(&self) -> bool {
        self.is_transport() || matches!(self, FlowcraftError::BudgetExhausted { .. })
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        FlowcraftError::MalformedOutput {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for FlowcraftError {
    fn from(err: anyhow::Error) -> Self {
        FlowcraftError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FlowcraftError {
    fn from(err: serde_json::Error) -> Self {
        FlowcraftError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for FlowcraftError {
    fn from(err: std::io::Error) -> Self {
        FlowcraftError::Store {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for FlowcraftError {
    fn from(err: toml::de::Error) -> Self {
        FlowcraftError::Config {
            message: err.to_string(),
        }
    }
}

impl From<crate::clients::ClientError> for FlowcraftError {
    fn from(err: crate::clients::ClientError) -> Self {
        use crate::clients::ClientError;
        match err {
            ClientError::Timeout { timeout_ms } => FlowcraftError::Timeout {
                operation: "external call".to_string(),
                timeout_ms,
            },
            ClientError::Parse(message) => FlowcraftError::MalformedOutput { message },
            other => FlowcraftError::Transport {
                service: other.service().to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type alias for flowcraft operations
pub type Result<T> = std::result::Result<T, FlowcraftError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientError;

    #[test]
    fn client_timeouts_map_to_transport_class() {
        let err: FlowcraftError = ClientError::Timeout { timeout_ms: 500 }.into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("500ms"));
    }

    #[test]
    fn parse_failures_are_not_transport() {
        let err: FlowcraftError = ClientError::Parse("bad body".into()).into();
        assert!(!err.is_transport());
        assert!(matches!(err, FlowcraftError::MalformedOutput { .. }));
    }
}
