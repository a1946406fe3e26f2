//! Error types for the switchboard orchestrator

use thiserror::Error;

/// Result type alias for switchboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the orchestrator and its collaborators
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing plugin directory, bad config file)
    #[error("configuration error: {0}")]
    Config(String),

    /// A transport spec carried options that cannot be used
    #[error("invalid options for {transport} transport: {reason}")]
    TransportValidation {
        /// Transport kind the options belong to
        transport: String,
        /// What was wrong with them
        reason: String,
    },

    /// Periodic plugin scan could not read the directory
    #[error("plugin scan failed: {0}")]
    Scan(String),

    /// A client unit failed to start
    #[error("client error: {0}")]
    Client(String),

    /// The orchestrator mailbox is closed
    #[error("orchestrator is not running")]
    OrchestratorStopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_transport() {
        let err = Error::TransportValidation {
            transport: "irc".to_string(),
            reason: "use_ssl must be true or false, got \"maybe\"".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("irc transport"));
        assert!(msg.contains("maybe"));
    }
}
