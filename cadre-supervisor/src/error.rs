//! Error types for supervisor operations

use cadre_core::error::AgentError;
use std::time::Duration;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Error types for the supervisor API.
///
/// Registry misuse (`DuplicateName`, `NotFound`, `AlreadyRunning`) propagates
/// to the caller immediately. Agent failures during scheduling never surface
/// here; they are recorded into the health snapshot and drive restart policy.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// An agent with this name is already registered
    #[error("agent already registered: {0}")]
    DuplicateName(String),

    /// No agent with this name is registered
    #[error("agent not found: {0}")]
    NotFound(String),

    /// run() was invoked while the control loop is already running
    #[error("supervisor control loop is already running")]
    AlreadyRunning,

    /// An agent failed to stop within the shutdown grace period
    #[error("agent {agent} did not stop within {timeout:?}")]
    ShutdownTimeout {
        /// Agent that kept running
        agent: String,
        /// Grace period that elapsed
        timeout: Duration,
    },

    /// An agent's stop() returned an error during shutdown
    #[error("agent {agent} failed during shutdown: {source}")]
    StopFailed {
        /// Agent whose cleanup failed
        agent: String,
        /// The underlying lifecycle error
        #[source]
        source: AgentError,
    },
}
