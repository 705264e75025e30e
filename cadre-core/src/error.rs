//! Error types for agent lifecycle operations

use crate::agent::AgentState;
use thiserror::Error;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error taxonomy for the agent lifecycle contract.
///
/// `InvalidState` is a contract violation on the caller's side and is never
/// retried. `Startup` and `Tick` are operational failures recorded by the
/// supervisor and fed into its restart policy. `Stop` is best-effort only.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent failed to acquire resources during start()
    #[error("startup failed: {0}")]
    Startup(String),

    /// One unit of scheduled work failed
    #[error("tick failed: {reason}")]
    Tick {
        /// Failure description
        reason: String,
        /// Whether the agent can keep running and retry on the next tick
        recoverable: bool,
    },

    /// Operation called from a state that does not permit it
    #[error("cannot {operation} while agent is {state}")]
    InvalidState {
        /// The lifecycle operation that was attempted
        operation: &'static str,
        /// The state the agent was in
        state: AgentState,
    },

    /// Cleanup failed during stop()
    #[error("stop failed: {0}")]
    Stop(String),
}

impl AgentError {
    /// A startup failure
    pub fn startup(reason: impl Into<String>) -> Self {
        AgentError::Startup(reason.into())
    }

    /// A tick failure the agent can survive; it stays `Running`
    pub fn recoverable(reason: impl Into<String>) -> Self {
        AgentError::Tick {
            reason: reason.into(),
            recoverable: true,
        }
    }

    /// A tick failure that transitions the agent to `Failed`
    pub fn unrecoverable(reason: impl Into<String>) -> Self {
        AgentError::Tick {
            reason: reason.into(),
            recoverable: false,
        }
    }

    /// A cleanup failure during stop()
    pub fn stop(reason: impl Into<String>) -> Self {
        AgentError::Stop(reason.into())
    }

    /// True only for recoverable tick failures
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Tick {
                recoverable: true,
                ..
            }
        )
    }
}
