//! Agent lifecycle contract and state machine
//!
//! Every Cadre worker satisfies the same four-operation contract: `start()`,
//! `tick()`, `health()`, `stop()`. The state machine behind that contract is
//! first-class here: implementors provide an [`AgentHooks`] with their actual
//! work, and [`LifecycleAgent`] wraps it with the complete guard, transition,
//! and bookkeeping logic so every agent behaves identically under
//! supervision.
//!
//! ```text
//! Created --start()--> Starting --(success)--> Running
//! Starting --(failure)--> Failed
//! Running --tick()--> Running   (success, or recoverable failure)
//! Running --tick()--> Failed    (unrecoverable failure)
//! Running/Starting/Failed --stop()--> Stopping --> Stopped
//! Stopped --stop()--> Stopped   (idempotent)
//! ```

use crate::error::{AgentError, Result};
use crate::health::HealthReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Agent lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Agent has been created but not started
    #[default]
    Created,

    /// Agent is in the process of starting
    Starting,

    /// Agent is running and can accept tick() calls
    Running,

    /// Agent is in the process of stopping
    Stopping,

    /// Agent has stopped cleanly
    Stopped,

    /// Agent has encountered an unrecoverable error
    Failed,
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentState::Created => write!(f, "created"),
            AgentState::Starting => write!(f, "starting"),
            AgentState::Running => write!(f, "running"),
            AgentState::Stopping => write!(f, "stopping"),
            AgentState::Stopped => write!(f, "stopped"),
            AgentState::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one bounded unit of scheduled work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickOutcome {
    /// Whether the tick made progress
    pub success: bool,

    /// Optional human-readable summary of the work performed
    pub detail: Option<String>,
}

impl TickOutcome {
    /// A successful tick with no detail
    pub fn ok() -> Self {
        Self {
            success: true,
            detail: None,
        }
    }

    /// A successful tick with a summary of the work performed
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: Some(detail.into()),
        }
    }

    /// A completed tick that made no progress (not a failure)
    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
        }
    }
}

/// The uniform lifecycle contract every supervised worker implements.
///
/// All methods take `&self`; agents keep their mutable state behind interior
/// locks so the supervisor can hold an `Arc<dyn Agent>` and call `health()`
/// while a tick is in flight on another task.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique agent name
    fn name(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> AgentState;

    /// Acquire resources and transition to `Running`.
    ///
    /// Idempotent while `Starting`/`Running`; permitted from `Created` and
    /// (for a policy-approved restart) from `Failed`.
    async fn start(&self) -> Result<()>;

    /// Perform exactly one bounded unit of scheduled work.
    ///
    /// Only valid while `Running`; anything else is a contract violation
    /// reported as [`AgentError::InvalidState`].
    async fn tick(&self) -> Result<TickOutcome>;

    /// Produce a fresh health snapshot from in-memory bookkeeping.
    ///
    /// Always callable, never blocks on I/O.
    fn health(&self) -> HealthReport;

    /// Release resources and transition to `Stopped`.
    ///
    /// Callable from any state and idempotent once `Stopped`.
    async fn stop(&self) -> Result<()>;
}

/// Implementor-facing hooks: the actual work behind the lifecycle contract.
///
/// [`LifecycleAgent`] calls these at the right points and owns all state
/// transitions; hooks never see or mutate the lifecycle state.
#[async_trait]
pub trait AgentHooks: Send + Sync {
    /// Acquire agent-specific resources (connections, files, caches)
    async fn on_start(&self) -> Result<()>;

    /// Perform one unit of agent-specific work.
    ///
    /// Return [`AgentError::recoverable`] for failures the agent can retry
    /// on its next tick, [`AgentError::unrecoverable`] for failures that
    /// should take the agent out of service.
    async fn on_tick(&self) -> Result<TickOutcome>;

    /// Release agent-specific resources
    async fn on_stop(&self) -> Result<()>;

    /// Agent-specific entries merged into each [`HealthReport`]
    fn health_details(&self) -> HashMap<String, serde_json::Value> {
        HashMap::new()
    }
}

/// In-memory lifecycle bookkeeping behind the cell lock
#[derive(Debug, Default)]
struct LifecycleState {
    state: AgentState,
    last_tick_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    last_error_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_success: bool,
    consecutive_failures: u32,
}

impl LifecycleState {
    fn record_error(&mut self, message: String) {
        self.last_error_at = Some(Utc::now());
        self.last_error = Some(message);
        self.last_success = false;
    }
}

/// Harness that enforces the lifecycle state machine for any [`AgentHooks`].
///
/// The cell lock is held only for bookkeeping, never across a hook await, so
/// `health()` and `state()` stay non-blocking while a tick is in flight.
pub struct LifecycleAgent<H: AgentHooks> {
    name: String,
    hooks: H,
    cell: RwLock<LifecycleState>,
}

impl<H: AgentHooks> LifecycleAgent<H> {
    /// Wrap `hooks` into a full lifecycle agent named `name`
    pub fn new(name: impl Into<String>, hooks: H) -> Self {
        Self {
            name: name.into(),
            hooks,
            cell: RwLock::new(LifecycleState::default()),
        }
    }

    /// Access the wrapped hooks
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    fn cell(&self) -> std::sync::RwLockWriteGuard<'_, LifecycleState> {
        // Recover the cell even if a previous holder panicked
        self.cell.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl<H: AgentHooks> Agent for LifecycleAgent<H> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> AgentState {
        self.cell.read().unwrap_or_else(|e| e.into_inner()).state
    }

    async fn start(&self) -> Result<()> {
        {
            let mut cell = self.cell();
            match cell.state {
                // Idempotent while a start is underway or complete
                AgentState::Starting | AgentState::Running => return Ok(()),
                AgentState::Stopping | AgentState::Stopped => {
                    return Err(AgentError::InvalidState {
                        operation: "start",
                        state: cell.state,
                    });
                }
                AgentState::Created | AgentState::Failed => {
                    cell.state = AgentState::Starting;
                }
            }
        }

        match self.hooks.on_start().await {
            Ok(()) => {
                let mut cell = self.cell();
                cell.state = AgentState::Running;
                cell.last_error = None;
                cell.consecutive_failures = 0;
                debug!(agent = %self.name, "agent started");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                let mut cell = self.cell();
                cell.state = AgentState::Failed;
                cell.record_error(message.clone());
                warn!(agent = %self.name, error = %message, "agent failed to start");
                match err {
                    AgentError::Startup(_) => Err(err),
                    _ => Err(AgentError::Startup(message)),
                }
            }
        }
    }

    async fn tick(&self) -> Result<TickOutcome> {
        {
            let mut cell = self.cell();
            if cell.state != AgentState::Running {
                // Contract violation: report it without touching bookkeeping
                return Err(AgentError::InvalidState {
                    operation: "tick",
                    state: cell.state,
                });
            }
            cell.last_tick_at = Some(Utc::now());
        }

        match self.hooks.on_tick().await {
            Ok(outcome) => {
                let mut cell = self.cell();
                cell.last_success_at = Some(Utc::now());
                cell.last_error = None;
                cell.last_success = true;
                cell.consecutive_failures = 0;
                Ok(outcome)
            }
            Err(err) => {
                let recoverable = err.is_recoverable();
                let message = err.to_string();
                let mut cell = self.cell();
                cell.record_error(message.clone());
                cell.consecutive_failures += 1;
                if !recoverable && cell.state == AgentState::Running {
                    cell.state = AgentState::Failed;
                    warn!(agent = %self.name, error = %message, "agent failed");
                }
                match err {
                    AgentError::Tick { .. } => Err(err),
                    _ => Err(AgentError::Tick {
                        reason: message,
                        recoverable: false,
                    }),
                }
            }
        }
    }

    fn health(&self) -> HealthReport {
        let cell = self.cell.read().unwrap_or_else(|e| e.into_inner());
        HealthReport {
            agent_name: self.name.clone(),
            state: cell.state,
            ok: matches!(cell.state, AgentState::Running | AgentState::Stopped),
            last_tick_at: cell.last_tick_at,
            last_success_at: cell.last_success_at,
            last_error_at: cell.last_error_at,
            last_success: cell.last_success,
            last_error: cell.last_error.clone(),
            consecutive_failures: cell.consecutive_failures,
            details: self.hooks.health_details(),
        }
    }

    async fn stop(&self) -> Result<()> {
        {
            let mut cell = self.cell();
            match cell.state {
                // Idempotent once a stop is underway or complete
                AgentState::Stopping | AgentState::Stopped => return Ok(()),
                _ => cell.state = AgentState::Stopping,
            }
        }

        let result = self.hooks.on_stop().await;
        let mut cell = self.cell();
        // The agent ends Stopped even when cleanup fails; the error is
        // recorded and surfaced, but resources are considered released.
        cell.state = AgentState::Stopped;
        match result {
            Ok(()) => {
                debug!(agent = %self.name, "agent stopped");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                cell.record_error(format!("stop failed: {message}"));
                warn!(agent = %self.name, error = %message, "agent stop reported an error");
                match err {
                    AgentError::Stop(_) => Err(err),
                    _ => Err(AgentError::Stop(message)),
                }
            }
        }
    }
}
