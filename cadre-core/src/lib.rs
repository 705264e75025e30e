//! # Cadre Core - Agent lifecycle contract
//!
//! Cadre supervises a set of independently-schedulable workers ("agents"),
//! each exposing a uniform lifecycle: start, periodic tick, health query,
//! stop. This crate defines that contract:
//! - The [`agent::Agent`] trait and the [`agent::AgentState`] machine
//! - [`agent::LifecycleAgent`], a harness that enforces the state machine for
//!   any [`agent::AgentHooks`] implementation
//! - [`health::HealthReport`], the immutable per-agent health snapshot
//! - The agent error taxonomy and configuration types
//!
//! The supervisor control loop that schedules agents lives in
//! `cadre-supervisor`; concrete agents live in `cadre-agents`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadre_core::prelude::*;
//!
//! struct Noop;
//!
//! #[async_trait::async_trait]
//! impl AgentHooks for Noop {
//!     async fn on_start(&self) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn on_tick(&self) -> Result<TickOutcome> {
//!         Ok(TickOutcome::ok())
//!     }
//!
//!     async fn on_stop(&self) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let agent = LifecycleAgent::new("noop", Noop);
//! agent.start().await?;
//! agent.tick().await?;
//! println!("{}", agent.health().state);
//! agent.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod health;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{Agent, AgentHooks, AgentState, LifecycleAgent, TickOutcome};
    pub use crate::config::{
        AgentKind, AgentSpec, CadreConfig, ConfigError, RestartSettings, SourceLocation,
        SourceSpec,
    };
    pub use crate::error::{AgentError, Result};
    pub use crate::health::HealthReport;
}
