//! # Cadre Supervisor - control loop for supervised agents
//!
//! Owns a dynamic set of registered agents and drives them forward in time:
//! dispatches each agent's `tick()` at its cadence, detects and classifies
//! failures, applies bounded restart policies with exponential backoff, and
//! aggregates health. A misbehaving agent degrades to `Failed` and stays
//! visible in the health snapshot; it never takes down the supervisor or
//! another agent.
//!
//! One control-loop task makes every scheduling decision; each dispatched
//! tick runs on its own task, so slow or blocking agent work never stalls
//! scheduling for the rest of the fleet. Ticks of the same agent are strictly
//! serialized.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadre_supervisor::{RestartPolicy, Supervisor};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run(agent: Arc<dyn cadre_core::agent::Agent>) -> Result<(), Box<dyn std::error::Error>> {
//! let supervisor = Arc::new(Supervisor::new());
//! supervisor.register("worker", agent, Duration::from_secs(10), RestartPolicy::default())?;
//!
//! let loop_task = tokio::spawn({
//!     let supervisor = supervisor.clone();
//!     async move { supervisor.run().await }
//! });
//!
//! // ... later
//! let report = supervisor.shutdown(Duration::from_secs(5)).await;
//! loop_task.await??;
//! println!("stopped: {:?}", report.stopped);
//! # Ok(())
//! # }
//! ```

mod entry;
mod error;
mod policy;
mod supervisor;

pub use error::{Result, SupervisorError};
pub use policy::RestartPolicy;
pub use supervisor::{ShutdownReport, Supervisor};

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
