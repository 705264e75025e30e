//! Supervisor control loop
//!
//! One task owns every scheduling decision and all `SchedulerEntry`
//! mutations. Dispatched ticks (and post-failure restarts) run on their own
//! tasks and report back over a channel, so the loop only ever suspends while
//! waiting for the next due time, a completion event, or cancellation.

use crate::entry::SchedulerEntry;
use crate::error::{Result, SupervisorError};
use crate::policy::RestartPolicy;
use cadre_core::agent::{Agent, AgentState, TickOutcome};
use cadre_core::error::AgentError;
use cadre_core::health::HealthReport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Completion events reported back to the control loop by dispatched tasks
enum LoopEvent {
    /// A dispatched tick (or its preceding first start) resolved
    TickDone {
        seq: u64,
        result: cadre_core::error::Result<TickOutcome>,
    },
    /// An eager restart of a failed agent resolved
    RestartDone {
        seq: u64,
        result: cadre_core::error::Result<()>,
    },
}

/// Aggregate result of a graceful shutdown
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Agents that stopped cleanly within the grace period
    pub stopped: Vec<String>,

    /// Agents that did not stop within the grace period
    pub timed_out: Vec<String>,

    /// Agents whose stop() returned an error
    pub failed: Vec<(String, AgentError)>,
}

impl ShutdownReport {
    /// True when every agent stopped cleanly
    pub fn is_clean(&self) -> bool {
        self.timed_out.is_empty() && self.failed.is_empty()
    }

    /// Convert the degraded outcomes into supervisor errors for reporting
    pub fn into_errors(self, timeout: Duration) -> Vec<SupervisorError> {
        let mut errors = Vec::new();
        for agent in self.timed_out {
            errors.push(SupervisorError::ShutdownTimeout { agent, timeout });
        }
        for (agent, source) in self.failed {
            errors.push(SupervisorError::StopFailed { agent, source });
        }
        errors
    }
}

struct EntryTable {
    next_seq: u64,
    entries: Vec<SchedulerEntry>,
}

/// Supervises a dynamic set of agents: scheduling, failure handling, restart
/// backoff, health aggregation, and shutdown ordering.
///
/// All methods take `&self`; wrap the supervisor in an [`Arc`] to share it
/// between the control loop task and whatever exposes health externally.
pub struct Supervisor {
    entries: Mutex<EntryTable>,
    events_tx: UnboundedSender<LoopEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<LoopEvent>>>,
    wake: Notify,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor with no registered agents
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            entries: Mutex::new(EntryTable {
                next_seq: 0,
                entries: Vec::new(),
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            wake: Notify::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Register an agent under `name`, to be ticked every `cadence`.
    ///
    /// The first dispatch happens as soon as the loop sees the entry and
    /// brings the agent from `Created` to `Running`. Fails with
    /// [`SupervisorError::DuplicateName`] if the name is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        agent: Arc<dyn Agent>,
        cadence: Duration,
        policy: RestartPolicy,
    ) -> Result<()> {
        let name = name.into();
        {
            let mut table = self.table();
            if table.entries.iter().any(|e| e.name == name) {
                return Err(SupervisorError::DuplicateName(name));
            }
            let seq = table.next_seq;
            table.next_seq += 1;
            info!(agent = %name, ?cadence, "agent registered");
            table
                .entries
                .push(SchedulerEntry::new(seq, name, agent, cadence, policy));
        }
        self.wake.notify_one();
        Ok(())
    }

    /// Remove `name` from scheduling and stop it best-effort.
    ///
    /// A stop failure is logged, not propagated; the entry is gone either
    /// way. Fails with [`SupervisorError::NotFound`] if the name is unknown.
    pub async fn deregister(&self, name: &str) -> Result<()> {
        let entry = {
            let mut table = self.table();
            let position = table
                .entries
                .iter()
                .position(|e| e.name == name)
                .ok_or_else(|| SupervisorError::NotFound(name.to_string()))?;
            table.entries.remove(position)
        };
        self.wake.notify_one();
        info!(agent = %name, "agent deregistered");

        if let Err(err) = entry.agent.stop().await {
            warn!(agent = %name, error = %err, "deregistered agent failed to stop");
        }
        Ok(())
    }

    /// Drive scheduling until [`Supervisor::shutdown`] cancels the loop.
    ///
    /// Agent failures never escape this loop; they are recorded into the
    /// owning entry and handled by the restart policy. Fails only with
    /// [`SupervisorError::AlreadyRunning`] on a second concurrent call.
    pub async fn run(&self) -> Result<()> {
        let mut events = self
            .events_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(SupervisorError::AlreadyRunning)?;

        info!("supervisor control loop started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.dispatch_due();
            let deadline = self.earliest_deadline();

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.wake.notified() => {}
                event = events.recv() => {
                    if let Some(event) = event {
                        self.handle_event(event);
                    }
                }
                _ = Self::wait_until(deadline) => {}
            }
        }
        info!("supervisor control loop stopped");
        Ok(())
    }

    /// Cancel the loop, then stop every registered agent concurrently, each
    /// bounded by `timeout`. Agents that do not stop in time are reported in
    /// the result, never waited on further.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        info!(?timeout, "supervisor shutting down");
        self.cancel.cancel();

        enum StopResult {
            Stopped,
            TimedOut,
            Failed(AgentError),
        }

        let agents: Vec<(String, Arc<dyn Agent>)> = {
            let table = self.table();
            table
                .entries
                .iter()
                .map(|e| (e.name.clone(), e.agent.clone()))
                .collect()
        };

        let stops = agents.into_iter().map(|(name, agent)| async move {
            match tokio::time::timeout(timeout, agent.stop()).await {
                Ok(Ok(())) => {
                    info!(agent = %name, "agent stopped");
                    (name, StopResult::Stopped)
                }
                Ok(Err(err)) => {
                    warn!(agent = %name, error = %err, "agent stop reported an error");
                    (name, StopResult::Failed(err))
                }
                Err(_) => {
                    warn!(agent = %name, "agent did not stop within the grace period");
                    (name, StopResult::TimedOut)
                }
            }
        });

        let mut report = ShutdownReport::default();
        for (name, outcome) in futures::future::join_all(stops).await {
            match outcome {
                StopResult::Stopped => report.stopped.push(name),
                StopResult::TimedOut => report.timed_out.push(name),
                StopResult::Failed(err) => report.failed.push((name, err)),
            }
        }
        report
    }

    /// Current health of every registered agent, keyed by name.
    ///
    /// Assembled from in-memory state only; the entry's failure count and
    /// disabled flag are authoritative and overwrite the agent's own view.
    pub fn health_snapshot(&self) -> HashMap<String, HealthReport> {
        let table = self.table();
        table
            .entries
            .iter()
            .map(|entry| {
                let mut report = entry.agent.health();
                report.consecutive_failures = entry.consecutive_failures;
                if entry.disabled {
                    report
                        .details
                        .insert("scheduling_disabled".to_string(), serde_json::json!(true));
                }
                (entry.name.clone(), report)
            })
            .collect()
    }

    fn table(&self) -> MutexGuard<'_, EntryTable> {
        // Sections under this lock never panic and never await
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Earliest due time among entries the loop may dispatch
    fn earliest_deadline(&self) -> Option<Instant> {
        let table = self.table();
        table
            .entries
            .iter()
            .filter(|e| e.eligible())
            .map(|e| e.next_due)
            .min()
    }

    /// Dispatch every eligible entry that is due, in registration order
    fn dispatch_due(&self) {
        let now = Instant::now();
        let mut dispatches = Vec::new();
        {
            let mut table = self.table();
            for entry in table.entries.iter_mut() {
                if entry.eligible() && entry.next_due <= now {
                    entry.begin_dispatch(now);
                    dispatches.push((entry.seq, entry.name.clone(), entry.agent.clone()));
                }
            }
        }

        for (seq, name, agent) in dispatches {
            debug!(agent = %name, "dispatching tick");
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                // Bring the agent up on its first dispatch, and again after a
                // failed restart left it in Failed
                if matches!(agent.state(), AgentState::Created | AgentState::Failed) {
                    if let Err(err) = agent.start().await {
                        let _ = tx.send(LoopEvent::TickDone {
                            seq,
                            result: Err(err),
                        });
                        return;
                    }
                }
                let result = agent.tick().await;
                let _ = tx.send(LoopEvent::TickDone { seq, result });
            });
        }
    }

    fn handle_event(&self, event: LoopEvent) {
        match event {
            LoopEvent::TickDone { seq, result } => self.handle_tick_done(seq, result),
            LoopEvent::RestartDone { seq, result } => self.handle_restart_done(seq, result),
        }
    }

    fn handle_tick_done(&self, seq: u64, result: cadre_core::error::Result<TickOutcome>) {
        let mut restart = None;
        {
            let mut table = self.table();
            let Some(entry) = table.entries.iter_mut().find(|e| e.seq == seq) else {
                debug!("dropping tick completion for a deregistered agent");
                return;
            };

            match result {
                Ok(outcome) => {
                    if let Some(detail) = &outcome.detail {
                        debug!(agent = %entry.name, detail, "tick complete");
                    }
                    entry.complete_success(outcome.success);
                }
                Err(AgentError::InvalidState { state, .. }) => {
                    // The loop never double-dispatches, so something outside
                    // the supervisor drove this agent's lifecycle
                    entry.busy = false;
                    entry.disabled = true;
                    error!(
                        agent = %entry.name,
                        %state,
                        "tick dispatched outside running state; scheduling disabled"
                    );
                }
                Err(err) => {
                    if !entry.complete_failure() {
                        warn!(
                            agent = %entry.name,
                            failures = entry.consecutive_failures,
                            error = %err,
                            "failure cap exceeded; agent disabled"
                        );
                    } else {
                        warn!(
                            agent = %entry.name,
                            failures = entry.consecutive_failures,
                            error = %err,
                            "tick failed"
                        );
                        if entry.agent.state() == AgentState::Failed {
                            // Restart eagerly so the agent is Running again
                            // by its backoff deadline
                            entry.busy = true;
                            restart = Some((entry.seq, entry.name.clone(), entry.agent.clone()));
                        }
                    }
                }
            }
        }

        if let Some((seq, name, agent)) = restart {
            debug!(agent = %name, "restarting failed agent");
            let tx = self.events_tx.clone();
            tokio::spawn(async move {
                let result = agent.start().await;
                let _ = tx.send(LoopEvent::RestartDone { seq, result });
            });
        }
    }

    fn handle_restart_done(&self, seq: u64, result: cadre_core::error::Result<()>) {
        let mut table = self.table();
        let Some(entry) = table.entries.iter_mut().find(|e| e.seq == seq) else {
            debug!("dropping restart completion for a deregistered agent");
            return;
        };

        entry.busy = false;
        match result {
            Ok(()) => {
                info!(agent = %entry.name, "agent restarted");
            }
            Err(err) => {
                // A failed restart counts as a further consecutive failure;
                // the next dispatch retries start() at the backoff deadline
                entry.consecutive_failures += 1;
                if entry.policy.cap_exceeded(entry.consecutive_failures) {
                    entry.disabled = true;
                    warn!(
                        agent = %entry.name,
                        failures = entry.consecutive_failures,
                        error = %err,
                        "failure cap exceeded; agent disabled"
                    );
                } else {
                    entry.next_due =
                        Instant::now() + entry.policy.backoff_delay(entry.consecutive_failures);
                    warn!(
                        agent = %entry.name,
                        failures = entry.consecutive_failures,
                        error = %err,
                        "restart failed"
                    );
                }
            }
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
