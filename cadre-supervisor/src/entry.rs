//! Per-agent scheduling bookkeeping

use crate::policy::RestartPolicy;
use cadre_core::agent::Agent;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-agent cadence and backoff record, owned and mutated exclusively by the
/// control loop. `seq` is the registration sequence and breaks ties between
/// entries due at the same instant.
pub(crate) struct SchedulerEntry {
    pub(crate) seq: u64,
    pub(crate) name: String,
    pub(crate) agent: Arc<dyn Agent>,
    pub(crate) cadence: Duration,
    pub(crate) policy: RestartPolicy,
    pub(crate) next_due: Instant,
    pub(crate) last_dispatch: Option<Instant>,
    pub(crate) consecutive_failures: u32,
    /// A tick (or restart) for this agent is in flight; do not dispatch
    pub(crate) busy: bool,
    /// Failure cap exceeded or contract violated; never dispatch again
    pub(crate) disabled: bool,
}

impl SchedulerEntry {
    pub(crate) fn new(
        seq: u64,
        name: String,
        agent: Arc<dyn Agent>,
        cadence: Duration,
        policy: RestartPolicy,
    ) -> Self {
        Self {
            seq,
            name,
            agent,
            cadence,
            policy,
            // First dispatch as soon as the loop sees the entry
            next_due: Instant::now(),
            last_dispatch: None,
            consecutive_failures: 0,
            busy: false,
            disabled: false,
        }
    }

    /// Whether the loop may dispatch this entry
    pub(crate) fn eligible(&self) -> bool {
        !self.busy && !self.disabled
    }

    /// Mark the entry dispatched at `now`
    pub(crate) fn begin_dispatch(&mut self, now: Instant) {
        self.busy = true;
        self.last_dispatch = Some(now);
    }

    /// Record a completed tick: a successful one resets the failure count and
    /// restores the nominal cadence; a degraded one (no progress) keeps the
    /// count but is not a failure.
    pub(crate) fn complete_success(&mut self, made_progress: bool) {
        self.busy = false;
        if made_progress {
            self.consecutive_failures = 0;
        }
        self.reschedule(self.cadence);
    }

    /// Record a failed tick and apply the backoff curve. Returns true while
    /// the failure cap permits further scheduling; false once the entry has
    /// been disabled.
    pub(crate) fn complete_failure(&mut self) -> bool {
        self.busy = false;
        self.consecutive_failures += 1;
        if self.policy.cap_exceeded(self.consecutive_failures) {
            self.disabled = true;
            return false;
        }
        self.reschedule(self.policy.backoff_delay(self.consecutive_failures));
        true
    }

    /// Next due time relative to the last dispatch
    fn reschedule(&mut self, delay: Duration) {
        let base = self.last_dispatch.unwrap_or_else(Instant::now);
        self.next_due = base + delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadre_core::agent::{AgentHooks, LifecycleAgent, TickOutcome};
    use cadre_core::error::Result;

    struct Noop;

    #[async_trait::async_trait]
    impl AgentHooks for Noop {
        async fn on_start(&self) -> Result<()> {
            Ok(())
        }

        async fn on_tick(&self) -> Result<TickOutcome> {
            Ok(TickOutcome::ok())
        }

        async fn on_stop(&self) -> Result<()> {
            Ok(())
        }
    }

    fn entry(cadence: Duration) -> SchedulerEntry {
        SchedulerEntry::new(
            0,
            "noop".to_string(),
            Arc::new(LifecycleAgent::new("noop", Noop)),
            cadence,
            RestartPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_restores_nominal_cadence() {
        let mut entry = entry(Duration::from_secs(10));
        let t0 = Instant::now();

        entry.begin_dispatch(t0);
        assert!(!entry.eligible());

        entry.complete_failure();
        assert_eq!(entry.consecutive_failures, 1);
        assert_eq!(entry.next_due, t0 + Duration::from_secs(1));

        entry.begin_dispatch(entry.next_due);
        entry.complete_success(true);
        assert_eq!(entry.consecutive_failures, 0);
        assert_eq!(
            entry.next_due,
            t0 + Duration::from_secs(1) + Duration::from_secs(10)
        );
        assert!(entry.eligible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_overrides_cadence_until_cap() {
        let mut entry = entry(Duration::from_secs(10));
        let t0 = Instant::now();

        for expected in [1u64, 2, 4] {
            let dispatched = entry.next_due;
            entry.begin_dispatch(dispatched);
            assert!(entry.complete_failure());
            assert_eq!(entry.next_due, dispatched + Duration::from_secs(expected));
        }
        assert_eq!(entry.next_due, t0 + Duration::from_secs(1 + 2 + 4));

        // Fourth failure goes past max_consecutive_failures = 3
        entry.begin_dispatch(entry.next_due);
        assert!(!entry.complete_failure());
        assert!(entry.disabled);
        assert!(!entry.eligible());
    }

    #[tokio::test(start_paused = true)]
    async fn test_degraded_tick_keeps_failure_count() {
        let mut entry = entry(Duration::from_secs(10));

        entry.begin_dispatch(Instant::now());
        entry.complete_failure();
        assert_eq!(entry.consecutive_failures, 1);

        entry.begin_dispatch(entry.next_due);
        entry.complete_success(false);
        assert_eq!(entry.consecutive_failures, 1);
    }
}
