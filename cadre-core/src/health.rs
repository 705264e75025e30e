//! Agent health reporting

use crate::agent::AgentState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Immutable point-in-time health snapshot for a single agent.
///
/// Produced fresh on every health query from in-memory bookkeeping only;
/// never mutated after construction and safe to share by copy. The
/// supervisor aggregates these into its health snapshot, overwriting
/// `consecutive_failures` with its own scheduling-side count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Agent name
    pub agent_name: String,

    /// Current lifecycle state
    pub state: AgentState,

    /// Whether the agent is healthy (running, or stopped cleanly)
    pub ok: bool,

    /// When the last tick was dispatched
    pub last_tick_at: Option<DateTime<Utc>>,

    /// When the last tick completed successfully
    pub last_success_at: Option<DateTime<Utc>>,

    /// When the last error was recorded
    pub last_error_at: Option<DateTime<Utc>>,

    /// Whether the most recently completed tick succeeded
    pub last_success: bool,

    /// Description of the last error, if any
    pub last_error: Option<String>,

    /// Consecutive failed ticks since the last success
    pub consecutive_failures: u32,

    /// Agent-specific details (counters, gauges, config echoes)
    #[serde(default)]
    pub details: HashMap<String, serde_json::Value>,
}

impl HealthReport {
    /// Add or replace a detail entry, returning the report for chaining
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_to_json() {
        let report = HealthReport {
            agent_name: "ingest".to_string(),
            state: AgentState::Running,
            ok: true,
            last_tick_at: Some(Utc::now()),
            last_success_at: Some(Utc::now()),
            last_error_at: None,
            last_success: true,
            last_error: None,
            consecutive_failures: 0,
            details: HashMap::new(),
        }
        .with_detail("ticks", serde_json::json!(3));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["agent_name"], "ingest");
        assert_eq!(json["state"], "running");
        assert_eq!(json["ok"], true);
        assert_eq!(json["details"]["ticks"], 3);
    }
}
