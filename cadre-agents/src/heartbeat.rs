//! No-op heartbeat agent
//!
//! Performs no real work; it counts ticks and optionally sleeps to simulate
//! load. Useful as a template for new agents and as smoke coverage that a
//! supervised deployment is alive end to end.

use async_trait::async_trait;
use cadre_core::agent::{AgentHooks, TickOutcome};
use cadre_core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Configuration for [`Heartbeat`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Optional simulated work performed in each tick
    #[serde(default, with = "humantime_serde")]
    pub work_delay: Duration,
}

/// Hooks for the heartbeat agent; wrap in a
/// [`cadre_core::agent::LifecycleAgent`] to register it.
pub struct Heartbeat {
    config: HeartbeatConfig,
    ticks: AtomicU64,
}

impl Heartbeat {
    /// Create heartbeat hooks with the given configuration
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            ticks: AtomicU64::new(0),
        }
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AgentHooks for Heartbeat {
    async fn on_start(&self) -> Result<()> {
        // Nothing to acquire
        Ok(())
    }

    async fn on_tick(&self) -> Result<TickOutcome> {
        let count = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.config.work_delay.is_zero() {
            tokio::time::sleep(self.config.work_delay).await;
        }
        Ok(TickOutcome::with_detail(format!("tick {count}")))
    }

    async fn on_stop(&self) -> Result<()> {
        // Nothing to release
        Ok(())
    }

    fn health_details(&self) -> HashMap<String, serde_json::Value> {
        HashMap::from([
            ("ticks".to_string(), serde_json::json!(self.ticks())),
            (
                "work_delay_ms".to_string(),
                serde_json::json!(self.config.work_delay.as_millis() as u64),
            ),
        ])
    }
}
