//! Configuration types for the Cadre control plane
//!
//! Configuration is layered: built-in defaults, then a TOML or YAML file,
//! then `CADRE_`-prefixed environment variables (nested keys separated by
//! `__`, e.g. `CADRE_RESTART__BACKOFF_MAX=60s`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::Figment;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Underlying figment extraction error
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// Structurally valid configuration with invalid contents
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for a Cadre deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadreConfig {
    /// Grace period granted to each agent during shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,

    /// Restart defaults applied to agents without their own override
    #[serde(default)]
    pub restart: RestartSettings,

    /// Agents to register, in registration order
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

impl Default for CadreConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(5),
            restart: RestartSettings::default(),
            agents: Vec::new(),
        }
    }
}

/// Restart policy settings as expressed in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartSettings {
    /// Consecutive tick failures tolerated before the supervisor stops
    /// scheduling the agent; `None` means unbounded
    pub max_consecutive_failures: Option<u32>,

    /// Delay after the first failure
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Upper bound on the backoff delay
    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,

    /// Growth factor applied per consecutive failure (>= 1)
    pub backoff_multiplier: f64,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            max_consecutive_failures: Some(3),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// One agent to register with the supervisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique agent name
    pub name: String,

    /// Nominal interval between ticks
    #[serde(with = "humantime_serde")]
    pub cadence: Duration,

    /// Agent kind and kind-specific settings
    #[serde(flatten)]
    pub kind: AgentKind,

    /// Per-agent restart override
    #[serde(default)]
    pub restart: Option<RestartSettings>,
}

/// Supported agent kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AgentKind {
    /// No-op template agent that counts ticks
    Heartbeat {
        /// Optional simulated work per tick
        #[serde(default, with = "humantime_serde")]
        work_delay: Duration,
    },

    /// Periodic ingestion of external data sources
    Ingestion {
        /// Sources to poll each tick
        sources: Vec<SourceSpec>,
    },
}

/// One external data source for an ingestion agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Unique source name within the agent
    pub name: String,

    /// Where the source lives
    #[serde(flatten)]
    pub location: SourceLocation,

    /// Minimum interval between fetches of this source
    #[serde(with = "humantime_serde", default = "default_min_interval")]
    pub min_interval: Duration,
}

fn default_min_interval() -> Duration {
    Duration::from_secs(300)
}

/// Location of an ingestion source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceLocation {
    /// Local JSON file
    File {
        /// File system path
        path: PathBuf,
    },

    /// Remote JSON document
    Url {
        /// HTTP/HTTPS URL
        url: String,
    },
}

impl CadreConfig {
    /// Load configuration: defaults, then `path` (TOML unless the extension
    /// is `.yaml`/`.yml`), then `CADRE_` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(CadreConfig::default()));

        if let Some(path) = path {
            let yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
            figment = if yaml {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        let config: CadreConfig = figment
            .merge(Env::prefixed("CADRE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = std::collections::HashSet::new();
        for spec in &self.agents {
            if spec.name.is_empty() {
                return Err(ConfigError::Invalid("agent name must not be empty".into()));
            }
            if !names.insert(spec.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate agent name: {}",
                    spec.name
                )));
            }
            if spec.cadence.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "agent {} has zero cadence",
                    spec.name
                )));
            }
            if let Some(restart) = &spec.restart {
                restart.validate(&spec.name)?;
            }
            if let AgentKind::Ingestion { sources } = &spec.kind {
                let mut source_names = std::collections::HashSet::new();
                for source in sources {
                    if !source_names.insert(source.name.as_str()) {
                        return Err(ConfigError::Invalid(format!(
                            "agent {} has duplicate source name: {}",
                            spec.name, source.name
                        )));
                    }
                }
            }
        }
        self.restart.validate("defaults")?;
        Ok(())
    }
}

impl RestartSettings {
    fn validate(&self, scope: &str) -> Result<(), ConfigError> {
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "restart settings for {scope}: backoff_multiplier must be >= 1"
            )));
        }
        if self.backoff_max < self.backoff_base {
            return Err(ConfigError::Invalid(format!(
                "restart settings for {scope}: backoff_max is below backoff_base"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    const EXAMPLE: &str = r#"
shutdown_timeout = "2s"

[restart]
max_consecutive_failures = 5
backoff_base = "500ms"
backoff_max = "1m"
backoff_multiplier = 2.0

[[agents]]
name = "pulse"
cadence = "10s"
kind = "heartbeat"
work_delay = "50ms"

[[agents]]
name = "ingest"
cadence = "5m"
kind = "ingestion"

[[agents.sources]]
name = "queues"
mode = "file"
path = "/data/queues.json"
min_interval = "10m"

[[agents.sources]]
name = "jobs"
mode = "url"
url = "https://example.invalid/jobs.json"
"#;

    // load() reads the process environment, so every test that calls it runs
    // inside a figment Jail; jailed tests are serialized with each other.

    #[test]
    fn test_load_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cadre.toml", EXAMPLE)?;
            let config = CadreConfig::load(Some(Path::new("cadre.toml"))).expect("load failed");

            assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
            assert_eq!(config.restart.max_consecutive_failures, Some(5));
            assert_eq!(config.restart.backoff_base, Duration::from_millis(500));
            assert_eq!(config.agents.len(), 2);

            match &config.agents[0].kind {
                AgentKind::Heartbeat { work_delay } => {
                    assert_eq!(*work_delay, Duration::from_millis(50));
                }
                other => panic!("unexpected kind: {other:?}"),
            }

            match &config.agents[1].kind {
                AgentKind::Ingestion { sources } => {
                    assert_eq!(sources.len(), 2);
                    assert_eq!(sources[0].min_interval, Duration::from_secs(600));
                    // Unspecified min_interval falls back to the default
                    assert_eq!(sources[1].min_interval, Duration::from_secs(300));
                    assert!(matches!(sources[1].location, SourceLocation::Url { .. }));
                }
                other => panic!("unexpected kind: {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn test_load_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cadre.yaml",
                r#"
shutdown_timeout: 3s
agents:
  - name: pulse
    cadence: 1s
    kind: heartbeat
"#,
            )?;
            let config = CadreConfig::load(Some(Path::new("cadre.yaml"))).expect("load failed");

            assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
            // Restart defaults fill in when the section is absent
            assert_eq!(config.restart.max_consecutive_failures, Some(3));
            assert_eq!(config.agents.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("cadre.toml", EXAMPLE)?;
            jail.set_env("CADRE_SHUTDOWN_TIMEOUT", "9s");
            jail.set_env("CADRE_RESTART__BACKOFF_MAX", "2m");

            let config =
                CadreConfig::load(Some(Path::new("cadre.toml"))).expect("load failed");
            assert_eq!(config.shutdown_timeout, Duration::from_secs(9));
            assert_eq!(config.restart.backoff_max, Duration::from_secs(120));
            Ok(())
        });
    }

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let config = CadreConfig::load(None).expect("load failed");
            assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
            assert!(config.agents.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_duplicate_agent_names_rejected() {
        let config = CadreConfig {
            agents: vec![
                AgentSpec {
                    name: "pulse".into(),
                    cadence: Duration::from_secs(1),
                    kind: AgentKind::Heartbeat {
                        work_delay: Duration::ZERO,
                    },
                    restart: None,
                },
                AgentSpec {
                    name: "pulse".into(),
                    cadence: Duration::from_secs(1),
                    kind: AgentKind::Heartbeat {
                        work_delay: Duration::ZERO,
                    },
                    restart: None,
                },
            ],
            ..Default::default()
        };

        let err = config.validate().expect_err("validation should fail");
        assert!(err.to_string().contains("duplicate agent name"));
    }

    #[test]
    fn test_unknown_agent_kind_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "cadre.toml",
                r#"
shutdown_timeout = "5s"

[[agents]]
name = "mystery"
cadence = "10s"
kind = "teleporter"
"#,
            )?;
            let err = CadreConfig::load(Some(Path::new("cadre.toml")))
                .expect_err("load should fail");
            assert!(matches!(err, ConfigError::Figment(_)));
            Ok(())
        });
    }

    #[test]
    fn test_sub_unit_multiplier_rejected() {
        let config = CadreConfig {
            restart: RestartSettings {
                backoff_multiplier: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };

        let err = config.validate().expect_err("validation should fail");
        assert!(err.to_string().contains("backoff_multiplier"));
    }
}
