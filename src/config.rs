use crate::application::{BehaviorSettings, HealthPolicy, SupervisorSettings};
use crate::domains::agent::AgentKind;
use crate::domains::dispatch::DispatchSettings;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub postgres: PostgresConfig,
    pub kafka: KafkaConfig,
    pub supervisor: SupervisorConfig,
    pub dispatch: DispatchConfig,
    pub logging: LoggingConfig,
    pub agents: Vec<AgentConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Demo orders and vehicles seeded into the in-memory store.
    pub seed_orders: usize,
    pub seed_vehicles: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            seed_orders: 12,
            seed_vehicles: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: u32,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "fleet_agents".to_string(),
            username: "postgres".to_string(),
            password: "password".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub enabled: bool,
    pub brokers: Vec<String>,
    pub client_id: String,
    pub topics: KafkaTopics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaTopics {
    pub agent_events: String,
    pub dispatch_events: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: vec!["localhost:9092".to_string()],
            client_id: "fleet-agents".to_string(),
            topics: KafkaTopics {
                agent_events: "agent-events".to_string(),
                dispatch_events: "dispatch-events".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub health_check_interval_secs: u64,
    pub heartbeat_timeout_secs: i64,
    pub max_consecutive_failures: u32,
    pub max_restart_attempts: u32,
    pub failure_backoff_secs: u64,
    pub shutdown_grace_secs: u64,
    pub notify_queue_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval_secs: 60,
            heartbeat_timeout_secs: 300,
            max_consecutive_failures: 5,
            max_restart_attempts: 3,
            failure_backoff_secs: 30,
            shutdown_grace_secs: 10,
            notify_queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub traffic_factor: f64,
    pub weather_factor: f64,
    pub pickup_lead_minutes: i64,
    pub delivery_window_minutes: i64,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            traffic_factor: 1.2,
            weather_factor: 1.0,
            pickup_lead_minutes: 10,
            delivery_window_minutes: 35,
            cache_capacity: 256,
            cache_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// fast_log file sink; `None` logs to the console only.
    pub file: Option<String>,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some("logs/fleet-agents.log".to_string()),
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub kind: AgentKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cycle_interval() -> u64 {
    60
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Optional TOML file overlaid with `FLEET__SECTION__KEY` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("FLEET")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Agents from the `agents` list, or one universal agent if none are configured.
    pub fn enabled_agents(&self) -> Vec<AgentConfig> {
        if self.agents.is_empty() {
            return vec![AgentConfig {
                kind: AgentKind::Universal,
                id: None,
                cycle_interval_secs: default_cycle_interval(),
                enabled: true,
            }];
        }
        self.agents.iter().filter(|a| a.enabled).cloned().collect()
    }

    pub fn health_policy(&self) -> HealthPolicy {
        let s = &self.supervisor;
        HealthPolicy {
            check_interval: Duration::from_secs(s.health_check_interval_secs),
            heartbeat_timeout: chrono::Duration::seconds(s.heartbeat_timeout_secs),
            max_consecutive_failures: s.max_consecutive_failures,
            max_restart_attempts: s.max_restart_attempts,
        }
    }

    pub fn behavior_settings(&self) -> BehaviorSettings {
        let d = &self.dispatch;
        BehaviorSettings {
            dispatch: DispatchSettings {
                pickup_lead_minutes: d.pickup_lead_minutes,
                delivery_window_minutes: d.delivery_window_minutes,
                ..DispatchSettings::default()
            },
            traffic_factor: d.traffic_factor,
            weather_factor: d.weather_factor,
            cache_capacity: d.cache_capacity,
            cache_ttl: Duration::from_secs(d.cache_ttl_secs),
        }
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            health: self.health_policy(),
            failure_backoff: Duration::from_secs(self.supervisor.failure_backoff_secs),
            shutdown_grace: Duration::from_secs(self.supervisor.shutdown_grace_secs),
            notify_queue_capacity: self.supervisor.notify_queue_capacity,
            behavior: self.behavior_settings(),
        }
    }
}
