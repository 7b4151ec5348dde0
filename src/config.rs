use anyhow::{bail, Context};
use std::time::Duration;

use crate::actors::{HubConfig, ObserverConfig};
use crate::domain::order::CoordinatorConfig;

// ============================================================================
// Configuration - ORDER_* environment variables with local defaults
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Scylla,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub transport: TransportKind,
    pub redis_url: String,
    pub topic: String,
    pub store: StoreKind,
    pub scylla_node: String,
    pub keyspace: String,
    pub store_timeout: Duration,
    pub refresh_debounce: Duration,
    pub resync_interval: Duration,
    pub metrics_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            topic: "breakfast/orders/lifecycle".to_string(),
            store: StoreKind::Memory,
            scylla_node: "127.0.0.1:9042".to_string(),
            keyspace: "orders_ks".to_string(),
            store_timeout: Duration::from_millis(5000),
            refresh_debounce: Duration::from_millis(1000),
            resync_interval: Duration::from_secs(30),
            metrics_port: 9090,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup("ORDER_TRANSPORT") {
            config.transport = match raw.to_ascii_lowercase().as_str() {
                "redis" => TransportKind::Redis,
                "memory" => TransportKind::Memory,
                other => bail!("ORDER_TRANSPORT must be 'redis' or 'memory', got '{}'", other),
            };
        }
        if let Some(raw) = lookup("ORDER_STORE") {
            config.store = match raw.to_ascii_lowercase().as_str() {
                "scylla" => StoreKind::Scylla,
                "memory" => StoreKind::Memory,
                other => bail!("ORDER_STORE must be 'scylla' or 'memory', got '{}'", other),
            };
        }
        if let Some(raw) = lookup("ORDER_REDIS_URL") {
            config.redis_url = raw;
        }
        if let Some(raw) = lookup("ORDER_TOPIC") {
            if raw.trim().is_empty() {
                bail!("ORDER_TOPIC must not be empty");
            }
            config.topic = raw;
        }
        if let Some(raw) = lookup("ORDER_SCYLLA_NODE") {
            config.scylla_node = raw;
        }
        if let Some(raw) = lookup("ORDER_KEYSPACE") {
            config.keyspace = raw;
        }
        if let Some(raw) = lookup("ORDER_STORE_TIMEOUT_MS") {
            let ms: u64 = raw.parse().with_context(|| format!("ORDER_STORE_TIMEOUT_MS is not a number: {}", raw))?;
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("ORDER_REFRESH_DEBOUNCE_MS") {
            let ms: u64 = raw
                .parse()
                .with_context(|| format!("ORDER_REFRESH_DEBOUNCE_MS is not a number: {}", raw))?;
            config.refresh_debounce = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("ORDER_RESYNC_INTERVAL_SECS") {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("ORDER_RESYNC_INTERVAL_SECS is not a number: {}", raw))?;
            if secs == 0 {
                bail!("ORDER_RESYNC_INTERVAL_SECS must be positive");
            }
            config.resync_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("ORDER_METRICS_PORT") {
            config.metrics_port = raw.parse().with_context(|| format!("ORDER_METRICS_PORT is not a port: {}", raw))?;
        }

        Ok(config)
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            store_timeout: self.store_timeout,
            ..CoordinatorConfig::default()
        }
    }

    pub fn observer(&self) -> ObserverConfig {
        ObserverConfig {
            debounce: self.refresh_debounce,
            resync_interval: self.resync_interval,
            store_timeout: self.store_timeout,
        }
    }

    pub fn hub(&self) -> HubConfig {
        HubConfig::new(self.topic.clone())
    }
}
