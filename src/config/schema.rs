//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::Strategy;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Selection strategy, breaker policy and registered instances.
    pub balancer: BalancerConfig,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Selection strategy.
    pub strategy: Strategy,

    /// Consecutive failures before a closed circuit opens.
    pub max_failures: u32,

    /// Reserved balancer-wide request timeout in milliseconds.
    pub timeout_ms: u64,

    /// How long an open circuit stays open before a trial request, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Instances registered at startup.
    pub instances: Vec<InstanceConfig>,
}

impl BalancerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::RoundRobin,
            max_failures: 5,
            timeout_ms: 30_000,
            recovery_timeout_ms: 30_000,
            instances: Vec::new(),
        }
    }
}

/// One backend replica.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct InstanceConfig {
    /// Unique instance identifier.
    pub id: String,

    /// Dispatch target (e.g., "http://10.0.0.1:8080").
    pub url: String,

    /// Health probe target (e.g., "http://10.0.0.1:8080/health").
    pub health_url: String,

    /// Weight (default: 1). Accepted but not used by any strategy.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Per-instance request timeout hint in milliseconds.
    #[serde(default = "default_instance_timeout_ms")]
    pub timeout_ms: u64,
}

impl InstanceConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>, health_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            health_url: health_url.into(),
            weight: default_weight(),
            timeout_ms: default_instance_timeout_ms(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_weight() -> u32 {
    1
}

fn default_instance_timeout_ms() -> u64 {
    30_000
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Interval between probe rounds in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30_000,
            timeout_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
