//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → LoadBalancer::from_config
//!
//! On file change:
//!     watcher.rs detects change (debounced)
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → watcher.rs reconciles the instance registry and health check timings
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - A reload never resets breaker state of instances that survive it

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BalancerConfig, GatewayConfig, HealthCheckConfig, InstanceConfig,
    ObservabilityConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::{apply_config, ConfigWatcher, ReloadReport, WatchHandle};
