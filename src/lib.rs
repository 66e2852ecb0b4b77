//! Client-side load balancer with per-instance circuit breaking and
//! background health checking.

pub mod admin;
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use health::HealthChecker;
pub use lifecycle::Shutdown;
pub use load_balancer::{LoadBalancer, LoadBalancerError, ServiceInstance, Strategy};
pub use resilience::CircuitState;
