//! Selection errors.

use thiserror::Error;

/// Errors returned by instance selection.
///
/// Both are expected, retryable conditions. The embedding gateway usually
/// maps them to `503 Service Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadBalancerError {
    #[error("no instances registered")]
    NoInstancesRegistered,

    #[error("no healthy instances available")]
    NoHealthyInstancesAvailable,
}

impl LoadBalancerError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            LoadBalancerError::NoInstancesRegistered => "no_instances",
            LoadBalancerError::NoHealthyInstancesAvailable => "no_healthy_instances",
        }
    }
}
