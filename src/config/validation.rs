//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and timeouts > 0)
//! - Reject duplicate or empty instance ids
//! - Check instance and listener addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("balancer.max_failures must be at least 1")]
    ZeroMaxFailures,

    #[error("balancer.recovery_timeout_ms must be greater than 0")]
    ZeroRecoveryTimeout,

    #[error("health_check.interval_ms must be greater than 0")]
    ZeroCheckInterval,

    #[error("health_check.timeout_ms must be greater than 0")]
    ZeroProbeTimeout,

    #[error("instance #{index} has an empty id")]
    EmptyInstanceId { index: usize },

    #[error("instance id '{0}' is registered more than once")]
    DuplicateInstanceId(String),

    #[error("instance '{id}': {field} '{value}' is not a valid http(s) URL")]
    InvalidUrl {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("{field} '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let balancer = &config.balancer;
    if balancer.max_failures == 0 {
        errors.push(ValidationError::ZeroMaxFailures);
    }
    if balancer.recovery_timeout_ms == 0 {
        errors.push(ValidationError::ZeroRecoveryTimeout);
    }

    let mut seen = HashSet::new();
    for (index, instance) in balancer.instances.iter().enumerate() {
        if instance.id.trim().is_empty() {
            errors.push(ValidationError::EmptyInstanceId { index });
        } else if !seen.insert(instance.id.as_str()) {
            errors.push(ValidationError::DuplicateInstanceId(instance.id.clone()));
        }

        for (field, value) in [("url", &instance.url), ("health_url", &instance.health_url)] {
            if !is_http_url(value) {
                errors.push(ValidationError::InvalidUrl {
                    id: instance.id.clone(),
                    field,
                    value: value.clone(),
                });
            }
        }
    }

    if config.health_check.interval_ms == 0 {
        errors.push(ValidationError::ZeroCheckInterval);
    }
    if config.health_check.timeout_ms == 0 {
        errors.push(ValidationError::ZeroProbeTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::MissingAdminKey);
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field: "admin.bind_address",
                value: config.admin.bind_address.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.balancer.max_failures = 0;
        config.balancer.instances = vec![
            InstanceConfig::new("a", "http://10.0.0.1:80", "http://10.0.0.1:80/health"),
            InstanceConfig::new("a", "ftp://10.0.0.2", "http://10.0.0.2/health"),
            InstanceConfig::new("", "http://10.0.0.3", "not a url"),
        ];
        config.health_check.timeout_ms = 0;
        config.admin.enabled = true;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::ZeroMaxFailures));
        assert!(errors.contains(&ValidationError::DuplicateInstanceId("a".into())));
        assert!(errors.contains(&ValidationError::EmptyInstanceId { index: 2 }));
        assert!(errors.contains(&ValidationError::ZeroProbeTimeout));
        assert!(errors.contains(&ValidationError::MissingAdminKey));
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::InvalidUrl { .. }))
                .count(),
            2
        );
    }
}
