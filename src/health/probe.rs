//! Single-instance HTTP health probe.

use std::sync::RwLock;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time;

/// Errors raised while setting up the probe transport.
#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("failed to build health check client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Outcome of probing one instance. Consumed once to update that instance.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub instance_id: String,
    pub healthy: bool,
    pub duration: Duration,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
struct Transport {
    client: reqwest::Client,
    timeout: Duration,
}

impl Transport {
    fn build(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("replica-balancer-health-check")
            .no_proxy()
            .build()?;
        Ok(Self { client, timeout })
    }
}

/// Issues `GET <health_url>` with a bounded timeout.
#[derive(Debug)]
pub struct Prober {
    transport: RwLock<Transport>,
}

impl Prober {
    pub fn new(timeout: Duration) -> Result<Self, HealthCheckError> {
        Ok(Self {
            transport: RwLock::new(Transport::build(timeout)?),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.transport.read().unwrap_or_else(|e| e.into_inner()).timeout
    }

    /// Change the probe timeout. The HTTP client is rebuilt so its own
    /// timeout matches.
    pub fn set_timeout(&self, timeout: Duration) -> Result<(), HealthCheckError> {
        let transport = Transport::build(timeout)?;
        *self.transport.write().unwrap_or_else(|e| e.into_inner()) = transport;
        Ok(())
    }

    /// Handle usable from a spawned probe task.
    pub(crate) fn handle(&self) -> ProbeHandle {
        ProbeHandle {
            transport: self.transport.read().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }

    /// Probe one instance. 2xx is healthy; anything else is not.
    pub async fn probe(&self, instance_id: &str, health_url: &str) -> HealthCheckResult {
        self.handle().probe(instance_id, health_url).await
    }
}

/// Snapshot of the transport taken at the start of a round.
#[derive(Debug, Clone)]
pub(crate) struct ProbeHandle {
    transport: Transport,
}

impl ProbeHandle {
    pub(crate) async fn probe(&self, instance_id: &str, health_url: &str) -> HealthCheckResult {
        let start = Instant::now();
        let request = self.transport.client.get(health_url).send();

        let (healthy, status, error) = match time::timeout(self.transport.timeout, request).await {
            Ok(Ok(response)) => {
                let status = response.status();
                let error = (!status.is_success()).then(|| format!("non-success status {status}"));
                (status.is_success(), Some(status.as_u16()), error)
            }
            Ok(Err(e)) => (false, e.status().map(|s| s.as_u16()), Some(e.to_string())),
            Err(_) => (false, None, Some("timeout".to_string())),
        };

        let duration = start.elapsed();
        if let Some(error) = &error {
            tracing::debug!(
                instance_id = %instance_id,
                url = %health_url,
                elapsed = ?duration,
                error = %error,
                "Health probe failed"
            );
        }

        HealthCheckResult {
            instance_id: instance_id.to_string(),
            healthy,
            duration,
            status,
            error,
        }
    }
}
