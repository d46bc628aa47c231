//! Endpoint probing
//!
//! Health and hardware checks against the sidecar agent of one endpoint.
//! Every failure is folded into the result (unhealthy, or zero load); nothing
//! is retried.

use crate::config::Settings;
use lbweight_core::{HardwareReport, LbWeightError, Result};
use tracing::{debug, instrument, warn};

/// Probes the sidecar agent running next to an endpoint
#[async_trait::async_trait]
pub trait EndpointProber: Send + Sync {
    /// Whether the endpoint should receive traffic
    async fn check_health(&self, address: &str) -> bool;

    /// Hardware load of the endpoint, zero when it cannot be read
    async fn check_hardware(&self, address: &str) -> i64;
}

/// Prober talking HTTP to the agents
pub struct HttpProber {
    client: reqwest::Client,
    port: u16,
    health_path: String,
    hardware_path: String,
}

impl HttpProber {
    /// Create a prober for the agent port and paths in `settings`
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.probe_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LbWeightError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            port: settings.port,
            health_path: settings.path_health.clone(),
            hardware_path: settings.path_hardware.clone(),
        })
    }

    fn url(&self, address: &str, path: &str) -> String {
        if address.contains(':') && !address.starts_with('[') {
            format!("http://[{}]:{}{}", address, self.port, path)
        } else {
            format!("http://{}:{}{}", address, self.port, path)
        }
    }
}

#[async_trait::async_trait]
impl EndpointProber for HttpProber {
    #[instrument(skip(self))]
    async fn check_health(&self, address: &str) -> bool {
        let url = self.url(address, &self.health_path);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url = %url, status = %response.status(), "Endpoint healthy");
                true
            }
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Endpoint reported unhealthy");
                false
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn check_hardware(&self, address: &str) -> i64 {
        let url = self.url(address, &self.hardware_path);

        let response = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Hardware check rejected");
                return 0;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Hardware check failed");
                return 0;
            }
        };

        match response.json::<HardwareReport>().await {
            Ok(report) => {
                debug!(
                    url = %url,
                    cpu = report.cpu,
                    disk = report.disk,
                    mem = report.mem,
                    swap = report.swap,
                    "Hardware report received"
                );
                report.load()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Malformed hardware report");
                0
            }
        }
    }
}
