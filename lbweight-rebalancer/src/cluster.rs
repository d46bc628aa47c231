//! Cluster weight rebalancing
//!
//! Reads one cluster's EDS document, probes every endpoint listed under
//! `lb_endpoints`, computes new weights and writes them back into the same
//! document. Only the weight scalars of healthy endpoints change.

use crate::prober::EndpointProber;
use crate::weights::{ClusterSample, Endpoint};
use lbweight_core::{Document, DocumentNode, LbWeightError, Result};
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};

const LB_ENDPOINTS: &str = "lb_endpoints";
const ENDPOINT: &str = "endpoint";
const ADDRESS: &str = "address";
const WEIGHT: &str = "load_balancing_weight";

/// What a pass did to one cluster document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterOutcome {
    /// New weights were written to the document
    Rewritten { updated: usize },
    /// Too few healthy endpoints; document untouched
    Skipped { healthy: usize },
    /// Weights computed but not written
    DryRun { updated: usize },
    /// Weights computed but the document could not be written
    WriteFailed { error: String },
}

/// Rebalances cluster documents using a prober
pub struct ClusterRebalancer<P> {
    prober: P,
    dry_run: bool,
}

impl<P: EndpointProber> ClusterRebalancer<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            dry_run: false,
        }
    }

    /// Compute and log weights without writing documents
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Rebalance the cluster document at `path`.
    ///
    /// Unreadable or malformed documents and missing required fields are
    /// errors. A failed write is reported in the outcome instead.
    #[instrument(skip(self, path), fields(cluster = %path.display()))]
    pub async fn rebalance(&self, path: &Path) -> Result<ClusterOutcome> {
        info!("Rebalancing cluster");

        let mut document = Document::load(path)?;
        let mut sample = self.sample(document.root()).await?;

        if !sample.is_balanceable() {
            info!(
                healthy = sample.len(),
                "Not enough healthy endpoints, leaving cluster untouched"
            );
            return Ok(ClusterOutcome::Skipped {
                healthy: sample.len(),
            });
        }

        sample.rebalance();

        for endpoint in sample.endpoints() {
            info!(
                address = %endpoint.address,
                load = endpoint.load,
                weight = endpoint.weight,
                new_weight = endpoint.new_weight,
                "Computed endpoint weight"
            );
        }

        let updated = apply_weights(document.root_mut(), &sample)?;

        if self.dry_run {
            info!(updated, "Dry run, document not written");
            return Ok(ClusterOutcome::DryRun { updated });
        }

        match document.save() {
            Ok(()) => {
                info!(updated, "Cluster document rewritten");
                Ok(ClusterOutcome::Rewritten { updated })
            }
            Err(e) => {
                error!(error = %e, "Failed to write cluster document");
                Ok(ClusterOutcome::WriteFailed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Probe every endpoint of the document, in document order
    async fn sample(&self, root: &DocumentNode) -> Result<ClusterSample> {
        let lb_endpoints = root.require(LB_ENDPOINTS)?;
        let mut sample = ClusterSample::default();

        for entry in lb_endpoints.children() {
            let address = endpoint_address(entry)?;
            let weight = endpoint_weight(entry)?;

            if !self.prober.check_health(address).await {
                warn!(address = %address, "Endpoint unhealthy, keeping its weight");
                continue;
            }

            let load = self.prober.check_hardware(address).await;
            debug!(address = %address, load, weight, "Endpoint sampled");
            sample.record(Endpoint::healthy(address, weight, load));
        }

        Ok(sample)
    }
}

/// Write the computed weights into a fresh traversal of `lb_endpoints`.
///
/// Returns the number of weight fields updated.
pub fn apply_weights(root: &mut DocumentNode, sample: &ClusterSample) -> Result<usize> {
    let lb_endpoints = root.require_mut(LB_ENDPOINTS)?;
    let mut updated = 0;

    for entry in lb_endpoints.children_mut() {
        let address = endpoint_address(entry)?.to_string();
        let Some(endpoint) = sample.get(&address) else {
            continue;
        };

        let weight = entry.require_mut(WEIGHT)?;
        // An unchanged weight keeps its source spelling (e.g. `0x32`)
        if weight.as_i64() == Some(endpoint.new_weight) {
            updated += 1;
            continue;
        }
        if !weight.set_value(endpoint.new_weight.to_string()) {
            return Err(LbWeightError::InvalidWeight {
                value: format!("non-scalar weight for {}", address),
            });
        }
        updated += 1;
    }

    Ok(updated)
}

/// Host of an `lb_endpoints` entry: `endpoint` → `address` → `address`.
///
/// Each lookup is scoped to the previous result; the outer `address` key
/// would otherwise shadow the socket address nested beneath it.
pub fn endpoint_address(entry: &DocumentNode) -> Result<&str> {
    let endpoint = entry.require(ENDPOINT)?;
    let address = endpoint.require(ADDRESS)?;
    let host = address.require(ADDRESS)?;
    host.value()
        .ok_or_else(|| LbWeightError::missing("endpoint.address.socket_address.address"))
}

/// Current `load_balancing_weight` of an `lb_endpoints` entry
pub fn endpoint_weight(entry: &DocumentNode) -> Result<i64> {
    let weight = entry.require(WEIGHT)?;
    weight.as_i64().ok_or_else(|| LbWeightError::InvalidWeight {
        value: weight.value().unwrap_or("<non-scalar>").to_string(),
    })
}
