//! Rebalancing pass over every cluster
//!
//! Reads the Envoy cluster document, follows each cluster's
//! `eds_cluster_config` → `eds_config` → `path` to its EDS file and
//! rebalances the clusters one after another.

use crate::cluster::{ClusterOutcome, ClusterRebalancer};
use crate::prober::EndpointProber;
use lbweight_core::{Document, DocumentNode, LbWeightError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, instrument};

/// Results of one pass
#[derive(Debug, Default)]
pub struct PassReport {
    /// Outcome per cluster document, in processing order
    pub clusters: Vec<(PathBuf, ClusterOutcome)>,
    /// Pass duration
    pub duration: Duration,
}

impl PassReport {
    pub fn rewritten(&self) -> usize {
        self.count(|o| matches!(o, ClusterOutcome::Rewritten { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ClusterOutcome::Skipped { .. }))
    }

    pub fn dry_runs(&self) -> usize {
        self.count(|o| matches!(o, ClusterOutcome::DryRun { .. }))
    }

    pub fn write_failures(&self) -> usize {
        self.count(|o| matches!(o, ClusterOutcome::WriteFailed { .. }))
    }

    fn count(&self, predicate: impl Fn(&ClusterOutcome) -> bool) -> usize {
        self.clusters.iter().filter(|(_, o)| predicate(o)).count()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Processed {} clusters in {:?}: {} rewritten, {} skipped, {} dry-run, {} write failures",
            self.clusters.len(),
            self.duration,
            self.rewritten(),
            self.skipped(),
            self.dry_runs(),
            self.write_failures()
        )
    }
}

/// EDS file paths of every cluster listed under `resources`
pub fn cluster_paths(root: &DocumentNode) -> Result<Vec<PathBuf>> {
    let resources = root.require("resources")?;

    resources
        .children()
        .iter()
        .map(|cluster| {
            let eds_cluster_config = cluster.require("eds_cluster_config")?;
            let eds_config = eds_cluster_config.require("eds_config")?;
            let path = eds_config.require("path")?;
            path.value()
                .map(PathBuf::from)
                .ok_or_else(|| LbWeightError::missing("eds_config.path"))
        })
        .collect()
}

/// Runs passes over all clusters of an Envoy configuration
pub struct Driver<P> {
    rebalancer: ClusterRebalancer<P>,
}

impl<P: EndpointProber> Driver<P> {
    pub fn new(rebalancer: ClusterRebalancer<P>) -> Self {
        Self { rebalancer }
    }

    /// Rebalance every cluster referenced by `envoy_config`, sequentially.
    ///
    /// The first fatal error stops the pass; clusters after it are not
    /// processed.
    #[instrument(skip(self, envoy_config), fields(envoy_config = %envoy_config.display()))]
    pub async fn run_pass(&self, envoy_config: &Path) -> Result<PassReport> {
        let start = Instant::now();
        let document = Document::load(envoy_config)?;
        let paths = cluster_paths(document.root())?;

        info!(clusters = paths.len(), "Starting rebalancing pass");

        let mut report = PassReport::default();
        for path in paths {
            let outcome = self.rebalancer.rebalance(&path).await?;
            report.clusters.push((path, outcome));
        }

        report.duration = start.elapsed();
        info!(summary = %report.summary(), "Rebalancing pass complete");

        Ok(report)
    }
}
