//! Integration tests for the lbweight rebalancer
//!
//! Runs whole rebalancing passes over EDS documents on disk with a scripted
//! prober standing in for the sidecar agents.
//! Run with: cargo test --test integration_tests -p lbweight-rebalancer

use lbweight_core::LbWeightError;
use lbweight_rebalancer::{ClusterOutcome, ClusterRebalancer, Driver, EndpointProber};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

// ============================================================================
// Test fixtures
// ============================================================================

/// Prober answering from a fixed table: listed addresses are healthy with
/// the given load, everything else is unhealthy.
#[derive(Default)]
struct ScriptedProber {
    loads: HashMap<String, i64>,
    calls: Mutex<Vec<String>>,
    /// Directory removed during the first hardware probe, to make the
    /// following write fail
    remove_on_hardware: Mutex<Option<PathBuf>>,
}

impl ScriptedProber {
    fn new(loads: &[(&str, i64)]) -> Self {
        Self {
            loads: loads
                .iter()
                .map(|(address, load)| (address.to_string(), *load))
                .collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EndpointProber for ScriptedProber {
    async fn check_health(&self, address: &str) -> bool {
        self.calls.lock().unwrap().push(format!("health {}", address));
        self.loads.contains_key(address)
    }

    async fn check_hardware(&self, address: &str) -> i64 {
        self.calls.lock().unwrap().push(format!("hardware {}", address));
        if let Some(dir) = self.remove_on_hardware.lock().unwrap().take() {
            std::fs::remove_dir_all(dir).unwrap();
        }
        self.loads.get(address).copied().unwrap_or(0)
    }
}

/// EDS document with one `lb_endpoints` entry per `(address, weight)`
fn eds(endpoints: &[(&str, i64)]) -> String {
    let mut doc = String::from(
        "resources:\n\
         - \"@type\": type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment\n\
         \x20 cluster_name: backend\n\
         \x20 endpoints:\n\
         \x20 - locality:\n\
         \x20     zone: eu-west-1a\n\
         \x20   lb_endpoints:\n",
    );
    for (address, weight) in endpoints {
        doc.push_str(&format!(
            "    - endpoint:\n\
             \x20       address:\n\
             \x20         socket_address:\n\
             \x20           address: {address}\n\
             \x20           port_value: 8080\n\
             \x20       health_check_config:\n\
             \x20         port_value: 8888\n\
             \x20     load_balancing_weight: {weight}\n"
        ));
    }
    doc
}

fn write_eds(dir: &TempDir, name: &str, endpoints: &[(&str, i64)]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, eds(endpoints)).unwrap();
    path
}

fn lb_endpoints(value: &Value) -> &Vec<Value> {
    value["resources"][0]["endpoints"][0]["lb_endpoints"]
        .as_sequence()
        .unwrap()
}

fn weights(path: &Path) -> Vec<i64> {
    let value: Value = serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    lb_endpoints(&value)
        .iter()
        .map(|entry| entry["load_balancing_weight"].as_i64().unwrap())
        .collect()
}

// ============================================================================
// Cluster rebalancing
// ============================================================================

#[tokio::test]
async fn test_two_healthy_endpoints_are_rebalanced() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);

    let prober = ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30)]);
    let rebalancer = ClusterRebalancer::new(prober);

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::Rewritten { updated: 2 });
    assert_eq!(weights(&path), vec![63, 37]);
}

#[tokio::test]
async fn test_rewrite_only_changes_weights() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30)]));
    rebalancer.rebalance(&path).await.unwrap();

    let expected = eds(&[("10.0.0.1", 63), ("10.0.0.2", 37)]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
}

/// EDS document as an operator might maintain it by hand
const HAND_EDITED_EDS: &str = "\
# managed by ops
defaults: &d {port_value: 8080}
cluster_name: backend
endpoints:
- lb_endpoints:
  - endpoint: {address: {socket_address: {address: 10.0.0.1, port_value: 8080}}}
    load_balancing_weight: 50   # tuned
  - endpoint:
      address:
        socket_address:
          address: 10.0.0.2
          extra: *d
    load_balancing_weight: \"50\"
  - endpoint: {address: {socket_address: {address: 10.0.0.3, port_value: 8080}}}
    load_balancing_weight: 0x11
";

#[tokio::test]
async fn test_rewrite_preserves_layout_and_unhealthy_weights() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eds.yaml");
    std::fs::write(&path, HAND_EDITED_EDS).unwrap();

    // 10.0.0.3 fails its health check
    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[
        ("10.0.0.1", 10),
        ("10.0.0.2", 30),
    ]));

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::Rewritten { updated: 2 });

    // Comments, anchors, flow style, quoting and the unhealthy entry's
    // weight are untouched
    let expected = HAND_EDITED_EDS
        .replacen(
            "load_balancing_weight: 50   # tuned",
            "load_balancing_weight: 63   # tuned",
            1,
        )
        .replacen(
            "load_balancing_weight: \"50\"",
            "load_balancing_weight: \"37\"",
            1,
        );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
}

#[tokio::test]
async fn test_single_healthy_endpoint_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);
    let before = std::fs::read(&path).unwrap();

    // 10.0.0.2 fails its health check
    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[("10.0.0.1", 10)]));

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::Skipped { healthy: 1 });
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_no_healthy_endpoint_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);
    let before = std::fs::read(&path).unwrap();

    let prober = ScriptedProber::new(&[]);
    let rebalancer = ClusterRebalancer::new(prober);

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::Skipped { healthy: 0 });
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_unhealthy_endpoint_keeps_its_weight() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(
        &dir,
        "eds.yaml",
        &[("10.0.0.1", 50), ("10.0.0.2", 17), ("10.0.0.3", 50)],
    );

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[
        ("10.0.0.1", 10),
        ("10.0.0.3", 30),
    ]));

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::Rewritten { updated: 2 });
    assert_eq!(weights(&path), vec![63, 17, 37]);
}

#[tokio::test]
async fn test_equal_loads_keep_weights() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(
        &dir,
        "eds.yaml",
        &[("10.0.0.1", 20), ("10.0.0.2", 45), ("10.0.0.3", 90)],
    );

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[
        ("10.0.0.1", 40),
        ("10.0.0.2", 40),
        ("10.0.0.3", 40),
    ]));
    rebalancer.rebalance(&path).await.unwrap();

    assert_eq!(weights(&path), vec![20, 45, 90]);
}

#[tokio::test]
async fn test_weights_are_clamped() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 95), ("10.0.0.2", 5)]);

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[
        ("10.0.0.1", 0),
        ("10.0.0.2", 100),
    ]));
    rebalancer.rebalance(&path).await.unwrap();

    assert_eq!(weights(&path), vec![100, 1]);
}

#[tokio::test]
async fn test_probes_run_in_document_order() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(
        &dir,
        "eds.yaml",
        &[("10.0.0.1", 50), ("10.0.0.2", 50), ("10.0.0.3", 50)],
    );

    let prober = ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.3", 30)]);
    let rebalancer = ClusterRebalancer::new(prober);
    rebalancer.rebalance(&path).await.unwrap();

    // The unhealthy endpoint gets no hardware probe
    let calls = rebalancer.prober().calls();
    assert_eq!(
        calls,
        vec![
            "health 10.0.0.1",
            "hardware 10.0.0.1",
            "health 10.0.0.2",
            "health 10.0.0.3",
            "hardware 10.0.0.3",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_addresses_share_the_last_weight() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(
        &dir,
        "eds.yaml",
        &[("10.0.0.1", 50), ("10.0.0.2", 50), ("10.0.0.1", 70)],
    );

    // Loads: 10.0.0.1 probed twice (10 each), 10.0.0.2 = 40.
    // Total 60 over 2 distinct endpoints: average 30.
    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[
        ("10.0.0.1", 10),
        ("10.0.0.2", 40),
    ]));
    rebalancer.rebalance(&path).await.unwrap();

    // 70 + 26 = 96 for both 10.0.0.1 entries, 50 - 13 = 37
    assert_eq!(weights(&path), vec![96, 37, 96]);
}

#[tokio::test]
async fn test_dry_run_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_eds(&dir, "eds.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);
    let before = std::fs::read(&path).unwrap();

    let rebalancer =
        ClusterRebalancer::new(ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30)]))
            .with_dry_run(true);

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert_eq!(outcome, ClusterOutcome::DryRun { updated: 2 });
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    let cluster_dir = dir.path().join("clusters");
    std::fs::create_dir(&cluster_dir).unwrap();
    let path = cluster_dir.join("eds.yaml");
    std::fs::write(&path, eds(&[("10.0.0.1", 50), ("10.0.0.2", 50)])).unwrap();

    let prober = ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30)]);
    *prober.remove_on_hardware.lock().unwrap() = Some(cluster_dir);
    let rebalancer = ClusterRebalancer::new(prober);

    let outcome = rebalancer.rebalance(&path).await.unwrap();
    assert!(matches!(outcome, ClusterOutcome::WriteFailed { .. }));
}

#[tokio::test]
async fn test_missing_lb_endpoints_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eds.yaml");
    std::fs::write(&path, "resources:\n- cluster_name: backend\n").unwrap();

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[]));
    let err = rebalancer.rebalance(&path).await.unwrap_err();
    assert!(matches!(err, LbWeightError::MissingField { ref field } if field == "lb_endpoints"));
}

#[tokio::test]
async fn test_malformed_document_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("eds.yaml");
    std::fs::write(&path, "resources: [unclosed\n").unwrap();

    let rebalancer = ClusterRebalancer::new(ScriptedProber::new(&[]));
    assert!(matches!(
        rebalancer.rebalance(&path).await,
        Err(LbWeightError::Parse(_))
    ));
}

// ============================================================================
// Driver
// ============================================================================

fn write_cds(dir: &TempDir, clusters: &[&Path]) -> PathBuf {
    let mut doc = String::from("resources:\n");
    for (i, path) in clusters.iter().enumerate() {
        doc.push_str(&format!(
            "- \"@type\": type.googleapis.com/envoy.config.cluster.v3.Cluster\n\
             \x20 name: cluster-{i}\n\
             \x20 type: EDS\n\
             \x20 eds_cluster_config:\n\
             \x20   eds_config:\n\
             \x20     path: {}\n",
            path.display()
        ));
    }
    let path = dir.path().join("cds.yaml");
    std::fs::write(&path, doc).unwrap();
    path
}

#[tokio::test]
async fn test_driver_rebalances_every_cluster() {
    let dir = TempDir::new().unwrap();
    let web = write_eds(&dir, "web.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);
    let api = write_eds(&dir, "api.yaml", &[("10.0.1.1", 50), ("10.0.1.2", 50)]);
    let cds = write_cds(&dir, &[&web, &api]);
    let api_before = std::fs::read(&api).unwrap();

    let prober = ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30), ("10.0.1.1", 70)]);
    let driver = Driver::new(ClusterRebalancer::new(prober));

    let report = driver.run_pass(&cds).await.unwrap();
    assert_eq!(report.clusters.len(), 2);
    assert_eq!(report.rewritten(), 1);
    assert_eq!(report.skipped(), 1);

    assert_eq!(weights(&web), vec![63, 37]);
    assert_eq!(std::fs::read(&api).unwrap(), api_before);
}

#[tokio::test]
async fn test_driver_stops_at_first_fatal_cluster() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken.yaml");
    std::fs::write(&broken, "resources: []\n").unwrap();
    let web = write_eds(&dir, "web.yaml", &[("10.0.0.1", 50), ("10.0.0.2", 50)]);
    let cds = write_cds(&dir, &[&broken, &web]);
    let web_before = std::fs::read(&web).unwrap();

    let prober = ScriptedProber::new(&[("10.0.0.1", 10), ("10.0.0.2", 30)]);
    let driver = Driver::new(ClusterRebalancer::new(prober));

    assert!(driver.run_pass(&cds).await.is_err());
    assert_eq!(std::fs::read(&web).unwrap(), web_before);
}

#[tokio::test]
async fn test_driver_missing_envoy_config_is_fatal() {
    let driver = Driver::new(ClusterRebalancer::new(ScriptedProber::new(&[])));
    assert!(matches!(
        driver.run_pass(Path::new("/nonexistent/cds.yaml")).await,
        Err(LbWeightError::DocumentRead { .. })
    ));
}
