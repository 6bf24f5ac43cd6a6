//! Tests for the state snapshotter.
//!
//! Feeds engine pod listings (as the engine's JSON) through the decoder and
//! checks which pods and containers survive and how phases are mapped.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hyperlet::pod::ContainerPhase;
use hyperlet::snapshot::{list_pods, observe_pod, pod_status};
use hyperlet::{EngineClient, EnginePodInfo, PodIdentity, Result};

// =============================================================================
// Test Helpers
// =============================================================================

const WEB_POD: &str = r#"{
    "podId": "pod-web",
    "podName": "kube_uid-1_web_default",
    "spec": {"containers": [
        {"name": "kube_uid-1_web_default_nginx_1f", "containerId": "c1", "image": "nginx", "imageId": "sha256:aa"},
        {"name": "kube_uid-1_web_default_log_2e", "containerId": "c2", "image": "busybox"},
        {"name": "kube_uid-1_web_default_init_3d", "containerId": "c3", "image": "busybox"},
        {"name": "sidecar", "containerId": "c4", "image": "envoy"}
    ]},
    "status": {
        "podIP": ["10.0.0.5", "10.0.0.6"],
        "status": [
            {"containerId": "c1", "phase": "running", "restartCount": 2,
             "running": {"startedAt": "2016-01-02T03:04:05Z"}},
            {"containerId": "c2", "phase": "failed",
             "terminated": {"exitCode": 3, "reason": "Error", "message": "crashed",
                            "startedAt": "2016-01-02T03:00:00Z", "finishedAt": "2016-01-02T03:01:00Z"}},
            {"containerId": "c3", "phase": "pending", "waiting": {"reason": "pulling"}}
        ]
    }
}"#;

const FOREIGN_POD: &str = r#"{
    "podId": "pod-x",
    "podName": "manually-started",
    "spec": {"containers": []},
    "status": {}
}"#;

fn info(json: &str) -> EnginePodInfo {
    serde_json::from_str(json).unwrap()
}

struct ListingEngine(Vec<EnginePodInfo>);

#[async_trait]
impl EngineClient for ListingEngine {
    async fn list_pods(&self) -> Result<Vec<EnginePodInfo>> {
        Ok(self.0.clone())
    }
    async fn create_pod(&self, _document: &[u8]) -> Result<String> {
        unreachable!("snapshots never create")
    }
    async fn start_pod(&self, _pod_id: &str) -> Result<()> {
        unreachable!("snapshots never start")
    }
    async fn remove_pod(&self, _pod_id: &str) -> Result<()> {
        unreachable!("snapshots never remove")
    }
    async fn is_image_present(&self, _repository: &str, _tag: &str) -> Result<bool> {
        Ok(true)
    }
    async fn pull_image(&self, _image: &str, _credential: &str) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Decoding Tests
// =============================================================================

#[test]
fn test_observe_pod_decodes_identity() {
    let pod = observe_pod(&info(WEB_POD)).unwrap();
    assert_eq!(pod.identity, PodIdentity::new("uid-1", "web", "default"));
    assert_eq!(pod.instance_id, "pod-web");
    assert_eq!(pod.ip.as_deref(), Some("10.0.0.5"), "first pod IP is used");
}

#[test]
fn test_foreign_pod_is_skipped() {
    assert!(observe_pod(&info(FOREIGN_POD)).is_none());
}

#[test]
fn test_foreign_container_is_skipped() {
    let pod = observe_pod(&info(WEB_POD)).unwrap();
    let names: Vec<&str> = pod.containers.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["nginx", "log", "init"]);
}

#[test]
fn test_phase_mapping() {
    let pod = observe_pod(&info(WEB_POD)).unwrap();

    let nginx = pod.find_container("nginx").unwrap();
    assert_eq!(nginx.phase, ContainerPhase::Running);
    assert_eq!(nginx.identity.spec_hash, 0x1f);
    assert_eq!(nginx.restart_count, 2);
    assert_eq!(nginx.image_id, "sha256:aa");
    assert_eq!(
        nginx.started_at,
        Utc.with_ymd_and_hms(2016, 1, 2, 3, 4, 5).unwrap()
    );

    let log = pod.find_container("log").unwrap();
    assert_eq!(log.phase, ContainerPhase::Exited);
    assert_eq!(log.exit_code, 3);
    assert_eq!(log.reason, "Error");
    assert_eq!(log.message, "crashed");
    assert_eq!(
        log.finished_at,
        Utc.with_ymd_and_hms(2016, 1, 2, 3, 1, 0).unwrap()
    );

    let init = pod.find_container("init").unwrap();
    assert_eq!(init.phase, ContainerPhase::Unknown);
    assert_eq!(init.reason, "pulling");
}

#[test]
fn test_container_without_status_is_unknown() {
    let mut raw = info(WEB_POD);
    raw.status.container_statuses.clear();
    let pod = observe_pod(&raw).unwrap();
    assert_eq!(pod.containers.len(), 3);
    assert!(pod
        .containers
        .iter()
        .all(|c| c.phase == ContainerPhase::Unknown));
}

#[test]
fn test_unparseable_time_excludes_container() {
    let mut raw = info(WEB_POD);
    raw.status.container_statuses[0].running.started_at = "last tuesday".to_string();
    let pod = observe_pod(&raw).unwrap();
    assert!(pod.find_container("nginx").is_none());
    assert!(pod.find_container("log").is_some());
}

#[test]
fn test_no_pod_ip() {
    let mut raw = info(WEB_POD);
    raw.status.pod_ip.clear();
    assert_eq!(observe_pod(&raw).unwrap().ip, None);
}

// =============================================================================
// Engine Query Tests
// =============================================================================

#[tokio::test]
async fn test_list_pods_skips_foreign() {
    let engine = ListingEngine(vec![info(FOREIGN_POD), info(WEB_POD)]);
    let pods = list_pods(&engine).await.unwrap();
    assert_eq!(pods.len(), 1);
    assert_eq!(pods[0].identity.pod_name, "web");
}

#[tokio::test]
async fn test_pod_status_found() {
    let engine = ListingEngine(vec![info(FOREIGN_POD), info(WEB_POD)]);
    let id = PodIdentity::new("uid-1", "web", "default");
    let pod = pod_status(&engine, &id).await.unwrap();
    assert_eq!(pod.instance_id, "pod-web");
    assert_eq!(pod.containers.len(), 3);
}

#[tokio::test]
async fn test_pod_status_missing_is_empty() {
    let engine = ListingEngine(vec![info(WEB_POD)]);
    let id = PodIdentity::new("uid-2", "api", "default");
    let pod = pod_status(&engine, &id).await.unwrap();
    assert_eq!(pod.identity, id);
    assert!(pod.instance_id.is_empty());
    assert!(pod.containers.is_empty());
}
