//! Engine client trait and the engine's pod listing format.
//!
//! The engine manages whole pods: a pod is created from one
//! [`PodSpecDocument`](crate::pod::PodSpecDocument), started, and removed.
//! There is no per-container create or restart.
//!
//! # Lifecycle
//!
//! ```text
//! create_pod(document) → start_pod(id) → remove_pod(id)
//!        │                    │
//!        └── instance id      └── on failure: remove_pod(id)
//! ```
//!
//! Transport (launching the engine binary, talking to its socket, parsing
//! its responses) lives in implementations of [`EngineClient`].

use crate::error::{Error, Result};
use crate::stream::Session;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// Pod Listing
// =============================================================================

/// Engine container phase strings.
pub const PHASE_RUNNING: &str = "running";
pub const PHASE_PENDING: &str = "pending";
pub const PHASE_FAILED: &str = "failed";
pub const PHASE_SUCCEEDED: &str = "succeeded";

/// One pod as listed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePodInfo {
    /// Engine-assigned pod instance ID.
    pub pod_id: String,
    /// Pod name as given in the document (`id` field).
    pub pod_name: String,
    #[serde(default)]
    pub spec: EnginePodSpec,
    #[serde(default)]
    pub status: EnginePodStatus,
}

/// Declared containers of an engine pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePodSpec {
    #[serde(default)]
    pub containers: Vec<EngineContainer>,
}

/// A declared container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineContainer {
    /// Container name as given in the document.
    pub name: String,
    pub container_id: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub image_id: String,
}

/// Runtime status of an engine pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnginePodStatus {
    #[serde(default, rename = "podIP")]
    pub pod_ip: Vec<String>,
    #[serde(default, rename = "status")]
    pub container_statuses: Vec<EngineContainerStatus>,
}

/// Runtime status of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineContainerStatus {
    pub container_id: String,
    /// One of the `PHASE_*` strings.
    pub phase: String,
    #[serde(default)]
    pub restart_count: u32,
    #[serde(default)]
    pub running: EngineRunningState,
    #[serde(default)]
    pub waiting: EngineWaitingState,
    #[serde(default)]
    pub terminated: EngineTerminatedState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRunningState {
    #[serde(default)]
    pub started_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineWaitingState {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineTerminatedState {
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub finished_at: String,
}

// =============================================================================
// Images
// =============================================================================

/// One image in the engine's local store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineImage {
    pub image_id: String,
    pub repository: String,
    #[serde(default)]
    pub tag: String,
    /// Size in bytes.
    #[serde(default)]
    pub virtual_size: u64,
}

/// An image as reported to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    /// `repository:tag` references of this image.
    pub repo_tags: Vec<String>,
    /// Size in bytes.
    pub size: u64,
}

impl From<EngineImage> for Image {
    fn from(image: EngineImage) -> Self {
        let tag = if image.tag.is_empty() {
            crate::constants::DEFAULT_IMAGE_TAG
        } else {
            image.tag.as_str()
        };
        Self {
            repo_tags: vec![format!("{}:{tag}", image.repository)],
            id: image.image_id,
            size: image.virtual_size,
        }
    }
}

// =============================================================================
// Day-2 Options
// =============================================================================

/// Options for streaming container logs.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Stream logs (follow mode).
    pub follow: bool,
    /// Only logs newer than this many seconds (0 = all).
    pub since_seconds: u64,
    /// Number of lines from tail (0 = all).
    pub tail_lines: u64,
    /// Include timestamps.
    pub timestamps: bool,
}

impl LogOptions {
    /// Engine CLI arguments for these options.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.follow {
            args.push("--follow".to_string());
        }
        if self.since_seconds != 0 {
            args.push(format!("--since={}", self.since_seconds));
        }
        if self.tail_lines != 0 {
            args.push(format!("--tail={}", self.tail_lines));
        }
        if self.timestamps {
            args.push("--timestamps".to_string());
        }
        args
    }
}

// =============================================================================
// Engine Client Trait
// =============================================================================

/// Client for a pod-level container engine.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Calls for different pods may run
/// concurrently; the adapter never issues concurrent calls for the same pod.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Lists every pod the engine knows about, including pods this adapter
    /// did not create.
    async fn list_pods(&self) -> Result<Vec<EnginePodInfo>>;

    /// Creates (but does not start) a pod from a serialized document.
    ///
    /// Returns the engine-assigned pod instance ID.
    async fn create_pod(&self, document: &[u8]) -> Result<String>;

    /// Starts a created pod.
    async fn start_pod(&self, pod_id: &str) -> Result<()>;

    /// Stops and removes a pod.
    async fn remove_pod(&self, pod_id: &str) -> Result<()>;

    /// Checks whether `repository:tag` is in the local image store.
    async fn is_image_present(&self, repository: &str, tag: &str) -> Result<bool>;

    /// Pulls an image. `credential` is base64url-encoded JSON, or empty.
    async fn pull_image(&self, image: &str, credential: &str) -> Result<()>;

    /// Engine version string.
    async fn version(&self) -> Result<String> {
        Err(Error::NotSupported(
            "version not reported by this engine".to_string(),
        ))
    }

    // =========================================================================
    // Image Management (Optional)
    // =========================================================================

    /// Lists the local image store.
    async fn list_images(&self) -> Result<Vec<EngineImage>> {
        Err(Error::NotSupported(
            "image listing not supported by this engine".to_string(),
        ))
    }

    /// Removes an image from the local store.
    async fn remove_image(&self, _image: &str) -> Result<()> {
        Err(Error::NotSupported(
            "image removal not supported by this engine".to_string(),
        ))
    }

    // =========================================================================
    // Day-2 Operations (Optional)
    // =========================================================================

    /// Opens a log stream for a container.
    async fn logs(&self, _container_id: &str, _options: &LogOptions) -> Result<Session> {
        Err(Error::NotSupported(
            "logs not supported by this engine".to_string(),
        ))
    }

    /// Runs a command inside a container on a terminal.
    async fn exec(&self, _container_id: &str, _command: &[String], _tty: bool) -> Result<Session> {
        Err(Error::NotSupported(
            "exec not supported by this engine".to_string(),
        ))
    }

    /// Attaches to the main process of a running container.
    async fn attach(&self, _container_id: &str, _tty: bool) -> Result<Session> {
        Err(Error::NotSupported(
            "attach not supported by this engine".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_options_args() {
        let opts = LogOptions {
            follow: true,
            since_seconds: 30,
            tail_lines: 0,
            timestamps: true,
        };
        assert_eq!(opts.to_args(), vec!["--follow", "--since=30", "--timestamps"]);
    }

    #[test]
    fn test_engine_image_to_image() {
        let image: Image = EngineImage {
            image_id: "sha256:abc".to_string(),
            repository: "nginx".to_string(),
            tag: String::new(),
            virtual_size: 42,
        }
        .into();
        assert_eq!(image.repo_tags, vec!["nginx:latest"]);
        assert_eq!(image.id, "sha256:abc");
        assert_eq!(image.size, 42);
    }

    #[test]
    fn test_pod_info_deserializes_engine_json() {
        let json = r#"{
            "podId": "pod-abc",
            "podName": "kube_uid_web_default",
            "spec": {"containers": [{"name": "kube_uid_web_default_nginx_1f", "containerId": "c1", "image": "nginx"}]},
            "status": {"podIP": ["10.0.0.5"], "status": [{"containerId": "c1", "phase": "running", "running": {"startedAt": "2016-01-02T03:04:05Z"}}]}
        }"#;
        let info: EnginePodInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.status.pod_ip, vec!["10.0.0.5"]);
        assert_eq!(info.status.container_statuses[0].phase, PHASE_RUNNING);
        assert_eq!(info.spec.containers[0].container_id, "c1");
    }
}
