//! Observed pod state types.
//!
//! Two views of the same engine data:
//! - `RunningPod` / `ContainerObservation`: decoded engine snapshot, one
//!   entry per engine container (a name may repeat across generations)
//! - `PodStatus` / `ContainerStatus`: orchestrator-facing status, one entry
//!   per desired container

use crate::identity::{ContainerIdentity, PodIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Container Phase
// =============================================================================

/// Coarse state of an engine container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerPhase {
    /// Process is running.
    Running,
    /// Process has exited (successfully or not).
    Exited,
    /// Engine has not reported a usable phase.
    #[default]
    Unknown,
}

impl std::fmt::Display for ContainerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerPhase::Running => write!(f, "running"),
            ContainerPhase::Exited => write!(f, "exited"),
            ContainerPhase::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// One engine container, decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerObservation {
    /// Decoded identity, including the spec hash it was created from.
    pub identity: ContainerIdentity,
    /// Engine-assigned container ID.
    pub container_id: String,
    pub image: String,
    pub image_id: String,
    pub phase: ContainerPhase,
    /// Start time; the zero time if the engine reported none.
    pub started_at: DateTime<Utc>,
    /// Finish time; the zero time while running.
    pub finished_at: DateTime<Utc>,
    pub exit_code: i32,
    pub restart_count: u32,
    pub reason: String,
    pub message: String,
}

impl ContainerObservation {
    /// Container name within the pod.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.container_name
    }
}

/// One engine pod, decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningPod {
    pub identity: PodIdentity,
    /// Engine-assigned pod instance ID (empty if not running).
    pub instance_id: String,
    /// First pod IP, if the engine reported one.
    pub ip: Option<String>,
    /// Containers in engine order.
    pub containers: Vec<ContainerObservation>,
}

impl RunningPod {
    /// A pod with no observed containers.
    #[must_use]
    pub fn empty(identity: PodIdentity) -> Self {
        Self {
            identity,
            instance_id: String::new(),
            ip: None,
            containers: Vec::new(),
        }
    }

    /// First container with the given name.
    #[must_use]
    pub fn find_container(&self, name: &str) -> Option<&ContainerObservation> {
        self.containers.iter().find(|c| c.name() == name)
    }
}

// =============================================================================
// Orchestrator-Facing Status
// =============================================================================

/// Orchestrator container state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum ContainerState {
    /// Not running; about to be (re)started.
    Waiting {
        #[serde(default)]
        reason: String,
    },
    /// Running since `started_at`.
    Running { started_at: DateTime<Utc> },
    /// Terminated and not going to be restarted.
    Terminated {
        exit_code: i32,
        #[serde(default)]
        reason: String,
        #[serde(default)]
        message: String,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        container_id: String,
    },
}

impl ContainerState {
    /// Waiting with no detail.
    #[must_use]
    pub fn waiting() -> Self {
        Self::Waiting {
            reason: String::new(),
        }
    }

    /// Exit code if terminated.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Terminated { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Orchestrator status of one desired container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub image: String,
    pub image_id: String,
    /// `hyper://<engine id>`, empty if never created.
    pub container_id: String,
    pub restart_count: u32,
    /// Current state (newest generation).
    pub state: ContainerState,
    /// State of the previous generation, if one was observed.
    pub last_termination_state: Option<ContainerState>,
}

/// Orchestrator status of a pod.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatus {
    pub pod_ip: Option<String>,
    /// One entry per desired container, in desired order.
    pub container_statuses: Vec<ContainerStatus>,
}

impl PodStatus {
    /// Status entry for a container name.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerStatus> {
        self.container_statuses.iter().find(|c| c.name == name)
    }
}
