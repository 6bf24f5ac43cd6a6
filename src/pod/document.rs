//! Engine pod specification document.
//!
//! The engine creates a pod from one JSON document:
//!
//! ```json
//! {
//!   "id": "kube_<uid>_<name>_<namespace>",
//!   "resource": { "vcpu": 2, "memory": 320 },
//!   "containers": [ { "name": "kube_..._<hash>", "image": "nginx", ... } ],
//!   "volumes": [ { "name": "data", "driver": "vfs", "source": "/var/lib/..." } ],
//!   "services": [ { "serviceip": "10.0.0.10", "serviceport": 80, "hosts": [] } ],
//!   "tty": true
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Complete engine document for one pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpecDocument {
    /// Encoded pod identity.
    pub id: String,
    /// VM sizing.
    pub resource: PodResource,
    /// Containers in desired-pod order.
    pub containers: Vec<ContainerDocument>,
    /// Pod volumes, sorted by name.
    pub volumes: Vec<VolumeDocument>,
    /// Services reachable from the pod. Never empty.
    pub services: Vec<Service>,
    /// Pod-level TTY flag.
    pub tty: bool,
}

impl PodSpecDocument {
    /// Serializes the document as the engine expects it.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses a previously serialized document.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// VM sizing for a pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodResource {
    /// Virtual CPUs.
    pub vcpu: u64,
    /// Memory in MiB.
    pub memory: u64,
}

/// One container of the pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDocument {
    /// Encoded container identity.
    pub name: String,
    pub image: String,
    pub tty: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(rename = "workdir", default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<String>,
    #[serde(default)]
    pub envs: Vec<EnvDocument>,
    #[serde(default)]
    pub ports: Vec<PortDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<MountDocument>,
}

/// Environment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDocument {
    pub env: String,
    pub value: String,
}

/// Port mapping. A missing host port lets the engine pick one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDocument {
    #[serde(rename = "containerPort")]
    pub container_port: u16,
    #[serde(rename = "hostPort", default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    pub protocol: String,
}

/// Container mount of a pod volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDocument {
    pub path: String,
    pub volume: String,
    #[serde(rename = "readOnly")]
    pub read_only: bool,
}

/// Pod volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeDocument {
    pub name: String,
    pub driver: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<VolumeOption>,
}

/// Block device access options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeOption {
    pub user: String,
    pub keyring: String,
    /// Monitor endpoints, `host:port`.
    pub monitors: Vec<String>,
}

/// A service (virtual IP and port) and the endpoints behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "serviceip")]
    pub ip: String,
    #[serde(rename = "serviceport")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<ServiceBackend>,
}

impl Service {
    /// A service without backends.
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            hosts: Vec::new(),
        }
    }
}

/// One endpoint behind a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBackend {
    #[serde(rename = "hostip")]
    pub ip: String,
    #[serde(rename = "hostport")]
    pub port: u16,
}
