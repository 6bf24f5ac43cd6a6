//! Desired pod specification types.
//!
//! This module provides Kubernetes-compatible pod manifest parsing
//! with validation, and the container spec hash used to detect drift
//! between a running container and its desired definition.
//!
//! # Supported Formats
//!
//! - **YAML**: Primary format, parsed via `serde_yaml`
//! - **JSON**: Also supported (YAML is a superset of JSON)

use crate::error::{Error, Result};
use crate::identity::{ContainerIdentity, PodIdentity, validate_field};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// =============================================================================
// Constants for Manifest Validation
// =============================================================================

/// Maximum size of a pod manifest in bytes (1 MiB).
pub const MAX_MANIFEST_SIZE: usize = 1024 * 1024;

/// Maximum number of containers per pod.
pub const MAX_CONTAINERS_PER_POD: usize = 16;

/// Maximum number of volumes per pod.
pub const MAX_VOLUMES_PER_POD: usize = 64;

/// Maximum length for Kubernetes-compatible names (RFC 1123 DNS subdomain).
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length for namespace names.
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Maximum length for container names within a pod.
pub const MAX_CONTAINER_NAME_LEN: usize = 63;

/// Maximum number of environment variables per container.
pub const MAX_ENV_VARS_PER_CONTAINER: usize = 256;

// =============================================================================
// Validation Helpers
// =============================================================================

/// Validates a Kubernetes-compatible name (RFC 1123 DNS label).
///
/// The allowed alphabet excludes the identity delimiter, so every validated
/// name can be embedded in an engine name.
fn validate_name(name: &str, max_len: usize) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("name cannot be empty".to_string()));
    }

    if name.len() > max_len {
        return Err(Error::InvalidInput(format!(
            "name '{}' exceeds maximum length of {}",
            name, max_len
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(Error::InvalidInput(format!(
            "name '{}' must contain only lowercase alphanumeric characters, '-' or '.'",
            name
        )));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(Error::InvalidInput(format!(
            "name '{}' cannot start or end with '-'",
            name
        )));
    }

    Ok(())
}

/// Derives a stable UID from namespace/name for manifests that carry none.
fn derive_uid(namespace: &str, name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b"/");
    hasher.update(name.as_bytes());
    let hash = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set version (4) and variant (RFC 4122)
    bytes[6] = (bytes[6] & 0x0F) | 0x40;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    uuid::Uuid::from_bytes(bytes).to_string()
}

// =============================================================================
// Restart Policy
// =============================================================================

/// Pod restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RestartPolicy {
    /// Always restart exited containers.
    #[default]
    Always,
    /// Restart only containers that exited with a non-zero code.
    OnFailure,
    /// Never restart.
    Never,
}

impl RestartPolicy {
    /// Parses the manifest spelling (`Always`, `OnFailure`, `Never`).
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Always" => Ok(Self::Always),
            "OnFailure" => Ok(Self::OnFailure),
            "Never" => Ok(Self::Never),
            other => Err(Error::InvalidInput(format!(
                "unknown restart policy '{other}'"
            ))),
        }
    }
}

// =============================================================================
// Pod Specification
// =============================================================================

/// Desired pod.
///
/// Represents a parsed and validated Kubernetes Pod manifest.
/// This is the primary input type for spec building and reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    /// UID of the pod object.
    pub uid: String,
    /// Pod name (unique within namespace).
    pub name: String,
    /// Namespace (defaults to "default" if not specified).
    pub namespace: String,
    /// Restart policy for all containers.
    pub restart_policy: RestartPolicy,
    /// Container specifications (at least one required).
    pub containers: Vec<ContainerSpec>,
    /// Volume definitions for the pod.
    pub volumes: Vec<Volume>,
}

impl PodSpec {
    /// Parses a pod spec from YAML bytes.
    ///
    /// # Errors
    ///
    /// - Size exceeds `MAX_MANIFEST_SIZE`
    /// - YAML parsing fails
    /// - Validation errors for names, counts, etc.
    pub fn from_yaml(yaml: &[u8]) -> Result<Self> {
        if yaml.len() > MAX_MANIFEST_SIZE {
            return Err(Error::InvalidInput(format!(
                "manifest size {} exceeds limit of {}",
                yaml.len(),
                MAX_MANIFEST_SIZE
            )));
        }

        let doc: serde_yaml::Value =
            serde_yaml::from_slice(yaml).map_err(|e| Error::InvalidInput(e.to_string()))?;

        Self::from_value(&doc)
    }

    /// Parses a pod spec from a `serde_yaml::Value`.
    pub fn from_value(doc: &serde_yaml::Value) -> Result<Self> {
        let metadata = doc.get("metadata");

        let namespace = metadata
            .and_then(|m| m.get("namespace"))
            .and_then(|n| n.as_str())
            .unwrap_or("default")
            .to_string();
        validate_name(&namespace, MAX_NAMESPACE_LEN)?;

        let name = metadata
            .and_then(|m| m.get("name"))
            .and_then(|n| n.as_str())
            .ok_or_else(|| Error::InvalidInput("missing metadata.name".to_string()))?
            .to_string();
        validate_name(&name, MAX_NAME_LEN)?;

        let uid = match metadata.and_then(|m| m.get("uid")).and_then(|u| u.as_str()) {
            Some(uid) => {
                validate_field("pod uid", uid)?;
                uid.to_string()
            }
            None => derive_uid(&namespace, &name),
        };

        let spec = doc.get("spec");

        let restart_policy = match spec
            .and_then(|s| s.get("restartPolicy"))
            .and_then(|r| r.as_str())
        {
            Some(policy) => RestartPolicy::parse(policy)?,
            None => RestartPolicy::default(),
        };

        let containers_seq = spec
            .and_then(|s| s.get("containers"))
            .and_then(|c| c.as_sequence())
            .ok_or_else(|| Error::InvalidInput("missing spec.containers".to_string()))?;

        if containers_seq.len() > MAX_CONTAINERS_PER_POD {
            return Err(Error::InvalidInput(format!(
                "too many containers: {} (max {})",
                containers_seq.len(),
                MAX_CONTAINERS_PER_POD
            )));
        }

        let containers: Vec<ContainerSpec> = containers_seq
            .iter()
            .map(ContainerSpec::from_value)
            .collect::<Result<Vec<_>>>()?;

        if containers.is_empty() {
            return Err(Error::InvalidInput(
                "at least one container required".to_string(),
            ));
        }

        let volumes = parse_volume_list(spec.and_then(|s| s.get("volumes")))?;

        Ok(Self {
            uid,
            name,
            namespace,
            restart_policy,
            containers,
            volumes,
        })
    }

    /// Identity of this pod.
    #[must_use]
    pub fn identity(&self) -> PodIdentity {
        PodIdentity::new(&self.uid, &self.name, &self.namespace)
    }

    /// Identity of one of this pod's containers, embedding its spec hash.
    #[must_use]
    pub fn container_identity(&self, container: &ContainerSpec) -> ContainerIdentity {
        ContainerIdentity::new(&self.identity(), &container.name, container.spec_hash())
    }

    /// Orchestrator "full name" of the pod.
    #[must_use]
    pub fn full_name(&self) -> String {
        self.identity().full_name()
    }
}

fn parse_volume_list(value: Option<&serde_yaml::Value>) -> Result<Vec<Volume>> {
    let Some(seq) = value.and_then(|v| v.as_sequence()) else {
        return Ok(Vec::new());
    };

    if seq.len() > MAX_VOLUMES_PER_POD {
        return Err(Error::InvalidInput(format!(
            "too many volumes: {} (max {})",
            seq.len(),
            MAX_VOLUMES_PER_POD
        )));
    }

    seq.iter().map(Volume::from_value).collect()
}

// =============================================================================
// Container Specification
// =============================================================================

/// Container specification.
///
/// Every field participates in [`ContainerSpec::spec_hash`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name (unique within pod).
    pub name: String,
    /// Image reference (e.g., "nginx:1.25").
    pub image: String,
    /// Override the image's default entrypoint.
    pub command: Vec<String>,
    /// Arguments to the entrypoint.
    pub args: Vec<String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
    /// Allocate a TTY.
    pub tty: bool,
    /// Environment variables in declaration order.
    pub env: Vec<EnvVar>,
    /// Exposed ports.
    pub ports: Vec<ContainerPort>,
    /// Volume mount points.
    pub volume_mounts: Vec<VolumeMount>,
    /// Resource limits.
    pub resources: ResourceRequirements,
}

impl ContainerSpec {
    /// Parses from a YAML value.
    pub fn from_value(value: &serde_yaml::Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| Error::InvalidInput("missing container name".to_string()))?
            .to_string();
        validate_name(&name, MAX_CONTAINER_NAME_LEN)?;

        let image = value
            .get("image")
            .and_then(|i| i.as_str())
            .ok_or_else(|| Error::InvalidInput("missing container image".to_string()))?
            .to_string();

        let command = parse_string_seq(value.get("command"));
        let args = parse_string_seq(value.get("args"));

        let working_dir = value
            .get("workingDir")
            .and_then(|w| w.as_str())
            .map(String::from);

        let tty = value.get("tty").and_then(|t| t.as_bool()).unwrap_or(false);

        let env = parse_env_vars(value.get("env"), &name)?;
        let ports = parse_ports(value.get("ports"));
        let volume_mounts = parse_volume_mounts(value.get("volumeMounts"));
        let resources = parse_resources(value.get("resources"))?;

        Ok(Self {
            name,
            image,
            command,
            args,
            working_dir,
            tty,
            env,
            ports,
            volume_mounts,
            resources,
        })
    }

    /// Deterministic content hash of this container's definition.
    ///
    /// SHA-256 over every field, each string length-prefixed, truncated to
    /// the first 8 bytes (big-endian). Stable across processes and releases.
    #[must_use]
    pub fn spec_hash(&self) -> u64 {
        let mut h = Sha256::new();
        feed(&mut h, &self.name);
        feed(&mut h, &self.image);
        feed_list(&mut h, &self.command);
        feed_list(&mut h, &self.args);
        feed(&mut h, self.working_dir.as_deref().unwrap_or(""));
        h.update([u8::from(self.tty)]);
        h.update((self.env.len() as u64).to_be_bytes());
        for e in &self.env {
            feed(&mut h, &e.name);
            feed(&mut h, &e.value);
        }
        h.update((self.ports.len() as u64).to_be_bytes());
        for p in &self.ports {
            feed(&mut h, p.name.as_deref().unwrap_or(""));
            h.update(p.container_port.to_be_bytes());
            h.update(p.host_port.to_be_bytes());
            feed(&mut h, &p.protocol);
        }
        h.update((self.volume_mounts.len() as u64).to_be_bytes());
        for m in &self.volume_mounts {
            feed(&mut h, &m.name);
            feed(&mut h, &m.mount_path);
            h.update([u8::from(m.read_only)]);
        }
        h.update(self.resources.cpu_millis.to_be_bytes());
        h.update(self.resources.memory_bytes.to_be_bytes());

        let digest = h.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

fn feed(h: &mut Sha256, s: &str) {
    h.update((s.len() as u64).to_be_bytes());
    h.update(s.as_bytes());
}

fn feed_list(h: &mut Sha256, items: &[String]) {
    h.update((items.len() as u64).to_be_bytes());
    for item in items {
        feed(h, item);
    }
}

fn parse_string_seq(value: Option<&serde_yaml::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_sequence())
        .map(|seq| {
            seq.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_env_vars(value: Option<&serde_yaml::Value>, container_name: &str) -> Result<Vec<EnvVar>> {
    let Some(seq) = value.and_then(|v| v.as_sequence()) else {
        return Ok(Vec::new());
    };

    if seq.len() > MAX_ENV_VARS_PER_CONTAINER {
        return Err(Error::InvalidInput(format!(
            "too many environment variables in container {}: {} (max {})",
            container_name,
            seq.len(),
            MAX_ENV_VARS_PER_CONTAINER
        )));
    }

    seq.iter()
        .map(|item| {
            let name = item
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| Error::InvalidInput("missing env name".to_string()))?;
            let value = item.get("value").and_then(|v| v.as_str()).unwrap_or("");
            Ok(EnvVar::new(name, value))
        })
        .collect()
}

fn parse_ports(value: Option<&serde_yaml::Value>) -> Vec<ContainerPort> {
    let Some(seq) = value.and_then(|v| v.as_sequence()) else {
        return Vec::new();
    };

    seq.iter()
        .filter_map(|p| {
            let container_port = u16::try_from(p.get("containerPort")?.as_u64()?).ok()?;
            let protocol = p
                .get("protocol")
                .and_then(|pr| pr.as_str())
                .unwrap_or("TCP")
                .to_string();
            let name = p.get("name").and_then(|n| n.as_str()).map(String::from);
            let host_port = p
                .get("hostPort")
                .and_then(|hp| hp.as_u64())
                .and_then(|hp| u16::try_from(hp).ok())
                .unwrap_or(0);
            Some(ContainerPort {
                name,
                container_port,
                host_port,
                protocol,
            })
        })
        .collect()
}

fn parse_volume_mounts(value: Option<&serde_yaml::Value>) -> Vec<VolumeMount> {
    let Some(seq) = value.and_then(|v| v.as_sequence()) else {
        return Vec::new();
    };

    seq.iter()
        .filter_map(|vm| {
            let name = vm.get("name")?.as_str()?.to_string();
            let mount_path = vm.get("mountPath")?.as_str()?.to_string();
            let read_only = vm
                .get("readOnly")
                .and_then(|r| r.as_bool())
                .unwrap_or(false);
            Some(VolumeMount {
                name,
                mount_path,
                read_only,
            })
        })
        .collect()
}

fn parse_resources(value: Option<&serde_yaml::Value>) -> Result<ResourceRequirements> {
    let Some(limits) = value.and_then(|r| r.get("limits")) else {
        return Ok(ResourceRequirements::default());
    };

    let memory_bytes = match limits.get("memory").and_then(quantity_str) {
        Some(m) => parse_memory_string(&m)?,
        None => 0,
    };

    let cpu_millis = match limits.get("cpu").and_then(quantity_str) {
        Some(c) => parse_cpu_string(&c)?,
        None => 0,
    };

    Ok(ResourceRequirements {
        cpu_millis,
        memory_bytes,
    })
}

/// Quantities may be written as YAML strings (`"500m"`) or bare numbers (`2`).
fn quantity_str(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvVar {
    /// Creates an environment variable.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Container port definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    /// Optional name for the port.
    pub name: Option<String>,
    /// Port number inside the container.
    pub container_port: u16,
    /// Host port to map to (0 = engine picks).
    pub host_port: u16,
    /// Protocol (TCP or UDP, defaults to TCP).
    pub protocol: String,
}

/// Volume mount specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Name of the volume to mount.
    pub name: String,
    /// Path inside the container to mount at.
    pub mount_path: String,
    /// If true, mount as read-only.
    pub read_only: bool,
}

/// Pod volume definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    /// Volume name (referenced by volume mounts).
    pub name: String,
    /// Volume source type.
    pub source: VolumeSource,
}

impl Volume {
    fn from_value(value: &serde_yaml::Value) -> Result<Self> {
        let name = value
            .get("name")
            .and_then(|n| n.as_str())
            .ok_or_else(|| Error::InvalidInput("volume missing 'name' field".to_string()))?
            .to_string();

        validate_name(&name, MAX_CONTAINER_NAME_LEN)?;

        let source = if let Some(hp) = value.get("hostPath") {
            let path = hp
                .get("path")
                .and_then(|p| p.as_str())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("hostPath volume '{}' missing 'path' field", name))
                })?
                .to_string();

            if !path.starts_with('/') {
                return Err(Error::InvalidInput(format!(
                    "hostPath volume '{}' must be absolute path: {}",
                    name, path
                )));
            }

            VolumeSource::HostPath { path }
        } else if let Some(rbd) = value.get("rbd") {
            let image = rbd
                .get("image")
                .and_then(|i| i.as_str())
                .ok_or_else(|| {
                    Error::InvalidInput(format!("rbd volume '{}' missing 'image' field", name))
                })?
                .to_string();
            let monitors = parse_string_seq(rbd.get("monitors"));
            if monitors.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "rbd volume '{}' has no monitors",
                    name
                )));
            }
            let user = rbd
                .get("user")
                .and_then(|u| u.as_str())
                .unwrap_or("admin")
                .to_string();
            let keyring = rbd
                .get("keyring")
                .and_then(|k| k.as_str())
                .unwrap_or("/etc/ceph/keyring")
                .to_string();
            VolumeSource::Rbd {
                image,
                monitors,
                user,
                keyring,
            }
        } else {
            VolumeSource::EmptyDir
        };

        Ok(Self { name, source })
    }
}

/// Volume source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolumeSource {
    /// Empty directory (ephemeral).
    EmptyDir,
    /// Host filesystem path.
    HostPath { path: String },
    /// Ceph RBD image, monitors given as `host:port`.
    Rbd {
        image: String,
        monitors: Vec<String>,
        user: String,
        keyring: String,
    },
}

/// Resource limits for a container. Zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// CPU limit in milli-units (1000 = 1 CPU).
    pub cpu_millis: u64,
    /// Memory limit in bytes.
    pub memory_bytes: u64,
}

// =============================================================================
// Resource Parsing Helpers
// =============================================================================

/// Parses a Kubernetes quantity (`1.5Gi`, `500m`, `1e9`, `2`) into base
/// units. Decimal mantissas, binary and decimal suffixes and exponents are
/// accepted; anything else is an error.
fn parse_quantity(s: &str) -> Result<f64> {
    let invalid = || Error::InvalidInput(format!("invalid resource quantity '{s}'"));
    let trimmed = s.trim();

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+'))
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);
    if !number.bytes().any(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let mantissa: f64 = number.parse().map_err(|_| invalid())?;

    let scale = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024f64,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => {
            let exponent = suffix
                .strip_prefix(['e', 'E'])
                .and_then(|e| e.parse::<i32>().ok())
                .ok_or_else(invalid)?;
            10f64.powi(exponent)
        }
    };

    let value = mantissa * scale;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

/// Rounds a non-negative quantity up to whole units. Values within float
/// noise of a whole unit round to it.
fn ceil_units(value: f64, s: &str) -> Result<u64> {
    let nearest = value.round();
    let rounded = if (value - nearest).abs() < 1e-6 {
        nearest
    } else {
        value.ceil()
    };
    if rounded >= u64::MAX as f64 {
        return Err(Error::InvalidInput(format!(
            "resource quantity '{s}' is too large"
        )));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(rounded as u64)
}

/// Parses Kubernetes memory strings to bytes, rounding up.
fn parse_memory_string(s: &str) -> Result<u64> {
    ceil_units(parse_quantity(s)?, s)
}

/// Parses Kubernetes CPU strings to milli-units, rounding up.
fn parse_cpu_string(s: &str) -> Result<u64> {
    ceil_units(parse_quantity(s)? * 1000.0, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_cpu_string("500m").unwrap(), 500);
        assert_eq!(parse_cpu_string("2").unwrap(), 2000);
        assert_eq!(parse_cpu_string("0.5").unwrap(), 500);
        assert_eq!(parse_cpu_string("1e-1").unwrap(), 100);
        assert_eq!(parse_memory_string("256Mi").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_memory_string("1G").unwrap(), 1_000_000_000);
        assert_eq!(parse_memory_string("0.5Gi").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_memory_string("2.5M").unwrap(), 2_500_000);
        assert_eq!(parse_memory_string("1e9").unwrap(), 1_000_000_000);
        assert_eq!(parse_memory_string("1E").unwrap(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_parse_quantity_rejects_garbage() {
        for bad in ["", "Gi", "abc", "-1Gi", "1.2.3Mi", "1X", "1e", "1 Gi x", "."] {
            assert!(parse_quantity(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_derived_uid_is_stable() {
        assert_eq!(derive_uid("default", "web"), derive_uid("default", "web"));
        assert_ne!(derive_uid("default", "web"), derive_uid("other", "web"));
    }
}
