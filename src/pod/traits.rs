//! Collaborator interfaces consumed by the adapter.
//!
//! Each external concern the lifecycle driver depends on is one trait, so
//! the spec builder, reconciler and status translator never see transport
//! details:
//!
//! | Trait | Provides |
//! |-------|----------|
//! | [`VolumeResolver`] | resolved volumes of a pod |
//! | [`NetworkPlugin`] | pod network setup / teardown |
//! | [`LivenessSource`] | probe results per container |
//! | [`RunOptionsGenerator`] | final env, DNS, ports and mounts per container |
//! | [`ServiceLister`] | services visible to a namespace |
//! | [`Keyring`] | registry credentials |
//!
//! The engine itself is [`crate::engine::EngineClient`].
//!
//! The bottom of this module has static implementations used by the CLI
//! and for pods that need no cluster context.

use super::document::Service;
use super::spec::{ContainerSpec, PodSpec, VolumeSource};
use super::volume::{VolumeDescriptor, VolumeMap};
use crate::error::{Error, Result};
use crate::identity::ContainerIdentity;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// =============================================================================
// Run Options
// =============================================================================

/// Final runtime options for one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Environment as `(name, value)` pairs, in order.
    pub env: Vec<(String, String)>,
    /// DNS servers.
    pub dns: Vec<String>,
    /// Port mappings.
    pub port_mappings: Vec<PortMapping>,
    /// Volume mounts.
    pub mounts: Vec<Mount>,
}

/// A port mapping. `host_port == 0` lets the engine pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// A container mount of a named pod volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub name: String,
    pub container_path: String,
    pub read_only: bool,
}

// =============================================================================
// Liveness
// =============================================================================

/// Result of the most recent liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Success,
    Failure,
    Unknown,
}

// =============================================================================
// Credentials
// =============================================================================

/// Registry credential, sent to the engine as base64url-encoded JSON.
///
/// `registry` scopes the credential: a host (`quay.io`, `localhost:5000`),
/// optionally followed by a path prefix (`quay.io/team`). A credential
/// without a registry matches no image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(
        rename = "serveraddress",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub registry: String,
}

impl Credential {
    /// Whether this credential belongs to the registry serving `repository`.
    ///
    /// Repositories without a registry host are served by `docker.io`.
    #[must_use]
    pub fn matches(&self, repository: &str) -> bool {
        let registry = normalize_registry(&self.registry);
        if registry.is_empty() {
            return false;
        }
        let repository = qualify_repository(repository);
        repository == registry
            || repository
                .strip_prefix(registry.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Credentials from `secrets` that match `repository`, in order.
#[must_use]
pub fn matching_credentials(secrets: &[Credential], repository: &str) -> Vec<Credential> {
    secrets
        .iter()
        .filter(|c| c.matches(repository))
        .cloned()
        .collect()
}

const DOCKER_HUB: &str = "docker.io";

fn normalize_registry(registry: &str) -> String {
    let r = registry
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let r = r.strip_suffix("/v1").unwrap_or(r);
    match r.split_once('/') {
        Some((host, path)) => format!("{}/{path}", canonical_host(host)),
        None => canonical_host(r).to_string(),
    }
}

fn canonical_host(host: &str) -> &str {
    match host {
        "index.docker.io" | "registry-1.docker.io" => DOCKER_HUB,
        other => other,
    }
}

/// `repository` with its registry host made explicit.
fn qualify_repository(repository: &str) -> String {
    match repository.split_once('/') {
        Some((first, rest)) if first.contains(['.', ':']) || first == "localhost" => {
            format!("{}/{rest}", canonical_host(first))
        }
        _ => format!("{DOCKER_HUB}/{repository}"),
    }
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Resolves the volumes of a pod.
pub trait VolumeResolver: Send + Sync {
    /// Returns the resolved volumes of the pod with `owner_uid`, or `None`
    /// if the pod's volumes are unknown.
    fn resolve_volumes(&self, owner_uid: &str) -> Option<VolumeMap>;
}

/// Sets up and tears down pod networking.
///
/// `pod_name` is the encoded engine pod name (`kube_<uid>_<name>_<ns>`).
/// Failures should be reported as [`Error::NetworkFailed`].
#[async_trait]
pub trait NetworkPlugin: Send + Sync {
    /// Sets up the network for a pod.
    async fn set_up_pod(&self, namespace: &str, pod_name: &str) -> Result<()>;

    /// Tears down the network of a pod.
    async fn tear_down_pod(&self, namespace: &str, pod_name: &str) -> Result<()>;
}

/// Liveness probe results.
pub trait LivenessSource: Send + Sync {
    /// Latest result for a container, `None` if it was never probed.
    fn get(&self, container: &ContainerIdentity) -> Option<Liveness>;
}

/// Generates final run options for a container.
pub trait RunOptionsGenerator: Send + Sync {
    fn generate(&self, pod: &PodSpec, container: &ContainerSpec) -> Result<RunOptions>;
}

/// Lists services visible to a namespace.
#[async_trait]
pub trait ServiceLister: Send + Sync {
    async fn services(&self, namespace: &str) -> Result<Vec<Service>>;
}

/// Looks up registry credentials for an image repository.
pub trait Keyring: Send + Sync {
    fn lookup(&self, repository: &str) -> Vec<Credential>;
}

// =============================================================================
// Static Implementations
// =============================================================================

/// Run options taken directly from the container spec.
#[derive(Debug, Clone, Default)]
pub struct SpecRunOptions {
    /// DNS servers added to every container.
    pub dns: Vec<String>,
}

impl RunOptionsGenerator for SpecRunOptions {
    fn generate(&self, pod: &PodSpec, container: &ContainerSpec) -> Result<RunOptions> {
        for m in &container.volume_mounts {
            if !pod.volumes.iter().any(|v| v.name == m.name) {
                return Err(Error::RunOptionsFailed {
                    container: container.name.clone(),
                    reason: format!("mount references unknown volume '{}'", m.name),
                });
            }
        }

        Ok(RunOptions {
            env: container
                .env
                .iter()
                .map(|e| (e.name.clone(), e.value.clone()))
                .collect(),
            dns: self.dns.clone(),
            port_mappings: container
                .ports
                .iter()
                .map(|p| PortMapping {
                    container_port: p.container_port,
                    host_port: p.host_port,
                    protocol: p.protocol.to_lowercase(),
                })
                .collect(),
            mounts: container
                .volume_mounts
                .iter()
                .map(|m| Mount {
                    name: m.name.clone(),
                    container_path: m.mount_path.clone(),
                    read_only: m.read_only,
                })
                .collect(),
        })
    }
}

/// Volumes resolved from pod manifests alone.
///
/// `emptyDir` volumes live under `<root>/<uid>/volumes/<name>`.
///
/// RBD monitors are handed on as separate host and port lists, which the
/// spec builder recombines as every host with every port. Declared
/// monitors that do not form such a grid are widened: `[a:1, b:2]`
/// becomes `a:1, a:2, b:1, b:2`.
#[derive(Debug, Default)]
pub struct ManifestVolumes {
    pods: HashMap<String, VolumeMap>,
}

impl ManifestVolumes {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the volumes declared by `pod`.
    pub fn insert_pod(&mut self, pod: &PodSpec, root: &Path) {
        let map = pod
            .volumes
            .iter()
            .map(|v| {
                let descriptor = match &v.source {
                    VolumeSource::EmptyDir => VolumeDescriptor::generic(
                        empty_dir_path(root, &pod.uid, &v.name).to_string_lossy(),
                    ),
                    VolumeSource::HostPath { path } => VolumeDescriptor::generic(path.clone()),
                    VolumeSource::Rbd {
                        image,
                        monitors,
                        user,
                        keyring,
                    } => {
                        let (hosts, ports) = split_monitors(monitors);
                        if hosts.len() * ports.len() != monitors.len() {
                            tracing::debug!(
                                volume = %v.name,
                                declared = monitors.len(),
                                resolved = hosts.len() * ports.len(),
                                "RBD monitors widened to every host and port"
                            );
                        }
                        let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();
                        let ports: Vec<&str> = ports.iter().map(String::as_str).collect();
                        VolumeDescriptor::rbd(image.clone(), image, &hosts, &ports, user, keyring)
                    }
                };
                (v.name.clone(), descriptor)
            })
            .collect();
        self.pods.insert(pod.uid.clone(), map);
    }
}

impl VolumeResolver for ManifestVolumes {
    fn resolve_volumes(&self, owner_uid: &str) -> Option<VolumeMap> {
        self.pods.get(owner_uid).cloned()
    }
}

fn empty_dir_path(root: &Path, uid: &str, volume: &str) -> PathBuf {
    root.join(uid).join("volumes").join(volume)
}

/// Splits `host:port` monitors into distinct hosts and distinct ports,
/// each in first-seen order. A monitor without a port uses 6789.
fn split_monitors(monitors: &[String]) -> (Vec<String>, Vec<String>) {
    let mut hosts = Vec::new();
    let mut ports = Vec::new();
    for m in monitors {
        let (host, port) = m.rsplit_once(':').unwrap_or((m.as_str(), "6789"));
        if !hosts.iter().any(|h| h == host) {
            hosts.push(host.to_string());
        }
        if !ports.iter().any(|p| p == port) {
            ports.push(port.to_string());
        }
    }
    (hosts, ports)
}

/// Liveness source with no probe results.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProbes;

impl LivenessSource for NoProbes {
    fn get(&self, _container: &ContainerIdentity) -> Option<Liveness> {
        None
    }
}

/// Service lister for pods without cluster services.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoServices;

#[async_trait]
impl ServiceLister for NoServices {
    async fn services(&self, _namespace: &str) -> Result<Vec<Service>> {
        Ok(Vec::new())
    }
}

/// Keyring without credentials (anonymous pulls).
#[derive(Debug, Default, Clone, Copy)]
pub struct AnonymousKeyring;

impl Keyring for AnonymousKeyring {
    fn lookup(&self, _repository: &str) -> Vec<Credential> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(registry: &str) -> Credential {
        Credential {
            username: "u".to_string(),
            registry: registry.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_credential_registry_matching() {
        assert!(scoped("quay.io").matches("quay.io/team/app"));
        assert!(scoped("https://quay.io/").matches("quay.io/team/app"));
        assert!(scoped("quay.io/team").matches("quay.io/team/app"));
        assert!(!scoped("quay.io/team").matches("quay.io/teammate/app"));
        assert!(!scoped("quay.io").matches("quay.io.evil.com/app"));
        assert!(!scoped("quay.io").matches("nginx"));

        assert!(scoped("docker.io").matches("nginx"));
        assert!(scoped("https://index.docker.io/v1/").matches("library/nginx"));
        assert!(scoped("localhost:5000").matches("localhost:5000/app"));
        assert!(!scoped("localhost:5000").matches("localhost:5001/app"));

        assert!(!scoped("").matches("nginx"));
    }

    #[test]
    fn test_split_monitors_dedups() {
        let monitors = vec![
            "10.0.0.1:6789".to_string(),
            "10.0.0.2:6789".to_string(),
            "10.0.0.1:6790".to_string(),
        ];
        let (hosts, ports) = split_monitors(&monitors);
        assert_eq!(hosts, vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(ports, vec!["6789", "6790"]);
    }
}
