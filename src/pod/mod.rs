//! # Pods: desired state, engine document, observed state
//!
//! ```text
//!   PodSpec (desired) ──┐
//!   VolumeMap ──────────┤
//!   RunOptions ─────────┼──▶ build_pod_document() ──▶ PodSpecDocument ──▶ engine
//!   Services ───────────┘
//!
//!   engine ──▶ RunningPod / ContainerObservation ──▶ PodStatus (orchestrator)
//! ```
//!
//! - [`spec`]: manifest parsing and the container spec hash
//! - [`volume`]: resolver output and its typed backend
//! - [`document`]: the serialized engine document
//! - [`builder`]: the pure desired-pod → document transformation
//! - [`state`]: snapshot and orchestrator status types
//! - [`traits`]: collaborator interfaces

pub mod builder;
pub mod document;
pub mod spec;
pub mod state;
pub mod traits;
pub mod volume;

use std::path::PathBuf;

/// Returns the platform-appropriate base directory for adapter state.
///
/// - Linux: `/var/lib/kubelet/hyper`
/// - macOS: `~/.hyperlet/run` (user-writable)
/// - Windows: `%LOCALAPPDATA%\hyperlet\run`
pub(crate) fn runtime_base_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from(crate::constants::DEFAULT_SPEC_DIR)
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|h| h.join(".hyperlet").join("run"))
            .unwrap_or_else(|| PathBuf::from(".hyperlet/run"))
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir()
            .map(|d| d.join("hyperlet").join("run"))
            .unwrap_or_else(|| PathBuf::from("hyperlet\\run"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from(crate::constants::DEFAULT_SPEC_DIR)
    }
}

// Re-export public API
pub use builder::{aggregate_resources, build_pod_document};
pub use document::{PodResource, PodSpecDocument, Service, ServiceBackend};
pub use spec::{
    ContainerPort, ContainerSpec, EnvVar, MAX_CONTAINERS_PER_POD, MAX_MANIFEST_SIZE, PodSpec,
    ResourceRequirements, RestartPolicy, Volume, VolumeMount, VolumeSource,
};
pub use state::{
    ContainerObservation, ContainerPhase, ContainerState, ContainerStatus, PodStatus, RunningPod,
};
pub use traits::{
    AnonymousKeyring, Credential, Keyring, Liveness, LivenessSource, ManifestVolumes, Mount,
    NetworkPlugin, NoProbes, NoServices, PortMapping, RunOptions, RunOptionsGenerator,
    ServiceLister, SpecRunOptions, VolumeResolver, matching_credentials,
};
pub use volume::{VolumeBackend, VolumeDescriptor, VolumeMap};
