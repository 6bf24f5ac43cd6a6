//! # hyperlet
//!
//! **Pod Runtime Adapter for VM-Pod Engines**
//!
//! Bridges declarative pods (named groups of containers with images,
//! resources, volumes, network and env requirements) to a container engine
//! that only understands create / start / remove on opaque pod instances.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            hyperlet                                 │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────────┐    │
//! │  │                 HyperRuntime (driver)                       │    │
//! │  │   run_pod │ kill_pod │ sync_pod │ get_pods │ pull_image     │    │
//! │  └─────────────────────────────────────────────────────────────┘    │
//! │         │                    │                      │               │
//! │  ┌──────┴───────┐   ┌────────┴────────┐   ┌─────────┴─────────┐     │
//! │  │ Spec Builder │   │   Reconciler    │   │ Status Translator │     │
//! │  │ PodSpec →    │   │ desired vs.     │   │ snapshot →        │     │
//! │  │ engine doc   │   │ running pod     │   │ PodStatus         │     │
//! │  └──────┬───────┘   └────────┬────────┘   └─────────┬─────────┘     │
//! │         │                    └──────────┬───────────┘               │
//! │  ┌──────┴───────┐              ┌────────┴────────┐                  │
//! │  │  SpecStore   │              │ State Snapshot  │                  │
//! │  │ atomic files │              │ decode + parse  │                  │
//! │  └──────────────┘              └────────┬────────┘                  │
//! │                   Identity Codec        │                           │
//! │          kube_<uid>_<pod>_<ns>[_<container>_<hash>]                 │
//! ├─────────────────────────────────────────┼───────────────────────────┤
//! │                      Collaborator Traits│                           │
//! │  EngineClient │ NetworkPlugin │ VolumeResolver │ LivenessSource     │
//! │  RunOptionsGenerator │ ServiceLister │ Keyring                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identity
//!
//! Engine names carry the orchestrator identity, so a running pod can be
//! matched to its desired pod without any local bookkeeping:
//!
//! ```text
//! pod:        kube_<uid>_<pod-name>_<namespace>
//! container:  kube_<uid>_<pod-name>_<namespace>_<container-name>_<spec-hash-hex>
//! ```
//!
//! A changed container spec changes the hash, which the reconciler sees as
//! a changed container.
//!
//! # Whole-Pod Granularity
//!
//! The engine cannot restart individual containers, so reconciliation
//! yields one of `NoAction`, `Create` or `RestartWholePod`. A failing
//! liveness probe on any container restarts the entire pod.
//!
//! # Example
//!
//! ```rust,ignore
//! use hyperlet::{HyperRuntime, PodSpec, RuntimeConfig};
//! use std::sync::Arc;
//!
//! async fn sync(engine: Arc<dyn hyperlet::EngineClient>,
//!               network: Arc<dyn hyperlet::NetworkPlugin>,
//!               volumes: Arc<dyn hyperlet::VolumeResolver>,
//!               manifest: &[u8]) -> hyperlet::Result<()> {
//!     let runtime = HyperRuntime::new(engine, network, volumes, RuntimeConfig::default())?;
//!     let pod = PodSpec::from_yaml(manifest)?;
//!     let previous = runtime.get_api_pod_status(&pod).await?;
//!     let running = runtime.get_pod_status(&pod.identity()).await?;
//!     runtime.sync_pod(&pod, &previous, Some(&running), &[]).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod driver;
pub mod engine;
pub mod error;
pub mod identity;
pub mod pod;
pub mod reconcile;
pub mod snapshot;
pub mod status;
pub mod storage;
pub mod stream;

// Re-exports
pub use config::RuntimeConfig;
pub use constants::*;
pub use driver::{HyperRuntime, parse_image_name};
pub use engine::{EngineClient, EngineImage, EnginePodInfo, Image, LogOptions};
pub use error::{Error, Result};
pub use identity::{ContainerIdentity, PodIdentity, container_uri};
pub use pod::{
    ContainerSpec, ContainerState, ContainerStatus, Credential, Keyring, Liveness, LivenessSource,
    NetworkPlugin, PodSpec, PodSpecDocument, PodStatus, RestartPolicy, RunOptions,
    RunOptionsGenerator, RunningPod, Service, ServiceLister, VolumeResolver, build_pod_document,
};
pub use reconcile::{Decision, RestartReason, reconcile};
pub use status::to_pod_status;
pub use storage::SpecStore;
pub use stream::{Session, pump_session};
