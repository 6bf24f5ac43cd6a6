//! # Adapter Constants
//!
//! Fixed values shared by the identity codec, spec builder, snapshotter and
//! lifecycle driver. These are the **single source of truth** for anything
//! that ends up inside an engine name, an engine document or a file on disk.
//!
//! ## Cross-References
//!
//! - [`crate::identity`]: name prefixes and delimiter
//! - [`crate::pod::builder`]: resource defaults and the placeholder service
//! - [`crate::snapshot`]: timestamp layout
//! - [`crate::storage`]: directory and file permissions

// =============================================================================
// Identity Encoding
// =============================================================================

/// Engine type tag, used in orchestrator-visible container IDs (`hyper://<id>`).
pub const ENGINE_TYPE: &str = "hyper";

/// Prefix of every pod name this adapter hands to the engine.
pub const POD_NAME_PREFIX: &str = "kube";

/// Prefix of every container name this adapter hands to the engine.
pub const CONTAINER_NAME_PREFIX: &str = "kube";

/// Delimiter between identity fields.
///
/// Orchestrator names are RFC 1123 labels/subdomains and UIDs are UUIDs, so
/// none of them can contain an underscore.
pub const IDENTITY_DELIMITER: char = '_';

/// Segments in an encoded pod identity (prefix, uid, name, namespace).
pub const POD_IDENTITY_SEGMENTS: usize = 4;

/// Segments in an encoded container identity
/// (prefix, uid, pod, namespace, container, hash).
pub const CONTAINER_IDENTITY_SEGMENTS: usize = 6;

// =============================================================================
// Resource Aggregation
// =============================================================================
//
// The engine boots one VM per pod. The VM gets the sum of its containers'
// limits plus a fixed allowance for the guest kernel and init.
// =============================================================================

/// Fixed guest memory allowance added to every pod (MiB).
pub const BASE_MEMORY_MIB: u64 = 64;

/// CPU limit assumed for a container without one (milli-units).
pub const DEFAULT_CONTAINER_CPU_MILLIS: u64 = 1;

/// Memory limit assumed for a container without one (MiB).
pub const DEFAULT_CONTAINER_MEMORY_MIB: u64 = 128;

/// Bytes per MiB.
pub const MIB: u64 = 1024 * 1024;

/// Milli-units per vCPU.
pub const MILLIS_PER_VCPU: u64 = 1000;

// =============================================================================
// Services
// =============================================================================

/// Address of the placeholder service emitted when a namespace has none.
///
/// The engine rejects a document with an empty service list.
pub const PLACEHOLDER_SERVICE_IP: &str = "127.0.0.2";

/// Port of the placeholder service.
pub const PLACEHOLDER_SERVICE_PORT: u16 = 65534;

// =============================================================================
// Volumes
// =============================================================================

/// Engine driver name for plain host directories.
pub const VOLUME_DRIVER_VFS: &str = "vfs";

/// Engine driver name (and metadata `volume_type`) for RBD block devices.
pub const VOLUME_DRIVER_RBD: &str = "rbd";

// =============================================================================
// Images
// =============================================================================

/// Tag assumed when an image reference has none.
pub const DEFAULT_IMAGE_TAG: &str = "latest";

/// Service proxy image the engine runs inside every pod VM.
pub const DEFAULT_PROXY_IMAGE: &str = "haproxy";

// =============================================================================
// Engine Status
// =============================================================================

/// Layout of every engine timestamp (UTC, second precision).
pub const ENGINE_TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%SZ";

// =============================================================================
// Spec Store
// =============================================================================

/// Default spec store directory on Linux.
pub const DEFAULT_SPEC_DIR: &str = "/var/lib/kubelet/hyper";

/// Permissions of the spec store directory.
pub const SPEC_DIR_MODE: u32 = 0o755;

/// Permissions of persisted spec files.
pub const SPEC_FILE_MODE: u32 = 0o664;

// =============================================================================
// Configuration
// =============================================================================

/// Maximum size of a configuration file (64 KiB).
pub const MAX_CONFIG_SIZE: usize = 64 * 1024;
