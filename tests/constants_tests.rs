//! Tests for constants module.
//!
//! Validates the values that end up inside engine names and documents, and
//! that they agree with each other.

use hyperlet::*;

// =============================================================================
// Identity Tests
// =============================================================================

#[test]
fn test_identity_prefixes() {
    assert_eq!(POD_NAME_PREFIX, "kube");
    assert_eq!(CONTAINER_NAME_PREFIX, "kube");
    assert!(!POD_NAME_PREFIX.contains(IDENTITY_DELIMITER));
}

#[test]
fn test_segment_counts_match_encoding() {
    let pod = PodIdentity::new("u", "p", "n");
    assert_eq!(
        pod.encode().split(IDENTITY_DELIMITER).count(),
        POD_IDENTITY_SEGMENTS
    );

    let container = ContainerIdentity::new(&pod, "c", 1);
    assert_eq!(
        container.encode().split(IDENTITY_DELIMITER).count(),
        CONTAINER_IDENTITY_SEGMENTS
    );
}

#[test]
fn test_container_uri_uses_engine_type() {
    assert_eq!(container_uri("abc"), format!("{ENGINE_TYPE}://abc"));
    assert_eq!(container_uri("abc"), "hyper://abc");
}

// =============================================================================
// Resource Tests
// =============================================================================

#[test]
fn test_resource_defaults() {
    assert_eq!(BASE_MEMORY_MIB, 64);
    assert_eq!(DEFAULT_CONTAINER_MEMORY_MIB, 128);
    assert_eq!(DEFAULT_CONTAINER_CPU_MILLIS, 1);
    assert_eq!(MILLIS_PER_VCPU, 1000);
    assert_eq!(MIB, 1 << 20);
}

// =============================================================================
// Document Tests
// =============================================================================

#[test]
fn test_placeholder_service() {
    let ip: std::net::Ipv4Addr = PLACEHOLDER_SERVICE_IP.parse().unwrap();
    assert!(ip.is_loopback(), "placeholder must not route anywhere");
    assert_eq!(PLACEHOLDER_SERVICE_PORT, 65534);
}

#[test]
fn test_volume_drivers() {
    assert_eq!(VOLUME_DRIVER_VFS, "vfs");
    assert_eq!(VOLUME_DRIVER_RBD, "rbd");
}

#[test]
fn test_image_defaults() {
    assert_eq!(DEFAULT_IMAGE_TAG, "latest");
    assert_eq!(DEFAULT_PROXY_IMAGE, "haproxy");
    assert_eq!(parse_image_name(DEFAULT_PROXY_IMAGE), ("haproxy".to_string(), "latest".to_string()));
}

// =============================================================================
// Time Tests
// =============================================================================

#[test]
fn test_engine_time_layout_parses_engine_output() {
    let t = chrono::NaiveDateTime::parse_from_str("2016-02-29T23:59:59Z", ENGINE_TIME_LAYOUT);
    assert!(t.is_ok());
}

// =============================================================================
// Storage Tests
// =============================================================================

#[test]
fn test_storage_modes() {
    assert_eq!(SPEC_DIR_MODE, 0o755);
    assert_eq!(SPEC_FILE_MODE, 0o664);
    assert_eq!(SPEC_FILE_MODE & 0o111, 0, "spec files are not executable");
    assert_eq!(SPEC_FILE_MODE & 0o002, 0, "spec files are not world-writable");
}

#[test]
fn test_default_spec_dir_is_absolute() {
    assert!(std::path::Path::new(DEFAULT_SPEC_DIR).is_absolute());
}

#[test]
fn test_config_size_reasonable() {
    assert!(MAX_CONFIG_SIZE >= 4 * 1024);
    assert!(MAX_CONFIG_SIZE <= 1024 * 1024);
}
