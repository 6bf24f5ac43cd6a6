//! Tests for the identity codec.
//!
//! Validates that engine names round-trip, that decoding is strict about
//! segment counts and prefixes, and that the hash segment is hex.

use hyperlet::identity::validate_field;
use hyperlet::{ContainerIdentity, Error, PodIdentity};

// =============================================================================
// Pod Identity Tests
// =============================================================================

#[test]
fn test_pod_identity_roundtrip() {
    let cases = [
        ("6f1c2a9e-0d3b-4b8e-9a1f-2c3d4e5f6a7b", "web", "default"),
        ("uid", "nginx-deployment-7d9c5", "kube-system"),
        ("a", "b", "c"),
        ("UPPER-uid.1", "pod.with.dots", "ns-1"),
    ];

    for (uid, name, ns) in cases {
        let id = PodIdentity::new(uid, name, ns);
        let decoded = PodIdentity::decode(&id.encode()).unwrap();
        assert_eq!(decoded, id, "roundtrip failed for {uid}/{name}/{ns}");
    }
}

#[test]
fn test_pod_identity_encoding() {
    let id = PodIdentity::new("uid-1", "web", "prod");
    assert_eq!(id.encode(), "kube_uid-1_web_prod");
    assert_eq!(id.to_string(), "kube_uid-1_web_prod");
}

#[test]
fn test_pod_decode_rejects_wrong_segment_count() {
    for name in [
        "kube_uid_web",
        "kube_uid_web_default_extra",
        "kube",
        "",
        "kube_uid_web_default_nginx_1f",
    ] {
        let err = PodIdentity::decode(name).unwrap_err();
        assert!(
            matches!(err, Error::MalformedIdentity { .. }),
            "'{name}' should be malformed, got {err:?}"
        );
    }
}

#[test]
fn test_pod_decode_rejects_foreign_prefix() {
    let err = PodIdentity::decode("docker_uid_web_default").unwrap_err();
    assert!(matches!(err, Error::MalformedIdentity { .. }));
}

#[test]
fn test_pod_decode_rejects_empty_segment() {
    assert!(PodIdentity::decode("kube__web_default").is_err());
    assert!(PodIdentity::decode("kube_uid_web_").is_err());
}

#[test]
fn test_pod_identity_from_str() {
    let id: PodIdentity = "kube_u_p_n".parse().unwrap();
    assert_eq!(id, PodIdentity::new("u", "p", "n"));
}

#[test]
fn test_full_name() {
    assert_eq!(PodIdentity::new("u", "web", "prod").full_name(), "web_prod");
}

// =============================================================================
// Container Identity Tests
// =============================================================================

#[test]
fn test_container_identity_roundtrip() {
    let pod = PodIdentity::new("uid", "web", "default");
    for hash in [0u64, 1, 0xdead_beef, u64::MAX] {
        let id = ContainerIdentity::new(&pod, "nginx", hash);
        let decoded = ContainerIdentity::decode(&id.encode()).unwrap();
        assert_eq!(decoded, id);
        assert_eq!(decoded.pod(), pod);
    }
}

#[test]
fn test_container_hash_rendering() {
    let pod = PodIdentity::new("uid", "web", "default");
    let id = ContainerIdentity::new(&pod, "nginx", 0x0000_00ff);
    assert_eq!(id.encode(), "kube_uid_web_default_nginx_ff");

    let id = ContainerIdentity::new(&pod, "nginx", u64::MAX);
    assert_eq!(id.encode(), "kube_uid_web_default_nginx_ffffffffffffffff");
}

#[test]
fn test_container_decode_rejects_wrong_segment_count() {
    for name in [
        "kube_uid_web_default",
        "kube_uid_web_default_nginx",
        "kube_uid_web_default_nginx_ff_extra",
    ] {
        assert!(
            matches!(
                ContainerIdentity::decode(name),
                Err(Error::MalformedIdentity { .. })
            ),
            "'{name}' should be malformed"
        );
    }
}

#[test]
fn test_container_decode_rejects_non_hex_hash() {
    let err = ContainerIdentity::decode("kube_uid_web_default_nginx_xyz").unwrap_err();
    assert!(matches!(err, Error::MalformedIdentity { .. }));

    // 17 hex digits overflow u64
    assert!(ContainerIdentity::decode("kube_uid_web_default_nginx_1ffffffffffffffff").is_err());

    // A sign is not part of the rendering.
    assert!(ContainerIdentity::decode("kube_uid_web_default_nginx_+1f").is_err());
}

#[test]
fn test_container_decode_accepts_only_canonical_hash() {
    for name in [
        "kube_u_p_n_c_00ab",
        "kube_u_p_n_c_AB",
        "kube_u_p_n_c_0ab",
        "kube_u_p_n_c_00",
    ] {
        assert!(
            matches!(
                ContainerIdentity::decode(name),
                Err(Error::MalformedIdentity { .. })
            ),
            "{name} should be rejected"
        );
    }

    for name in ["kube_u_p_n_c_ab", "kube_u_p_n_c_0"] {
        let decoded = ContainerIdentity::decode(name).unwrap();
        assert_eq!(decoded.encode(), name, "decode then encode must be lossless");
    }
}

#[test]
fn test_same_name_different_hash_not_equal() {
    let pod = PodIdentity::new("uid", "web", "default");
    let a = ContainerIdentity::new(&pod, "nginx", 1);
    let b = ContainerIdentity::new(&pod, "nginx", 2);
    assert_ne!(a, b);
    assert_ne!(a.encode(), b.encode());
}

// =============================================================================
// Field Validation Tests
// =============================================================================

#[test]
fn test_validate_field() {
    assert!(validate_field("pod name", "web").is_ok());
    assert!(matches!(
        validate_field("pod name", "my_pod"),
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        validate_field("pod name", ""),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_validate_identity() {
    assert!(PodIdentity::new("u", "web", "ns").validate().is_ok());
    assert!(PodIdentity::new("u_1", "web", "ns").validate().is_err());
}
