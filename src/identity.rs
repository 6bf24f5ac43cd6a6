//! # Identity Codec
//!
//! The engine only knows opaque names. Every pod and container this adapter
//! creates gets a name that embeds the orchestrator fields needed to match it
//! back to the desired pod:
//!
//! ```text
//! pod:        kube_<uid>_<pod-name>_<namespace>
//! container:  kube_<uid>_<pod-name>_<namespace>_<container-name>_<spec-hash-hex>
//! ```
//!
//! Decoding is strict. A name with the wrong number of segments, the wrong
//! prefix, an empty field or a non-hex hash is rejected with
//! [`Error::MalformedIdentity`]; it most likely belongs to something this
//! adapter did not create.

use crate::constants::{
    CONTAINER_IDENTITY_SEGMENTS, CONTAINER_NAME_PREFIX, ENGINE_TYPE, IDENTITY_DELIMITER,
    POD_IDENTITY_SEGMENTS, POD_NAME_PREFIX,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Checks that a field can be embedded in an encoded name.
pub fn validate_field(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidInput(format!("{kind} cannot be empty")));
    }
    if value.contains(IDENTITY_DELIMITER) {
        return Err(Error::InvalidInput(format!(
            "{kind} '{value}' contains the identity delimiter '{IDENTITY_DELIMITER}'"
        )));
    }
    Ok(())
}

/// Splits `name` into exactly `expected` non-empty segments behind `prefix`.
fn split_segments<'a>(name: &'a str, prefix: &str, expected: usize) -> Result<Vec<&'a str>> {
    let parts: Vec<&str> = name.split(IDENTITY_DELIMITER).collect();
    if parts.len() != expected {
        return Err(Error::malformed(
            name,
            format!("expected {expected} segments, found {}", parts.len()),
        ));
    }
    if parts[0] != prefix {
        return Err(Error::malformed(
            name,
            format!("expected prefix '{prefix}', found '{}'", parts[0]),
        ));
    }
    if let Some(pos) = parts.iter().position(|p| p.is_empty()) {
        return Err(Error::malformed(name, format!("segment {pos} is empty")));
    }
    Ok(parts)
}

/// Lowercase hex without leading zeros, as `{:x}` renders a `u64`.
fn is_canonical_hex(s: &str) -> bool {
    let lower_hex = s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    lower_hex && (s == "0" || !s.starts_with('0'))
}

// =============================================================================
// Pod Identity
// =============================================================================

/// Orchestrator identity of a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PodIdentity {
    /// UID of the owning pod object.
    pub owner_uid: String,
    /// Pod name.
    pub pod_name: String,
    /// Pod namespace.
    pub namespace: String,
}

impl PodIdentity {
    /// Creates a pod identity.
    pub fn new(
        owner_uid: impl Into<String>,
        pod_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            pod_name: pod_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Checks that every field can be encoded.
    pub fn validate(&self) -> Result<()> {
        validate_field("pod uid", &self.owner_uid)?;
        validate_field("pod name", &self.pod_name)?;
        validate_field("namespace", &self.namespace)
    }

    /// Encodes the identity as the engine pod name.
    ///
    /// Fields are not validated here; see [`PodIdentity::validate`].
    #[must_use]
    pub fn encode(&self) -> String {
        let d = IDENTITY_DELIMITER;
        format!(
            "{POD_NAME_PREFIX}{d}{}{d}{}{d}{}",
            self.owner_uid, self.pod_name, self.namespace
        )
    }

    /// Decodes an engine pod name.
    pub fn decode(name: &str) -> Result<Self> {
        let parts = split_segments(name, POD_NAME_PREFIX, POD_IDENTITY_SEGMENTS)?;
        Ok(Self::new(parts[1], parts[2], parts[3]))
    }

    /// Orchestrator "full name" (`name_namespace`) used in log lines and by
    /// the network plugin.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}_{}", self.pod_name, self.namespace)
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for PodIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

// =============================================================================
// Container Identity
// =============================================================================

/// Orchestrator identity of a container, including the hash of the spec it
/// was created from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerIdentity {
    /// UID of the owning pod object.
    pub owner_uid: String,
    /// Pod name.
    pub pod_name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Container name within the pod.
    pub container_name: String,
    /// Content hash of the container spec.
    pub spec_hash: u64,
}

impl ContainerIdentity {
    /// Creates a container identity inside `pod`.
    pub fn new(pod: &PodIdentity, container_name: impl Into<String>, spec_hash: u64) -> Self {
        Self {
            owner_uid: pod.owner_uid.clone(),
            pod_name: pod.pod_name.clone(),
            namespace: pod.namespace.clone(),
            container_name: container_name.into(),
            spec_hash,
        }
    }

    /// Identity of the pod this container belongs to.
    #[must_use]
    pub fn pod(&self) -> PodIdentity {
        PodIdentity::new(&self.owner_uid, &self.pod_name, &self.namespace)
    }

    /// Encodes the identity as the engine container name.
    #[must_use]
    pub fn encode(&self) -> String {
        let d = IDENTITY_DELIMITER;
        format!(
            "{CONTAINER_NAME_PREFIX}{d}{}{d}{}{d}{}{d}{}{d}{:x}",
            self.owner_uid, self.pod_name, self.namespace, self.container_name, self.spec_hash
        )
    }

    /// Decodes an engine container name.
    pub fn decode(name: &str) -> Result<Self> {
        let parts = split_segments(name, CONTAINER_NAME_PREFIX, CONTAINER_IDENTITY_SEGMENTS)?;
        if !is_canonical_hex(parts[5]) {
            return Err(Error::malformed(name, format!("invalid spec hash '{}'", parts[5])));
        }
        let spec_hash = u64::from_str_radix(parts[5], 16)
            .map_err(|e| Error::malformed(name, format!("invalid spec hash '{}': {e}", parts[5])))?;
        Ok(Self {
            owner_uid: parts[1].to_string(),
            pod_name: parts[2].to_string(),
            namespace: parts[3].to_string(),
            container_name: parts[4].to_string(),
            spec_hash,
        })
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for ContainerIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// Orchestrator-visible ID for an engine container (`hyper://<id>`).
#[must_use]
pub fn container_uri(engine_container_id: &str) -> String {
    format!("{ENGINE_TYPE}://{engine_container_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_lowercase_hex_without_padding() {
        let pod = PodIdentity::new("u", "p", "n");
        let c = ContainerIdentity::new(&pod, "c", 0xAB);
        assert_eq!(c.encode(), "kube_u_p_n_c_ab");
    }

    #[test]
    fn test_decode_rejects_wrong_prefix() {
        assert!(PodIdentity::decode("k8s_uid_name_ns").is_err());
    }

    #[test]
    fn test_container_uri() {
        assert_eq!(container_uri("abc"), "hyper://abc");
    }
}
