//! Resolved pod volumes.
//!
//! The volume resolver hands back a path plus an untyped metadata block per
//! volume. The block is decoded exactly once, into [`VolumeBackend`], before
//! any spec building happens.

use crate::constants::VOLUME_DRIVER_RBD;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Resolved volumes of a pod, keyed by volume name.
pub type VolumeMap = BTreeMap<String, VolumeDescriptor>;

/// A volume as returned by the volume resolver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    /// Host path the volume is materialized at.
    pub path: String,
    /// Backend-specific metadata, if the volume plugin provides any.
    pub metadata: Option<Map<String, Value>>,
}

impl VolumeDescriptor {
    /// A plain host directory.
    pub fn generic(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: None,
        }
    }

    /// An RBD block device described the way the RBD volume plugin reports it.
    pub fn rbd(
        path: impl Into<String>,
        image: &str,
        hosts: &[&str],
        ports: &[&str],
        user: &str,
        keyring: &str,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("volume_type".into(), Value::from(VOLUME_DRIVER_RBD));
        metadata.insert("name".into(), Value::from(image));
        metadata.insert("hosts".into(), Value::from(hosts.to_vec()));
        metadata.insert("ports".into(), Value::from(ports.to_vec()));
        metadata.insert("auth_username".into(), Value::from(user));
        metadata.insert("keyring".into(), Value::from(keyring));
        Self {
            path: path.into(),
            metadata: Some(metadata),
        }
    }
}

/// Decoded volume backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeBackend {
    /// Bind mount of a host path.
    Generic { path: String },
    /// Distributed block device reached through monitor endpoints.
    BlockDevice {
        name: String,
        hosts: Vec<String>,
        ports: Vec<String>,
        auth_user: String,
        keyring: String,
    },
}

impl VolumeBackend {
    /// Decodes a resolver descriptor for volume `volume`.
    ///
    /// Metadata without `volume_type == "rbd"` is a generic volume. An RBD
    /// block missing `name`, `hosts` or `ports`, or with values of the wrong
    /// type, fails with [`Error::InvalidVolumeMetadata`].
    pub fn from_descriptor(volume: &str, descriptor: &VolumeDescriptor) -> Result<Self> {
        let generic = || Self::Generic {
            path: descriptor.path.clone(),
        };

        let Some(meta) = &descriptor.metadata else {
            return Ok(generic());
        };

        let volume_type = match meta.get("volume_type") {
            None | Some(Value::Null) => return Ok(generic()),
            Some(Value::String(t)) => t.as_str(),
            Some(other) => {
                return Err(invalid(volume, format!("volume_type must be a string, got {other}")));
            }
        };

        if volume_type != VOLUME_DRIVER_RBD {
            return Ok(generic());
        }

        let name = required_str(volume, meta, "name")?;
        let hosts = required_list(volume, meta, "hosts")?;
        let ports = required_list(volume, meta, "ports")?;
        let auth_user = optional_str(volume, meta, "auth_username")?;
        let keyring = optional_str(volume, meta, "keyring")?;

        Ok(Self::BlockDevice {
            name,
            hosts,
            ports,
            auth_user,
            keyring,
        })
    }
}

fn invalid(volume: &str, reason: impl Into<String>) -> Error {
    Error::InvalidVolumeMetadata {
        volume: volume.to_string(),
        reason: reason.into(),
    }
}

fn required_str(volume: &str, meta: &Map<String, Value>, key: &str) -> Result<String> {
    match meta.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(other) => Err(invalid(volume, format!("'{key}' must be a non-empty string, got {other}"))),
        None => Err(invalid(volume, format!("missing '{key}'"))),
    }
}

fn optional_str(volume: &str, meta: &Map<String, Value>, key: &str) -> Result<String> {
    match meta.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(volume, format!("'{key}' must be a string, got {other}"))),
    }
}

/// Reads a list of strings. Ports are accepted as numbers too.
fn required_list(volume: &str, meta: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    let items = match meta.get(key) {
        Some(Value::Array(items)) => items,
        Some(other) => return Err(invalid(volume, format!("'{key}' must be a list, got {other}"))),
        None => return Err(invalid(volume, format!("missing '{key}'"))),
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(invalid(volume, format!("'{key}' entry {other} is not a string"))),
        })
        .collect()
}
