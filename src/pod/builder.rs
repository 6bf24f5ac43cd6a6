//! Spec builder: desired pod → engine document.
//!
//! Building is a pure transformation. Every input (resolved volumes, run
//! options, services) is fetched by the caller beforehand, so the same
//! inputs always produce the same document, and a failure leaves nothing
//! behind.

use super::document::{
    ContainerDocument, EnvDocument, MountDocument, PodResource, PodSpecDocument, PortDocument,
    Service, VolumeDocument, VolumeOption,
};
use super::spec::{ContainerSpec, PodSpec};
use super::traits::RunOptions;
use super::volume::{VolumeBackend, VolumeMap};
use crate::constants::{
    BASE_MEMORY_MIB, DEFAULT_CONTAINER_CPU_MILLIS, DEFAULT_CONTAINER_MEMORY_MIB, MIB,
    MILLIS_PER_VCPU, PLACEHOLDER_SERVICE_IP, PLACEHOLDER_SERVICE_PORT, VOLUME_DRIVER_RBD,
    VOLUME_DRIVER_VFS,
};
use crate::error::{Error, Result};
use crate::identity::validate_field;
use std::collections::HashMap;
use tracing::debug;

/// Builds the engine document for `pod`.
///
/// `run_options` is keyed by container name and must cover every container.
/// An empty `services` list is replaced by a single placeholder entry.
///
/// # Errors
///
/// - `InvalidInput` if a pod or container field cannot be embedded in a name
/// - `InvalidVolumeMetadata` for malformed backend metadata
/// - `RunOptionsFailed` if a container has no run options
pub fn build_pod_document(
    pod: &PodSpec,
    volumes: &VolumeMap,
    run_options: &HashMap<String, RunOptions>,
    services: &[Service],
) -> Result<PodSpecDocument> {
    let identity = pod.identity();
    identity.validate()?;

    let volumes = build_volumes(volumes)?;
    let services = services_or_placeholder(services);

    let containers = pod
        .containers
        .iter()
        .map(|c| {
            validate_field("container name", &c.name)?;
            let opts = run_options
                .get(&c.name)
                .ok_or_else(|| Error::RunOptionsFailed {
                    container: c.name.clone(),
                    reason: "no run options resolved".to_string(),
                })?;
            Ok(build_container(pod, c, opts))
        })
        .collect::<Result<Vec<_>>>()?;

    let resource = aggregate_resources(&pod.containers);
    debug!(
        pod = %pod.full_name(),
        vcpu = resource.vcpu,
        memory_mib = resource.memory,
        "Computed pod resource limits"
    );

    Ok(PodSpecDocument {
        id: identity.encode(),
        resource,
        containers,
        volumes,
        services,
        tty: true,
    })
}

/// Converts resolved volumes into engine volume entries, sorted by name.
pub fn build_volumes(volumes: &VolumeMap) -> Result<Vec<VolumeDocument>> {
    volumes
        .iter()
        .map(|(name, descriptor)| {
            let doc = match VolumeBackend::from_descriptor(name, descriptor)? {
                VolumeBackend::Generic { path } => VolumeDocument {
                    name: name.clone(),
                    driver: VOLUME_DRIVER_VFS.to_string(),
                    source: path,
                    option: None,
                },
                VolumeBackend::BlockDevice {
                    name: image,
                    hosts,
                    ports,
                    auth_user,
                    keyring,
                } => VolumeDocument {
                    name: name.clone(),
                    driver: VOLUME_DRIVER_RBD.to_string(),
                    source: format!("{VOLUME_DRIVER_RBD}:{image}"),
                    option: Some(VolumeOption {
                        user: auth_user,
                        keyring,
                        monitors: monitor_endpoints(&hosts, &ports),
                    }),
                },
            };
            debug!(volume = %name, driver = %doc.driver, source = %doc.source, "Resolved volume");
            Ok(doc)
        })
        .collect()
}

/// Every host paired with every port, host-major.
#[must_use]
pub fn monitor_endpoints(hosts: &[String], ports: &[String]) -> Vec<String> {
    hosts
        .iter()
        .flat_map(|h| ports.iter().map(move |p| format!("{h}:{p}")))
        .collect()
}

/// Returns `services`, or the placeholder entry if it is empty.
#[must_use]
pub fn services_or_placeholder(services: &[Service]) -> Vec<Service> {
    if services.is_empty() {
        vec![Service::new(PLACEHOLDER_SERVICE_IP, PLACEHOLDER_SERVICE_PORT)]
    } else {
        services.to_vec()
    }
}

fn build_container(pod: &PodSpec, container: &ContainerSpec, opts: &RunOptions) -> ContainerDocument {
    ContainerDocument {
        name: pod.container_identity(container).encode(),
        image: container.image.clone(),
        tty: container.tty,
        command: container.command.clone(),
        args: container.args.clone(),
        working_dir: container.working_dir.clone().filter(|w| !w.is_empty()),
        dns: opts.dns.clone(),
        envs: opts
            .env
            .iter()
            .map(|(name, value)| EnvDocument {
                env: name.clone(),
                value: value.clone(),
            })
            .collect(),
        ports: opts
            .port_mappings
            .iter()
            .map(|p| PortDocument {
                container_port: p.container_port,
                host_port: (p.host_port != 0).then_some(p.host_port),
                protocol: p.protocol.clone(),
            })
            .collect(),
        volumes: opts
            .mounts
            .iter()
            .map(|m| MountDocument {
                path: m.container_path.clone(),
                volume: m.name.clone(),
                read_only: m.read_only,
            })
            .collect(),
    }
}

/// Sums container limits into VM sizing.
///
/// Unset limits count as 1 milli-CPU and 128 MiB. vCPUs round up; memory is
/// the 64 MiB base plus the summed limits in whole MiB (rounded down).
#[must_use]
pub fn aggregate_resources(containers: &[ContainerSpec]) -> PodResource {
    let (cpu_millis, memory_bytes) =
        containers
            .iter()
            .fold((0u64, 0u64), |(cpu, mem), c| {
                let c_cpu = match c.resources.cpu_millis {
                    0 => DEFAULT_CONTAINER_CPU_MILLIS,
                    v => v,
                };
                let c_mem = match c.resources.memory_bytes {
                    0 => DEFAULT_CONTAINER_MEMORY_MIB * MIB,
                    v => v,
                };
                (cpu.saturating_add(c_cpu), mem.saturating_add(c_mem))
            });

    PodResource {
        vcpu: cpu_millis.div_ceil(MILLIS_PER_VCPU),
        memory: BASE_MEMORY_MIB + memory_bytes / MIB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_endpoints_host_major() {
        let hosts = vec!["a".to_string(), "b".to_string()];
        let ports = vec!["1".to_string(), "2".to_string()];
        assert_eq!(monitor_endpoints(&hosts, &ports), vec!["a:1", "a:2", "b:1", "b:2"]);
    }

    #[test]
    fn test_single_default_container_gets_one_vcpu() {
        let r = aggregate_resources(&[ContainerSpec::default()]);
        assert_eq!(r.vcpu, 1);
        assert_eq!(r.memory, 64 + 128);
    }
}
