//! # State Snapshotter
//!
//! Turns the engine's pod listing into decoded [`RunningPod`]s.
//!
//! The engine lists every pod it runs, including ones this adapter did not
//! create. Anything whose name does not decode is somebody else's and is
//! skipped. A container whose status cannot be parsed is left out of its
//! pod rather than failing the whole query.
//!
//! Snapshots are never cached; every call lists the engine again.

use crate::constants::ENGINE_TIME_LAYOUT;
use crate::engine::{
    EngineClient, EngineContainerStatus, EnginePodInfo, PHASE_FAILED, PHASE_RUNNING,
    PHASE_SUCCEEDED,
};
use crate::error::{Error, Result};
use crate::identity::{ContainerIdentity, PodIdentity};
use crate::pod::{ContainerObservation, ContainerPhase, RunningPod};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

/// Parses an engine timestamp. The empty string is the zero time.
pub fn parse_engine_time(value: &str) -> Result<DateTime<Utc>> {
    if value.is_empty() {
        return Ok(DateTime::<Utc>::UNIX_EPOCH);
    }
    NaiveDateTime::parse_from_str(value, ENGINE_TIME_LAYOUT)
        .map(|t| t.and_utc())
        .map_err(|e| Error::Time {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Lists all pods the adapter manages.
pub async fn list_pods(engine: &dyn EngineClient) -> Result<Vec<RunningPod>> {
    let infos = engine.list_pods().await?;
    Ok(infos.iter().filter_map(observe_pod).collect())
}

/// Snapshot of a single pod; empty if the engine does not run it.
pub async fn pod_status(engine: &dyn EngineClient, identity: &PodIdentity) -> Result<RunningPod> {
    let name = identity.encode();
    let infos = engine.list_pods().await?;
    let pod = infos
        .iter()
        .find(|info| info.pod_name == name)
        .and_then(observe_pod)
        .unwrap_or_else(|| RunningPod::empty(identity.clone()));

    debug!(
        pod = %identity.full_name(),
        containers = pod.containers.len(),
        ip = ?pod.ip,
        "Observed pod status"
    );
    Ok(pod)
}

/// Decodes one engine pod. Returns `None` if the pod is not ours.
pub fn observe_pod(info: &EnginePodInfo) -> Option<RunningPod> {
    let identity = match PodIdentity::decode(&info.pod_name) {
        Ok(identity) => identity,
        Err(e) => {
            debug!(name = %info.pod_name, error = %e, "Skipping unmanaged pod");
            return None;
        }
    };

    let mut containers = Vec::with_capacity(info.spec.containers.len());
    for declared in &info.spec.containers {
        let container_identity = match ContainerIdentity::decode(&declared.name) {
            Ok(id) => id,
            Err(e) => {
                debug!(
                    pod = %identity.full_name(),
                    name = %declared.name,
                    error = %e,
                    "Skipping unmanaged container"
                );
                continue;
            }
        };

        let status = info
            .status
            .container_statuses
            .iter()
            .find(|s| s.container_id == declared.container_id);

        let mut observation = ContainerObservation {
            identity: container_identity,
            container_id: declared.container_id.clone(),
            image: declared.image.clone(),
            image_id: declared.image_id.clone(),
            phase: ContainerPhase::Unknown,
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            finished_at: DateTime::<Utc>::UNIX_EPOCH,
            exit_code: 0,
            restart_count: 0,
            reason: String::new(),
            message: String::new(),
        };

        if let Some(status) = status
            && let Err(e) = apply_status(&mut observation, status)
        {
            warn!(
                pod = %identity.full_name(),
                container = %observation.name(),
                error = %e,
                "Excluding container with unparseable status"
            );
            continue;
        }

        containers.push(observation);
    }

    Some(RunningPod {
        identity,
        instance_id: info.pod_id.clone(),
        ip: info.status.pod_ip.first().cloned(),
        containers,
    })
}

fn apply_status(observation: &mut ContainerObservation, status: &EngineContainerStatus) -> Result<()> {
    observation.restart_count = status.restart_count;
    match status.phase.as_str() {
        PHASE_RUNNING => {
            observation.phase = ContainerPhase::Running;
            observation.started_at = parse_engine_time(&status.running.started_at)?;
        }
        PHASE_FAILED | PHASE_SUCCEEDED => {
            let terminated = &status.terminated;
            observation.phase = ContainerPhase::Exited;
            observation.started_at = parse_engine_time(&terminated.started_at)?;
            observation.finished_at = parse_engine_time(&terminated.finished_at)?;
            observation.exit_code = terminated.exit_code;
            observation.reason = terminated.reason.clone();
            observation.message = terminated.message.clone();
        }
        _ => {
            observation.phase = ContainerPhase::Unknown;
            observation.reason = status.waiting.reason.clone();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_engine_time() {
        let t = parse_engine_time("2016-01-02T03:04:05Z").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2016, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn test_empty_time_is_zero() {
        assert_eq!(parse_engine_time("").unwrap(), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_bad_time_rejected() {
        assert!(matches!(
            parse_engine_time("yesterday"),
            Err(Error::Time { .. })
        ));
    }
}
