//! # Status Translator
//!
//! Renders a [`RunningPod`] snapshot as the orchestrator-facing
//! [`PodStatus`] of a desired pod.
//!
//! ## Merge Rule
//!
//! A container name can appear more than once in a snapshot (one entry per
//! generation). Observations are ordered by restart count, highest first,
//! so the newest generation is seen first and becomes the current state.
//! The next one with the same name fills `last_termination_state`, once.
//! Any further generations are ignored.
//!
//! ## Exited Containers
//!
//! | Policy | Exit code | Rendered as |
//! |--------|-----------|-------------|
//! | `Always` | any | `Waiting` |
//! | `OnFailure` | non-zero | `Waiting` |
//! | `OnFailure` | 0 | `Terminated` |
//! | `Never` | any | `Terminated` |
//!
//! `Waiting` means the orchestrator will see a restart coming.

use crate::engine::{
    EngineContainerStatus, PHASE_FAILED, PHASE_PENDING, PHASE_RUNNING, PHASE_SUCCEEDED,
};
use crate::error::Result;
use crate::identity::container_uri;
use crate::pod::{
    ContainerObservation, ContainerPhase, ContainerState, ContainerStatus, PodSpec, PodStatus,
    RestartPolicy, RunningPod,
};
use crate::snapshot::parse_engine_time;
use std::collections::HashMap;
use tracing::warn;

/// Builds the orchestrator status of `pod` from its snapshot.
///
/// Entries follow the desired container order. Observed containers the pod
/// does not declare are left out.
#[must_use]
pub fn to_pod_status(pod: &PodSpec, running: &RunningPod) -> PodStatus {
    let mut observations: Vec<&ContainerObservation> = running.containers.iter().collect();
    observations.sort_by(|a, b| b.restart_count.cmp(&a.restart_count));

    let mut by_name: HashMap<&str, ContainerStatus> = HashMap::new();
    for observation in observations {
        let state = observed_state(observation, pod.restart_policy);
        match by_name.get_mut(observation.name()) {
            None => {
                by_name.insert(
                    observation.name(),
                    ContainerStatus {
                        name: observation.name().to_string(),
                        image: observation.image.clone(),
                        image_id: observation.image_id.clone(),
                        container_id: container_uri(&observation.container_id),
                        restart_count: observation.restart_count,
                        state,
                        last_termination_state: None,
                    },
                );
            }
            Some(existing) => {
                if existing.last_termination_state.is_none() {
                    existing.last_termination_state = Some(state);
                }
            }
        }
    }

    let container_statuses = pod
        .containers
        .iter()
        .map(|c| {
            by_name
                .remove(c.name.as_str())
                .unwrap_or_else(|| ContainerStatus {
                    name: c.name.clone(),
                    image: c.image.clone(),
                    image_id: String::new(),
                    container_id: String::new(),
                    restart_count: 0,
                    state: ContainerState::waiting(),
                    last_termination_state: None,
                })
        })
        .collect();

    PodStatus {
        pod_ip: running.ip.clone(),
        container_statuses,
    }
}

/// State of one observation under a restart policy.
fn observed_state(observation: &ContainerObservation, policy: RestartPolicy) -> ContainerState {
    match observation.phase {
        ContainerPhase::Running => ContainerState::Running {
            started_at: observation.started_at,
        },
        ContainerPhase::Exited => {
            let restarting = match policy {
                RestartPolicy::Always => true,
                RestartPolicy::OnFailure => observation.exit_code != 0,
                RestartPolicy::Never => false,
            };
            if restarting {
                ContainerState::waiting()
            } else {
                ContainerState::Terminated {
                    exit_code: observation.exit_code,
                    reason: observation.reason.clone(),
                    message: observation.message.clone(),
                    started_at: observation.started_at,
                    finished_at: observation.finished_at,
                    container_id: container_uri(&observation.container_id),
                }
            }
        }
        ContainerPhase::Unknown => ContainerState::waiting(),
    }
}

/// Maps a single engine status entry straight to an orchestrator state.
///
/// Unlike [`to_pod_status`] this does not apply a restart policy; an exited
/// container is always `Terminated`.
pub fn engine_container_state(status: &EngineContainerStatus) -> Result<ContainerState> {
    let state = match status.phase.as_str() {
        PHASE_RUNNING => ContainerState::Running {
            started_at: parse_engine_time(&status.running.started_at)?,
        },
        PHASE_PENDING => ContainerState::Waiting {
            reason: status.waiting.reason.clone(),
        },
        PHASE_FAILED | PHASE_SUCCEEDED => {
            let t = &status.terminated;
            ContainerState::Terminated {
                exit_code: t.exit_code,
                reason: t.reason.clone(),
                message: t.message.clone(),
                started_at: parse_engine_time(&t.started_at)?,
                finished_at: parse_engine_time(&t.finished_at)?,
                container_id: container_uri(&status.container_id),
            }
        }
        other => {
            warn!(container_id = %status.container_id, phase = %other, "Unknown container phase");
            ContainerState::waiting()
        }
    };
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineTerminatedState, EngineWaitingState};

    #[test]
    fn test_pending_keeps_reason() {
        let status = EngineContainerStatus {
            container_id: "c1".to_string(),
            phase: PHASE_PENDING.to_string(),
            waiting: EngineWaitingState {
                reason: "pulling".to_string(),
            },
            ..Default::default()
        };
        assert_eq!(
            engine_container_state(&status).unwrap(),
            ContainerState::Waiting {
                reason: "pulling".to_string()
            }
        );
    }

    #[test]
    fn test_failed_is_terminated() {
        let status = EngineContainerStatus {
            container_id: "c1".to_string(),
            phase: PHASE_FAILED.to_string(),
            terminated: EngineTerminatedState {
                exit_code: 137,
                reason: "OOMKilled".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let state = engine_container_state(&status).unwrap();
        assert_eq!(state.exit_code(), Some(137));
    }

    #[test]
    fn test_bad_running_time_is_error() {
        let mut status = EngineContainerStatus {
            container_id: "c1".to_string(),
            phase: PHASE_RUNNING.to_string(),
            ..Default::default()
        };
        status.running.started_at = "not-a-time".to_string();
        assert!(engine_container_state(&status).is_err());
    }
}
