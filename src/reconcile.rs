//! # Reconciler
//!
//! Decides what to do about a pod given its desired spec and what the
//! engine is running.
//!
//! The engine cannot restart a single container inside a pod, so the only
//! corrective action is a whole-pod restart:
//!
//! ```text
//!   nothing running ──────────────────────────────▶ Create
//!   every desired container matched and healthy ───▶ NoAction
//!   anything else ─────────────────────────────────▶ RestartWholePod(reason)
//! ```
//!
//! A desired container triggers a restart when:
//!
//! 1. it is not running and its restart policy says it should be
//! 2. it runs with a spec hash different from the desired one
//! 3. its liveness probe is not `Success` (unless the policy is `Never`)
//!
//! Only observations in the running phase count; exited generations are
//! history for the status translator. Running containers that no desired
//! container claims also force a restart. One unhealthy container restarts
//! the whole pod.

use crate::pod::{
    ContainerObservation, ContainerPhase, ContainerSpec, ContainerState, Liveness, LivenessSource,
    PodSpec, PodStatus, RestartPolicy, RunningPod,
};
use std::fmt;
use tracing::{debug, info};

/// Why a pod has to be restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartReason {
    /// Desired container is not running and its restart policy wants it.
    ContainerDead { container: String },
    /// Running container was created from a different spec.
    SpecChanged {
        container: String,
        running: u64,
        desired: u64,
    },
    /// Liveness probe is failing.
    Unhealthy { container: String },
    /// Running containers that match no desired container.
    Unidentified { count: usize },
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContainerDead { container } => {
                write!(f, "container {container} is dead and should be restarted")
            }
            Self::SpecChanged {
                container,
                running,
                desired,
            } => write!(
                f,
                "container {container} hash changed ({running:x} vs {desired:x})"
            ),
            Self::Unhealthy { container } => write!(f, "container {container} is unhealthy"),
            Self::Unidentified { count } => write!(f, "{count} unidentified container(s)"),
        }
    }
}

/// Reconciliation outcome for one pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Running state already satisfies the desired pod.
    NoAction,
    /// Nothing is running; create the pod.
    Create,
    /// Kill the pod and create it again.
    RestartWholePod(RestartReason),
}

impl Decision {
    /// Whether the decision changes anything.
    #[must_use]
    pub fn is_action(&self) -> bool {
        !matches!(self, Self::NoAction)
    }
}

/// Whether a container that is not running should be started again.
///
/// Looks at the orchestrator's last status for the container. Without a
/// terminated record the container never ran and is always restarted.
#[must_use]
pub fn should_restart_dead_container(
    container: &ContainerSpec,
    policy: RestartPolicy,
    previous: &PodStatus,
) -> bool {
    let last_exit = previous.container(&container.name).and_then(|s| {
        s.state
            .exit_code()
            .or_else(|| s.last_termination_state.as_ref().and_then(ContainerState::exit_code))
    });

    let Some(exit_code) = last_exit else {
        return true;
    };

    match policy {
        RestartPolicy::Never => false,
        RestartPolicy::OnFailure => exit_code != 0,
        RestartPolicy::Always => true,
    }
}

/// Compares a desired pod with its running counterpart.
///
/// `previous` is the orchestrator status from the last sync, used only for
/// containers that are not running.
pub fn reconcile(
    pod: &PodSpec,
    running: Option<&RunningPod>,
    liveness: &dyn LivenessSource,
    previous: &PodStatus,
) -> Decision {
    let full_name = pod.full_name();

    let live: Vec<&ContainerObservation> = running
        .map(|r| {
            r.containers
                .iter()
                .filter(|c| c.phase == ContainerPhase::Running)
                .collect()
        })
        .unwrap_or_default();

    if live.is_empty() {
        debug!(pod = %full_name, "Pod is not running, will create it");
        return Decision::Create;
    }

    let mut matched = vec![false; live.len()];

    for container in &pod.containers {
        let desired_hash = container.spec_hash();

        let Some(index) = live.iter().position(|c| c.name() == container.name) else {
            if should_restart_dead_container(container, pod.restart_policy, previous) {
                return restart(
                    &full_name,
                    RestartReason::ContainerDead {
                        container: container.name.clone(),
                    },
                );
            }
            continue;
        };
        let observed = live[index];

        let running_hash = observed.identity.spec_hash;
        if running_hash != 0 && running_hash != desired_hash {
            return restart(
                &full_name,
                RestartReason::SpecChanged {
                    container: container.name.clone(),
                    running: running_hash,
                    desired: desired_hash,
                },
            );
        }

        if let Some(result) = liveness.get(&observed.identity)
            && result != Liveness::Success
            && pod.restart_policy != RestartPolicy::Never
        {
            return restart(
                &full_name,
                RestartReason::Unhealthy {
                    container: container.name.clone(),
                },
            );
        }

        matched[index] = true;
    }

    let unidentified = matched.iter().filter(|m| !**m).count();
    if unidentified > 0 {
        return restart(&full_name, RestartReason::Unidentified { count: unidentified });
    }

    debug!(pod = %full_name, "Pod is up to date");
    Decision::NoAction
}

fn restart(full_name: &str, reason: RestartReason) -> Decision {
    info!(pod = %full_name, reason = %reason, "Pod will be killed and re-created");
    Decision::RestartWholePod(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::ContainerStatus;

    fn terminated(exit_code: i32) -> ContainerState {
        ContainerState::Terminated {
            exit_code,
            reason: String::new(),
            message: String::new(),
            started_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            finished_at: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            container_id: String::new(),
        }
    }

    fn status_with(state: ContainerState) -> PodStatus {
        PodStatus {
            pod_ip: None,
            container_statuses: vec![ContainerStatus {
                name: "app".to_string(),
                image: "busybox".to_string(),
                image_id: String::new(),
                container_id: String::new(),
                restart_count: 0,
                state,
                last_termination_state: None,
            }],
        }
    }

    fn app() -> ContainerSpec {
        ContainerSpec {
            name: "app".to_string(),
            image: "busybox".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_dead_container_without_record_restarts() {
        assert!(should_restart_dead_container(
            &app(),
            RestartPolicy::Never,
            &PodStatus::default()
        ));
    }

    #[test]
    fn test_on_failure_clean_exit_stays_down() {
        let status = status_with(terminated(0));
        assert!(!should_restart_dead_container(&app(), RestartPolicy::OnFailure, &status));

        let status = status_with(terminated(2));
        assert!(should_restart_dead_container(&app(), RestartPolicy::OnFailure, &status));
    }

    #[test]
    fn test_never_stays_down() {
        let status = status_with(terminated(1));
        assert!(!should_restart_dead_container(&app(), RestartPolicy::Never, &status));
    }
}
