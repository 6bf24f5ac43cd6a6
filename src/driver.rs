//! # Lifecycle Driver
//!
//! [`HyperRuntime`] sequences the side effects around the pure components:
//!
//! ```text
//! run_pod:
//!   pull images ─▶ resolve volumes ─▶ run options ─▶ services
//!        ─▶ build document ─▶ store.put ─▶ network set up
//!        ─▶ store.get ─▶ engine create ─▶ engine start
//!                                              │
//!                                   on failure: engine remove
//!
//! kill_pod:
//!   find instance ─▶ engine remove ─▶ network tear down ─▶ store.delete
//!
//! sync_pod:
//!   reconcile ─▶ Create: run_pod
//!             ─▶ RestartWholePod: kill_pod + run_pod
//!             ─▶ NoAction
//! ```
//!
//! An instance that is still registered with the engine but has no running
//! container needs care before `Create`: if some container has not settled
//! yet (the engine still reports it pending), the pod is left to boot. If
//! every container exited, the instance is replaced only when the restart
//! policy wants one of them back.
//!
//! Calls for one pod run strictly in sequence. The caller guarantees at most
//! one lifecycle operation per pod at a time; different pods are
//! independent. Nothing here retries or times out.

use crate::config::RuntimeConfig;
use crate::constants::{DEFAULT_IMAGE_TAG, ENGINE_TYPE};
use crate::engine::{EngineClient, Image, LogOptions};
use crate::error::{Error, Result};
use crate::identity::{PodIdentity, container_uri};
use crate::pod::{
    AnonymousKeyring, ContainerPhase, Credential, Keyring, LivenessSource, NetworkPlugin,
    NoProbes, NoServices, PodSpec, PodStatus, RunOptions, RunOptionsGenerator, RunningPod,
    Service, ServiceLister, SpecRunOptions, VolumeResolver, build_pod_document,
    matching_credentials,
};
use crate::reconcile::{Decision, reconcile, should_restart_dead_container};
use crate::snapshot;
use crate::status::to_pod_status;
use crate::storage::SpecStore;
use crate::stream::pump_session;
use base64::Engine as _;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};

/// Pod runtime backed by a VM-pod engine.
pub struct HyperRuntime {
    engine: Arc<dyn EngineClient>,
    network: Arc<dyn NetworkPlugin>,
    volumes: Arc<dyn VolumeResolver>,
    liveness: Arc<dyn LivenessSource>,
    run_options: Arc<dyn RunOptionsGenerator>,
    services: Arc<dyn ServiceLister>,
    keyring: Arc<dyn Keyring>,
    store: SpecStore,
    config: RuntimeConfig,
}

impl HyperRuntime {
    /// Creates a runtime with the spec store at `config.spec_dir`.
    ///
    /// Liveness, services and credentials start out empty and run options
    /// come straight from the container spec; replace them with the
    /// `with_*` methods.
    ///
    /// # Errors
    ///
    /// Returns error if the spec store directory cannot be created.
    pub fn new(
        engine: Arc<dyn EngineClient>,
        network: Arc<dyn NetworkPlugin>,
        volumes: Arc<dyn VolumeResolver>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let store = SpecStore::with_path(config.spec_dir.clone())?;
        Ok(Self {
            engine,
            network,
            volumes,
            liveness: Arc::new(NoProbes),
            run_options: Arc::new(SpecRunOptions {
                dns: config.dns.clone(),
            }),
            services: Arc::new(NoServices),
            keyring: Arc::new(AnonymousKeyring),
            store,
            config,
        })
    }

    /// Uses `liveness` for probe results.
    #[must_use]
    pub fn with_liveness(mut self, liveness: Arc<dyn LivenessSource>) -> Self {
        self.liveness = liveness;
        self
    }

    /// Uses `run_options` to generate container run options.
    #[must_use]
    pub fn with_run_options(mut self, run_options: Arc<dyn RunOptionsGenerator>) -> Self {
        self.run_options = run_options;
        self
    }

    /// Uses `services` to list namespace services.
    #[must_use]
    pub fn with_services(mut self, services: Arc<dyn ServiceLister>) -> Self {
        self.services = services;
        self
    }

    /// Uses `keyring` for registry credentials.
    #[must_use]
    pub fn with_keyring(mut self, keyring: Arc<dyn Keyring>) -> Self {
        self.keyring = keyring;
        self
    }

    /// Returns the spec store.
    pub fn store(&self) -> &SpecStore {
        &self.store
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Name of the container runtime type.
    #[must_use]
    pub fn runtime_type(&self) -> &'static str {
        ENGINE_TYPE
    }

    /// Version reported by the engine.
    pub async fn version(&self) -> Result<String> {
        self.engine.version().await
    }

    // =========================================================================
    // Pod Lifecycle
    // =========================================================================

    /// Creates and starts `pod`.
    ///
    /// If the engine fails to start the pod, the created instance is removed
    /// again and the start error is returned.
    pub async fn run_pod(&self, pod: &PodSpec, pull_secrets: &[Credential]) -> Result<()> {
        let identity = pod.identity();
        let key = identity.encode();
        let full_name = identity.full_name();

        for container in &pod.containers {
            self.pull_image(&container.image, pull_secrets).await?;
        }

        let document = self.build_document(pod).await?;
        let data = document.to_json()?;

        self.store.put(&key, &data)?;

        self.network.set_up_pod(&pod.namespace, &key).await?;

        let data = self.store.get(&key)?;
        let pod_id = self.engine.create_pod(&data).await?;
        tracing::info!(pod = %full_name, pod_id = %pod_id, "Created pod");

        let created = CreatedPod::new(self.engine.clone(), pod_id);
        let pod_id = created.start().await.inspect_err(|e| {
            tracing::error!(pod = %full_name, error = %e, "Failed to start pod");
        })?;

        tracing::info!(
            pod = %full_name,
            pod_id = %pod_id,
            containers = pod.containers.len(),
            "Pod started"
        );
        Ok(())
    }

    /// Resolves every input of the document and builds it.
    async fn build_document(&self, pod: &PodSpec) -> Result<crate::pod::PodSpecDocument> {
        let full_name = pod.full_name();

        let volumes = self
            .volumes
            .resolve_volumes(&pod.uid)
            .ok_or_else(|| Error::VolumeResolutionFailed {
                pod: full_name.clone(),
            })?;

        let mut run_options: HashMap<String, RunOptions> = HashMap::new();
        for container in &pod.containers {
            let opts = self.run_options.generate(pod, container)?;
            run_options.insert(container.name.clone(), opts);
        }

        let services: Vec<Service> = match self.services.services(&pod.namespace).await {
            Ok(services) => services,
            Err(e) => {
                tracing::warn!(
                    pod = %full_name,
                    namespace = %pod.namespace,
                    error = %e,
                    "Failed to list services, using placeholder"
                );
                Vec::new()
            }
        };

        build_pod_document(pod, &volumes, &run_options, &services)
    }

    /// Stops and removes a running pod.
    ///
    /// Removing the persisted spec is best effort; a failure is only logged.
    pub async fn kill_pod(&self, running: &RunningPod) -> Result<()> {
        if running.identity.pod_name.is_empty() {
            return Ok(());
        }

        let key = running.identity.encode();
        let full_name = running.identity.full_name();
        tracing::debug!(pod = %full_name, "Killing pod");

        let infos = self.engine.list_pods().await?;
        let pod_id = infos
            .iter()
            .find(|info| info.pod_name == key)
            .map(|info| info.pod_id.clone())
            .ok_or_else(|| Error::PodNotFound(key.clone()))?;

        self.engine.remove_pod(&pod_id).await?;

        self.network
            .tear_down_pod(&running.identity.namespace, &key)
            .await?;

        if let Err(e) = self.store.delete(&key) {
            tracing::warn!(pod = %full_name, error = %e, "Failed to delete pod spec");
        }

        tracing::info!(pod = %full_name, pod_id = %pod_id, "Pod killed");
        Ok(())
    }

    /// Brings the engine in line with `pod`.
    ///
    /// `previous` is the orchestrator status from the last sync. Returns the
    /// decision that was carried out.
    pub async fn sync_pod(
        &self,
        pod: &PodSpec,
        previous: &PodStatus,
        running: Option<&RunningPod>,
        pull_secrets: &[Credential],
    ) -> Result<Decision> {
        let mut decision = reconcile(pod, running, self.liveness.as_ref(), previous);

        let registered = running.filter(|r| !r.instance_id.is_empty());
        if decision == Decision::Create
            && let Some(instance) = registered
            && !replace_registered_instance(pod, instance, previous)
        {
            decision = Decision::NoAction;
        }

        match (&decision, running) {
            (Decision::NoAction, _) => {}
            (Decision::Create, Some(stale)) if !stale.instance_id.is_empty() => {
                self.kill_pod(stale).await?;
                self.run_pod(pod, pull_secrets).await?;
            }
            (Decision::Create, _) => self.run_pod(pod, pull_secrets).await?,
            (Decision::RestartWholePod(_), Some(running)) => {
                self.kill_pod(running).await?;
                self.run_pod(pod, pull_secrets).await?;
            }
            (Decision::RestartWholePod(_), None) => {
                return Err(Error::Internal(
                    "restart decided for a pod that is not running".to_string(),
                ));
            }
        }

        Ok(decision)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Lists all pods managed by this adapter.
    pub async fn get_pods(&self) -> Result<Vec<RunningPod>> {
        snapshot::list_pods(self.engine.as_ref()).await
    }

    /// Snapshot of one pod; empty if it is not running.
    pub async fn get_pod_status(&self, identity: &PodIdentity) -> Result<RunningPod> {
        snapshot::pod_status(self.engine.as_ref(), identity).await
    }

    /// Orchestrator status of `pod`.
    pub async fn get_api_pod_status(&self, pod: &PodSpec) -> Result<PodStatus> {
        let running = self.get_pod_status(&pod.identity()).await?;
        Ok(to_pod_status(pod, &running))
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Pulls `image` unless it is already present.
    ///
    /// Pull secrets scoped to the image's registry come first, then the
    /// keyring's credentials; the first one is used. The companion proxy
    /// image is pulled too when absent.
    pub async fn pull_image(&self, image: &str, pull_secrets: &[Credential]) -> Result<()> {
        let (repository, tag) = parse_image_name(image);
        if self.image_present(&repository, &tag).await {
            return Ok(());
        }

        let mut credentials = matching_credentials(pull_secrets, &repository);
        credentials.extend(self.keyring.lookup(&repository));
        let credential = match credentials.first() {
            Some(c) => encode_credential(c)?,
            None => {
                tracing::debug!(image = %image, "Pulling image without credentials");
                String::new()
            }
        };

        tracing::info!(image = %image, "Pulling image");
        self.engine
            .pull_image(image, &credential)
            .await
            .map_err(|e| Error::ImagePullFailed {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

        if self.config.pull_proxy_image {
            let (proxy_repo, proxy_tag) = parse_image_name(&self.config.proxy_image);
            if !self.image_present(&proxy_repo, &proxy_tag).await {
                tracing::info!(image = %self.config.proxy_image, "Pulling proxy image");
                self.engine
                    .pull_image(&self.config.proxy_image, &credential)
                    .await
                    .map_err(|e| Error::ImagePullFailed {
                        image: self.config.proxy_image.clone(),
                        reason: e.to_string(),
                    })?;
            }
        }

        Ok(())
    }

    /// Whether `image` is in the engine's local store.
    pub async fn is_image_present(&self, image: &str) -> Result<bool> {
        let (repository, tag) = parse_image_name(image);
        tracing::debug!(image = %image, "Checking image presence");
        self.engine.is_image_present(&repository, &tag).await
    }

    /// Images in the engine's local store.
    pub async fn list_images(&self) -> Result<Vec<Image>> {
        let images = self.engine.list_images().await?;
        Ok(images.into_iter().map(Image::from).collect())
    }

    /// Removes `image` from the engine's local store.
    pub async fn remove_image(&self, image: &str) -> Result<()> {
        tracing::info!(image = %image, "Removing image");
        self.engine.remove_image(image).await
    }

    /// Presence check where a failed query counts as absent.
    async fn image_present(&self, repository: &str, tag: &str) -> bool {
        match self.engine.is_image_present(repository, tag).await {
            Ok(present) => present,
            Err(e) => {
                tracing::debug!(
                    repository = %repository,
                    tag = %tag,
                    error = %e,
                    "Image presence check failed"
                );
                false
            }
        }
    }

    // =========================================================================
    // Day-2 Operations
    // =========================================================================

    /// Streams a container's logs into `stdout`. Returns the exit code of
    /// the log command.
    pub async fn container_logs<W>(
        &self,
        container_id: &str,
        options: &LogOptions,
        stdout: W,
    ) -> Result<i32>
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = strip_container_uri(container_id);
        tracing::debug!(container_id = %id, args = ?options.to_args(), "Streaming container logs");
        let session = self.engine.logs(id, options).await?;
        pump_session(session, None::<tokio::io::Empty>, Some(stdout)).await
    }

    /// Runs `command` in a container, wiring the caller's streams to its
    /// terminal. Returns the command's exit code.
    pub async fn exec_in_container<R, W>(
        &self,
        container_id: &str,
        command: &[String],
        tty: bool,
        stdin: Option<R>,
        stdout: W,
    ) -> Result<i32>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = strip_container_uri(container_id);
        tracing::debug!(container_id = %id, command = ?command, tty, "Exec in container");
        let session = self.engine.exec(id, command, tty).await?;
        pump_session(session, stdin, Some(stdout)).await
    }

    /// Attaches the caller's streams to a container's main process. Returns
    /// the process exit code.
    pub async fn attach_container<R, W>(
        &self,
        container_id: &str,
        tty: bool,
        stdin: Option<R>,
        stdout: W,
    ) -> Result<i32>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let id = strip_container_uri(container_id);
        tracing::debug!(container_id = %id, tty, "Attaching to container");
        let session = self.engine.attach(id, tty).await?;
        pump_session(session, stdin, Some(stdout)).await
    }

    /// Runs `command` in a container and returns its output.
    ///
    /// A non-zero exit code is an error.
    pub async fn run_in_container(&self, container_id: &str, command: &[String]) -> Result<Vec<u8>> {
        let id = strip_container_uri(container_id);
        let session = self.engine.exec(id, command, false).await?;
        let (code, output) = session.collect().await?;
        if code != 0 {
            return Err(Error::engine(
                "exec",
                format!(
                    "command {:?} exited with code {code}: {}",
                    command,
                    String::from_utf8_lossy(&output).trim_end()
                ),
            ));
        }
        Ok(output)
    }
}

// =============================================================================
// Create/Start Guard
// =============================================================================

/// A created but not yet started engine pod.
///
/// Removed again unless [`CreatedPod::start`] succeeds. If the guard is
/// dropped before that (the surrounding future was cancelled), removal is
/// spawned onto the current runtime.
struct CreatedPod {
    engine: Arc<dyn EngineClient>,
    pod_id: String,
    armed: bool,
}

impl CreatedPod {
    fn new(engine: Arc<dyn EngineClient>, pod_id: String) -> Self {
        Self {
            engine,
            pod_id,
            armed: true,
        }
    }

    /// Starts the pod. On success the pod is committed and its ID returned;
    /// on failure it is removed and the start error returned.
    async fn start(mut self) -> Result<String> {
        match self.engine.start_pod(&self.pod_id).await {
            Ok(()) => {
                self.armed = false;
                Ok(std::mem::take(&mut self.pod_id))
            }
            Err(e) => {
                self.rollback().await;
                Err(e)
            }
        }
    }

    async fn rollback(mut self) {
        self.armed = false;
        match self.engine.remove_pod(&self.pod_id).await {
            Ok(()) => tracing::debug!(pod_id = %self.pod_id, "Removed pod after failed start"),
            Err(e) => tracing::error!(
                pod_id = %self.pod_id,
                error = %e,
                "Failed to remove pod after failed start"
            ),
        }
    }
}

impl Drop for CreatedPod {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let engine = self.engine.clone();
        let pod_id = std::mem::take(&mut self.pod_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = engine.remove_pod(&pod_id).await {
                        tracing::error!(pod_id = %pod_id, error = %e, "Failed to remove abandoned pod");
                    }
                });
            }
            Err(_) => {
                tracing::error!(pod_id = %pod_id, "Abandoned created pod outside a runtime");
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Whether a registered instance without running containers should be
/// killed and created again.
///
/// Containers the engine has not settled yet mean the pod is still booting.
/// Once every container exited, the restart policy decides.
fn replace_registered_instance(pod: &PodSpec, instance: &RunningPod, previous: &PodStatus) -> bool {
    let full_name = pod.full_name();
    if instance
        .containers
        .iter()
        .any(|c| c.phase != ContainerPhase::Exited)
    {
        tracing::debug!(pod = %full_name, "Pod is still starting, leaving it alone");
        return false;
    }

    let restart = pod
        .containers
        .iter()
        .any(|c| should_restart_dead_container(c, pod.restart_policy, previous));
    if !restart {
        tracing::debug!(pod = %full_name, "Pod finished and its restart policy keeps it down");
    }
    restart
}

/// Splits an image reference into repository and tag.
///
/// - `nginx` → (`nginx`, `latest`)
/// - `nginx:1.25` → (`nginx`, `1.25`)
/// - `localhost:5000/app` → (`localhost:5000/app`, `latest`)
/// - `app@sha256:…` → (`app@sha256:…`, empty tag)
#[must_use]
pub fn parse_image_name(image: &str) -> (String, String) {
    if image.contains('@') {
        return (image.to_string(), String::new());
    }

    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rfind(':') {
        Some(i) => {
            let split = name_start + i;
            (image[..split].to_string(), image[split + 1..].to_string())
        }
        None => (image.to_string(), DEFAULT_IMAGE_TAG.to_string()),
    }
}

/// Base64url-encoded JSON, as the engine expects registry credentials.
fn encode_credential(credential: &Credential) -> Result<String> {
    let json = serde_json::to_vec(credential)?;
    Ok(base64::engine::general_purpose::URL_SAFE.encode(json))
}

/// Accepts both engine IDs and `hyper://` URIs.
fn strip_container_uri(container_id: &str) -> &str {
    let prefix = container_uri("");
    container_id.strip_prefix(prefix.as_str()).unwrap_or(container_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_name() {
        assert_eq!(
            parse_image_name("nginx"),
            ("nginx".to_string(), "latest".to_string())
        );
        assert_eq!(
            parse_image_name("nginx:1.25"),
            ("nginx".to_string(), "1.25".to_string())
        );
        assert_eq!(
            parse_image_name("localhost:5000/team/app"),
            ("localhost:5000/team/app".to_string(), "latest".to_string())
        );
        assert_eq!(
            parse_image_name("localhost:5000/app:v2"),
            ("localhost:5000/app".to_string(), "v2".to_string())
        );
        assert_eq!(parse_image_name("app@sha256:abc").1, "");
    }

    #[test]
    fn test_strip_container_uri() {
        assert_eq!(strip_container_uri("hyper://abc"), "abc");
        assert_eq!(strip_container_uri("abc"), "abc");
    }

    #[test]
    fn test_credential_is_urlsafe_json() {
        let cred = Credential {
            username: "u".to_string(),
            password: "p?>".to_string(),
            ..Default::default()
        };
        let encoded = encode_credential(&cred).unwrap();
        let decoded = base64::engine::general_purpose::URL_SAFE
            .decode(encoded)
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(json["username"], "u");
        assert_eq!(json["password"], "p?>");
    }
}
