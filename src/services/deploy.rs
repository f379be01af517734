//! Cygnus redeployment on the local host or over SSH.
//!
//! One attempt walks `Idle -> Connected -> Stopped -> Started -> HealthChecked` and
//! [`DeploymentDriver::close`] brings it back to `Idle`. A failing step aborts the attempt;
//! store changes made before the redeploy are kept.

use crate::domain::constants::{
    AGENT_CONF_MOUNT, AGENT_CONTAINER_NAME, AGENT_FILE_NAME, AGENT_IMAGE_NAME,
    DEFAULT_ARTIFACTS_DIR, GROUPING_RULES_FILE_NAME, GROUPING_RULES_MOUNT,
};
use crate::domain::models::{DeploymentTarget, StorageSettings};
use crate::error::{BdtiError, Result};
use crate::services::channel::{CommandChannel, LocalShell, SshChannel};
use crate::services::docker::{agent_containers, ContainerRuntime, DockerCli, RunSpec, VolumeMount};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

pub const SETTLE_DELAY: Duration = Duration::from_secs(10);
const STORAGE_PROBE_SECS: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Idle,
    Connected,
    Stopped,
    Started,
    HealthChecked,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeployPhase::Idle => "idle",
            DeployPhase::Connected => "connected",
            DeployPhase::Stopped => "stopped",
            DeployPhase::Started => "started",
            DeployPhase::HealthChecked => "health_checked",
        };
        f.write_str(s)
    }
}

/// Regenerated artifacts are live once this returns.
pub trait Deployer {
    fn redeploy(&mut self) -> Result<()>;
    /// Ends any session opened ahead of a redeploy that may never have happened.
    fn release(&mut self) {}
}

pub struct DeploymentDriver {
    target: DeploymentTarget,
    channel: Rc<dyn CommandChannel>,
    runtime: Box<dyn ContainerRuntime>,
    local_agent: PathBuf,
    local_rules: PathBuf,
    remote_dir: PathBuf,
    storage_host: String,
    storage_port: String,
    settle: Duration,
    phase: DeployPhase,
}

impl DeploymentDriver {
    pub fn new(target: DeploymentTarget, artifacts_dir: &Path, storage: &StorageSettings) -> Self {
        let channel: Rc<dyn CommandChannel> = match &target {
            DeploymentTarget::Local { .. } => Rc::new(LocalShell::new()),
            DeploymentTarget::Remote { host, credentials } => {
                Rc::new(SshChannel::new(host, credentials.clone()))
            }
        };
        let runtime = Box::new(DockerCli::new(channel.clone()));
        Self::with_parts(target, channel, runtime, artifacts_dir, storage)
    }

    pub fn with_parts(
        target: DeploymentTarget,
        channel: Rc<dyn CommandChannel>,
        runtime: Box<dyn ContainerRuntime>,
        artifacts_dir: &Path,
        storage: &StorageSettings,
    ) -> Self {
        Self {
            target,
            channel,
            runtime,
            local_agent: artifacts_dir.join(AGENT_FILE_NAME),
            local_rules: artifacts_dir.join(GROUPING_RULES_FILE_NAME),
            remote_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            storage_host: storage.host.clone(),
            storage_port: storage.port.clone(),
            settle: SETTLE_DELAY,
            phase: DeployPhase::Idle,
        }
    }

    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn phase(&self) -> DeployPhase {
        self.phase
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    fn require(&self, step: &str, allowed: &[DeployPhase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(BdtiError::InvalidPhase {
                step: step.to_string(),
                phase: self.phase.to_string(),
            })
        }
    }

    /// Artifact paths as seen by the docker daemon on the agent host.
    fn agent_side_paths(&self) -> (PathBuf, PathBuf) {
        if self.target.is_remote() {
            (
                self.remote_dir.join(AGENT_FILE_NAME),
                self.remote_dir.join(GROUPING_RULES_FILE_NAME),
            )
        } else {
            (self.local_agent.clone(), self.local_rules.clone())
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        self.require("connect", &[DeployPhase::Idle])?;
        self.channel.verify()?;
        if self.target.is_remote() {
            tracing::info!(host = %self.target.host(), channel = %self.channel.describe(), "connected to Cygnus host");
        }
        self.phase = DeployPhase::Connected;
        Ok(())
    }

    /// Probes the storage backend from the agent host.
    pub fn check_storage_reachable(&self) -> Result<()> {
        let address = format!("{}:{}", self.storage_host, self.storage_port);
        let argv: Vec<String> = vec![
            "curl".to_string(),
            "-s".to_string(),
            "-o".to_string(),
            "/dev/null".to_string(),
            "--max-time".to_string(),
            STORAGE_PROBE_SECS.to_string(),
            address.clone(),
        ];

        let reachable = match self.channel.execute(&argv) {
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(error = %e, "storage probe could not run");
                false
            }
        };
        if !reachable {
            return Err(BdtiError::StorageUnreachable {
                host: self.storage_host.clone(),
                port: self.storage_port.clone(),
                is_remote: self.target.is_remote(),
                agent_host: self.target.host().to_string(),
            });
        }
        tracing::debug!(address = %address, "storage reachable");
        Ok(())
    }

    pub fn copy_artifacts(&mut self) -> Result<()> {
        self.require("copy_artifacts", &[DeployPhase::Connected])?;
        if !self.target.is_remote() {
            return Ok(());
        }
        let (agent, rules) = self.agent_side_paths();
        self.channel.upload(&self.local_agent, &agent)?;
        self.channel.upload(&self.local_rules, &rules)?;
        tracing::info!(host = %self.target.host(), "artifacts copied");
        Ok(())
    }

    fn agent_image(&self) -> Result<String> {
        self.runtime
            .list_images(AGENT_IMAGE_NAME)?
            .into_iter()
            .next()
            .ok_or_else(|| BdtiError::AgentImageNotFound(AGENT_IMAGE_NAME.to_string()))
    }

    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", &[DeployPhase::Connected])?;
        let image = self.agent_image()?;
        let containers = self.runtime.list_containers()?;
        for container in agent_containers(&containers, &image, AGENT_IMAGE_NAME) {
            self.runtime.stop_container(&container.id)?;
        }
        self.phase = DeployPhase::Stopped;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.require("start", &[DeployPhase::Stopped])?;
        let image = self.agent_image()?;
        let (agent, rules) = self.agent_side_paths();
        let spec = RunSpec {
            name: AGENT_CONTAINER_NAME.to_string(),
            image,
            host_network: true,
            mounts: vec![
                VolumeMount {
                    host_path: agent.display().to_string(),
                    container_path: AGENT_CONF_MOUNT.to_string(),
                    read_only: true,
                },
                VolumeMount {
                    host_path: rules.display().to_string(),
                    container_path: GROUPING_RULES_MOUNT.to_string(),
                    read_only: false,
                },
            ],
        };
        self.runtime.run_container(&spec)?;
        if !self.settle.is_zero() {
            std::thread::sleep(self.settle);
        }
        self.phase = DeployPhase::Started;
        Ok(())
    }

    /// A container for the agent image must be listed after start.
    pub fn verify(&mut self) -> Result<()> {
        self.require("verify", &[DeployPhase::Started])?;
        let image = self.agent_image()?;
        let containers = self.runtime.list_containers()?;
        if agent_containers(&containers, &image, AGENT_IMAGE_NAME).is_empty() {
            return Err(BdtiError::AgentNotRunning(image));
        }
        self.phase = DeployPhase::HealthChecked;
        Ok(())
    }

    pub fn close(&mut self) {
        if self.phase != DeployPhase::Idle && self.target.is_remote() {
            tracing::info!(host = %self.target.host(), "closing SSH session");
        }
        self.phase = DeployPhase::Idle;
    }

    fn cycle(&mut self) -> Result<()> {
        if self.phase == DeployPhase::Idle {
            self.connect()?;
        }
        self.copy_artifacts()?;
        self.stop()?;
        self.start()?;
        self.verify()
    }
}

impl Deployer for DeploymentDriver {
    fn redeploy(&mut self) -> Result<()> {
        tracing::info!(host = %self.target.host(), remote = self.target.is_remote(), "redeploying Cygnus");
        let result = self.cycle();
        self.close();
        if result.is_ok() {
            tracing::info!("Cygnus redeployed");
        }
        result
    }

    fn release(&mut self) {
        self.close();
    }
}
