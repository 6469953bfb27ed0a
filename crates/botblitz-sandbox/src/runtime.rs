// Container runtime seam: the docker CLI in production, fakes in tests.

use std::path::PathBuf;
use std::process::Output;

use anyhow::{bail, Context};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::artifacts::ContainerLogs;
use crate::error::SandboxError;

/// Everything needed to start one bot container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Published on the host and inside the container.
    pub port: u16,
    pub memory_mb: u32,
    pub cpus: f64,
    /// Host directory mounted read-only at `mount_target`.
    pub mount_source: PathBuf,
    pub mount_target: String,
    pub env: Vec<(String, String)>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Start a detached container and return its id.
    async fn start(&self, spec: &ContainerSpec) -> Result<String, SandboxError>;
    async fn logs(&self, id: &str) -> anyhow::Result<ContainerLogs>;
    async fn kill(&self, id: &str) -> anyhow::Result<()>;
    async fn remove(&self, id: &str) -> anyhow::Result<()>;
    /// Force-remove every container whose name starts with `name_prefix`.
    async fn sweep(&self, name_prefix: &str) -> anyhow::Result<usize>;
    /// Last-resort synchronous removal, used when an async teardown never ran.
    fn force_remove_blocking(&self, id: &str);
}

/// Drives containers through the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn docker(&self, args: &[String]) -> anyhow::Result<Output> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.binary))?;
        Ok(output)
    }

    async fn docker_ok(&self, args: &[String]) -> anyhow::Result<String> {
        let output = self.docker(args).await?;
        if !output.status.success() {
            bail!(
                "{} {} exited with {}: {}",
                self.binary,
                args.first().map(String::as_str).unwrap_or(""),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Arguments for `docker run`.
pub(crate) fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--memory".to_string(),
        format!("{}m", spec.memory_mb),
        "--cpus".to_string(),
        format!("{}", spec.cpus),
        "--publish".to_string(),
        format!("{0}:{0}", spec.port),
        "--volume".to_string(),
        format!("{}:{}:ro", spec.mount_source.display(), spec.mount_target),
    ];
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(spec.image.clone());
    args
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn start(&self, spec: &ContainerSpec) -> Result<String, SandboxError> {
        let stdout = self
            .docker_ok(&run_args(spec))
            .await
            .map_err(|e| SandboxError::Launch {
                message: format!("{e:#}"),
            })?;
        let id = stdout.trim().to_string();
        if id.is_empty() {
            return Err(SandboxError::Launch {
                message: "docker run printed no container id".to_string(),
            });
        }
        Ok(id)
    }

    async fn logs(&self, id: &str) -> anyhow::Result<ContainerLogs> {
        let output = self.docker(&["logs".to_string(), id.to_string()]).await?;
        if !output.status.success() {
            bail!("docker logs {id} exited with {}", output.status);
        }
        // docker logs replays the container's streams on its own stdout/stderr
        Ok(ContainerLogs {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn kill(&self, id: &str) -> anyhow::Result<()> {
        self.docker_ok(&["kill".to_string(), id.to_string()]).await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> anyhow::Result<()> {
        self.docker_ok(&["rm".to_string(), "--force".to_string(), id.to_string()])
            .await?;
        Ok(())
    }

    async fn sweep(&self, name_prefix: &str) -> anyhow::Result<usize> {
        let listed = self
            .docker_ok(&[
                "ps".to_string(),
                "--all".to_string(),
                "--quiet".to_string(),
                "--filter".to_string(),
                format!("name=^{name_prefix}"),
            ])
            .await?;
        let ids: Vec<&str> = listed.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        for id in &ids {
            self.remove(id).await?;
        }
        Ok(ids.len())
    }

    fn force_remove_blocking(&self, id: &str) {
        let _ = std::process::Command::new(&self.binary)
            .args(["rm", "--force", id])
            .output();
    }
}
