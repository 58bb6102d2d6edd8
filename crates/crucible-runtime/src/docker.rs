// SPDX-License-Identifier: MIT

//! [`ContainerRuntime`] backed by the Docker Engine API via `bollard`.

use crate::error::{Result, RuntimeError};
use crate::runtime::{ContainerRuntime, LOG_TAIL_CAP_BYTES};
use crate::spec::{ContainerSpec, ExitStatus};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::TryStreamExt;
use std::time::Duration;
use tracing::debug;

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects using `DOCKER_HOST` if set, otherwise the platform default
    /// socket (spec.md's Configuration module, `DOCKER_HOST`).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Control { op: "connect", source: e })?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn pull(&self, image: &str) -> Result<()> {
        let options = Some(CreateImageOptions { from_image: image, ..Default::default() });
        self.docker
            .create_image(options, None, None)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| RuntimeError::Pull(e.to_string()))?;
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let host_config = HostConfig {
            memory: Some(spec.memory_bytes),
            nano_cpus: Some(spec.nano_cpus),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            ..Default::default()
        };
        let config = Config {
            image: Some(spec.image.clone()),
            cmd: if spec.command.is_empty() { None } else { Some(spec.command.clone()) },
            env: if env.is_empty() { None } else { Some(env) },
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions { name: spec.name.clone(), platform: None };
        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| RuntimeError::Create(e.to_string()))?;
        debug!(container_id = %response.id, name = %spec.name, "container created");
        Ok(response.id)
    }

    async fn start(&self, container_id: &str) -> Result<()> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RuntimeError::Start(e.to_string()))
    }

    async fn wait(&self, container_id: &str) -> Result<ExitStatus> {
        let options = Some(WaitContainerOptions { condition: "not-running" });
        let mut stream = self.docker.wait_container(container_id, options);
        match stream.try_next().await {
            Ok(Some(result)) => Ok(ExitStatus::Exited(result.status_code)),
            Ok(None) => Ok(ExitStatus::Unknown),
            Err(bollard::errors::Error::DockerContainerWaitError { code, .. }) => Ok(ExitStatus::Exited(code)),
            Err(e) => Err(RuntimeError::Wait(e.to_string())),
        }
    }

    async fn pause(&self, container_id: &str) -> Result<()> {
        self.docker
            .pause_container(container_id)
            .await
            .map_err(|e| RuntimeError::Control { op: "pause", source: e })
    }

    async fn unpause(&self, container_id: &str) -> Result<()> {
        self.docker
            .unpause_container(container_id)
            .await
            .map_err(|e| RuntimeError::Control { op: "unpause", source: e })
    }

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<()> {
        let options = Some(StopContainerOptions { t: grace.as_secs() as i64 });
        self.docker
            .stop_container(container_id, options)
            .await
            .map_err(|e| RuntimeError::Control { op: "stop", source: e })
    }

    async fn remove(&self, container_id: &str) -> Result<()> {
        let options = Some(RemoveContainerOptions { force: true, ..Default::default() });
        self.docker
            .remove_container(container_id, options)
            .await
            .map_err(|e| RuntimeError::Control { op: "remove", source: e })
    }

    async fn logs_tail(&self, container_id: &str) -> Result<String> {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        });
        let chunks = self
            .docker
            .logs(container_id, options)
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| RuntimeError::Control { op: "logs", source: e })?;

        let mut combined = Vec::new();
        for chunk in chunks {
            combined.extend_from_slice(&chunk.into_bytes());
        }
        if combined.len() > LOG_TAIL_CAP_BYTES {
            let start = combined.len() - LOG_TAIL_CAP_BYTES;
            combined.drain(..start);
        }
        Ok(String::from_utf8_lossy(&combined).into_owned())
    }
}
