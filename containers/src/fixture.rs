use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use anyhow::{Context, bail};
use parking_lot::Mutex;
use suite::{Fixture, SetupContext};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, ContainerRequest, GenericImage, ImageExt};
use tracing::{info, warn};

use crate::config::ContainerConfig;
use crate::docker::docker_available;

/// Describes one kind of container. Implement it on a marker type and
/// register `ContainerFixture<Marker>`.
pub trait ContainerSpec: Send + Sync + 'static {
    fn config() -> ContainerConfig;
}

/// A docker container started on first use and removed at teardown.
pub struct ContainerFixture<S> {
    config: ContainerConfig,
    container: Mutex<Option<Container<GenericImage>>>,
    host_ports: HashMap<u16, u16>,
    _spec: PhantomData<fn() -> S>,
}

impl<S: ContainerSpec> ContainerFixture<S> {
    pub fn new() -> Self {
        Self::with_config(S::config())
    }
}

impl<S: ContainerSpec> Default for ContainerFixture<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ContainerFixture<S> {
    /// Use `config` instead of `S::config()`, e.g. to pin host ports.
    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            container: Mutex::new(None),
            host_ports: HashMap::new(),
            _spec: PhantomData,
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Host port bound to container port `inside`, once started.
    pub fn host_port(&self, inside: u16) -> Option<u16> {
        self.host_ports.get(&inside).copied()
    }

    pub fn id(&self) -> Option<String> {
        self.container.lock().as_ref().map(|c| c.id().to_string())
    }

    pub fn is_running(&self) -> bool {
        self.container
            .lock()
            .as_ref()
            .is_some_and(|c| c.is_running().unwrap_or(false))
    }

    fn request(&self) -> ContainerRequest<GenericImage> {
        let mut image = GenericImage::new(&self.config.image.name, &self.config.image.tag);
        for port in &self.config.ports {
            image = image.with_exposed_port(ContainerPort::Tcp(port.inside));
        }
        if let Some(message) = &self.config.wait_for_stdout {
            image = image.with_wait_for(WaitFor::message_on_stdout(message));
        }

        let mut request = ContainerRequest::from(image);
        for port in &self.config.ports {
            if let Some(outside) = port.outside {
                request = request.with_mapped_port(outside, ContainerPort::Tcp(port.inside));
            }
        }
        for (key, value) in &self.config.environment {
            request = request.with_env_var(key, value);
        }
        if let Some(timeout) = self.config.startup_timeout {
            request = request.with_startup_timeout(timeout);
        }
        request
    }
}

impl<S: ContainerSpec> Fixture for ContainerFixture<S> {
    fn setup(&mut self, _cx: &SetupContext<'_>) -> anyhow::Result<()> {
        let image = self.config.image.reference();
        if !docker_available() {
            bail!("cannot start {image}: docker daemon is not reachable");
        }

        let container = self
            .request()
            .start()
            .with_context(|| format!("failed to start {image} container"))?;

        for port in &self.config.ports {
            let host_port = container
                .get_host_port_ipv4(port.inside)
                .with_context(|| format!("failed to read host port for {image}:{}", port.inside))?;
            self.host_ports.insert(port.inside, host_port);
        }

        info!(image = %image, id = container.id(), ports = ?self.host_ports, "container fixture started");
        *self.container.get_mut() = Some(container);
        Ok(())
    }

    fn teardown(&self) -> anyhow::Result<()> {
        let Some(container) = self.container.lock().take() else {
            return Ok(());
        };
        let image = self.config.image.reference();
        let id = container.id().to_string();

        if let Err(e) = container.stop() {
            warn!(image = %image, id = %id, error = %e, "failed to stop container, removing anyway");
        }
        container
            .rm()
            .with_context(|| format!("failed to remove {image} container {id}"))?;
        info!(image = %image, id = %id, "container fixture removed");
        Ok(())
    }
}

impl<S> fmt::Debug for ContainerFixture<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFixture")
            .field("image", &self.config.image.reference())
            .field("host_ports", &self.host_ports)
            .finish_non_exhaustive()
    }
}
