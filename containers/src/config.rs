use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Image reference, e.g. `mysql:8`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    pub name: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

impl ImageConfig {
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

fn default_tag() -> String {
    "latest".to_string()
}

/// A container port to expose. `outside` pins the host port; `None` lets
/// docker pick a free one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub inside: u16,
    #[serde(default)]
    pub outside: Option<u16>,
}

/// How to start a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: ImageConfig,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// Setup completes once this line appears on stdout
    #[serde(default)]
    pub wait_for_stdout: Option<String>,
    #[serde(default)]
    pub startup_timeout: Option<Duration>,
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            image: ImageConfig {
                name: name.into(),
                tag: tag.into(),
            },
            ports: Vec::new(),
            environment: BTreeMap::new(),
            wait_for_stdout: None,
            startup_timeout: None,
        }
    }

    pub fn port(mut self, inside: u16) -> Self {
        self.ports.push(PortConfig {
            inside,
            outside: None,
        });
        self
    }

    pub fn mapped_port(mut self, inside: u16, outside: u16) -> Self {
        self.ports.push(PortConfig {
            inside,
            outside: Some(outside),
        });
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn wait_for_stdout(mut self, message: impl Into<String>) -> Self {
        self.wait_for_stdout = Some(message.into());
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = Some(timeout);
        self
    }
}
