//! Docker container fixtures.
//!
//! Each container type is described by a [`ContainerSpec`] marker so that
//! several containers can be registered side by side (fixtures are keyed
//! by type). The container is started on first use and stopped and removed
//! at teardown.
//!
//! ```rust,no_run
//! use containers::{ContainerConfig, ContainerFixture, ContainerSpec};
//! use suite::Registry;
//!
//! struct Redis;
//!
//! impl ContainerSpec for Redis {
//!     fn config() -> ContainerConfig {
//!         ContainerConfig::new("redis", "7-alpine")
//!             .port(6379)
//!             .wait_for_stdout("Ready to accept connections")
//!     }
//! }
//!
//! let fixtures = Registry::new();
//! fixtures.register(ContainerFixture::<Redis>::new());
//! ```

mod config;
mod docker;
mod fixture;

pub use config::{ContainerConfig, ImageConfig, PortConfig};
pub use docker::docker_available;
pub use fixture::{ContainerFixture, ContainerSpec};
