//! Host configuration

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::capabilities::Capabilities;
use crate::runtime::RuntimeConfig;
use crate::synth::WorkerLocation;
use crate::thread::{ThreadError, ThreadResult};

/// Host configuration
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// URL the host is "served from". Workers see it as `self.location` and
    /// relative dependencies resolve against its origin. `None` stands for
    /// the `file:///` root.
    pub location: Option<Url>,
    /// Directory plain script paths are read from
    pub base_path: PathBuf,
    /// What the platform supports
    pub capabilities: Capabilities,
    /// Sleep between event pump rounds, also the worker wake-up interval
    pub poll_interval: Duration,
    /// Maximum JS call depth inside workers
    pub recursion_limit: usize,
    /// Maximum VM stack size inside workers
    pub stack_size_limit: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        let base_path = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let location = Url::from_directory_path(&base_path).ok();
        let engine = RuntimeConfig::default();

        Self {
            location,
            base_path,
            capabilities: Capabilities::detect(),
            poll_interval: engine.poll_interval,
            recursion_limit: engine.recursion_limit,
            stack_size_limit: engine.stack_size_limit,
        }
    }
}

impl HostConfig {
    /// Defaults overridden from the environment:
    ///
    /// - `STRAND_LOCATION`: host location URL
    /// - `STRAND_BASE_PATH`: directory for plain script paths
    /// - `STRAND_POLL_INTERVAL_MS`: event pump interval
    pub fn from_env() -> ThreadResult<Self> {
        let mut config = Self::default();

        if let Ok(location) = std::env::var("STRAND_LOCATION") {
            let url = Url::parse(&location).map_err(|e| {
                ThreadError::Config(format!("STRAND_LOCATION '{}': {}", location, e))
            })?;
            config.location = Some(url);
        }

        if let Ok(base_path) = std::env::var("STRAND_BASE_PATH") {
            config.base_path = PathBuf::from(base_path);
        }

        if let Some(ms) = std::env::var("STRAND_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn with_location(mut self, location: Url) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// The location as worker programs see it
    pub fn worker_location(&self) -> WorkerLocation {
        self.location
            .as_ref()
            .map(WorkerLocation::from)
            .unwrap_or_default()
    }

    /// Engine settings handed to every worker
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            recursion_limit: self.recursion_limit,
            stack_size_limit: self.stack_size_limit,
            poll_interval: self.poll_interval,
        }
    }
}
