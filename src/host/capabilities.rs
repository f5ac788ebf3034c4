//! Platform capability check

use lazy_static::lazy_static;
use std::thread;

use crate::runtime::WorkerRuntime;

lazy_static! {
    /// Probed once per process
    static ref DETECTED: Capabilities = Capabilities::probe();
}

/// What the process can do for threads. Blob URLs live in-process and are
/// always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// OS threads can be spawned
    pub threads: bool,
    /// A worker engine context can be built
    pub engine: bool,
    /// Object URLs can be created and revoked
    pub object_urls: bool,
}

impl Capabilities {
    /// Capabilities of the current process
    pub fn detect() -> Self {
        *DETECTED
    }

    /// No capabilities; every thread construction fails
    pub fn none() -> Self {
        Self {
            threads: false,
            engine: false,
            object_urls: false,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.threads && self.engine && self.object_urls
    }

    fn probe() -> Self {
        // Build an engine on a spawned thread, the way workers do.
        let probe = thread::Builder::new()
            .name("strand-probe".to_string())
            .spawn(|| WorkerRuntime::new().is_ok());

        let (threads, engine) = match probe {
            Ok(handle) => (true, handle.join().unwrap_or(false)),
            Err(e) => {
                tracing::warn!(error = %e, "cannot spawn worker threads");
                (false, false)
            }
        };

        Self {
            threads,
            engine,
            object_urls: true,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}
