//! The host: owner of threads, groups and object URLs
//!
//! A [`Host`] plays the part of the page that creates workers. It holds the
//! blob store programs are published to, the loader workers import scripts
//! with and the group index. Worker events are delivered only when the host
//! is pumped with [`Host::poll`] or [`Host::run_until_idle`], so every
//! callback runs on the thread that owns the host.

pub mod capabilities;
pub mod config;

pub use capabilities::Capabilities;
pub use config::HostConfig;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::group::{GroupId, GroupIndex, ThreadGroup};
use crate::runtime::{BlobStore, ScriptLoader};
use crate::synth::ThreadSpec;
use crate::thread::{Thread, ThreadResult};

struct HostInner {
    config: HostConfig,
    blobs: Arc<BlobStore>,
    loader: ScriptLoader,
    index: Rc<RefCell<GroupIndex>>,
}

impl HostInner {
    fn shutdown(&self) -> usize {
        // No index borrow may be held while killing.
        let threads = self.index.borrow_mut().clear();
        let killed = threads
            .iter()
            .filter(|thread| thread.kill().is_some())
            .count();
        self.blobs.clear();
        killed
    }
}

impl Drop for HostInner {
    fn drop(&mut self) {
        let killed = self.shutdown();
        if killed > 0 {
            debug!(killed, "host dropped with live threads");
        }
    }
}

/// Handle to a host. Clones share the same threads and groups.
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

impl Host {
    pub fn new() -> Self {
        Self::with_config(HostConfig::default())
    }

    pub fn with_config(config: HostConfig) -> Self {
        let blobs = Arc::new(BlobStore::new());
        let loader = ScriptLoader::new(Arc::clone(&blobs), config.base_path.clone());

        Self {
            inner: Rc::new(HostInner {
                config,
                blobs,
                loader,
                index: Rc::new(RefCell::new(GroupIndex::new())),
            }),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// Whether threads can be created on this host
    pub fn is_supported(&self) -> bool {
        self.inner.config.capabilities.is_supported()
    }

    /// Create a thread for `spec`
    pub fn spawn(&self, spec: impl Into<ThreadSpec>) -> ThreadResult<Thread> {
        Thread::new(self, spec)
    }

    /// The group every new thread starts in
    pub fn default_group(&self) -> ThreadGroup {
        ThreadGroup::with_id(self, GroupId::default_group())
    }

    /// A new, empty group
    pub fn group(&self) -> ThreadGroup {
        ThreadGroup::new(self)
    }

    /// Every thread created on this host and not yet shut down.
    ///
    /// Killed and errored threads stay registered, and keep their group,
    /// until [`prune`](Self::prune) or [`shutdown`](Self::shutdown).
    pub fn threads(&self) -> Vec<Thread> {
        self.inner.index.borrow().threads()
    }

    /// Unregister terminated and errored threads from every group.
    pub fn prune(&self) -> Vec<Thread> {
        let pruned = self.inner.index.borrow_mut().remove_terminated();
        debug!(pruned = pruned.len(), "pruned dead threads");
        pruned
    }

    pub fn blob_store(&self) -> &Arc<BlobStore> {
        &self.inner.blobs
    }

    pub(crate) fn loader(&self) -> &ScriptLoader {
        &self.inner.loader
    }

    pub(crate) fn index(&self) -> &Rc<RefCell<GroupIndex>> {
        &self.inner.index
    }

    /// Deliver pending worker events of every live thread.
    ///
    /// Returns the number of events handled. Every thread is polled even when
    /// one fails; the first error is returned.
    pub fn poll(&self) -> ThreadResult<usize> {
        let mut handled = 0;
        let mut first_error = None;

        // Snapshot: callbacks may create threads or regroup them.
        for thread in self.threads() {
            if thread.is_terminated() {
                continue;
            }
            match thread.poll() {
                Ok(n) => handled += n,
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(handled),
        }
    }

    /// Pump events until no thread is running.
    ///
    /// Returns `false` when `timeout` elapses first.
    pub fn run_until_idle(&self, timeout: Duration) -> ThreadResult<bool> {
        let deadline = Instant::now() + timeout;

        loop {
            self.poll()?;

            if !self.threads().iter().any(Thread::is_running) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(self.inner.config.poll_interval);
        }
    }

    /// Kill every thread and forget them. Returns how many were still alive.
    pub fn shutdown(&self) -> usize {
        let killed = self.inner.shutdown();
        info!(killed, "host shut down");
        killed
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Host")
            .field("location", &self.inner.config.location.as_ref().map(|l| l.as_str()))
            .field("threads", &self.inner.index.borrow().threads().len())
            .field("blobs", &self.inner.blobs.len())
            .finish()
    }
}
