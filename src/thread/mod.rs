//! Threads: host-side handles for background workers
//!
//! A [`Thread`] owns one worker running the program synthesized for its user
//! function. Calls are made with [`Thread::send`]; the worker answers with
//! [frames](frame::Frame) that the host event pump ([`Host::poll`]) turns into
//! callback invocations on the host thread.
//!
//! ```text
//!            send                      completion (no call left)
//!   Idle ──────────────> Running ─────────────────────────────> Idle
//!                         │  ▲ progress / completion (calls left)
//!                         │  └───┘
//!                         └─ stop() ──> Idle (fresh worker, calls dropped)
//!
//!   Idle | Running ── kill() ──> Terminated
//!   Idle | Running ── uncaught worker error ──> Errored
//! ```
//!
//! [`Host::poll`]: crate::host::Host::poll

pub mod error;
pub mod frame;
pub mod status;

pub use error::{ThreadError, ThreadResult};
pub use frame::{Frame, FrameKind};
pub use status::Status;

use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::group::{GroupId, GroupIndex};
use crate::host::Host;
use crate::runtime::{BlobStore, RuntimeConfig, ScriptLoader, Worker, WorkerEvent};
use crate::synth::{PROGRAM_CONTENT_TYPE, ScriptFunction, ThreadSpec, synthesize};

/// Callback for call results: receives the payload and the thread status at
/// the time of delivery.
pub type Callback = Box<dyn FnMut(Value, Status)>;

/// Unique thread id, `thread#<uuid>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadId(String);

impl ThreadId {
    fn new() -> Self {
        Self(format!("thread#{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operations shared by threads and thread groups
pub trait Lifecycle {
    /// Terminate for good. `None` when there was nothing to kill.
    fn kill(&self) -> Option<bool>;

    /// Abort running calls but stay usable. `None` when nothing was running.
    fn stop(&self) -> Option<bool>;
}

enum Listener {
    /// One callback for progress and completion
    Single(Callback),
    Split {
        on_progress: Callback,
        on_complete: Callback,
    },
}

impl Listener {
    fn progress(&mut self, payload: Value, status: Status) {
        match self {
            Listener::Single(callback) => callback(payload, status),
            Listener::Split { on_progress, .. } => on_progress(payload, status),
        }
    }

    fn complete(self, payload: Value, status: Status) {
        match self {
            Listener::Single(mut callback) => callback(payload, status),
            Listener::Split {
                mut on_complete, ..
            } => on_complete(payload, status),
        }
    }
}

struct PendingCall {
    seq: u64,
    /// Taken out while a progress callback runs
    listener: Option<Listener>,
    /// A malformed frame was received for this call; its result is discarded
    failed: bool,
}

struct ThreadState {
    status: Status,
    worker: Option<Worker>,
    pending: VecDeque<PendingCall>,
    next_seq: u64,
}

struct ThreadInner {
    id: ThreadId,
    function: ScriptFunction,
    program_url: String,
    blobs: Arc<BlobStore>,
    loader: ScriptLoader,
    engine: RuntimeConfig,
    index: Weak<RefCell<GroupIndex>>,
    state: RefCell<ThreadState>,
}

/// Handle to a background worker running one user function.
///
/// Cloning the handle does not clone the worker; all clones control the same
/// thread.
#[derive(Clone)]
pub struct Thread {
    inner: Rc<ThreadInner>,
}

impl Thread {
    /// Build the worker program for `spec` and start a worker for it.
    ///
    /// The thread starts `Idle` in the host's default group.
    pub fn new(host: &Host, spec: impl Into<ThreadSpec>) -> ThreadResult<Self> {
        let config = host.config();
        if !config.capabilities.is_supported() {
            return Err(ThreadError::Unsupported);
        }

        let spec = spec.into();
        let id = ThreadId::new();
        let location = config.worker_location();
        let program = synthesize(&spec, id.as_str(), &location)?;

        let blobs = Arc::clone(host.blob_store());
        let program_url = blobs.create_object_url(program.into_text(), PROGRAM_CONTENT_TYPE);
        let engine = config.runtime_config();

        let worker = match Worker::spawn(&program_url, host.loader().clone(), engine.clone()) {
            Ok(worker) => worker,
            Err(e) => {
                blobs.revoke_object_url(&program_url);
                return Err(e.into());
            }
        };

        let thread = Self {
            inner: Rc::new(ThreadInner {
                id,
                function: spec.function,
                program_url,
                blobs,
                loader: host.loader().clone(),
                engine,
                index: Rc::downgrade(host.index()),
                state: RefCell::new(ThreadState {
                    status: Status::Idle,
                    worker: Some(worker),
                    pending: VecDeque::new(),
                    next_seq: 0,
                }),
            }),
        };

        host.index()
            .borrow_mut()
            .assign(&thread, &GroupId::default_group());

        info!(thread = %thread.id(), url = %thread.program_url(), "thread created");
        Ok(thread)
    }

    /// Send `payload` to the worker. `callback` receives progress reports and
    /// the return value.
    ///
    /// Returns `false` when the thread is terminated.
    pub fn send<F>(&self, payload: impl Into<Value>, callback: F) -> bool
    where
        F: FnMut(Value, Status) + 'static,
    {
        self.enqueue(payload.into(), Some(Listener::Single(Box::new(callback))))
    }

    /// Like [`send`](Self::send) with separate progress and completion callbacks
    pub fn send_with<P, C>(&self, payload: impl Into<Value>, on_progress: P, on_complete: C) -> bool
    where
        P: FnMut(Value, Status) + 'static,
        C: FnMut(Value, Status) + 'static,
    {
        self.enqueue(
            payload.into(),
            Some(Listener::Split {
                on_progress: Box::new(on_progress),
                on_complete: Box::new(on_complete),
            }),
        )
    }

    /// Send `payload` without listening for the result
    pub fn post(&self, payload: impl Into<Value>) -> bool {
        self.enqueue(payload.into(), None)
    }

    fn enqueue(&self, payload: Value, listener: Option<Listener>) -> bool {
        let mut state = self.inner.state.borrow_mut();
        if !state.status.accepts_calls() {
            return false;
        }
        let Some(worker) = state.worker.as_ref() else {
            return false;
        };
        if let Err(e) = worker.post(payload) {
            warn!(thread = %self.inner.id, error = %e, "could not post message");
            return false;
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push_back(PendingCall {
            seq,
            listener,
            failed: false,
        });
        state.status = Status::Running;

        debug!(thread = %self.inner.id, pending = state.pending.len(), "message sent");
        true
    }

    /// Abort every running call by replacing the worker with a fresh one
    /// started from the same program.
    ///
    /// Returns `None` unless the thread is running, `Some(false)` if the new
    /// worker could not be started (the thread is then errored).
    pub fn stop(&self) -> Option<bool> {
        let (discarded, relaunched) = {
            let mut state = self.inner.state.borrow_mut();
            if state.status != Status::Running {
                return None;
            }

            if let Some(worker) = state.worker.take() {
                worker.terminate();
            }
            let discarded = std::mem::take(&mut state.pending);

            match Worker::spawn(
                &self.inner.program_url,
                self.inner.loader.clone(),
                self.inner.engine.clone(),
            ) {
                Ok(worker) => {
                    state.worker = Some(worker);
                    state.status = Status::Idle;
                    (discarded, true)
                }
                Err(e) => {
                    error!(thread = %self.inner.id, error = %e, "could not restart worker");
                    state.status = Status::Errored;
                    (discarded, false)
                }
            }
        };

        if !relaunched {
            self.inner.blobs.revoke_object_url(&self.inner.program_url);
        }
        info!(thread = %self.inner.id, dropped = discarded.len(), "thread stopped");
        Some(relaunched)
    }

    /// Terminate the worker and release the program.
    ///
    /// Returns `None` when the thread is already terminated.
    pub fn kill(&self) -> Option<bool> {
        let discarded = {
            let mut state = self.inner.state.borrow_mut();
            if state.status.is_terminal() {
                return None;
            }
            if let Some(worker) = state.worker.take() {
                worker.terminate();
            }
            state.status = Status::Terminated;
            std::mem::take(&mut state.pending)
        };

        let revoked = self.inner.blobs.revoke_object_url(&self.inner.program_url);
        info!(
            thread = %self.inner.id,
            revoked,
            dropped = discarded.len(),
            "thread killed"
        );
        Some(true)
    }

    /// Deliver every event the worker has posted so far.
    ///
    /// Returns the number of events handled. An uncaught error in the worker
    /// errors the thread and is returned as [`ThreadError::Runtime`]; a
    /// malformed frame is returned as [`ThreadError::Protocol`] and leaves the
    /// thread usable. Events after the failing one stay queued.
    pub fn poll(&self) -> ThreadResult<usize> {
        let mut handled = 0;

        loop {
            let event = {
                let state = self.inner.state.borrow();
                if state.status.is_terminal() {
                    break;
                }
                match state.worker.as_ref().and_then(Worker::next_event) {
                    Some(event) => event,
                    None => break,
                }
            };
            handled += 1;

            match event {
                WorkerEvent::Ready => {
                    debug!(thread = %self.inner.id, "worker ready");
                }
                WorkerEvent::Message(message) => self.handle_message(message)?,
                WorkerEvent::Error(message) => return Err(self.fail(message)),
                WorkerEvent::Close => {
                    info!(thread = %self.inner.id, "worker closed itself");
                    self.kill();
                }
            }
        }

        Ok(handled)
    }

    fn handle_message(&self, message: Value) -> ThreadResult<()> {
        let frame = match Frame::decode(message) {
            Ok(frame) => frame,
            Err(reason) => {
                self.fail_front_call();
                warn!(thread = %self.inner.id, error = %reason, "malformed frame");
                return Err(ThreadError::Protocol {
                    thread: self.inner.id.to_string(),
                    message: reason,
                });
            }
        };

        match frame.kind {
            FrameKind::Progress => self.deliver_progress(frame.payload),
            FrameKind::Completion => self.deliver_completion(frame.payload)?,
        }
        Ok(())
    }

    fn deliver_progress(&self, payload: Value) {
        let taken = {
            let mut state = self.inner.state.borrow_mut();
            match state.pending.front_mut() {
                Some(call) if !call.failed => call.listener.take().map(|l| (call.seq, l)),
                _ => None,
            }
        };

        let Some((seq, mut listener)) = taken else {
            debug!(thread = %self.inner.id, "progress without listener dropped");
            return;
        };

        listener.progress(payload, Status::Running);

        // The callback may have stopped or killed the thread.
        let mut state = self.inner.state.borrow_mut();
        if let Some(call) = state.pending.front_mut() {
            if call.seq == seq && call.listener.is_none() {
                call.listener = Some(listener);
            }
        }
    }

    fn deliver_completion(&self, payload: Value) -> ThreadResult<()> {
        let (call, status) = {
            let mut state = self.inner.state.borrow_mut();
            let Some(call) = state.pending.pop_front() else {
                return Err(ThreadError::Protocol {
                    thread: self.inner.id.to_string(),
                    message: "completion frame without a pending call".to_string(),
                });
            };
            if state.pending.is_empty() && state.status == Status::Running {
                state.status = Status::Idle;
            }
            (call, state.status)
        };

        debug!(thread = %self.inner.id, status = %status, "call completed");
        if !call.failed {
            if let Some(listener) = call.listener {
                listener.complete(payload, status);
            }
        }
        Ok(())
    }

    /// Drop the callbacks of the oldest call. It stays queued so its
    /// completion frame is still matched to it.
    fn fail_front_call(&self) {
        let dropped = {
            let mut state = self.inner.state.borrow_mut();
            state.pending.front_mut().and_then(|call| {
                call.failed = true;
                call.listener.take()
            })
        };
        drop(dropped);
    }

    fn fail(&self, message: String) -> ThreadError {
        error!(thread = %self.inner.id, error = %message, "uncaught error in worker");
        self.kill();
        self.inner.state.borrow_mut().status = Status::Errored;
        ThreadError::Runtime {
            thread: self.inner.id.to_string(),
            message,
        }
    }

    pub fn id(&self) -> &ThreadId {
        &self.inner.id
    }

    pub fn status(&self) -> Status {
        self.inner.state.borrow().status
    }

    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    /// Idle and ready for calls
    pub fn is_waiting(&self) -> bool {
        self.status() == Status::Idle
    }

    /// Terminated or errored
    pub fn is_terminated(&self) -> bool {
        self.status().is_terminal()
    }

    /// Number of calls still in flight
    pub fn pending_calls(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    /// Group the thread currently belongs to. `None` once the host is gone.
    pub fn group_id(&self) -> Option<GroupId> {
        let index = self.inner.index.upgrade()?;
        let index = index.borrow();
        index.group_of(&self.inner.id).cloned()
    }

    /// The user function this thread runs
    pub fn source(&self) -> &ScriptFunction {
        &self.inner.function
    }

    /// Blob URL of the worker program
    pub fn program_url(&self) -> &str {
        &self.inner.program_url
    }
}

impl Lifecycle for Thread {
    fn kill(&self) -> Option<bool> {
        Thread::kill(self)
    }

    fn stop(&self) -> Option<bool> {
        Thread::stop(self)
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .field("program_url", &self.inner.program_url)
            .finish()
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object Thread {}]", self.inner.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Capabilities, HostConfig};
    use serde_json::json;
    use std::cell::Cell;
    use std::time::Duration;
    use url::Url;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn function(source: &str) -> ScriptFunction {
        ScriptFunction::parse(source).unwrap()
    }

    fn results() -> (Rc<RefCell<Vec<(Value, Status)>>>, impl FnMut(Value, Status) + 'static) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        (seen, move |payload, status| sink.borrow_mut().push((payload, status)))
    }

    #[test]
    fn test_send_and_complete() {
        let host = Host::new();
        let thread = host.spawn(function("payload => payload * 2")).unwrap();
        assert!(thread.is_waiting());

        let (seen, callback) = results();
        assert!(thread.send(21, callback));
        assert_eq!(thread.status(), Status::Running);

        assert!(host.run_until_idle(TIMEOUT).unwrap());
        assert_eq!(*seen.borrow(), vec![(json!(42), Status::Idle)]);
        assert_eq!(thread.status(), Status::Idle);
    }

    #[test]
    fn test_status_is_idle_inside_completion_callback() {
        let host = Host::new();
        let thread = host.spawn(function("x => x")).unwrap();
        let observed = Rc::new(Cell::new(None));

        let probe = thread.clone();
        let slot = Rc::clone(&observed);
        thread.send(1, move |_, _| slot.set(Some(probe.status())));

        host.run_until_idle(TIMEOUT).unwrap();
        assert_eq!(observed.get(), Some(Status::Idle));
    }

    #[test]
    fn test_progress_frames() {
        let host = Host::new();
        let thread = host
            .spawn(function(
                "function (n) { for (var i = 1; i <= n; i++) { this.send(i); } return 'done'; }",
            ))
            .unwrap();

        let (progress, on_progress) = results();
        let (complete, on_complete) = results();
        assert!(thread.send_with(3, on_progress, on_complete));
        host.run_until_idle(TIMEOUT).unwrap();

        assert_eq!(
            *progress.borrow(),
            vec![
                (json!(1), Status::Running),
                (json!(2), Status::Running),
                (json!(3), Status::Running)
            ]
        );
        assert_eq!(*complete.borrow(), vec![(json!("done"), Status::Idle)]);
    }

    #[test]
    fn test_single_callback_receives_progress_and_completion() {
        let host = Host::new();
        let thread = host
            .spawn(function("function (x) { this.send('half'); return x; }"))
            .unwrap();

        let (seen, callback) = results();
        thread.send(json!({"k": [1, 2]}), callback);
        host.run_until_idle(TIMEOUT).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (json!("half"), Status::Running),
                (json!({"k": [1, 2]}), Status::Idle)
            ]
        );
    }

    #[test]
    fn test_calls_complete_in_order() {
        let host = Host::new();
        let thread = host.spawn(function("x => x + 1")).unwrap();
        let (seen, callback) = results();
        let callback = Rc::new(RefCell::new(callback));

        for i in 0..3 {
            let callback = Rc::clone(&callback);
            thread.send(i, move |payload, status| (&mut *callback.borrow_mut())(payload, status));
        }
        assert_eq!(thread.pending_calls(), 3);
        host.run_until_idle(TIMEOUT).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (json!(1), Status::Running),
                (json!(2), Status::Running),
                (json!(3), Status::Idle)
            ]
        );
    }

    #[test]
    fn test_post_without_listener_returns_to_idle() {
        let host = Host::new();
        let thread = host.spawn(function("x => x")).unwrap();
        assert!(thread.post(1));
        assert!(thread.is_running());
        host.run_until_idle(TIMEOUT).unwrap();
        assert!(thread.is_waiting());
    }

    #[test]
    fn test_kill_twice() {
        let host = Host::new();
        let thread = host.spawn(function("x => x")).unwrap();
        let blobs = Arc::clone(host.blob_store());
        assert!(blobs.get(thread.program_url()).is_some());

        assert_eq!(thread.kill(), Some(true));
        assert_eq!(thread.status(), Status::Terminated);
        assert!(blobs.get(thread.program_url()).is_none());

        assert_eq!(thread.kill(), None);
        assert_eq!(thread.stop(), None);
        assert!(!thread.send(1, |_, _| {}));
        assert!(thread.is_terminated());
    }

    #[test]
    fn test_stop_when_idle_returns_none() {
        let host = Host::new();
        let thread = host.spawn(function("x => x")).unwrap();
        assert_eq!(thread.stop(), None);
        assert_eq!(thread.status(), Status::Idle);
    }

    #[test]
    fn test_stop_discards_running_call() {
        let host = Host::new();
        let thread = host
            .spawn(function(
                "function (x) { if (x) { while (true) { this.send(0); } } return 'fresh'; }",
            ))
            .unwrap();

        let (stuck, callback) = results();
        thread.send(true, callback);
        assert_eq!(thread.stop(), Some(true));
        assert_eq!(thread.status(), Status::Idle);
        assert_eq!(thread.pending_calls(), 0);

        let (fresh, callback) = results();
        assert!(thread.send(false, callback));
        host.run_until_idle(TIMEOUT).unwrap();

        assert!(stuck.borrow().is_empty());
        assert_eq!(*fresh.borrow(), vec![(json!("fresh"), Status::Idle)]);
        // Same program, same blob
        assert!(host.blob_store().get(thread.program_url()).is_some());
    }

    #[test]
    fn test_uncaught_error_marks_errored() {
        let host = Host::new();
        let thread = host
            .spawn(function("function () { throw new Error('boom'); }"))
            .unwrap();
        thread.send(1, |_, _| {});

        let err = host.run_until_idle(TIMEOUT).unwrap_err();
        match err {
            ThreadError::Runtime { thread: id, message } => {
                assert_eq!(id, thread.id().to_string());
                assert!(message.contains("boom"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(thread.status(), Status::Errored);
        assert!(thread.is_terminated());
        assert!(host.blob_store().get(thread.program_url()).is_none());
        assert_eq!(thread.kill(), None);
    }

    #[test]
    fn test_rejected_promise_marks_errored() {
        let host = Host::new();
        let thread = host
            .spawn(function("async function (x) { throw new Error('nope'); }"))
            .unwrap();
        let (seen, callback) = results();
        thread.send(1, callback);

        let err = host.run_until_idle(TIMEOUT).unwrap_err();
        match err {
            ThreadError::Runtime { thread: id, message } => {
                assert_eq!(id, thread.id().to_string());
                assert!(message.contains("nope"), "{}", message);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(thread.status(), Status::Errored);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_rejection_with_non_error_value() {
        let host = Host::new();
        let thread = host
            .spawn(function("function () { return Promise.reject('plain'); }"))
            .unwrap();
        thread.post(Value::Null);

        match host.run_until_idle(TIMEOUT).unwrap_err() {
            ThreadError::Runtime { message, .. } => assert!(message.contains("plain"), "{}", message),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(thread.status(), Status::Errored);
    }

    #[test]
    fn test_resolved_promise_completes_with_value() {
        let host = Host::new();
        let thread = host
            .spawn(function("async function (x) { var y = await Promise.resolve(x + 1); return [x, y]; }"))
            .unwrap();
        let (seen, callback) = results();
        thread.send(41, callback);

        assert!(host.run_until_idle(TIMEOUT).unwrap());
        assert_eq!(*seen.borrow(), vec![(json!([41, 42]), Status::Idle)]);
    }

    #[test]
    fn test_malformed_frame_is_a_protocol_error() {
        let host = Host::new();
        let thread = host
            .spawn(function("function (x) { postMessage('not a frame'); return x; }"))
            .unwrap();

        let (seen, callback) = results();
        thread.send(5, callback);

        let err = host.run_until_idle(TIMEOUT).unwrap_err();
        assert!(matches!(err, ThreadError::Protocol { .. }));

        // The completion of the failed call is absorbed, the thread stays usable.
        host.run_until_idle(TIMEOUT).unwrap();
        assert!(seen.borrow().is_empty());
        assert!(thread.is_waiting());

        let (seen, callback) = results();
        thread.send(6, callback);
        host.run_until_idle(TIMEOUT).unwrap_err();
        host.run_until_idle(TIMEOUT).unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_thread_id_is_visible_to_function() {
        let host = Host::new();
        let thread = host.spawn(function("function () { return this.threadId; }")).unwrap();
        let (seen, callback) = results();
        thread.send(Value::Null, callback);
        host.run_until_idle(TIMEOUT).unwrap();
        assert_eq!(seen.borrow()[0].0, json!(thread.id().as_str()));
    }

    #[test]
    fn test_location_is_visible_to_function() {
        let config = HostConfig::default()
            .with_location(Url::parse("https://example.com:8080/app/?q=1").unwrap());
        let host = Host::with_config(config);
        let thread = host
            .spawn(function(
                "function () { return [self.location.hostname, self.location.port, self.location.search]; }",
            ))
            .unwrap();

        let (seen, callback) = results();
        thread.send(Value::Null, callback);
        host.run_until_idle(TIMEOUT).unwrap();
        assert_eq!(seen.borrow()[0].0, json!(["example.com", "8080", "?q=1"]));
    }

    #[test]
    fn test_local_and_remote_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("square.js"),
            "function square(x) { return x * x; }",
        )
        .unwrap();
        std::fs::write(dir.path().join("late.js"), "var LATE = 100;").unwrap();

        let location = Url::from_directory_path(dir.path()).unwrap();
        let host = Host::with_config(HostConfig::default().with_location(location));

        let remote = format!("{}/square.js", dir.path().display());
        let late = format!("{}/late.js", dir.path().display());
        let spec = ThreadSpec::new(function(&format!(
            "function (x) {{ this.require({:?}); return increment(square(x)) + LATE; }}",
            late
        )))
        .require(function("function increment(x) { return x + 1; }"))
        .require(remote);

        let thread = host.spawn(spec).unwrap();
        let (seen, callback) = results();
        thread.send(4, callback);
        host.run_until_idle(TIMEOUT).unwrap();
        assert_eq!(seen.borrow()[0].0, json!(117));
    }

    #[test]
    fn test_unsupported_host() {
        let config = HostConfig::default().with_capabilities(Capabilities::none());
        let host = Host::with_config(config);
        assert!(matches!(
            host.spawn(function("x => x")),
            Err(ThreadError::Unsupported)
        ));
    }

    #[test]
    fn test_construction_errors() {
        let host = Host::new();
        let spec = ThreadSpec::new(function("x => x")).require(function("y => y"));
        assert!(matches!(host.spawn(spec), Err(ThreadError::Construction(_))));
        assert!(host.threads().is_empty());
        assert!(host.blob_store().is_empty());
    }

    #[test]
    fn test_new_thread_joins_default_group() {
        let host = Host::new();
        let thread = Thread::new(&host, function("x => x")).unwrap();
        assert_eq!(thread.group_id(), Some(GroupId::default_group()));
        assert!(host.default_group().has(&thread));
    }

    #[test]
    fn test_display_and_equality() {
        let host = Host::new();
        let a = host.spawn(function("x => x")).unwrap();
        let b = host.spawn(function("x => x")).unwrap();
        assert!(a.id().as_str().starts_with("thread#"));
        assert_eq!(a.to_string(), format!("[object Thread {}]", a.id()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.source().source(), "x => x");
    }

    #[test]
    fn test_lifecycle_trait() {
        fn kill_it(target: &dyn Lifecycle) -> Option<bool> {
            target.kill()
        }

        let host = Host::new();
        let thread = host.spawn(function("x => x")).unwrap();
        assert_eq!(kill_it(&thread), Some(true));
        assert_eq!(kill_it(&thread), None);
    }

    #[test]
    fn test_worker_self_close_terminates_thread() {
        let host = Host::new();
        let thread = host.spawn(function("function () { close(); return 1; }")).unwrap();
        thread.send(Value::Null, |_, _| {});

        let deadline = std::time::Instant::now() + TIMEOUT;
        while !thread.is_terminated() && std::time::Instant::now() < deadline {
            host.poll().unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(thread.status(), Status::Terminated);
    }
}
