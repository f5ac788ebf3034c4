//! Dedicated workers: one Boa context per OS thread
//!
//! A [`Worker`] loads a script by URL on a fresh thread and exchanges JSON
//! messages with its owner through a shared [`WorkerChannel`]:
//! - owner -> worker: [`WorkerMessage`] queued in the inbox, the worker thread
//!   blocks on a condvar until one arrives
//! - worker -> owner: [`WorkerEvent`] queued in the outbox, drained by the
//!   owner with [`Worker::next_event`]
//!
//! Globals available inside the worker: `self`, `postMessage`,
//! `addEventListener`, `removeEventListener`, `onmessage`, `onerror`,
//! `importScripts` and `close`.
//!
//! Terminating a worker flags it as closing and returns immediately. The
//! worker thread notices on its next wake-up and exits; any `postMessage`
//! it attempts in the meantime throws, so a long running call unwinds.

use boa_engine::{
    Context, JsArgs, JsNativeError, JsResult, JsValue, NativeFunction, Source, js_string,
};
use boa_gc::{Finalize, Trace};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use super::loader::ScriptLoader;
use super::{RuntimeConfig, RuntimeError, RuntimeResult, StrandLogger, WorkerRuntime};

/// Messages from the owner to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// Payload delivered as a `message` event
    Data(serde_json::Value),
    /// Terminate signal
    Terminate,
}

/// Events from the worker to the owner
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Script loaded, worker accepts messages
    Ready,
    /// Argument of a `postMessage` call
    Message(serde_json::Value),
    /// Uncaught error while loading the script or handling a message
    Error(String),
    /// Worker thread exited
    Close,
}

/// Worker ready states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Starting = 0,
    Running = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for WorkerState {
    fn from(v: u8) -> Self {
        match v {
            0 => WorkerState::Starting,
            1 => WorkerState::Running,
            2 => WorkerState::Closing,
            _ => WorkerState::Closed,
        }
    }
}

/// Counter for worker thread names
static WORKER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mailbox shared by a worker thread and its owner
#[derive(Debug)]
pub struct WorkerChannel {
    state: AtomicU8,
    /// Messages from owner to worker
    inbox: Mutex<VecDeque<WorkerMessage>>,
    /// Condition variable for inbox
    inbox_condvar: Condvar,
    /// Events from worker to owner
    outbox: Mutex<VecDeque<WorkerEvent>>,
}

impl WorkerChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(WorkerState::Starting as u8),
            inbox: Mutex::new(VecDeque::with_capacity(16)),
            inbox_condvar: Condvar::new(),
            outbox: Mutex::new(VecDeque::with_capacity(16)),
        })
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn is_closing(&self) -> bool {
        matches!(self.state(), WorkerState::Closing | WorkerState::Closed)
    }

    /// Send message to worker (from owner)
    fn send_to_worker(&self, msg: WorkerMessage) {
        self.inbox.lock().push_back(msg);
        self.inbox_condvar.notify_one();
    }

    /// Next message for the worker, waiting up to `timeout` for one to arrive
    fn receive_from_owner(&self, timeout: Duration) -> Option<WorkerMessage> {
        let mut inbox = self.inbox.lock();
        if inbox.is_empty() {
            self.inbox_condvar.wait_for(&mut inbox, timeout);
        }
        inbox.pop_front()
    }

    /// Send event to owner (from worker)
    fn send_to_owner(&self, event: WorkerEvent) {
        self.outbox.lock().push_back(event);
    }

    /// Next event for the owner, non-blocking
    fn receive_from_worker(&self) -> Option<WorkerEvent> {
        self.outbox.lock().pop_front()
    }

    fn close(&self) {
        if !self.is_closing() {
            self.set_state(WorkerState::Closing);
        }
        self.send_to_worker(WorkerMessage::Terminate);
    }
}

/// Owner-side handle to a worker thread. Dropping it terminates the worker.
#[derive(Debug)]
pub struct Worker {
    url: String,
    channel: Arc<WorkerChannel>,
}

impl Worker {
    /// Start a worker running the script at `url`
    pub fn spawn(url: &str, loader: ScriptLoader, config: RuntimeConfig) -> RuntimeResult<Self> {
        let channel = WorkerChannel::new();
        let id = WORKER_COUNTER.fetch_add(1, Ordering::SeqCst);

        let thread_url = url.to_string();
        let thread_channel = Arc::clone(&channel);
        thread::Builder::new()
            .name(format!("strand-worker-{}", id))
            .spawn(move || run_worker(thread_url, thread_channel, loader, config))?;

        tracing::debug!(url = %url, worker = id, "worker spawned");

        Ok(Self {
            url: url.to_string(),
            channel,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> WorkerState {
        self.channel.state()
    }

    /// Queue `data` as a `message` event for the worker
    pub fn post(&self, data: serde_json::Value) -> RuntimeResult<()> {
        if self.channel.is_closing() {
            return Err(RuntimeError::Terminated);
        }
        self.channel.send_to_worker(WorkerMessage::Data(data));
        Ok(())
    }

    /// Next event posted by the worker, if any
    pub fn next_event(&self) -> Option<WorkerEvent> {
        self.channel.receive_from_worker()
    }

    /// Flag the worker as closing. Does not wait for the thread to exit.
    pub fn terminate(&self) {
        if !self.channel.is_closing() {
            tracing::debug!(url = %self.url, "terminating worker");
        }
        self.channel.close();
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ============================================================================
// Worker Thread Implementation
// ============================================================================

fn run_worker(
    url: String,
    channel: Arc<WorkerChannel>,
    loader: ScriptLoader,
    config: RuntimeConfig,
) {
    let poll_interval = config.poll_interval;

    let mut runtime = match start_worker(&url, &channel, loader, config) {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "worker failed to start");
            channel.send_to_owner(WorkerEvent::Error(e.to_string()));
            channel.set_state(WorkerState::Closed);
            return;
        }
    };

    // Worker event loop
    while !channel.is_closing() {
        match channel.receive_from_owner(poll_interval) {
            Some(WorkerMessage::Terminate) => break,
            Some(WorkerMessage::Data(data)) => {
                if let Err(e) = dispatch_message(&mut runtime, &data) {
                    // A closing worker unwinds through a throwing postMessage
                    if !channel.is_closing() {
                        channel.send_to_owner(WorkerEvent::Error(e.to_string()));
                    }
                    break;
                }
            }
            None => {}
        }

        runtime.run_jobs();
    }

    channel.set_state(WorkerState::Closed);
    channel.send_to_owner(WorkerEvent::Close);
    tracing::debug!(url = %url, "worker closed");
}

fn start_worker(
    url: &str,
    channel: &Arc<WorkerChannel>,
    loader: ScriptLoader,
    config: RuntimeConfig,
) -> RuntimeResult<WorkerRuntime> {
    let mut runtime = WorkerRuntime::with_config(config, StrandLogger::new(url))?;

    let code = loader.load(url)?;

    let scope = WorkerScope {
        channel: Arc::clone(channel),
        loader,
    };
    register_worker_globals(runtime.context_mut(), scope)
        .map_err(|e| RuntimeError::JsError(format!("Failed to register worker globals: {}", e)))?;

    channel.set_state(WorkerState::Running);
    channel.send_to_owner(WorkerEvent::Ready);

    runtime.eval(&code)?;
    Ok(runtime)
}

/// Deliver `data` to the worker's `message` listeners
fn dispatch_message(runtime: &mut WorkerRuntime, data: &serde_json::Value) -> RuntimeResult<()> {
    let context = runtime.context_mut();
    let js_error = |e: boa_engine::JsError| RuntimeError::JsError(e.to_string());

    let payload = JsValue::from_json(data, context).map_err(js_error)?;
    let dispatch = context
        .global_object()
        .get(js_string!("__strand_dispatch"), context)
        .map_err(js_error)?;

    let Some(callable) = dispatch.as_callable() else {
        return Err(RuntimeError::JsError(
            "worker message dispatcher is missing".to_string(),
        ));
    };
    callable
        .call(&JsValue::undefined(), &[payload], context)
        .map_err(js_error)?;

    runtime.run_jobs();
    Ok(())
}

// ============================================================================
// Worker Globals
// ============================================================================

/// State captured by the worker's native functions
#[derive(Clone, Trace, Finalize)]
struct WorkerScope {
    #[unsafe_ignore_trace]
    channel: Arc<WorkerChannel>,
    #[unsafe_ignore_trace]
    loader: ScriptLoader,
}

/// postMessage(data): send a JSON copy of `data` to the owner
fn post_message(
    _this: &JsValue,
    args: &[JsValue],
    scope: &WorkerScope,
    context: &mut Context,
) -> JsResult<JsValue> {
    if scope.channel.is_closing() {
        return Err(JsNativeError::error()
            .with_message("worker is closing")
            .into());
    }

    let data = args
        .get_or_undefined(0)
        .to_json(context)?
        .unwrap_or_default();
    scope.channel.send_to_owner(WorkerEvent::Message(data));
    Ok(JsValue::undefined())
}

/// importScripts(...urls): load and evaluate each script in the global scope
fn import_scripts(
    _this: &JsValue,
    args: &[JsValue],
    scope: &WorkerScope,
    context: &mut Context,
) -> JsResult<JsValue> {
    for arg in args {
        let specifier = arg.to_string(context)?.to_std_string_escaped();
        let code = scope.loader.load(&specifier).map_err(|e| {
            JsNativeError::error().with_message(format!(
                "importScripts failed to load '{}': {}",
                specifier, e
            ))
        })?;
        context.eval(Source::from_bytes(code.as_bytes()))?;
    }
    Ok(JsValue::undefined())
}

/// close(): stop the worker after the current message
fn close_worker(
    _this: &JsValue,
    _args: &[JsValue],
    scope: &WorkerScope,
    _context: &mut Context,
) -> JsResult<JsValue> {
    scope.channel.set_state(WorkerState::Closing);
    Ok(JsValue::undefined())
}

/// __strand_fail(message): report an asynchronous failure as an uncaught
/// error and close the worker
fn fail_worker(
    _this: &JsValue,
    args: &[JsValue],
    scope: &WorkerScope,
    context: &mut Context,
) -> JsResult<JsValue> {
    if scope.channel.is_closing() {
        return Ok(JsValue::undefined());
    }

    let message = args
        .get_or_undefined(0)
        .to_string(context)?
        .to_std_string_escaped();
    scope.channel.send_to_owner(WorkerEvent::Error(message));
    scope.channel.set_state(WorkerState::Closing);
    Ok(JsValue::undefined())
}

/// Register worker-specific globals (self, postMessage, etc.)
fn register_worker_globals(context: &mut Context, scope: WorkerScope) -> JsResult<()> {
    context.register_global_callable(
        js_string!("postMessage"),
        1,
        NativeFunction::from_copy_closure_with_captures(post_message, scope.clone()),
    )?;
    context.register_global_callable(
        js_string!("importScripts"),
        0,
        NativeFunction::from_copy_closure_with_captures(import_scripts, scope.clone()),
    )?;
    context.register_global_callable(
        js_string!("close"),
        0,
        NativeFunction::from_copy_closure_with_captures(close_worker, scope.clone()),
    )?;
    context.register_global_callable(
        js_string!("__strand_fail"),
        1,
        NativeFunction::from_copy_closure_with_captures(fail_worker, scope),
    )?;

    let worker_globals = r#"
        (function (global) {
            var listeners = {};

            global.self = global;
            global.onmessage = null;
            global.onerror = null;

            global.addEventListener = function (type, listener) {
                var list = listeners[type] || (listeners[type] = []);
                if (typeof listener === "function" && list.indexOf(listener) === -1) {
                    list.push(listener);
                }
            };

            global.removeEventListener = function (type, listener) {
                var list = listeners[type] || [];
                var idx = list.indexOf(listener);
                if (idx !== -1) {
                    list.splice(idx, 1);
                }
            };

            Object.defineProperty(global, "__strand_dispatch", {
                enumerable: false,
                value: function (data) {
                    var event = { type: "message", data: data, target: global };
                    if (typeof global.onmessage === "function") {
                        global.onmessage.call(global, event);
                    }
                    var list = (listeners.message || []).slice();
                    for (var i = 0; i < list.length; ++i) {
                        list[i].call(global, event);
                    }
                }
            });
        })(globalThis);
    "#;

    context.eval(Source::from_bytes(worker_globals.as_bytes()))?;
    Ok(())
}
