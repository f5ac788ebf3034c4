//! JavaScript runtime for worker threads, powered by the Boa engine
//!
//! Every worker owns one [`WorkerRuntime`]: a Boa `Context` with the
//! `boa_runtime` Web APIs registered and console output routed to `tracing`.
//!
//! Features provided inside a worker:
//! - Console API (console.log, console.error, etc.)
//! - Timers (setTimeout, setInterval, clearTimeout, clearInterval)
//! - URL API (URL, URLSearchParams)
//! - Text encoding (TextEncoder, TextDecoder)
//! - structuredClone
//! - queueMicrotask
//! - Worker globals (self, postMessage, importScripts, close), see [`worker`]

use boa_engine::{Context, JsResult, JsValue, Source, context::ContextBuilder};
use boa_gc::{Finalize, Trace};
use boa_runtime::{
    ConsoleState, Logger,
    extensions::{
        ConsoleExtension, EncodingExtension, MicrotaskExtension, StructuredCloneExtension,
        TimeoutExtension, UrlExtension,
    },
    register_extensions,
};
use std::time::Duration;
use thiserror::Error;

pub mod blob;
pub mod loader;
pub mod worker;

pub use blob::BlobStore;
pub use loader::ScriptLoader;
pub use worker::{Worker, WorkerEvent, WorkerState};

/// Errors that can occur while running a worker
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("JavaScript error: {0}")]
    JsError(String),

    #[error("Script not found: {0}")]
    ScriptNotFound(String),

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Worker is terminated")]
    Terminated,
}

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Console logger that forwards worker output to `tracing`
#[derive(Debug, Clone, Default, Trace, Finalize)]
pub struct StrandLogger {
    worker: String,
}

impl StrandLogger {
    pub fn new(worker: impl Into<String>) -> Self {
        Self {
            worker: worker.into(),
        }
    }
}

impl Logger for StrandLogger {
    fn log(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::info!(target: "strand::console", worker = %self.worker, "{}", msg);
        Ok(())
    }

    fn info(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::info!(target: "strand::console", worker = %self.worker, "{}", msg);
        Ok(())
    }

    fn warn(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::warn!(target: "strand::console", worker = %self.worker, "{}", msg);
        Ok(())
    }

    fn error(&self, msg: String, _state: &ConsoleState, _context: &mut Context) -> JsResult<()> {
        tracing::error!(target: "strand::console", worker = %self.worker, "{}", msg);
        Ok(())
    }
}

/// Engine configuration applied to every worker context
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum JS call depth
    pub recursion_limit: usize,
    /// Maximum VM stack size
    pub stack_size_limit: usize,
    /// How long an idle worker waits for a message before running pending jobs
    pub poll_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            recursion_limit: 16384,
            stack_size_limit: 1024 * 1024, // 1MB
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// A Boa context prepared for running worker programs
pub struct WorkerRuntime {
    context: Context,
    config: RuntimeConfig,
}

impl WorkerRuntime {
    /// Create a runtime with default configuration
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(RuntimeConfig::default(), StrandLogger::default())
    }

    /// Create a runtime with custom configuration and console logger
    pub fn with_config(config: RuntimeConfig, logger: StrandLogger) -> RuntimeResult<Self> {
        let mut context = ContextBuilder::default()
            .build()
            .map_err(|e| RuntimeError::JsError(e.to_string()))?;

        context
            .runtime_limits_mut()
            .set_recursion_limit(config.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(config.stack_size_limit);

        // console, setTimeout/setInterval, URL, TextEncoder/TextDecoder,
        // structuredClone and queueMicrotask
        register_extensions(
            (
                ConsoleExtension(logger),
                TimeoutExtension,
                UrlExtension,
                EncodingExtension,
                StructuredCloneExtension,
                MicrotaskExtension,
            ),
            None,
            &mut context,
        )
        .map_err(|e| RuntimeError::JsError(e.to_string()))?;

        Ok(Self { context, config })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Evaluate a script in the global scope and run pending jobs
    pub fn eval(&mut self, code: &str) -> RuntimeResult<JsValue> {
        let source = Source::from_bytes(code.as_bytes());
        let result = self.context.eval(source);

        self.run_jobs();

        result.map_err(|e| RuntimeError::JsError(e.to_string()))
    }

    /// Run queued promise jobs and due timers
    pub fn run_jobs(&mut self) {
        if let Err(e) = self.context.run_jobs() {
            tracing::warn!(error = %e, "job failed in worker");
        }
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Convert a JsValue to JSON. `undefined` becomes `null`.
    pub fn to_json(&mut self, value: &JsValue) -> RuntimeResult<serde_json::Value> {
        value
            .to_json(&mut self.context)
            .map(Option::unwrap_or_default)
            .map_err(|e| RuntimeError::JsError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_creation() {
        let runtime = WorkerRuntime::new();
        assert!(runtime.is_ok());
    }

    #[test]
    fn test_basic_javascript() {
        let mut runtime = WorkerRuntime::new().unwrap();
        let result = runtime.eval("1 + 1").unwrap();
        assert_eq!(runtime.to_json(&result).unwrap(), serde_json::json!(2));
    }

    #[test]
    fn test_console_log() {
        let mut runtime = WorkerRuntime::new().unwrap();
        let result = runtime.eval("console.log('hello from a worker')");
        assert!(result.is_ok());
    }

    #[test]
    fn test_url_api() {
        let mut runtime = WorkerRuntime::new().unwrap();
        let result = runtime
            .eval("new URL('https://example.com/path?query=value').hostname")
            .unwrap();
        assert_eq!(
            runtime.to_json(&result).unwrap(),
            serde_json::json!("example.com")
        );
    }

    #[test]
    fn test_recursion_limit_applies() {
        let config = RuntimeConfig {
            recursion_limit: 64,
            ..Default::default()
        };
        let mut runtime = WorkerRuntime::with_config(config, StrandLogger::new("test")).unwrap();
        assert!(runtime.eval("(function f(n) { return f(n + 1); })(0)").is_err());
    }

    #[test]
    fn test_undefined_to_json_is_null() {
        let mut runtime = WorkerRuntime::new().unwrap();
        let value = runtime.eval("undefined").unwrap();
        assert_eq!(runtime.to_json(&value).unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_syntax_error() {
        let mut runtime = WorkerRuntime::new().unwrap();
        assert!(matches!(
            runtime.eval("function ("),
            Err(RuntimeError::JsError(_))
        ));
    }
}
