//! Strand - background threads for JavaScript functions
//!
//! Strand takes the source text of a JavaScript function, wraps it into a
//! self-contained worker program and runs it on a background worker:
//! - `resolver`: path normalization for script dependencies
//! - `minifier`: comment and whitespace stripping that keeps literals intact
//! - `synth`: worker program synthesis from a function and its dependencies
//! - `runtime`: Boa based workers, object URLs and script loading
//! - `thread`: host-side thread handles and their lifecycle
//! - `group`: thread groups for bulk operations
//! - `host`: owner of threads and the event pump that delivers results

pub mod cli;
pub mod group;
pub mod host;
pub mod minifier;
pub mod resolver;
pub mod runtime;
pub mod synth;
pub mod thread;

// Re-export commonly used types
pub use group::{GroupId, ThreadGroup};
pub use host::{Capabilities, Host, HostConfig};
pub use minifier::{MinifyError, minify};
pub use resolver::absolute;
pub use runtime::{RuntimeConfig, RuntimeError, RuntimeResult};
pub use synth::{Dependency, ScriptFunction, ThreadSpec, WorkerProgram, synthesize};
pub use thread::{Lifecycle, Status, Thread, ThreadError, ThreadId, ThreadResult};
