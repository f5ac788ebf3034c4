//! Thread error types

use thiserror::Error;

use crate::minifier::MinifyError;
use crate::runtime::RuntimeError;

/// Thread error type
#[derive(Error, Debug)]
pub enum ThreadError {
    #[error("could not create thread: {0}")]
    Construction(String),

    #[error("could not minify worker program: {0}")]
    Minify(#[from] MinifyError),

    #[error("threads are not supported on this host")]
    Unsupported,

    #[error("thread {thread} sent a malformed frame: {message}")]
    Protocol { thread: String, message: String },

    #[error("thread {thread} terminated with the following message: {message}")]
    Runtime { thread: String, message: String },

    #[error("you cannot remove anything from the default thread group")]
    DefaultGroupRemoval,

    #[error("worker error: {0}")]
    Worker(#[from] RuntimeError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for thread operations
pub type ThreadResult<T> = Result<T, ThreadError>;
