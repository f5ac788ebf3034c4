//! Command implementations for the `strand` binary

use colored::Colorize;
use serde_json::Value;
use std::cell::RefCell;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::host::{Host, HostConfig};
use crate::minifier::minify;
use crate::synth::{Dependency, ScriptFunction, ThreadSpec, synthesize};
use crate::thread::{Status, ThreadError, ThreadResult};

/// Function source plus the dependencies given on the command line
#[derive(Debug, Clone, Default)]
pub struct SpecArgs {
    /// File holding the user function
    pub file: PathBuf,
    /// Remote dependencies, resolved against the host location
    pub require: Vec<String>,
    /// Files holding named function declarations to inline
    pub local: Vec<PathBuf>,
}

impl SpecArgs {
    pub fn load(&self) -> ThreadResult<ThreadSpec> {
        let mut spec = ThreadSpec::new(read_function(&self.file)?);
        for path in &self.local {
            spec = spec.require(read_function(path)?);
        }
        for path in &self.require {
            spec = spec.require(Dependency::Remote(path.clone()));
        }
        Ok(spec)
    }
}

fn read_function(path: &Path) -> ThreadResult<ScriptFunction> {
    let source = std::fs::read_to_string(path)?;
    ScriptFunction::parse(source).map_err(|e| match e {
        ThreadError::Construction(message) => {
            ThreadError::Construction(format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

/// Read `file`, or stdin when no file is given
pub fn read_source(file: Option<&Path>) -> ThreadResult<String> {
    match file {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

/// `strand minify`
pub fn minify_source(file: Option<&Path>) -> ThreadResult<()> {
    let source = read_source(file)?;
    let minified = minify(&source)?;
    println!("{}", minified);
    Ok(())
}

/// `strand build`: print the worker program without starting it
pub fn build_program(args: &SpecArgs, config: &HostConfig) -> ThreadResult<()> {
    let spec = args.load()?;
    let location = config.worker_location();
    let program = synthesize(&spec, "thread#build", &location)?;

    for url in program.imports() {
        eprintln!("{}: {}", "Import".cyan(), url);
    }
    println!("{}", program.text());
    Ok(())
}

/// `strand run`: call the function once and print what comes back
pub fn run_once(
    args: &SpecArgs,
    data: Value,
    timeout: Duration,
    config: HostConfig,
) -> ThreadResult<()> {
    let host = Host::with_config(config);
    let thread = host.spawn(args.load()?)?;

    let result = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&result);
    thread.send_with(
        data,
        |payload, _| println!("{} {}", "progress".yellow(), payload),
        move |payload, _| *slot.borrow_mut() = Some(payload),
    );

    let finished = host.run_until_idle(timeout)?;
    let result = result.borrow_mut().take();

    match result {
        Some(payload) => {
            println!("{} {}", "=>".green(), payload);
            host.shutdown();
            Ok(())
        }
        None if !finished => {
            thread.kill();
            Err(ThreadError::Runtime {
                thread: thread.id().to_string(),
                message: format!("no result after {:?}", timeout),
            })
        }
        None => {
            let status = thread.status();
            host.shutdown();
            Err(ThreadError::Runtime {
                thread: thread.id().to_string(),
                message: format!("thread ended without a result ({})", status_label(status)),
            })
        }
    }
}

fn status_label(status: Status) -> String {
    match status {
        Status::Errored => status.to_string().red().to_string(),
        _ => status.to_string(),
    }
}
