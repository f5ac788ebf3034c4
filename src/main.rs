//! Strand - background threads for JavaScript functions
//!
//! Command line front end: minify sources, print synthesized worker programs
//! and run a function once in a worker.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

use strand::cli::{self, SpecArgs};
use strand::host::HostConfig;

#[derive(Parser)]
#[command(name = "strand")]
#[command(author, version, about = "Run JavaScript functions in background workers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Minify a JavaScript source
    Minify {
        /// Input file (defaults to stdin)
        file: Option<PathBuf>,
    },
    /// Print the worker program synthesized for a function
    Build {
        #[command(flatten)]
        spec: SpecOptions,
    },
    /// Call a function once in a worker and print the result
    Run {
        #[command(flatten)]
        spec: SpecOptions,
        /// JSON payload passed to the function
        #[arg(short, long, default_value = "null")]
        data: String,
        /// Seconds to wait for the result
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },
}

#[derive(Args)]
struct SpecOptions {
    /// File holding the function
    file: PathBuf,
    /// Script path or URL to import before the function runs
    #[arg(short, long)]
    require: Vec<String>,
    /// File holding a named function declaration to inline
    #[arg(short, long)]
    local: Vec<PathBuf>,
    /// Host location relative script paths resolve against
    #[arg(long)]
    location: Option<Url>,
}

impl SpecOptions {
    fn split(self) -> Result<(SpecArgs, HostConfig)> {
        let mut config = HostConfig::from_env().into_diagnostic()?;
        if let Some(location) = self.location {
            config = config.with_location(location);
        }
        let args = SpecArgs {
            file: self.file,
            require: self.require,
            local: self.local,
        };
        Ok((args, config))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Minify { file } => cli::minify_source(file.as_deref()),
        Commands::Build { spec } => {
            let (args, config) = spec.split()?;
            cli::build_program(&args, &config)
        }
        Commands::Run {
            spec,
            data,
            timeout,
        } => {
            let (args, config) = spec.split()?;
            let data = serde_json::from_str(&data).into_diagnostic()?;
            cli::run_once(&args, data, Duration::from_secs(timeout), config)
        }
    };

    if let Err(e) = outcome {
        eprintln!("{}: {}", "Error".red(), e);
        std::process::exit(1);
    }

    Ok(())
}
