//! lspbridge CLI: start a language server, run one query, print JSON.
//!
//! ```text
//! main() -> resolve config -> LspService::initialize -> wait_for_ready
//!        -> query -> JSON on stdout -> shutdown
//! ```
//!
//! Stdout carries only the JSON result; logs go to a file.

mod args;
mod run;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use lspbridge_config::ProfileResolver;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::args::{Cli, GlobalArgs};

fn init_tracing(global: &GlobalArgs) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&global.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (log_file, init_warnings) = open_log_file(global.log_file.as_ref());

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, stay silent rather than mixing logs into the JSON
    // on stdout.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file(explicit: Option<&PathBuf>) -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates(explicit) {
        if let Some(parent) = candidate.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates(explicit: Option<&PathBuf>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.clone()];
    }

    let mut candidates = Vec::new();

    // Primary: <data_dir>/lspbridge/logs/lspbridge.log
    if let Some(data_dir) = dirs::data_dir() {
        candidates.push(data_dir.join("lspbridge").join("logs").join("lspbridge.log"));
    }

    // Fallback: ./.lspbridge/logs/lspbridge.log
    candidates.push(PathBuf::from(".lspbridge").join("logs").join("lspbridge.log"));

    candidates
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.global);

    let resolver = ProfileResolver::load(cli.global.profiles.as_deref());

    match run::execute(&cli, resolver).await {
        Ok(value) => {
            println!("{value:#}");
            ExitCode::SUCCESS
        }
        Err(failure) => {
            tracing::warn!(?failure, "Command failed");
            println!("{:#}", failure.to_json());
            ExitCode::FAILURE
        }
    }
}
