//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lspbridge", version, about = "Query a language server and print JSON")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Workspace root. Defaults to the current directory.
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Language server profile. Defaults to auto-detection, then `csharp`.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Extra profiles file layered over the built-in and user profiles.
    #[arg(long, global = true, env = "LSPBRIDGE_PROFILES")]
    pub profiles: Option<PathBuf>,

    /// Server command line, replacing the profile's.
    #[arg(long = "command", global = true, value_name = "CMDLINE")]
    pub server_command: Option<String>,

    /// Solution file to open after the handshake.
    #[arg(long, global = true, conflicts_with = "projects")]
    pub solution: Option<PathBuf>,

    /// Project file to open after the handshake. Repeatable.
    #[arg(long = "project", global = true, value_name = "FILE")]
    pub projects: Vec<PathBuf>,

    /// Seconds to wait for the workspace to finish loading.
    #[arg(long, global = true, default_value_t = 60, value_name = "SECS")]
    pub wait_ready: u64,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Log file. Defaults to `<data_dir>/lspbridge/logs/lspbridge.log`.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// A file and a 1-based cursor position in it.
#[derive(Debug, Clone, Args)]
pub struct PositionArgs {
    pub file: PathBuf,
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub line: u32,
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    pub character: u32,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Every reference to the symbol at the position, declaration included.
    References(PositionArgs),
    Definition(PositionArgs),
    TypeDefinition(PositionArgs),
    Implementation(PositionArgs),
    Completion(PositionArgs),
    /// Hover text and the enclosing symbol.
    Hover(PositionArgs),
    /// Workspace symbol search.
    Search { query: String },
    /// Symbols declared in a file.
    Symbols {
        file: PathBuf,
        #[arg(long)]
        max_depth: Option<u32>,
    },
    Diagnostics { file: PathBuf },
    /// Rename the symbol at the position and write the edits.
    Rename {
        #[command(flatten)]
        position: PositionArgs,
        new_name: String,
    },
    /// Messages the server sent to the client window.
    Logs,
    /// List available profiles without starting a server.
    Profiles,
}

impl Command {
    /// Whether the command needs a running language server.
    pub fn needs_server(&self) -> bool {
        !matches!(self, Self::Profiles)
    }
}
