//! Resolving the server configuration and running one command against it.

use std::env;
use std::path::{self, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use lspbridge_config::{CommandLine, ProcessConfig, ProfileResolver};
use lspbridge_lsp::{LspService, ServiceError};
use lspbridge_types::{EditorPosition, ErrorCode};
use serde::Serialize;
use serde_json::{Value, json};

use crate::args::{Cli, Command, GlobalArgs, PositionArgs};

const FALLBACK_PROFILE: &str = "csharp";

/// A failed run, printed as `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub struct Failure {
    message: String,
    code: ErrorCode,
}

impl Failure {
    fn new(message: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({ "error": self.message, "code": self.code })
    }
}

impl From<ServiceError> for Failure {
    fn from(err: ServiceError) -> Self {
        let message = match &err {
            ServiceError::Operation { message, source } => format!("{message}: {source:#}"),
            other => other.to_string(),
        };
        Self::new(message, err.code())
    }
}

/// Process configuration from the global flags: profile (explicit,
/// detected, then the fallback), optional command override, workspace
/// targets resolved against the workspace root.
pub fn resolve_config(global: &GlobalArgs, resolver: &ProfileResolver) -> Result<ProcessConfig> {
    let workspace = match &global.workspace {
        Some(dir) => path::absolute(dir)
            .with_context(|| format!("resolving workspace {}", dir.display()))?,
        None => env::current_dir().context("reading current directory")?,
    };

    let profile_name = global
        .profile
        .clone()
        .or_else(|| resolver.auto_detect(&workspace).map(str::to_string))
        .unwrap_or_else(|| FALLBACK_PROFILE.to_string());
    let profile = resolver.require_profile(&profile_name)?;

    let mut config = match &global.server_command {
        Some(cmdline) => {
            let command = CommandLine::parse(cmdline)
                .with_context(|| format!("parsing --command {cmdline:?}"))?;
            ProcessConfig {
                args: command.args,
                profile: Some(profile_name.clone()),
                environment: profile.environment.clone(),
                ..ProcessConfig::new(command.program, workspace)
            }
        }
        None => ProcessConfig::from_profile(&profile_name, profile, &workspace)?,
    };

    config.solution = global.solution.as_deref().map(|p| config.absolute(p));
    config.projects = global
        .projects
        .iter()
        .map(|p| config.absolute(p))
        .collect::<Vec<PathBuf>>();

    tracing::debug!(
        profile = %profile_name,
        command = %config.command,
        workspace = %config.workspace.display(),
        "Resolved server configuration"
    );
    Ok(config)
}

/// Run `cli.command` and return its JSON result.
pub async fn execute(cli: &Cli, resolver: ProfileResolver) -> Result<Value, Failure> {
    if !cli.command.needs_server() {
        return Ok(list_profiles(&resolver));
    }

    let config = resolve_config(&cli.global, &resolver)
        .map_err(|e| Failure::new(format!("{e:#}"), ErrorCode::StartupFailed))?;
    let service = LspService::new(config, resolver);

    let result = async {
        service.initialize().await?;
        let wait = Duration::from_secs(cli.global.wait_ready);
        if !service.wait_for_ready(wait).await? {
            tracing::warn!("Workspace still loading after {}s", wait.as_secs());
        }
        dispatch(&service, &cli.command).await
    }
    .await;

    service.shutdown().await;
    result
}

async fn dispatch(service: &LspService, command: &Command) -> Result<Value, Failure> {
    match command {
        Command::References(at) => {
            to_json(service.find_references(&at.file, position(at)?).await?)
        }
        Command::Definition(at) => {
            to_json(service.go_to_definition(&at.file, position(at)?).await?)
        }
        Command::TypeDefinition(at) => to_json(
            service
                .go_to_type_definition(&at.file, position(at)?)
                .await?,
        ),
        Command::Implementation(at) => to_json(
            service
                .find_implementations(&at.file, position(at)?)
                .await?,
        ),
        Command::Completion(at) => to_json(service.completion(&at.file, position(at)?).await?),
        Command::Hover(at) => to_json(service.hover(&at.file, position(at)?).await?),
        Command::Search { query } => to_json(service.search_symbols(query).await?),
        Command::Symbols { file, max_depth } => {
            to_json(service.document_symbols(file, *max_depth).await?)
        }
        Command::Diagnostics { file } => to_json(service.diagnostics(file).await?),
        Command::Rename { position: at, new_name } => to_json(
            service
                .rename(&at.file, position(at)?, new_name)
                .await?,
        ),
        Command::Logs => to_json(service.window_log_messages().await?),
        Command::Profiles => Ok(Value::Null),
    }
}

fn position(args: &PositionArgs) -> Result<EditorPosition, Failure> {
    EditorPosition::new(args.line, args.character)
        .map_err(|e| Failure::new(e.to_string(), ErrorCode::Unknown))
}

fn to_json<T: Serialize>(value: T) -> Result<Value, Failure> {
    serde_json::to_value(value)
        .map_err(|e| Failure::new(format!("serializing result: {e}"), ErrorCode::Unknown))
}

fn list_profiles(resolver: &ProfileResolver) -> Value {
    let profiles: Vec<Value> = resolver
        .available_profiles()
        .into_iter()
        .filter_map(|name| {
            let profile = resolver.get_profile(name)?;
            Some(json!({
                "name": name,
                "command": profile.command,
                "extensions": profile.extensions.keys().collect::<Vec<_>>(),
                "workspaceFiles": profile.workspace_files,
            }))
        })
        .collect();
    Value::Array(profiles)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn global(args: &[&str]) -> GlobalArgs {
        let mut argv = vec!["lspbridge"];
        argv.extend_from_slice(args);
        argv.push("logs");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn detected_profile_wins_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\n").unwrap();
        let workspace = dir.path().to_str().unwrap();

        let config = resolve_config(
            &global(&["--workspace", workspace]),
            &ProfileResolver::builtin(),
        )
        .unwrap();
        assert_eq!(config.profile.as_deref(), Some("rust"));
        assert_eq!(config.command, "rust-analyzer");
    }

    #[test]
    fn empty_workspace_falls_back_to_csharp() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().to_str().unwrap();

        let config = resolve_config(
            &global(&["--workspace", workspace]),
            &ProfileResolver::builtin(),
        )
        .unwrap();
        assert_eq!(config.profile.as_deref(), Some(FALLBACK_PROFILE));
    }

    #[test]
    fn command_override_keeps_the_profile() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().to_str().unwrap();

        let config = resolve_config(
            &global(&[
                "--workspace",
                workspace,
                "--profile",
                "pyright",
                "--command",
                "\"/opt/my server/pyright\" --stdio",
            ]),
            &ProfileResolver::builtin(),
        )
        .unwrap();
        assert_eq!(config.command, "/opt/my server/pyright");
        assert_eq!(config.args, ["--stdio"]);
        assert_eq!(config.profile.as_deref(), Some("pyright"));
    }

    #[test]
    fn solution_and_projects_resolve_against_the_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().to_str().unwrap();

        let config = resolve_config(
            &global(&["--workspace", workspace, "--solution", "App.sln"]),
            &ProfileResolver::builtin(),
        )
        .unwrap();
        assert_eq!(config.solution, Some(dir.path().join("App.sln")));
        assert!(config.requires_async_load());

        let config = resolve_config(
            &global(&[
                "--workspace",
                workspace,
                "--project",
                "a/A.csproj",
                "--project",
                "b/B.csproj",
            ]),
            &ProfileResolver::builtin(),
        )
        .unwrap();
        assert_eq!(
            config.projects,
            [dir.path().join("a/A.csproj"), dir.path().join("b/B.csproj")]
        );
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let err = resolve_config(&global(&["--profile", "cobol"]), &ProfileResolver::builtin())
            .unwrap_err();
        assert!(format!("{err:#}").contains("cobol"));
    }

    #[test]
    fn failures_carry_the_error_code() {
        let failure = Failure::from(ServiceError::WorkspaceLoading);
        assert_eq!(
            failure.to_json(),
            json!({
                "error": "workspace is still loading, retry shortly",
                "code": "WorkspaceLoadInProgress"
            })
        );
    }

    #[test]
    fn profiles_are_listed_in_name_order() {
        let listed = list_profiles(&ProfileResolver::builtin());
        let names: Vec<&str> = listed
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|p| p["name"].as_str())
            .collect();
        assert_eq!(names, ["csharp", "pyright", "rust", "typescript"]);
    }
}
