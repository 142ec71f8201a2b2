use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;

use crate::builtin::builtin_profiles;
use crate::command_line::CommandLineError;
use crate::loader::ProfilesFile;
use crate::profile::{DiagnosticsSettings, LspProfile, SymbolsSettings, normalize_extension};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown profile '{0}'")]
    UnknownProfile(String),
    #[error("profile '{0}' has no command")]
    MissingCommand(String),
    #[error("invalid command for profile '{name}': {source}")]
    Command {
        name: String,
        #[source]
        source: CommandLineError,
    },
    #[error("failed to parse profiles at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}

/// Merged view of every profile layer.
///
/// Later layers replace earlier profiles of the same name wholesale:
/// custom > package defaults > built-in.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    profiles: BTreeMap<String, LspProfile>,
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProfileResolver {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    #[must_use]
    pub fn with_layers(package: Option<ProfilesFile>, custom: Vec<ProfilesFile>) -> Self {
        let mut resolver = Self::builtin();
        for layer in package.into_iter().chain(custom) {
            resolver.merge(layer);
        }
        resolver
    }

    /// Build from the package file next to the executable, the user file,
    /// and an optional explicit file, in that order.
    #[must_use]
    pub fn load(explicit: Option<&Path>) -> Self {
        let package = crate::package_profiles_path().and_then(|p| ProfilesFile::load(&p));
        let custom = crate::user_profiles_path()
            .into_iter()
            .chain(explicit.map(Path::to_path_buf))
            .filter_map(|p| ProfilesFile::load(&p))
            .collect();
        Self::with_layers(package, custom)
    }

    pub fn merge(&mut self, layer: ProfilesFile) {
        for (name, profile) in layer.profiles {
            self.profiles.insert(name.to_ascii_lowercase(), profile);
        }
    }

    #[must_use]
    pub fn get_profile(&self, name: &str) -> Option<&LspProfile> {
        self.profiles.get(&name.trim().to_ascii_lowercase())
    }

    pub fn require_profile(&self, name: &str) -> Result<&LspProfile, ProfileError> {
        self.get_profile(name)
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))
    }

    #[must_use]
    pub fn available_profiles(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }

    /// First profile, by name, that claims `extension`.
    #[must_use]
    pub fn profile_for_extension(&self, extension: &str) -> Option<&str> {
        let wanted = normalize_extension(extension);
        self.profiles
            .iter()
            .find(|(_, p)| {
                p.extensions
                    .keys()
                    .any(|ext| normalize_extension(ext) == wanted)
            })
            .map(|(name, _)| name.as_str())
    }

    /// First profile, by name, whose workspace-file globs match an entry in
    /// the workspace root.
    #[must_use]
    pub fn auto_detect(&self, workspace: &Path) -> Option<&str> {
        let entries: Vec<String> = match std::fs::read_dir(workspace) {
            Ok(dir) => dir
                .filter_map(Result::ok)
                .filter_map(|e| e.file_name().into_string().ok())
                .collect(),
            Err(err) => {
                tracing::debug!("Cannot scan {} for profiles: {err}", workspace.display());
                return None;
            }
        };

        self.profiles
            .iter()
            .find(|(name, profile)| {
                let Some(set) = workspace_globs(name, &profile.workspace_files) else {
                    return false;
                };
                entries.iter().any(|entry| set.is_match(entry))
            })
            .map(|(name, _)| name.as_str())
    }

    /// Diagnostics settings by precedence: the explicitly requested profile,
    /// then the configured profile, then pull defaults.
    #[must_use]
    pub fn diagnostics_settings(
        &self,
        explicit: Option<&str>,
        configured: Option<&str>,
    ) -> DiagnosticsSettings {
        explicit
            .into_iter()
            .chain(configured)
            .filter_map(|name| self.get_profile(name))
            .find_map(|p| p.diagnostics.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn symbols_settings(&self, name: Option<&str>) -> SymbolsSettings {
        name.and_then(|n| self.get_profile(n))
            .and_then(|p| p.symbols.clone())
            .unwrap_or_default()
    }
}

fn workspace_globs(name: &str, patterns: &[String]) -> Option<GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(err) => {
                tracing::warn!("Ignoring workspace pattern '{pattern}' in profile '{name}': {err}");
            }
        }
    }
    builder.build().ok()
}
