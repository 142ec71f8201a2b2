//! Reading profile files from disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::profile::LspProfile;
use crate::resolver::ProfileError;

/// Contents of a `profiles.toml` file.
///
/// ```toml
/// [profiles.csharp]
/// command = "Microsoft.CodeAnalysis.LanguageServer --stdio"
///
/// [profiles.csharp.extensions]
/// ".cs" = "csharp"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, LspProfile>,
}

impl ProfilesFile {
    pub fn parse(content: &str, path: &Path) -> Result<Self, ProfileError> {
        toml::from_str(content).map_err(|source| ProfileError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Load a profiles file, logging and skipping it when it is absent or
    /// malformed.
    pub fn load(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read profiles at {}: {err}", path.display());
                return None;
            }
        };

        match Self::parse(&content, path) {
            Ok(file) => {
                tracing::debug!(
                    "Loaded {} profile(s) from {}",
                    file.profiles.len(),
                    path.display()
                );
                Some(file)
            }
            Err(err) => {
                tracing::warn!("{err}");
                None
            }
        }
    }
}

/// `<config_dir>/lspbridge/profiles.toml`
#[must_use]
pub fn user_profiles_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lspbridge").join("profiles.toml"))
}

/// `profiles.toml` next to the running executable.
#[must_use]
pub fn package_profiles_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join("profiles.toml"))
}
