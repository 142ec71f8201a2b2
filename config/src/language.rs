use std::collections::BTreeMap;
use std::path::Path;

use crate::profile::{LspProfile, normalize_extension};

const PLAINTEXT: &str = "plaintext";

const DEFAULT_LANGUAGE_IDS: &[(&str, &str)] = &[
    ("cs", "csharp"),
    ("csx", "csharp"),
    ("ts", "typescript"),
    ("tsx", "typescriptreact"),
    ("js", "javascript"),
    ("jsx", "javascriptreact"),
    ("py", "python"),
    ("pyi", "python"),
    ("rs", "rust"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("md", "markdown"),
    ("xml", "xml"),
    ("csproj", "xml"),
    ("html", "html"),
    ("css", "css"),
    ("sh", "shellscript"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("fs", "fsharp"),
    ("vb", "vb"),
    ("lua", "lua"),
    ("sql", "sql"),
];

/// Maps file paths to protocol language identifiers.
///
/// The active profile's extension table wins over the built-in table;
/// anything unknown is `plaintext`.
#[derive(Debug, Clone, Default)]
pub struct LanguageIdMapper {
    overrides: BTreeMap<String, String>,
}

impl LanguageIdMapper {
    #[must_use]
    pub fn new(profile: Option<&LspProfile>) -> Self {
        let overrides = profile
            .map(|p| {
                p.extensions
                    .iter()
                    .map(|(ext, id)| (normalize_extension(ext), id.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self { overrides }
    }

    #[must_use]
    pub fn language_id(&self, path: &Path) -> String {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return PLAINTEXT.to_string();
        };
        let ext = normalize_extension(ext);

        if let Some(id) = self.overrides.get(&ext) {
            return id.clone();
        }
        DEFAULT_LANGUAGE_IDS
            .iter()
            .find(|(known, _)| *known == ext)
            .map_or_else(|| PLAINTEXT.to_string(), |(_, id)| (*id).to_string())
    }
}
