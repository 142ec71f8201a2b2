//! Profiles that ship with the binary.

use std::collections::BTreeMap;

use crate::profile::{DEFAULT_WAIT_TIMEOUT_MS, DiagnosticsSettings, LspProfile, SymbolsSettings};

fn extensions(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(ext, id)| ((*ext).to_string(), (*id).to_string()))
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn csharp() -> LspProfile {
    LspProfile {
        command: Some(
            "Microsoft.CodeAnalysis.LanguageServer --logLevel Information \
             --extensionLogDirectory ./logs --stdio"
                .to_string(),
        ),
        extensions: extensions(&[(".cs", "csharp")]),
        workspace_files: strings(&["*.sln", "*.csproj"]),
        diagnostics: Some(DiagnosticsSettings::default()),
        symbols: None,
        environment: BTreeMap::new(),
    }
}

fn typescript() -> LspProfile {
    LspProfile {
        command: Some("typescript-language-server --stdio".to_string()),
        extensions: extensions(&[
            (".ts", "typescript"),
            (".tsx", "typescriptreact"),
            (".js", "javascript"),
            (".jsx", "javascriptreact"),
        ]),
        workspace_files: strings(&["package.json", "tsconfig.json"]),
        diagnostics: Some(DiagnosticsSettings::push(DEFAULT_WAIT_TIMEOUT_MS)),
        symbols: Some(SymbolsSettings {
            max_depth: Some(0),
            kinds: strings(&[
                "Function",
                "Class",
                "Variable",
                "Enum",
                "Interface",
                "Module",
            ]),
        }),
        environment: BTreeMap::new(),
    }
}

fn pyright() -> LspProfile {
    LspProfile {
        command: Some("pyright-langserver --stdio".to_string()),
        extensions: extensions(&[(".py", "python"), (".pyi", "python")]),
        workspace_files: strings(&[
            "pyproject.toml",
            "setup.py",
            "requirements.txt",
            "pyrightconfig.json",
        ]),
        diagnostics: Some(DiagnosticsSettings::default()),
        symbols: Some(SymbolsSettings {
            max_depth: Some(0),
            kinds: strings(&["Function", "Class", "Variable"]),
        }),
        environment: BTreeMap::new(),
    }
}

fn rust() -> LspProfile {
    LspProfile {
        command: Some("rust-analyzer".to_string()),
        extensions: extensions(&[(".rs", "rust")]),
        workspace_files: strings(&["Cargo.toml"]),
        diagnostics: Some(DiagnosticsSettings::push(DEFAULT_WAIT_TIMEOUT_MS)),
        symbols: None,
        environment: BTreeMap::new(),
    }
}

/// The built-in profile set, keyed by lowercase name.
#[must_use]
pub fn builtin_profiles() -> BTreeMap<String, LspProfile> {
    BTreeMap::from([
        ("csharp".to_string(), csharp()),
        ("typescript".to_string(), typescript()),
        ("pyright".to_string(), pyright()),
        ("rust".to_string(), rust()),
    ])
}
