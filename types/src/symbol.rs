//! Symbols, symbol kinds and source locations.

use std::fmt;

use serde::Serialize;

use crate::EditorPosition;

/// LSP `SymbolKind`, labelled by its protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SymbolKind {
    File,
    Module,
    Namespace,
    Package,
    Class,
    Method,
    Property,
    Field,
    Constructor,
    Enum,
    Interface,
    Function,
    Variable,
    Constant,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Key,
    Null,
    EnumMember,
    Struct,
    Event,
    Operator,
    TypeParameter,
    Unknown,
}

impl SymbolKind {
    const ORDERED: [Self; 26] = [
        Self::File,
        Self::Module,
        Self::Namespace,
        Self::Package,
        Self::Class,
        Self::Method,
        Self::Property,
        Self::Field,
        Self::Constructor,
        Self::Enum,
        Self::Interface,
        Self::Function,
        Self::Variable,
        Self::Constant,
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Array,
        Self::Object,
        Self::Key,
        Self::Null,
        Self::EnumMember,
        Self::Struct,
        Self::Event,
        Self::Operator,
        Self::TypeParameter,
    ];

    #[must_use]
    pub fn from_lsp(value: u64) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(|v| v.checked_sub(1))
            .and_then(|idx| Self::ORDERED.get(idx).copied())
            .unwrap_or(Self::Unknown)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::Module => "Module",
            Self::Namespace => "Namespace",
            Self::Package => "Package",
            Self::Class => "Class",
            Self::Method => "Method",
            Self::Property => "Property",
            Self::Field => "Field",
            Self::Constructor => "Constructor",
            Self::Enum => "Enum",
            Self::Interface => "Interface",
            Self::Function => "Function",
            Self::Variable => "Variable",
            Self::Constant => "Constant",
            Self::String => "String",
            Self::Number => "Number",
            Self::Boolean => "Boolean",
            Self::Array => "Array",
            Self::Object => "Object",
            Self::Key => "Key",
            Self::Null => "Null",
            Self::EnumMember => "EnumMember",
            Self::Struct => "Struct",
            Self::Event => "Event",
            Self::Operator => "Operator",
            Self::TypeParameter => "TypeParameter",
            Self::Unknown => "Unknown",
        }
    }

    /// Case-insensitive match against a configured kind name.
    #[must_use]
    pub fn matches_name(self, name: &str) -> bool {
        self.label().eq_ignore_ascii_case(name.trim())
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A source range in a file, 1-based, with an optional snippet of the
/// enclosed text.
///
/// Line and character bounds are optional because some servers answer
/// workspace symbol queries with a bare URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolLocation {
    pub file_path: String,
    pub start_line: Option<u32>,
    pub start_character: Option<u32>,
    pub end_line: Option<u32>,
    pub end_character: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SymbolLocation {
    #[must_use]
    pub fn without_range(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            start_line: None,
            start_character: None,
            end_line: None,
            end_character: None,
            text: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: Option<String>) -> Self {
        self.text = text;
        self
    }

    /// `(start_line, start_character, end_line, end_character)` when every
    /// bound is present.
    #[must_use]
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        Some((
            self.start_line?,
            self.start_character?,
            self.end_line?,
            self.end_character?,
        ))
    }

    /// Inclusive containment check on both edges.
    #[must_use]
    pub fn contains(&self, position: EditorPosition) -> bool {
        let Some((start_line, start_char, end_line, end_char)) = self.bounds() else {
            return false;
        };
        let (line, character) = (position.line(), position.character());
        if line < start_line || line > end_line {
            return false;
        }
        if line == start_line && character < start_char {
            return false;
        }
        if line == end_line && character > end_char {
            return false;
        }
        true
    }
}

/// A symbol as returned to callers. `depth` is computed from the container
/// chain, never taken from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SymbolLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoverResult {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<DocumentSymbol>,
}
