//! Editor-facing cursor positions.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("editor positions are 1-based, got {line}:{character}")]
pub struct InvalidPositionError {
    pub line: u32,
    pub character: u32,
}

/// A 1-based (line, character) cursor position.
///
/// This is the only position shape callers ever see. The wire layer turns it
/// into a 0-based protocol position exactly once, right before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EditorPosition {
    line: u32,
    character: u32,
}

impl EditorPosition {
    pub fn new(line: u32, character: u32) -> Result<Self, InvalidPositionError> {
        if line == 0 || character == 0 {
            return Err(InvalidPositionError { line, character });
        }
        Ok(Self { line, character })
    }

    #[must_use]
    pub const fn line(self) -> u32 {
        self.line
    }

    #[must_use]
    pub const fn character(self) -> u32 {
        self.character
    }

    /// The same position in 0-based (line, character) form.
    #[must_use]
    pub const fn to_zero_based(self) -> (u32, u32) {
        (self.line - 1, self.character - 1)
    }
}

impl fmt::Display for EditorPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}
