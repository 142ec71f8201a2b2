//! Splitting a profile's command string into program and arguments.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandLineError {
    #[error("command line is empty")]
    Empty,
    #[error("unterminated {0} quote in command line")]
    UnterminatedQuote(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Tokenize a shell-like command line.
    ///
    /// Whitespace separates words. Single and double quotes group words; a
    /// backslash inside double quotes escapes `"` and `\`. Backslashes
    /// elsewhere are literal so Windows paths survive untouched.
    pub fn parse(input: &str) -> Result<Self, CommandLineError> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut quote: Option<char> = None;
        let mut chars = input.chars().peekable();

        while let Some(ch) = chars.next() {
            match (quote, ch) {
                (Some('"'), '\\') if matches!(chars.peek(), Some('"' | '\\')) => {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                }
                (Some(q), c) if c == q => quote = None,
                (Some(_), c) => current.push(c),
                (None, '"' | '\'') => {
                    quote = Some(ch);
                    in_word = true;
                }
                (None, c) if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                (None, c) => {
                    current.push(c);
                    in_word = true;
                }
            }
        }

        if let Some(q) = quote {
            return Err(CommandLineError::UnterminatedQuote(q));
        }
        if in_word {
            words.push(current);
        }

        let mut words = words.into_iter();
        let program = words.next().ok_or(CommandLineError::Empty)?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}
