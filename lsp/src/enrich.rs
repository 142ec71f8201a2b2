//! Source-text snippets for locations and diagnostics.

use std::collections::HashMap;

use lspbridge_types::{DocumentDiagnostic, SymbolLocation};

use crate::protocol;

const MAX_SNIPPET_LINES: usize = 3;
const MAX_SNIPPET_CHARS: usize = 200;

/// Text of 0-based lines `start..=end`: the trimmed line for a single-line
/// range, otherwise the non-empty trimmed lines joined with spaces.
fn range_text(lines: &[&str], start: usize, end: usize) -> Option<String> {
    if start == end {
        return lines.get(start).map(|line| line.trim().to_string());
    }
    let end = end.min(lines.len().checked_sub(1)?);
    let joined = lines
        .get(start..=end)?
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Some(joined)
}

/// Like [`range_text`], capped at a few lines and characters.
fn location_snippet(lines: &[&str], start: usize, end: usize) -> Option<String> {
    if start == end {
        return range_text(lines, start, end);
    }
    let capped_end = end.min(start + MAX_SNIPPET_LINES - 1);
    let mut text = range_text(lines, start, capped_end)?;
    let truncated_lines = capped_end < end;
    if text.chars().count() > MAX_SNIPPET_CHARS {
        text = text.chars().take(MAX_SNIPPET_CHARS).collect();
        text.push_str("...");
    } else if truncated_lines {
        text.push_str("...");
    }
    Some(text)
}

/// Attach snippets to `locations`, reading each file at most once.
/// Locations in unreadable files keep no text.
pub(crate) async fn enrich_locations(locations: Vec<SymbolLocation>) -> Vec<SymbolLocation> {
    let mut contents: HashMap<String, Option<String>> = HashMap::new();
    for location in &locations {
        if contents.contains_key(&location.file_path) {
            continue;
        }
        let text = match protocol::file_uri_to_path(&location.file_path) {
            Some(path) => match tokio::fs::read(&path).await {
                Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    tracing::debug!("Cannot read {} for snippets: {e}", path.display());
                    None
                }
            },
            None => None,
        };
        contents.insert(location.file_path.clone(), text);
    }

    locations
        .into_iter()
        .map(|location| {
            let snippet = contents
                .get(&location.file_path)
                .and_then(Option::as_deref)
                .and_then(|text| {
                    let (start, end) = (location.start_line?, location.end_line?);
                    let lines: Vec<&str> = text.lines().collect();
                    location_snippet(&lines, start.checked_sub(1)? as usize, end.checked_sub(1)? as usize)
                });
            location.with_text(snippet)
        })
        .collect()
}

/// Attach the enclosed source text of `document` to each diagnostic.
pub(crate) fn attach_diagnostic_text(document: &str, diagnostics: &mut [DocumentDiagnostic]) {
    let lines: Vec<&str> = document.lines().collect();
    for diagnostic in diagnostics {
        diagnostic.text = range_text(
            &lines,
            diagnostic.start_line as usize,
            diagnostic.end_line as usize,
        );
    }
}
