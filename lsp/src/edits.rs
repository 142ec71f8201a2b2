//! Applying server-produced workspace edits to files on disk.
//!
//! Each document is handled on its own: read once, edits applied from the
//! bottom of the file upwards so earlier offsets stay valid, written back
//! atomically. A failing document is reported and does not stop the others.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use lspbridge_types::{FileChangeResult, WorkspaceEditResult};
use lspbridge_utils::atomic_write;

use crate::protocol::{self, Position, TextEdit, WorkspaceEdit};

/// Apply every document's edits. `None` means the server had nothing to
/// change.
pub(crate) fn apply_workspace_edit(edit: Option<WorkspaceEdit>) -> WorkspaceEditResult {
    let mut result = WorkspaceEditResult::default();
    let Some(edit) = edit else {
        return result;
    };

    for (uri, edits) in edit.into_document_edits() {
        match apply_document_edits(&uri, edits) {
            Ok(changed) => {
                tracing::debug!(
                    uri = %uri,
                    edits = changed.edits_applied,
                    lines = changed.lines_changed,
                    "Applied edits"
                );
                result.changed_files.push(changed);
            }
            Err(e) => {
                tracing::warn!("Failed to apply changes to {uri}: {e:#}");
                result
                    .errors
                    .push(format!("Failed to apply changes to {uri}: {e:#}"));
            }
        }
    }
    result
}

fn apply_document_edits(uri: &str, edits: Vec<TextEdit>) -> Result<FileChangeResult> {
    let path = protocol::file_uri_to_path(uri).ok_or_else(|| anyhow!("not a file URI"))?;
    if !path.is_file() {
        bail!("file not found: {}", path.display());
    }
    let content =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;

    let edits_applied = edits.len();
    let (updated, lines_changed) = apply_text_edits(&content, edits)?;
    write_document(&path, &updated)?;

    Ok(FileChangeResult {
        file_path: uri.to_string(),
        edits_applied,
        lines_changed,
    })
}

fn write_document(path: &Path, content: &str) -> Result<()> {
    atomic_write(path, content.as_bytes()).with_context(|| format!("writing {}", path.display()))
}

/// Apply `edits` to `content`. Returns the new text and the number of
/// distinct original lines the edits touched.
pub(crate) fn apply_text_edits(content: &str, edits: Vec<TextEdit>) -> Result<(String, usize)> {
    let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();

    // Descending by start; among edits at the same start the later one goes
    // first so insertions keep their given order.
    let mut ordered: Vec<(usize, TextEdit)> = edits.into_iter().enumerate().collect();
    ordered.sort_by(|(ai, a), (bi, b)| {
        (b.range.start, *bi).cmp(&(a.range.start, *ai))
    });

    for (_, edit) in &ordered {
        splice(&mut lines, edit)
            .with_context(|| format!("edit at {}-{}", edit.range.start, edit.range.end))?;
    }

    // Every range was checked against the document by `splice`.
    let touched: BTreeSet<u32> = ordered
        .iter()
        .flat_map(|(_, edit)| edit.range.start.line..=edit.range.end.line)
        .collect();
    Ok((lines.join("\n"), touched.len()))
}

fn splice(lines: &mut Vec<String>, edit: &TextEdit) -> Result<()> {
    let Position { line: start_line, character: start_char } = edit.range.start;
    let Position { line: end_line, character: end_char } = edit.range.end;
    let (start_line, end_line) = (start_line as usize, end_line as usize);

    if (start_line, start_char) > (end_line, end_char) {
        bail!("range start is after range end");
    }
    if end_line >= lines.len() {
        bail!(
            "line {end_line} is out of range (document has {} lines)",
            lines.len()
        );
    }

    let start_byte = utf16_to_byte_offset(&lines[start_line], start_char)
        .ok_or_else(|| anyhow!("character {start_char} is past the end of line {start_line}"))?;
    let end_byte = utf16_to_byte_offset(&lines[end_line], end_char)
        .ok_or_else(|| anyhow!("character {end_char} is past the end of line {end_line}"))?;

    let mut replaced = String::with_capacity(edit.new_text.len());
    replaced.push_str(&lines[start_line][..start_byte]);
    replaced.push_str(&edit.new_text);
    replaced.push_str(&lines[end_line][end_byte..]);

    lines.splice(
        start_line..=end_line,
        replaced.split('\n').map(str::to_string).collect::<Vec<_>>(),
    );
    Ok(())
}

/// Byte offset of the UTF-16 code unit offset `utf16` in `line`, or `None`
/// if it lies past the end or inside a surrogate pair.
fn utf16_to_byte_offset(line: &str, utf16: u32) -> Option<usize> {
    let target = utf16 as usize;
    let mut units = 0;
    for (byte, ch) in line.char_indices() {
        if units == target {
            return Some(byte);
        }
        units += ch.len_utf16();
        if units > target {
            return None;
        }
    }
    (units == target).then_some(line.len())
}
