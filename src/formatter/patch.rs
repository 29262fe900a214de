// src/formatter/patch.rs - Apply tool output as a minimal set of edits

use crate::buffer::BufferError;
use crate::host::{TextBuffer, TextEdit};
use similar::{DiffTag, TextDiff};

/// Line-level edits turning `old` into `new`, sorted and expressed in
/// `old`'s char offsets. Empty when the texts are identical.
pub fn compute_edits(old: &str, new: &str) -> Vec<TextEdit> {
    if old == new {
        return Vec::new();
    }

    let diff = TextDiff::from_lines(old, new);
    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();

    // Char offset of the start of each old line, plus the end of the text
    let mut line_starts = Vec::with_capacity(old_lines.len() + 1);
    let mut offset = 0;
    line_starts.push(offset);
    for line in old_lines {
        offset += line.chars().count();
        line_starts.push(offset);
    }

    diff.ops()
        .iter()
        .filter(|op| op.tag() != DiffTag::Equal)
        .map(|op| {
            let old_range = op.old_range();
            let text: String = new_lines[op.new_range()].concat();
            TextEdit::new(line_starts[old_range.start]..line_starts[old_range.end], text)
        })
        .collect()
}

/// Replaces the buffer's text with `new_text`, touching only the lines that
/// differ. Returns the number of edits applied; zero means the buffer was
/// left untouched.
pub fn apply(buffer: &mut dyn TextBuffer, new_text: &str) -> Result<usize, BufferError> {
    let edits = compute_edits(&buffer.text(), new_text);
    if edits.is_empty() {
        return Ok(0);
    }
    buffer.apply_edits(&edits)?;
    Ok(edits.len())
}
