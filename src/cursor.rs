use crate::host::TextEdit;
use ropey::Rope;

/// Cursor as a char offset into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub offset: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(offset: usize) -> Self {
        Self { offset }
    }

    /// Line and column of the cursor in `rope`, clamped to the text.
    pub fn position(&self, rope: &Rope) -> (usize, usize) {
        let offset = self.offset.min(rope.len_chars());
        let line = rope.char_to_line(offset);
        (line, offset - rope.line_to_char(line))
    }

    /// Moves the cursor as if `edit` had been applied in front of it.
    ///
    /// Offsets up to the start of the edit stay put. Offsets past it shift
    /// by the edit's delta; offsets inside the replaced span land at the end
    /// of the replacement.
    pub fn map_through(&mut self, edit: &TextEdit) {
        if self.offset < edit.range.start
            || (self.offset == edit.range.start && !edit.range.is_empty())
        {
            return;
        }
        if self.offset >= edit.range.end && !edit.range.is_empty() {
            self.offset = (self.offset as isize + edit.delta()) as usize;
        } else if edit.range.is_empty() {
            // Insertion at or before the cursor pushes it forward
            self.offset += edit.text.chars().count();
        } else {
            self.offset = edit.range.start + edit.text.chars().count();
        }
    }
}
