use crate::cursor::Cursor;
use crate::host::{DestroyHandler, TextBuffer, TextEdit, WillSaveHandler};
use crate::language::scope_for_path;
use crate::subscription::{Emitter, Subscription};
use ropey::Rope;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum BufferError {
    Io(std::io::Error),
    InvalidEdit { range: std::ops::Range<usize>, len: usize },
    NoPath,
    Destroyed,
}

impl From<std::io::Error> for BufferError {
    fn from(err: std::io::Error) -> Self {
        BufferError::Io(err)
    }
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Io(err) => write!(f, "IO error: {}", err),
            BufferError::InvalidEdit { range, len } => write!(
                f,
                "Edit {}..{} is out of order or outside buffer of {} chars",
                range.start, range.end, len
            ),
            BufferError::NoPath => write!(f, "Buffer has no file path"),
            BufferError::Destroyed => write!(f, "Buffer has been destroyed"),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// One undoable step: the edits that revert it, in post-edit coordinates.
#[derive(Debug, Clone)]
struct Transaction {
    inverse: Vec<TextEdit>,
}

pub struct Buffer {
    pub rope: Rope,
    pub file_path: Option<PathBuf>,
    pub grammar_scope: Option<String>,
    pub modified: bool,
    pub version: usize,
    pub cursor: Cursor,
    undo_stack: Vec<Transaction>,
    alive: bool,
    will_save: Emitter<WillSaveHandler>,
    destroyed: Emitter<DestroyHandler>,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            rope: Rope::from(""),
            file_path: None,
            grammar_scope: None,
            modified: false,
            version: 0,
            cursor: Cursor::new(),
            undo_stack: Vec::new(),
            alive: true,
            will_save: Emitter::new(),
            destroyed: Emitter::new(),
        }
    }

    /// An unsaved buffer holding `text`, with the scope inferred from `path`.
    pub fn with_text(text: &str, path: Option<PathBuf>) -> Self {
        let mut buffer = Self::new();
        buffer.rope = Rope::from_str(text);
        buffer.grammar_scope = path
            .as_deref()
            .and_then(scope_for_path)
            .map(str::to_string);
        buffer.file_path = path;
        buffer
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("file_path", &self.file_path)
            .field("grammar_scope", &self.grammar_scope)
            .field("modified", &self.modified)
            .field("version", &self.version)
            .field("alive", &self.alive)
            .finish()
    }
}

impl Buffer {
    /// Inserts `text` at `line`/`col`. The column may point at most at the
    /// end of the line, before its newline.
    pub fn insert_text(&mut self, text: &str, line: usize, col: usize) -> Result<(), BufferError> {
        let len = self.rope.len_chars();
        if line >= self.rope.len_lines() || col > self.line_len(line) {
            return Err(BufferError::InvalidEdit { range: len..len, len });
        }
        let char_idx = self.rope.line_to_char(line) + col;
        self.apply_edits(&[TextEdit::insert(char_idx, text)])
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    pub fn line(&self, line_idx: usize) -> Option<String> {
        if line_idx < self.rope.len_lines() {
            let line = self.rope.line(line_idx).to_string();
            if line.ends_with('\n') {
                Some(line.trim_end_matches('\n').to_string())
            } else {
                Some(line)
            }
        } else {
            None
        }
    }

    /// Chars on `line_idx`, not counting the line ending.
    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line(line_idx).map_or(0, |line| line.trim_end_matches('\r').chars().count())
    }

    /// Number of transactions that `undo` can revert.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Reverts the most recent transaction. Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<bool, BufferError> {
        let Some(transaction) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(err) = self.apply_batch(&transaction.inverse) {
            self.undo_stack.push(transaction);
            return Err(err);
        }
        self.modified = true;
        self.version += 1;
        Ok(true)
    }

    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BufferError> {
        let content = fs::read_to_string(path.as_ref())?;
        self.rope = Rope::from_str(&content);
        self.file_path = Some(path.as_ref().to_path_buf());
        self.grammar_scope = scope_for_path(path.as_ref()).map(str::to_string);
        self.modified = false;
        self.version = 0;
        self.cursor = Cursor::new();
        self.undo_stack.clear();
        Ok(())
    }

    /// Writes the buffer to its own path, running will-save handlers first.
    pub fn save(&mut self) -> Result<(), BufferError> {
        let path = self.file_path.clone().ok_or(BufferError::NoPath)?;
        self.emit_will_save(None)?;
        self.write_to(&path)
    }

    /// Writes the buffer to its own path without notifying will-save handlers.
    pub fn write(&mut self) -> Result<(), BufferError> {
        let path = self.file_path.clone().ok_or(BufferError::NoPath)?;
        self.write_to(&path)
    }

    /// Writes the buffer to `path`, which becomes the buffer's path.
    pub fn save_as<P: AsRef<Path>>(&mut self, path: P) -> Result<(), BufferError> {
        let path = path.as_ref();
        self.emit_will_save(Some(path))?;
        self.write_to(path)?;
        self.file_path = Some(path.to_path_buf());
        if self.grammar_scope.is_none() {
            self.grammar_scope = scope_for_path(path).map(str::to_string);
        }
        Ok(())
    }

    /// Notifies destroy handlers once and releases every handler.
    pub fn destroy(&mut self) {
        if !self.alive {
            return;
        }
        let destroyed = self.destroyed.clone();
        destroyed.emit(|handler| handler());
        self.alive = false;
        self.will_save.clear();
        self.destroyed.clear();
    }

    pub fn will_save_handler_count(&self) -> usize {
        self.will_save.len()
    }

    fn emit_will_save(&mut self, target: Option<&Path>) -> Result<(), BufferError> {
        if !self.alive {
            return Err(BufferError::Destroyed);
        }
        let will_save = self.will_save.clone();
        will_save.emit(|handler| {
            let buffer: &mut dyn TextBuffer = &mut *self;
            handler(buffer, target)
        });
        Ok(())
    }

    fn write_to(&mut self, path: &Path) -> Result<(), BufferError> {
        fs::write(path, self.rope.to_string())?;
        self.modified = false;
        Ok(())
    }

    fn validate(&self, edits: &[TextEdit]) -> Result<(), BufferError> {
        let len = self.rope.len_chars();
        let mut previous_end = 0;
        for edit in edits {
            let range = &edit.range;
            if range.start > range.end || range.end > len || range.start < previous_end {
                return Err(BufferError::InvalidEdit {
                    range: range.clone(),
                    len,
                });
            }
            previous_end = range.end;
        }
        Ok(())
    }

    /// Applies validated edits back to front and returns their inverses.
    fn apply_batch(&mut self, edits: &[TextEdit]) -> Result<Vec<TextEdit>, BufferError> {
        self.validate(edits)?;

        let mut inverse = Vec::with_capacity(edits.len());
        let mut shift: isize = 0;
        for edit in edits {
            let start = (edit.range.start as isize + shift) as usize;
            let inserted = edit.text.chars().count();
            let removed = self.rope.slice(edit.range.clone()).to_string();
            inverse.push(TextEdit::new(start..start + inserted, removed));
            shift += edit.delta();
        }

        for edit in edits.iter().rev() {
            self.rope.remove(edit.range.clone());
            self.rope.insert(edit.range.start, &edit.text);
            self.cursor.map_through(edit);
        }
        Ok(inverse)
    }
}

impl TextBuffer for Buffer {
    fn text(&self) -> String {
        self.rope.to_string()
    }

    fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn grammar_scope(&self) -> Option<&str> {
        self.grammar_scope.as_deref()
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), BufferError> {
        if !self.alive {
            return Err(BufferError::Destroyed);
        }
        if edits.is_empty() {
            return Ok(());
        }
        let inverse = self.apply_batch(edits)?;
        self.undo_stack.push(Transaction { inverse });
        self.modified = true;
        self.version += 1;
        Ok(())
    }

    fn on_will_save(&mut self, handler: Box<WillSaveHandler>) -> Subscription {
        if !self.alive {
            return Subscription::empty();
        }
        self.will_save.subscribe(handler)
    }

    fn on_destroy(&mut self, handler: Box<DestroyHandler>) -> Subscription {
        if !self.alive {
            return Subscription::empty();
        }
        self.destroyed.subscribe(handler)
    }
}
