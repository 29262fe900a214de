// src/host.rs - Capabilities the formatter needs from the hosting editor

use crate::buffer::BufferError;
use crate::project::ProjectPaths;
use crate::subscription::Subscription;
use std::ops::Range;
use std::path::Path;

/// Replace the chars in `range` (pre-edit coordinates) with `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range<usize>,
    pub text: String,
}

impl TextEdit {
    pub fn new(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::new(at..at, text)
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::new(range, String::new())
    }

    /// Net change in char count once applied.
    pub fn delta(&self) -> isize {
        self.text.chars().count() as isize - self.range.len() as isize
    }
}

/// Called before a buffer is written. The path is the save-as target when
/// the save goes somewhere other than the buffer's own path.
pub type WillSaveHandler = dyn FnMut(&mut dyn TextBuffer, Option<&Path>);
pub type DestroyHandler = dyn FnMut();
/// Invoked with the active buffer, if there is one.
pub type CommandHandler = dyn FnMut(Option<&mut dyn TextBuffer>);
pub type BufferObserver = dyn FnMut(&mut dyn TextBuffer);

/// An editable text buffer owned by the host.
pub trait TextBuffer {
    fn text(&self) -> String;

    fn path(&self) -> Option<&Path>;

    /// Grammar scope name, e.g. `source.go`.
    fn grammar_scope(&self) -> Option<&str>;

    /// False once the underlying text store has been destroyed.
    fn is_alive(&self) -> bool;

    /// Applies a sorted, non-overlapping batch of edits as one transaction.
    fn apply_edits(&mut self, edits: &[TextEdit]) -> Result<(), BufferError>;

    fn on_will_save(&mut self, handler: Box<WillSaveHandler>) -> Subscription;

    fn on_destroy(&mut self, handler: Box<DestroyHandler>) -> Subscription;
}

/// Editor-level services: command bindings and buffer observation.
pub trait Host {
    fn add_command(&self, name: &str, handler: Box<CommandHandler>) -> Subscription;

    /// Calls `observer` for every open buffer now and for each buffer opened
    /// later, until the returned subscription is released.
    fn observe_buffers(&self, observer: Box<BufferObserver>) -> Subscription;

    /// Project roots used to pick a tool's working directory.
    fn project_paths(&self) -> ProjectPaths {
        ProjectPaths::default()
    }
}
