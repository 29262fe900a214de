// src/formatter/diagnostics.rs - Tool stderr parsing and diagnostic publishing

use lsp_types::{DiagnosticSeverity, Position, Range};
use regex::Regex;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

/// `<standard input>:12:5: message`, as printed by tools reading stdin.
static STDIN_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<.*?>:(\d+):(\d+):(.*)$").expect("valid stdin position pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

/// A position-anchored problem reported by a tool. Line and columns are
/// 0-based; `column_end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub file_path: PathBuf,
    pub line: u32,
    pub column_start: u32,
    pub column_end: u32,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn range(&self) -> Range {
        Range {
            start: Position {
                line: self.line,
                character: self.column_start,
            },
            end: Position {
                line: self.line,
                character: self.column_end,
            },
        }
    }

    pub fn to_lsp(&self, source: &str) -> lsp_types::Diagnostic {
        lsp_types::Diagnostic {
            range: self.range(),
            severity: Some(match self.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
            }),
            source: Some(source.to_string()),
            message: self.message.clone(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for Diagnostic {
    /// `file:line:col: message` with 1-based positions.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file_path.display(),
            self.line + 1,
            self.column_start + 1,
            self.message
        )
    }
}

/// Parses one stderr line; `None` for anything that is not a well-formed
/// `<...>:line:col:message` record with 1-based positions.
pub fn parse_line(file: &Path, line: &str) -> Option<Diagnostic> {
    let captures = STDIN_POSITION.captures(line)?;
    let line_no: u32 = captures.get(1)?.as_str().parse().ok()?;
    let column: u32 = captures.get(2)?.as_str().parse().ok()?;
    let line_no = line_no.checked_sub(1)?;
    let column_start = column.checked_sub(1)?;

    Some(Diagnostic {
        file_path: file.to_path_buf(),
        line: line_no,
        column_start,
        column_end: column_start + 1,
        message: captures
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        severity: Severity::Error,
    })
}

/// Lazily yields the diagnostics found in `stderr`, anchored to `file`.
/// Yields nothing when there is no file to anchor them to.
pub fn parse_iter<'a>(
    file: Option<&'a Path>,
    stderr: &'a str,
) -> impl Iterator<Item = Diagnostic> + 'a {
    file.into_iter()
        .flat_map(move |file| stderr.lines().filter_map(move |line| parse_line(file, line)))
}

pub fn parse(file: Option<&Path>, stderr: &str) -> Vec<Diagnostic> {
    parse_iter(file, stderr).collect()
}

/// Receives the full diagnostic set after each format run.
pub trait DiagnosticSink {
    fn clear(&mut self);

    /// Replaces everything previously published.
    fn set_all(&mut self, diagnostics: Vec<Diagnostic>);

    /// Stderr from a failed run that held no positioned diagnostics.
    fn report_unparsed(&mut self, _tool: &str, _stderr: &str) {}
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Rc<RefCell<T>> {
    fn clear(&mut self) {
        self.borrow_mut().clear();
    }

    fn set_all(&mut self, diagnostics: Vec<Diagnostic>) {
        self.borrow_mut().set_all(diagnostics);
    }

    fn report_unparsed(&mut self, tool: &str, stderr: &str) {
        self.borrow_mut().report_unparsed(tool, stderr);
    }
}

/// In-memory sink holding the latest published set.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
    diagnostics: Vec<Diagnostic>,
    unparsed: Vec<String>,
    publish_count: usize,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// `tool: message` lines from failures without positions.
    pub fn unparsed(&self) -> &[String] {
        &self.unparsed
    }

    pub fn diagnostics_at_line(&self, file: &Path, line: u32) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.file_path == file && d.line == line)
            .collect()
    }

    /// How many non-empty sets have been published.
    pub fn publish_count(&self) -> usize {
        self.publish_count
    }
}

impl DiagnosticSink for DiagnosticStore {
    fn clear(&mut self) {
        self.diagnostics.clear();
        self.unparsed.clear();
    }

    fn set_all(&mut self, diagnostics: Vec<Diagnostic>) {
        if !diagnostics.is_empty() {
            self.publish_count += 1;
        }
        self.diagnostics = diagnostics;
    }

    fn report_unparsed(&mut self, tool: &str, stderr: &str) {
        self.unparsed.extend(
            stderr
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty())
                .map(|line| format!("{}: {}", tool, line)),
        );
    }
}
