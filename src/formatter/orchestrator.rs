// src/formatter/orchestrator.rs - Run a tool against a buffer and apply the result

use super::diagnostics::{self, Diagnostic, DiagnosticSink};
use super::patch;
use super::process::{ExecOptions, ExecutionResult, ProcessRunner};
use crate::config::ToolDescriptor;
use crate::host::TextBuffer;
use crate::project::ProjectPaths;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// What a single `format` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// Wrong grammar or dead buffer; the tool was not run.
    Ineligible,
    Formatted { edits: usize },
    /// The tool succeeded and its output matched the buffer.
    Unchanged,
    Failed { diagnostics: Vec<Diagnostic> },
    Skipped { exit_code: Option<i32> },
    SpawnFailed,
}

/// Everything the orchestrator needs besides the runner.
#[derive(Debug, Clone)]
pub struct FormatSettings {
    /// Grammar scope a buffer must have to be formatted.
    pub scope: String,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub projects: ProjectPaths,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            scope: crate::language::GO_SCOPE.to_string(),
            env: HashMap::new(),
            timeout: None,
            projects: ProjectPaths::default(),
        }
    }
}

pub struct FormatOrchestrator {
    runner: Box<dyn ProcessRunner>,
    settings: RefCell<FormatSettings>,
    sink: RefCell<Option<Box<dyn DiagnosticSink>>>,
}

impl FormatOrchestrator {
    pub fn new(runner: Box<dyn ProcessRunner>, settings: FormatSettings) -> Self {
        Self {
            runner,
            settings: RefCell::new(settings),
            sink: RefCell::new(None),
        }
    }

    pub fn set_diagnostic_sink(&self, sink: Box<dyn DiagnosticSink>) {
        *self.sink.borrow_mut() = Some(sink);
    }

    pub fn take_diagnostic_sink(&self) -> Option<Box<dyn DiagnosticSink>> {
        self.sink.borrow_mut().take()
    }

    pub fn update_settings(&self, settings: FormatSettings) {
        *self.settings.borrow_mut() = settings;
    }

    pub fn is_eligible(&self, buffer: &dyn TextBuffer) -> bool {
        buffer.is_alive() && buffer.grammar_scope() == Some(self.settings.borrow().scope.as_str())
    }

    /// Formats `buffer` with `tool`. `save_path` overrides the buffer's own
    /// path when anchoring diagnostics (a save-as target).
    ///
    /// Never fails: every problem is resolved here and reported through the
    /// outcome, the log and the diagnostic sink.
    pub fn format(
        &self,
        buffer: &mut dyn TextBuffer,
        tool: &ToolDescriptor,
        save_path: Option<&Path>,
    ) -> FormatOutcome {
        if !self.is_eligible(buffer) {
            log::trace!("{}: buffer not eligible", tool.name);
            return FormatOutcome::Ineligible;
        }

        let file_path = save_path.or_else(|| buffer.path()).map(Path::to_path_buf);
        let options = {
            let settings = self.settings.borrow();
            ExecOptions {
                cwd: settings.projects.resolve(buffer.path()),
                env: settings.env.clone(),
                input: buffer.text(),
                timeout: settings.timeout,
            }
        };

        self.clear_diagnostics();
        log::debug!("{}: running {} {:?}", tool.name, tool.cmd, tool.args);
        let result = self.runner.run(&tool.cmd, &tool.args, &options);
        self.dispatch(buffer, tool, file_path.as_deref(), result)
    }

    fn dispatch(
        &self,
        buffer: &mut dyn TextBuffer,
        tool: &ToolDescriptor,
        file_path: Option<&Path>,
        result: ExecutionResult,
    ) -> FormatOutcome {
        if let Some(err) = result.error {
            log::warn!("{}: {}", tool.name, err);
            return FormatOutcome::SpawnFailed;
        }

        if !result.stderr.trim().is_empty() {
            let diagnostics = diagnostics::parse(file_path, &result.stderr);
            self.publish(tool, &result.stderr, diagnostics.clone());
            return FormatOutcome::Failed { diagnostics };
        }

        if result.exit_code == Some(0) && !result.stdout.trim().is_empty() {
            return match patch::apply(buffer, &result.stdout) {
                Ok(0) => FormatOutcome::Unchanged,
                Ok(edits) => {
                    log::debug!("{}: applied {} edits", tool.name, edits);
                    FormatOutcome::Formatted { edits }
                }
                Err(err) => {
                    log::error!("{}: could not apply formatted output: {}", tool.name, err);
                    FormatOutcome::Skipped {
                        exit_code: result.exit_code,
                    }
                }
            };
        }

        log::debug!("{}: skipped (exit code {:?})", tool.name, result.exit_code);
        FormatOutcome::Skipped {
            exit_code: result.exit_code,
        }
    }

    fn clear_diagnostics(&self) {
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            sink.clear();
        }
    }

    fn publish(&self, tool: &ToolDescriptor, stderr: &str, diagnostics: Vec<Diagnostic>) {
        let positioned = !diagnostics.is_empty();
        let mut guard = self.sink.borrow_mut();
        if let Some(sink) = guard.as_mut() {
            log::warn!("{}: {} problem(s) reported", tool.name, diagnostics.len());
            sink.set_all(diagnostics);
            if !positioned {
                sink.report_unparsed(&tool.name, stderr);
            }
        }
        // Without positions the raw text is the only trace of the failure
        if guard.is_none() || !positioned {
            log::warn!("{}: (stderr) {}", tool.name, stderr.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Buffer;
    use crate::formatter::diagnostics::DiagnosticStore;
    use crate::formatter::process::ProcessError;
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct Scripted {
        calls: Rc<Cell<usize>>,
        respond: Box<dyn Fn(&ExecOptions) -> ExecutionResult>,
    }

    impl ProcessRunner for Scripted {
        fn run(&self, _command: &str, _args: &[String], options: &ExecOptions) -> ExecutionResult {
            self.calls.set(self.calls.get() + 1);
            (self.respond)(options)
        }
    }

    fn orchestrator(
        respond: impl Fn(&ExecOptions) -> ExecutionResult + 'static,
    ) -> (FormatOrchestrator, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let runner = Scripted {
            calls: Rc::clone(&calls),
            respond: Box::new(respond),
        };
        (
            FormatOrchestrator::new(Box::new(runner), FormatSettings::default()),
            calls,
        )
    }

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            error: None,
        }
    }

    fn go_buffer(text: &str) -> Buffer {
        Buffer::with_text(text, Some(PathBuf::from("/a/b.go")))
    }

    #[test]
    fn test_formats_buffer() {
        let (orchestrator, _) = orchestrator(|_| output(0, "package main\n", ""));
        let mut buffer = go_buffer("package  main\n");
        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::Formatted { edits: 1 });
        assert_eq!(buffer.text(), "package main\n");
    }

    #[test]
    fn test_passes_buffer_text_as_input() {
        let (orchestrator, _) = orchestrator(|options| output(0, &options.input, ""));
        let mut buffer = go_buffer("package main\n");
        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::Unchanged);
        assert_eq!(buffer.version, 0);
    }

    #[test]
    fn test_stderr_takes_priority_over_stdout() {
        let (orchestrator, _) =
            orchestrator(|_| output(0, "package main\n", "<standard input>:1:9: oops\n"));
        let mut buffer = go_buffer("package  main\n");
        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert!(matches!(outcome, FormatOutcome::Failed { ref diagnostics } if diagnostics.len() == 1));
        assert_eq!(buffer.text(), "package  main\n");
    }

    #[test]
    fn test_skip_on_nonzero_exit_without_output() {
        let (orchestrator, _) = orchestrator(|_| output(1, "", ""));
        let store = Rc::new(RefCell::new(DiagnosticStore::new()));
        orchestrator.set_diagnostic_sink(Box::new(Rc::clone(&store)));
        let mut buffer = go_buffer("x");

        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::Skipped { exit_code: Some(1) });
        assert_eq!(buffer.text(), "x");
        assert!(store.borrow().is_empty());
    }

    #[test]
    fn test_skip_on_zero_exit_with_blank_stdout() {
        let (orchestrator, _) = orchestrator(|_| output(0, "  \n", ""));
        let mut buffer = go_buffer("package main\n");
        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::Skipped { exit_code: Some(0) });
        assert_eq!(buffer.text(), "package main\n");
    }

    #[test]
    fn test_ineligible_buffer_never_runs_tool() {
        let (orchestrator, calls) = orchestrator(|_| output(0, "changed", ""));
        let mut rust = Buffer::with_text("fn main() {}", Some(PathBuf::from("main.rs")));
        let mut unnamed = Buffer::with_text("package main", None);
        let mut dead = go_buffer("package main");
        dead.destroy();

        for buffer in [&mut rust, &mut unnamed, &mut dead] {
            let outcome = orchestrator.format(buffer, &ToolDescriptor::gofmt(), None);
            assert_eq!(outcome, FormatOutcome::Ineligible);
        }
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_spawn_failure_leaves_buffer() {
        let (orchestrator, _) = orchestrator(|_| {
            ExecutionResult::failed(ProcessError::Spawn {
                command: "gofmt".to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });
        let mut buffer = go_buffer("package main");
        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::SpawnFailed);
        assert_eq!(buffer.text(), "package main");
    }

    #[test]
    fn test_failure_publishes_and_success_clears() {
        let fail = Rc::new(Cell::new(true));
        let switch = Rc::clone(&fail);
        let (orchestrator, _) = orchestrator(move |options| {
            if switch.get() {
                output(2, "", "<standard input>:3:10: expected ';', found newline\n")
            } else {
                output(0, &options.input, "")
            }
        });
        let store = Rc::new(RefCell::new(DiagnosticStore::new()));
        orchestrator.set_diagnostic_sink(Box::new(Rc::clone(&store)));
        let mut buffer = go_buffer("package main\n");

        orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        {
            let store = store.borrow();
            assert_eq!(store.diagnostics().len(), 1);
            let diagnostic = &store.diagnostics()[0];
            assert_eq!(diagnostic.file_path, PathBuf::from("/a/b.go"));
            assert_eq!((diagnostic.line, diagnostic.column_start, diagnostic.column_end), (2, 9, 10));
        }

        fail.set(false);
        orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert!(store.borrow().is_empty());
    }

    #[test]
    fn test_unpositioned_stderr_is_reported() {
        let (orchestrator, _) =
            orchestrator(|_| output(2, "", "goimports: open /x/go.mod: permission denied\n"));
        let store = Rc::new(RefCell::new(DiagnosticStore::new()));
        orchestrator.set_diagnostic_sink(Box::new(Rc::clone(&store)));
        let mut buffer = go_buffer("package main\n");

        let outcome = orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
        assert_eq!(outcome, FormatOutcome::Failed { diagnostics: vec![] });
        assert_eq!(buffer.text(), "package main\n");
        assert!(store.borrow().is_empty());
        assert_eq!(
            store.borrow().unparsed(),
            ["gofmt: goimports: open /x/go.mod: permission denied"]
        );
    }

    #[test]
    fn test_save_path_anchors_diagnostics() {
        let (orchestrator, _) = orchestrator(|_| output(2, "", "<standard input>:1:1: bad\n"));
        let mut buffer = go_buffer("x");
        let outcome = orchestrator.format(
            &mut buffer,
            &ToolDescriptor::gofmt(),
            Some(Path::new("/elsewhere/c.go")),
        );
        let FormatOutcome::Failed { diagnostics } = outcome else {
            panic!("expected failure, got {:?}", outcome);
        };
        assert_eq!(diagnostics[0].file_path, PathBuf::from("/elsewhere/c.go"));
    }

    #[test]
    fn test_cwd_is_project_root() {
        let (orchestrator, _) = orchestrator(|options| {
            assert_eq!(options.cwd.as_deref(), Some(Path::new("/a")));
            output(0, &options.input, "")
        });
        let mut settings = FormatSettings::default();
        settings.projects = ProjectPaths::new(vec![PathBuf::from("/a")]);
        orchestrator.update_settings(settings);

        let mut buffer = go_buffer("package main\n");
        orchestrator.format(&mut buffer, &ToolDescriptor::gofmt(), None);
    }
}
