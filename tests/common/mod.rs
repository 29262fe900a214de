// Common test utilities: a scripted process runner and a wired-up workspace

use go_formatter::buffer::Buffer;
use go_formatter::config::{Config, ConfigStore};
use go_formatter::formatter::{DiagnosticStore, ExecOptions, ExecutionResult, ProcessRunner};
use go_formatter::integration::Integration;
use go_formatter::workspace::{SharedBuffer, Workspace};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// One recorded tool invocation.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Call {
    pub command: String,
    pub args: Vec<String>,
    pub input: String,
    pub cwd: Option<PathBuf>,
}

type Respond = dyn Fn(&str, &ExecOptions) -> ExecutionResult;

/// Answers every run with a scripted result and records what was asked.
pub struct FakeRunner {
    calls: Rc<RefCell<Vec<Call>>>,
    respond: Box<Respond>,
}

impl FakeRunner {
    pub fn new(
        respond: impl Fn(&str, &ExecOptions) -> ExecutionResult + 'static,
    ) -> (Self, Rc<RefCell<Vec<Call>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let runner = Self {
            calls: Rc::clone(&calls),
            respond: Box::new(respond),
        };
        (runner, calls)
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, command: &str, args: &[String], options: &ExecOptions) -> ExecutionResult {
        self.calls.borrow_mut().push(Call {
            command: command.to_string(),
            args: args.to_vec(),
            input: options.input.clone(),
            cwd: options.cwd.clone(),
        });
        (self.respond)(command, options)
    }
}

/// Scripted results shaped like real tool runs.
#[allow(dead_code)]
pub mod results {
    use super::*;

    pub fn success(stdout: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(exit_code),
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    pub fn silent(exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(exit_code),
            ..Default::default()
        }
    }
}

/// A workspace with the integration activated and a shared diagnostic store.
#[allow(dead_code)]
pub struct Harness {
    pub workspace: Rc<Workspace>,
    pub store: ConfigStore,
    pub integration: Integration,
    pub diagnostics: Rc<RefCell<DiagnosticStore>>,
    pub calls: Rc<RefCell<Vec<Call>>>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(
        config: Config,
        respond: impl Fn(&str, &ExecOptions) -> ExecutionResult + 'static,
    ) -> Self {
        Self::with_workspace(Workspace::default(), config, respond)
    }

    pub fn with_workspace(
        workspace: Workspace,
        config: Config,
        respond: impl Fn(&str, &ExecOptions) -> ExecutionResult + 'static,
    ) -> Self {
        let workspace = Rc::new(workspace);
        let store = ConfigStore::new(config);
        let (runner, calls) = FakeRunner::new(respond);
        let integration = Integration::activate(workspace.clone(), &store, Box::new(runner));
        let diagnostics = Rc::new(RefCell::new(DiagnosticStore::new()));
        integration.set_diagnostic_sink(Box::new(Rc::clone(&diagnostics)));
        Self {
            workspace,
            store,
            integration,
            diagnostics,
            calls,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn open_go(&self, dir: &Path, name: &str, text: &str) -> SharedBuffer {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        self.workspace.open_file(&path).unwrap()
    }
}

#[allow(dead_code)]
pub fn go_buffer(text: &str, path: &str) -> Buffer {
    Buffer::with_text(text, Some(PathBuf::from(path)))
}
