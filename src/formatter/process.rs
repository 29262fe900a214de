// src/formatter/process.rs - Synchronous external tool execution

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` did not finish within {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// How to run a tool: working directory, environment overrides, stdin text.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub cwd: Option<PathBuf>,
    /// Applied on top of the inherited environment.
    pub env: HashMap<String, String>,
    pub input: String,
    pub timeout: Option<Duration>,
}

/// Outcome of one tool invocation. `exit_code` is `None` when the process
/// could not be spawned, was killed, or ended by signal.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<ProcessError>,
}

impl ExecutionResult {
    pub fn failed(error: ProcessError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

pub trait ProcessRunner {
    fn run(&self, command: &str, args: &[String], options: &ExecOptions) -> ExecutionResult;
}

/// Runs tools as real child processes, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &str, args: &[String], options: &ExecOptions) -> ExecutionResult {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                return ExecutionResult::failed(ProcessError::Spawn {
                    command: command.to_string(),
                    source,
                });
            }
        };

        // Feed stdin and drain both pipes on helper threads so a tool that
        // writes a lot before reading everything cannot block on a full pipe.
        let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
        let writer = child.stdin.take().map(|mut stdin| {
            let input = options.input.clone();
            spawn_worker(move || stdin.write_all(input.as_bytes()))
        });
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = match wait(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => return timed_out(command, options),
            Err(source) => {
                return ExecutionResult::failed(ProcessError::Io {
                    command: command.to_string(),
                    source,
                });
            }
        };

        // The child is gone, but a background process it started may still
        // hold the pipes open. The deadline covers that wait too.
        let (stdout, stderr, written) = match (
            collect(stdout, deadline),
            collect(stderr, deadline),
            collect(writer, deadline),
        ) {
            (Ok(stdout), Ok(stderr), Ok(written)) => (stdout, stderr, written),
            _ => return timed_out(command, options),
        };

        let mut result = ExecutionResult {
            exit_code: status.code(),
            stdout: decode(stdout),
            stderr: decode(stderr),
            error: None,
        };

        if let Some(Err(err)) = written {
            // A tool may exit without reading all of its input
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                result.error = Some(ProcessError::Io {
                    command: command.to_string(),
                    source: err,
                });
            }
        }

        result
    }
}

/// Helper threads are left detached: whatever still holds the pipes is out
/// of our reach.
fn timed_out(command: &str, options: &ExecOptions) -> ExecutionResult {
    ExecutionResult::failed(ProcessError::TimedOut {
        command: command.to_string(),
        timeout: options.timeout.unwrap_or_default(),
    })
}

/// Waits for `child`, killing it once `deadline` passes. `Ok(None)` means
/// the child was killed.
fn wait(
    child: &mut Child,
    deadline: Option<Instant>,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let Some(deadline) = deadline else {
        return child.wait().map(Some);
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            child.kill()?;
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_worker<T: Send + 'static>(work: impl FnOnce() -> T + Send + 'static) -> Receiver<T> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        // Nobody is listening once the run has given up on this worker
        let _ = sender.send(work());
    });
    receiver
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    spawn_worker(move || {
        let mut bytes = Vec::new();
        // Whatever was read before an error is still returned
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

struct DeadlinePassed;

/// A worker's result, waiting at most until `deadline`. `Ok(None)` when
/// there was no worker or it died without answering.
fn collect<T>(
    worker: Option<Receiver<T>>,
    deadline: Option<Instant>,
) -> Result<Option<T>, DeadlinePassed> {
    let Some(worker) = worker else {
        return Ok(None);
    };
    let received = match deadline {
        Some(deadline) => worker.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => worker.recv().map_err(RecvTimeoutError::from),
    };
    match received {
        Ok(value) => Ok(Some(value)),
        Err(RecvTimeoutError::Timeout) => Err(DeadlinePassed),
        Err(RecvTimeoutError::Disconnected) => Ok(None),
    }
}

fn decode(bytes: Option<Vec<u8>>) -> String {
    bytes
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Environment overrides for a tool: explicit `overrides`, plus `path_dirs`
/// prepended to the inherited (or overridden) `PATH`.
pub fn tool_env(overrides: &HashMap<String, String>, path_dirs: &[PathBuf]) -> HashMap<String, String> {
    let mut env = overrides.clone();
    if path_dirs.is_empty() {
        return env;
    }

    let current: OsString = env
        .get("PATH")
        .map(OsString::from)
        .or_else(|| std::env::var_os("PATH"))
        .unwrap_or_default();
    let dirs = path_dirs
        .iter()
        .cloned()
        .chain(std::env::split_paths(&current));
    match std::env::join_paths(dirs) {
        Ok(joined) => {
            env.insert("PATH".to_string(), joined.to_string_lossy().into_owned());
        }
        Err(err) => log::warn!("ignoring extra tool paths: {}", err),
    }
    env
}

/// Directory `bin` under each entry of a GOPATH-style list.
pub fn gopath_bins(gopath: &str) -> Vec<PathBuf> {
    std::env::split_paths(gopath)
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.join("bin"))
        .collect()
}
