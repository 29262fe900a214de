// src/formatter/mod.rs - External tool formatting pipeline

pub mod diagnostics;
pub mod orchestrator;
pub mod patch;
pub mod process;
pub mod registry;

pub use diagnostics::{Diagnostic, DiagnosticSink, DiagnosticStore, Severity};
pub use orchestrator::{FormatOrchestrator, FormatOutcome, FormatSettings};
pub use process::{ExecOptions, ExecutionResult, ProcessError, ProcessRunner, SystemRunner};
pub use registry::ToolRegistry;
