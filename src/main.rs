use anyhow::{Context, bail};
use go_formatter::cli;
use go_formatter::config::{Config, ConfigStore};
use go_formatter::formatter::{DiagnosticStore, SystemRunner};
use go_formatter::host::TextBuffer;
use go_formatter::integration::Integration;
use go_formatter::project::ProjectPaths;
use go_formatter::workspace::Workspace;
use std::cell::RefCell;
use std::rc::Rc;

/// Opens each file as a buffer in an in-process workspace, activates the
/// formatter integration on it and then either saves every buffer (running
/// the on-save tools) or dispatches a single tool command.
///
/// Exits with status 1 when any tool reported a problem.
fn main() -> anyhow::Result<()> {
    let cli_args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => e.exit(),
    };

    // Set RUST_LOG to control verbosity
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = Config::load(cli_args.config.as_deref()).context("failed to load config")?;
    let command = cli_args.tool.as_deref().map(|tool| config.command_name(tool));

    let workspace = Rc::new(Workspace::new(ProjectPaths::new(cli_args.project_roots())));
    let store = ConfigStore::new(config);
    let mut integration = Integration::activate(workspace.clone(), &store, Box::new(SystemRunner::new()));

    if let Some(command) = &command
        && !integration.command_names().contains(command)
    {
        bail!("no tool registered as '{}'", command);
    }

    let diagnostics = Rc::new(RefCell::new(DiagnosticStore::new()));
    integration.set_diagnostic_sink(Box::new(Rc::clone(&diagnostics)));

    let mut reported = 0;
    for path in &cli_args.files {
        let buffer = workspace
            .open_file(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        match &command {
            Some(command) => {
                workspace.dispatch(command);
                if cli_args.stdout {
                    print!("{}", buffer.borrow().text());
                } else {
                    // Bypass the on-save tools so only the requested one runs
                    let mut buffer = buffer.borrow_mut();
                    if buffer.modified {
                        buffer
                            .write()
                            .with_context(|| format!("failed to write {}", path.display()))?;
                    }
                }
            }
            None => workspace
                .save(&buffer)
                .with_context(|| format!("failed to save {}", path.display()))?,
        }

        // The sink is cleared before every run, so report per file
        let store = diagnostics.borrow();
        for diagnostic in store.diagnostics() {
            eprintln!("{}", diagnostic);
            reported += 1;
        }
        for message in store.unparsed() {
            eprintln!("{}: {}", path.display(), message);
            reported += 1;
        }
        drop(store);
        workspace.close(&buffer);
    }

    integration.deactivate();

    if reported > 0 {
        std::process::exit(1);
    }
    Ok(())
}
