use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Default, Parser)]
#[command(name = "go-formatter")]
#[command(version = "0.1.0")]
#[command(about = "Run gofmt-style tools over Go buffers, as an editor would on save")]
pub struct CliArgs {
    /// Go source files to format
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Config file (TOML, or JSON with a .json extension)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Project root used as the tools' working directory (repeatable)
    #[arg(long, short = 'p')]
    pub project: Vec<PathBuf>,

    /// Run this tool's command instead of the on-save tools
    #[arg(long, short = 't')]
    pub tool: Option<String>,

    /// Print the formatted text instead of writing it back (requires --tool)
    #[arg(long, requires = "tool")]
    pub stdout: bool,
}

impl CliArgs {
    /// Project roots, defaulting to the current directory.
    pub fn project_roots(&self) -> Vec<PathBuf> {
        if !self.project.is_empty() {
            return self.project.clone();
        }
        std::env::current_dir().map(|dir| vec![dir]).unwrap_or_default()
    }
}

pub fn parse_args() -> Result<CliArgs, clap::Error> {
    CliArgs::try_parse()
}
