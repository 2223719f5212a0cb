//! Command-line argument definitions for stageops.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Command-line interface for stageops.
#[derive(Debug, Parser)]
#[command(name = "stageops")]
#[command(
    author,
    version,
    about = "Reconcile a single host with a declarative deployment document"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the tool configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Deployment document to read.
    #[arg(long, short = 'f', global = true)]
    pub file: Option<Utf8PathBuf>,

    /// Directory whose files override the built-in templates.
    #[arg(long, global = true)]
    pub templates_dir: Option<Utf8PathBuf>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply the deployment document to the host.
    Deploy(DeployArgs),

    /// Validate the deployment document and render every artifact locally.
    Validate(SelectArgs),

    /// Print the artifacts rendered for one app.
    Render(RenderArgs),

    /// Print a GitHub App installation token.
    Token,
}

/// App selection shared by `deploy` and `validate`.
#[derive(Debug, Default, Args)]
pub struct SelectArgs {
    /// Only act on the named app; repeat or separate with commas.
    #[arg(long = "only", value_name = "NAME", value_delimiter = ',')]
    pub only: Vec<String>,
}

/// Arguments for the `deploy` subcommand.
#[derive(Debug, Default, Args)]
pub struct DeployArgs {
    /// App selection.
    #[command(flatten)]
    pub select: SelectArgs,

    /// Print the commands and uploads instead of connecting to the host.
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `render` subcommand.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Project name of the app to render.
    #[arg(required = true)]
    pub name: String,
}
