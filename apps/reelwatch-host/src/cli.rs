use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "reelwatch-host",
    version,
    about = "Browser native messaging host that reports watched movies and shows",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Caller details passed by the browser: the extension origin (Chrome), or
    /// the app manifest path and extension id (Firefox).
    pub caller: Vec<String>,

    /// Handle of the calling window, passed by Chrome on Windows.
    #[arg(long, hide = true)]
    pub parent_window: Option<String>,

    /// Config file to load instead of the platform default.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the native messaging host manifest for an extension.
    Manifest {
        /// Extension id allowed to connect.
        #[arg(long)]
        extension_id: String,

        /// Host binary path to put in the manifest. Defaults to this executable.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}
