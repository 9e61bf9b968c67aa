use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "farmgate-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the REST service (default).
    Serve,
    /// Compile a schema file and report every error in it.
    CheckSchema { path: PathBuf },
    /// Print the built-in harvest schema.
    PrintSchema,
}
