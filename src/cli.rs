use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "codecontext",
    about = "Code-context graph generator with git co-change neighborhoods"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(help = "Repository root (default: current directory)")]
    pub path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Quick summary of the last analysis")]
    Status {
        #[arg(help = "Repository root (default: current directory)")]
        path: Option<PathBuf>,
    },
    #[command(about = "Clear the persistent graph cache")]
    Clean {
        #[arg(help = "Repository root (default: current directory)")]
        path: Option<PathBuf>,
    },
}
