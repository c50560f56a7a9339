use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tdmon")]
#[command(about = "Terminal monitor for a local issue tracker shared with AI agents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Issue database directory (default: ./.todos)
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,

    /// Session id used for @me and review rules (default: a fresh id)
    #[arg(long)]
    pub session: Option<String>,

    /// Hide the footer, for running inside another tool's pane
    #[arg(long)]
    pub embedded: bool,

    /// Seconds between automatic refreshes
    #[arg(long, default_value_t = 2)]
    pub refresh_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty issue database
    Init,
}
