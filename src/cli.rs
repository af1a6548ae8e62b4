use crate::app::RunOptions;
use clap::Parser;
use std::path::PathBuf;

/// oncall-buddy-finder - find who is on call and tell the team
#[derive(Debug, Parser)]
#[command(name = "oncall-buddy-finder")]
#[command(about = "Watches the on-call calendar and announces the current buddy", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The config file path
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resolve the current buddy once, print it as JSON and exit
    #[arg(long = "once")]
    pub once: bool,

    /// Do not expose the /buddy status endpoint
    #[arg(long = "no-server")]
    pub no_server: bool,
}

impl Cli {
    pub fn run_options(&self) -> RunOptions {
        RunOptions { once: self.once, serve_status: !self.no_server }
    }
}
