pub mod api_server;
pub mod app;
pub mod buddy;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod directory;
pub mod dispatch;
pub mod notifier;
pub mod render;
pub mod scheduler;
pub mod selector;
pub mod state;

use anyhow::Result;
use env_logger::Env;
use log::{debug, info, warn};
use std::io::Write;

pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

pub async fn run(cli: cli::Cli) -> Result<()> {
    let (config, path) = Config::load(cli.config.clone())?;
    match &path {
        Some(path) => info!("Using {} config file", path.display()),
        None => warn!("No config file found, running with defaults"),
    }
    debug!("Configuration: {:?}", config.redacted());

    let app = app::Application::new(config)?;
    app.run(cli.run_options()).await
}

// Re-export commonly used types
pub use buddy::Buddy;
pub use config::Config;
pub use dispatch::Dispatcher;
