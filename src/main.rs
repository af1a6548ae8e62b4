use anyhow::Result;
use clap::Parser;
use log::{debug, info};
use oncall_buddy_finder::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    oncall_buddy_finder::init_logger();

    if let Err(e) = dotenvy::dotenv() {
        debug!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();
    info!("Starting oncall-buddy-finder");
    oncall_buddy_finder::run(cli).await?;
    info!("Finished oncall-buddy-finder");
    Ok(())
}
