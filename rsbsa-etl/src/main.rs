use anyhow::Result;
use clap::Parser;

use rsbsa_etl::cli::{handle_command, Cli};
use rsbsa_etl::logging;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    handle_command(cli).await
}
