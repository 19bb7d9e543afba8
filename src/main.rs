use anyhow::Result;
use clap::Parser;
use hex_forge::{logging, setup, Cli, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli)?;
    logging::init_logger(&settings);
    log::info!("Hex Forge starting with {:?}", settings);

    setup::execution::run(&cli, &settings).await
}
