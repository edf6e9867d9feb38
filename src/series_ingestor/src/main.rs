use clap::Parser;
use series_ingestor::{
    cli::{commands::Cli, dispatch},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();
    let cli = Cli::parse();
    dispatch(cli).await?;
    Ok(())
}
