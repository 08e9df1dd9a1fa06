use anyhow::Result;
use lantern::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = cli::parse_args();

    tracing::info!("lantern {} starting...", env!("CARGO_PKG_VERSION"));
    lantern::ignite(cli_args).await?;

    Ok(())
}
