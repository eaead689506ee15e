use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let config = singlingo_lib::config::Config::parse();
    singlingo_lib::run(config).await
}
