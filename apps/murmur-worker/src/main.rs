use clap::Parser;

use murmur_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	murmur_worker::run(Args::parse()).await
}
