pub mod error;
pub mod worker;

pub use error::{Error, Result};
pub use murmur_cli::Args;

use tracing_subscriber::EnvFilter;

use murmur_service::MurmurService;
use murmur_storage::db::Db;

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = murmur_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.storage.vector_dim).await?;

	let tokens = murmur_service::token_counter(&config.tokens)?;
	let poll_interval_ms = config.batch.poll_interval_ms;
	let service = MurmurService::new(config, db).with_token_counter(tokens);

	worker::run_worker(worker::WorkerState { service, poll_interval_ms }).await
}
