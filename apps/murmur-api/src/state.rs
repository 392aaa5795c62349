use std::sync::Arc;

use murmur_service::MurmurService;
use murmur_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<MurmurService>,
}
impl AppState {
	pub async fn new(config: murmur_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.vector_dim).await?;

		let tokens = murmur_service::token_counter(&config.tokens)?;
		let service = MurmurService::new(config, db).with_token_counter(tokens);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: MurmurService) -> Self {
		Self { service: Arc::new(service) }
	}
}
