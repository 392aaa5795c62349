pub mod avatar_chat;
pub mod avatars;
pub mod backfill;
pub mod batch;
pub mod ingest;
pub mod search;

mod access;
mod error;

pub use avatar_chat::{ChatRequest, ChatResponse};
pub use avatars::{
	AvatarChatView, AvatarConfigView, ChatMessageView, CreateChatRequest, CreateConfigRequest,
	UpdateConfigRequest,
};
pub use backfill::InitializeResponse;
pub use batch::BatchReport;
pub use error::{Error, Result};
pub use ingest::{IngestEvent, IngestReport, IngestRequest};
pub use search::{SearchRequest, SearchResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use murmur_config::{CompletionProviderConfig, Config, EmbeddingProviderConfig, Tokens};
use murmur_domain::{
	prompt::ChatMessage,
	settings::{EmbeddingSettings, HistoryLimitBounds, SettingsDefaults},
};
use murmur_providers::{completion, embedding};
use murmur_storage::{db::Db, models::AvatarConfig};
use murmur_tokens::TokenCounter;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		tokens: &'a TokenCounter,
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
		temperature: f32,
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { embedding, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), completion: provider }
	}
}

pub struct MurmurService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
	pub tokens: TokenCounter,
}
impl MurmurService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self::with_providers(cfg, db, Providers::default())
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		let tokens = TokenCounter::estimate(cfg.tokens.chars_per_token);

		Self { cfg, db, providers, tokens }
	}

	pub fn with_token_counter(mut self, tokens: TokenCounter) -> Self {
		self.tokens = tokens;

		self
	}

	pub(crate) fn settings_defaults(&self) -> SettingsDefaults {
		let avatars = &self.cfg.avatars;

		SettingsDefaults {
			recent_messages_count: avatars.default_recent_messages_count,
			similarity_threshold: avatars.default_similarity_threshold,
			max_context_messages: avatars.default_max_context_messages,
			include_recent_messages: avatars.default_include_recent_messages,
		}
	}

	pub(crate) fn history_bounds(&self) -> HistoryLimitBounds {
		let avatars = &self.cfg.avatars;

		HistoryLimitBounds {
			min: avatars.min_history_limit,
			default: avatars.default_history_limit,
			max: avatars.max_history_limit,
		}
	}

	/// Settings stored on a config row. Unknown or missing keys fall back to the configured
	/// defaults.
	pub(crate) fn stored_settings(&self, config: &AvatarConfig) -> Result<EmbeddingSettings> {
		let patch = serde_json::from_value(config.embedding_settings.clone()).map_err(|err| {
			Error::Storage {
				message: format!(
					"Avatar config {} has malformed embedding_settings: {err}.",
					config.config_id
				),
			}
		})?;

		Ok(EmbeddingSettings::from_defaults(&self.settings_defaults()).merged(&patch)?)
	}

	/// Embeds one text and checks the vector against the store dimension.
	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts, &self.tokens).await?;
		let Some(vec) = vectors.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		self.check_dimension(&vec)?;

		Ok(vec)
	}

	pub(crate) fn check_dimension(&self, vec: &[f32]) -> Result<()> {
		if vec.len() != self.cfg.storage.vector_dim as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch. Expected {}, got {}.",
					self.cfg.storage.vector_dim,
					vec.len()
				),
			});
		}
		if vec.iter().any(|value| !value.is_finite()) {
			return Err(Error::Provider {
				message: "Embedding provider returned a non-finite value.".to_string(),
			});
		}

		Ok(())
	}
}

/// Builds the token counter described by `[tokens]`, loading the tokenizer when one is set.
pub fn token_counter(cfg: &Tokens) -> Result<TokenCounter> {
	let Some(repo) = cfg.tokenizer_repo.as_deref() else {
		return Ok(TokenCounter::estimate(cfg.chars_per_token));
	};
	let tokenizer = murmur_tokens::load_tokenizer(repo).map_err(|err| Error::InvalidRequest {
		message: format!("Failed to load tokenizer {repo:?}: {err}."),
	})?;

	Ok(TokenCounter::from_tokenizer(tokenizer))
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
		tokens: &'a TokenCounter,
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts, tokens).await?) })
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a CompletionProviderConfig,
		messages: &'a [ChatMessage],
		temperature: f32,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(completion::complete(cfg, messages, temperature).await?) })
	}
}
