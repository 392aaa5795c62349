mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Avatars, Batch, CompletionProviderConfig, Config, EmbeddingProviderConfig, Postgres, Providers,
	Search, Security, Service, Storage, Tokens,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(validation("service.http_bind must be non-empty."));
	}
	if cfg.service.log_level.trim().is_empty() {
		return Err(validation("service.log_level must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(validation("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(validation("providers.embedding.dimensions must be greater than zero."));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector_dim {
		return Err(validation("providers.embedding.dimensions must match storage.vector_dim."));
	}
	if cfg.providers.embedding.max_input_tokens == 0 {
		return Err(validation("providers.embedding.max_input_tokens must be greater than zero."));
	}
	if cfg.providers.completion.max_prompt_tokens == 0 {
		return Err(validation("providers.completion.max_prompt_tokens must be greater than zero."));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("completion", &cfg.providers.completion.api_key),
	] {
		if key.trim().is_empty() {
			return Err(validation(format!("Provider {label} api_key must be non-empty.")));
		}
	}

	if !cfg.tokens.chars_per_token.is_finite() || cfg.tokens.chars_per_token <= 0.0 {
		return Err(validation("tokens.chars_per_token must be a finite number greater than zero."));
	}

	validate_avatars(&cfg.avatars)?;
	validate_batch(&cfg.batch)?;

	if cfg.search.default_limit == 0 {
		return Err(validation("search.default_limit must be greater than zero."));
	}
	if cfg.search.max_limit < cfg.search.default_limit {
		return Err(validation("search.max_limit must be at least search.default_limit."));
	}

	Ok(())
}

fn validate_avatars(avatars: &Avatars) -> Result<()> {
	if avatars.min_history_limit == 0 {
		return Err(validation("avatars.min_history_limit must be greater than zero."));
	}
	if !(avatars.min_history_limit..=avatars.max_history_limit)
		.contains(&avatars.default_history_limit)
	{
		return Err(validation(
			"avatars.default_history_limit must be within avatars.min_history_limit and avatars.max_history_limit.",
		));
	}
	if !avatars.default_similarity_threshold.is_finite()
		|| !(0.0..=1.0).contains(&avatars.default_similarity_threshold)
	{
		return Err(validation("avatars.default_similarity_threshold must be in the range 0.0-1.0."));
	}
	if avatars.default_max_context_messages == 0 {
		return Err(validation("avatars.default_max_context_messages must be greater than zero."));
	}
	if !avatars.default_temperature.is_finite()
		|| !(0.0..=2.0).contains(&avatars.default_temperature)
	{
		return Err(validation("avatars.default_temperature must be in the range 0.0-2.0."));
	}
	if avatars.default_context_length == 0 {
		return Err(validation("avatars.default_context_length must be greater than zero."));
	}

	Ok(())
}

fn validate_batch(batch: &Batch) -> Result<()> {
	if batch.batch_size == 0 {
		return Err(validation("batch.batch_size must be greater than zero."));
	}
	if batch.max_batch_size < batch.batch_size {
		return Err(validation("batch.max_batch_size must be at least batch.batch_size."));
	}
	if batch.claim_lease_seconds <= 0 {
		return Err(validation("batch.claim_lease_seconds must be greater than zero."));
	}
	if batch.max_attempts <= 0 {
		return Err(validation("batch.max_attempts must be greater than zero."));
	}
	if batch.base_backoff_ms <= 0 || batch.max_backoff_ms < batch.base_backoff_ms {
		return Err(validation(
			"batch.base_backoff_ms must be positive and no greater than batch.max_backoff_ms.",
		));
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.tokens.tokenizer_repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.tokens.tokenizer_repo = None;
	}
	if cfg.security.api_auth_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false)
	{
		cfg.security.api_auth_token = None;
	}
}

fn validation(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}
