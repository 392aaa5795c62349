use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub tokens: Tokens,
	#[serde(default)]
	pub avatars: Avatars,
	#[serde(default)]
	pub batch: Batch,
	#[serde(default)]
	pub search: Search,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	/// Dimension of the `vector` column. Must match the embedding model output.
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub completion: CompletionProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	/// Inputs longer than this are truncated before the request is sent.
	pub max_input_tokens: u32,
	/// Sent as `encoding_format`.
	#[serde(default = "default_encoding")]
	pub encoding: String,
	pub timeout_ms: u64,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Upper bound for the prompt assembled for one avatar turn. Each avatar's own
	/// `context_length` is capped by this value.
	pub max_prompt_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Tokens {
	/// Optional Hugging Face repo used for exact token counts. Falls back to a character
	/// estimate when unset.
	pub tokenizer_repo: Option<String>,
	pub chars_per_token: f32,
}
impl Default for Tokens {
	fn default() -> Self {
		Self { tokenizer_repo: None, chars_per_token: 4.0 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Avatars {
	pub min_history_limit: u32,
	pub default_history_limit: u32,
	pub max_history_limit: u32,
	pub default_recent_messages_count: u32,
	pub default_similarity_threshold: f32,
	pub default_max_context_messages: u32,
	pub default_include_recent_messages: bool,
	pub default_temperature: f32,
	pub default_context_length: u32,
}
impl Default for Avatars {
	fn default() -> Self {
		Self {
			min_history_limit: 10,
			default_history_limit: 20,
			max_history_limit: 40,
			default_recent_messages_count: 5,
			default_similarity_threshold: 0.7,
			default_max_context_messages: 10,
			default_include_recent_messages: true,
			default_temperature: 0.7,
			default_context_length: 4_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Batch {
	pub batch_size: u32,
	pub max_batch_size: u32,
	pub claim_lease_seconds: i64,
	pub max_attempts: i32,
	pub base_backoff_ms: i64,
	pub max_backoff_ms: i64,
	pub poll_interval_ms: u64,
}
impl Default for Batch {
	fn default() -> Self {
		Self {
			batch_size: 10,
			max_batch_size: 100,
			claim_lease_seconds: 60,
			max_attempts: 5,
			base_backoff_ms: 500,
			max_backoff_ms: 30_000,
			poll_interval_ms: 1_000,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub max_limit: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self { default_limit: 10, max_limit: 50 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
}

fn default_encoding() -> String {
	"float".to_string()
}

fn default_max_retries() -> u32 {
	2
}
