use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row of `message_embeddings` without its vector column.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmbeddingRecord {
	pub embedding_id: Uuid,
	pub avatar_config_id: Uuid,
	pub workspace_id: Uuid,
	pub source_type: String,
	pub source_id: Uuid,
	pub content: String,
	pub content_hash: String,
	pub speaker: String,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub claim_token: Option<Uuid>,
	pub claimed_until: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEmbedding<'a> {
	pub avatar_config_id: Uuid,
	pub workspace_id: Uuid,
	pub source_type: &'a str,
	pub source_id: Uuid,
	pub content: &'a str,
	pub content_hash: &'a str,
	pub speaker: &'a str,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoredEmbedding {
	pub embedding_id: Uuid,
	pub avatar_config_id: Uuid,
	pub workspace_id: Uuid,
	pub source_type: String,
	pub source_id: Uuid,
	pub content: String,
	pub speaker: String,
	pub score: f32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
	pub pending: i64,
	pub processing: i64,
	pub computed: i64,
	pub failed: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AvatarConfig {
	pub config_id: Uuid,
	pub workspace_id: Uuid,
	pub name: String,
	pub system_prompt: String,
	pub source_type: String,
	pub source_id: Uuid,
	pub created_by_user_id: Uuid,
	pub embedding_settings: Value,
	pub message_history_limit: i32,
	pub temperature: f32,
	pub context_length: i32,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AvatarChat {
	pub chat_id: Uuid,
	pub config_id: Uuid,
	pub title: String,
	pub created_by_user_id: Uuid,
	pub workspace_id: Uuid,
	pub source_type: String,
	pub source_id: Uuid,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AvatarChatMessage {
	pub message_id: Uuid,
	pub chat_id: Uuid,
	pub query: String,
	pub response: String,
	pub created_at: OffsetDateTime,
}

/// A chat artifact read from the application's tables, normalised across source kinds.
///
/// `channel_id` is set for channel and thread messages and for channel documents. `receiver_id` is
/// set for direct messages only.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceMessage {
	pub source_type: String,
	pub source_id: Uuid,
	pub workspace_id: Uuid,
	pub channel_id: Option<Uuid>,
	pub sender_id: Uuid,
	pub receiver_id: Option<Uuid>,
	pub speaker: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}
