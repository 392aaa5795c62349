//! Wire shapes of the HTTP surface. Field names are camelCase; each type converts to or from the
//! service's own request and view types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use murmur_domain::{
	retrieval::{ResultOrigin, SearchResult},
	settings::{EmbeddingSettings, EmbeddingSettingsPatch},
	source::{AvatarSourceType, EmbeddingSourceRef, SourceType},
};
use murmur_service::{
	AvatarChatView, AvatarConfigView, BatchReport, ChatMessageView, ChatRequest, ChatResponse,
	CreateChatRequest, CreateConfigRequest, IngestEvent, IngestReport, IngestRequest,
	InitializeResponse, SearchRequest, UpdateConfigRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
	pub message: String,
	pub workspace_id: Uuid,
	pub avatar_config_id: Uuid,
	#[serde(default)]
	pub chat_id: Option<Uuid>,
}
impl From<ChatBody> for ChatRequest {
	fn from(body: ChatBody) -> Self {
		Self {
			message: body.message,
			workspace_id: body.workspace_id,
			avatar_config_id: body.avatar_config_id,
			chat_id: body.chat_id,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
	pub response: String,
	pub chat_id: Uuid,
	pub message_id: Uuid,
	pub context_items: usize,
}
impl From<ChatResponse> for ChatReply {
	fn from(res: ChatResponse) -> Self {
		Self {
			response: res.response,
			chat_id: res.chat_id,
			message_id: res.message_id,
			context_items: res.context_items,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeBody {
	pub chat_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct InitializeReply {
	pub success: bool,
	pub count: usize,
	pub created: usize,
}
impl From<InitializeResponse> for InitializeReply {
	fn from(res: InitializeResponse) -> Self {
		Self { success: res.success, count: res.count, created: res.created }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingsBody {
	#[serde(default)]
	pub batch_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct BatchReply {
	pub processed: usize,
	pub successful: usize,
	pub failed: usize,
}
impl From<BatchReport> for BatchReply {
	fn from(report: BatchReport) -> Self {
		Self { processed: report.processed, successful: report.successful, failed: report.failed }
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
	pub query: String,
	pub workspace_id: Uuid,
	#[serde(default)]
	pub limit: Option<u32>,
}
impl From<SearchQuery> for SearchRequest {
	fn from(query: SearchQuery) -> Self {
		Self { query: query.query, workspace_id: query.workspace_id, limit: query.limit }
	}
}

#[derive(Debug, Serialize)]
pub struct SearchReply {
	pub results: Vec<ResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
	pub source_type: SourceType,
	pub source_id: Uuid,
	pub content: String,
	pub speaker: String,
	pub similarity_score: f32,
	pub origin: ResultOrigin,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<SearchResult> for ResultItem {
	fn from(item: SearchResult) -> Self {
		Self {
			source_type: item.source.source_type(),
			source_id: item.source.id(),
			content: item.content,
			speaker: item.speaker,
			similarity_score: item.similarity_score,
			origin: item.origin,
			created_at: item.created_at,
		}
	}
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatchBody {
	pub recent_messages_count: Option<u32>,
	pub similarity_threshold: Option<f32>,
	pub max_context_messages: Option<u32>,
	pub include_recent_messages: Option<bool>,
}
impl From<SettingsPatchBody> for EmbeddingSettingsPatch {
	fn from(body: SettingsPatchBody) -> Self {
		Self {
			recent_messages_count: body.recent_messages_count,
			similarity_threshold: body.similarity_threshold,
			max_context_messages: body.max_context_messages,
			include_recent_messages: body.include_recent_messages,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsBody {
	pub recent_messages_count: u32,
	pub similarity_threshold: f32,
	pub max_context_messages: u32,
	pub include_recent_messages: bool,
}
impl From<EmbeddingSettings> for SettingsBody {
	fn from(settings: EmbeddingSettings) -> Self {
		Self {
			recent_messages_count: settings.recent_messages_count,
			similarity_threshold: settings.similarity_threshold,
			max_context_messages: settings.max_context_messages,
			include_recent_messages: settings.include_recent_messages,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConfigBody {
	pub workspace_id: Uuid,
	pub name: String,
	#[serde(default)]
	pub system_prompt: String,
	pub source_type: AvatarSourceType,
	pub source_id: Uuid,
	#[serde(default)]
	pub embedding_settings: SettingsPatchBody,
	#[serde(default)]
	pub message_history_limit: Option<u32>,
	#[serde(default)]
	pub temperature: Option<f32>,
	#[serde(default)]
	pub context_length: Option<u32>,
}
impl From<CreateConfigBody> for CreateConfigRequest {
	fn from(body: CreateConfigBody) -> Self {
		Self {
			workspace_id: body.workspace_id,
			name: body.name,
			system_prompt: body.system_prompt,
			source_type: body.source_type,
			source_id: body.source_id,
			embedding_settings: body.embedding_settings.into(),
			message_history_limit: body.message_history_limit,
			temperature: body.temperature,
			context_length: body.context_length,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConfigBody {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub system_prompt: Option<String>,
	#[serde(default)]
	pub embedding_settings: SettingsPatchBody,
	#[serde(default)]
	pub message_history_limit: Option<u32>,
	#[serde(default)]
	pub temperature: Option<f32>,
	#[serde(default)]
	pub context_length: Option<u32>,
}
impl From<UpdateConfigBody> for UpdateConfigRequest {
	fn from(body: UpdateConfigBody) -> Self {
		Self {
			name: body.name,
			system_prompt: body.system_prompt,
			embedding_settings: body.embedding_settings.into(),
			message_history_limit: body.message_history_limit,
			temperature: body.temperature,
			context_length: body.context_length,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigReply {
	pub config_id: Uuid,
	pub workspace_id: Uuid,
	pub name: String,
	pub system_prompt: String,
	pub source_type: String,
	pub source_id: Uuid,
	pub created_by_user_id: Uuid,
	pub embedding_settings: SettingsBody,
	pub message_history_limit: u32,
	pub temperature: f32,
	pub context_length: u32,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "murmur_domain::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<AvatarConfigView> for ConfigReply {
	fn from(view: AvatarConfigView) -> Self {
		Self {
			config_id: view.config_id,
			workspace_id: view.workspace_id,
			name: view.name,
			system_prompt: view.system_prompt,
			source_type: view.source_type,
			source_id: view.source_id,
			created_by_user_id: view.created_by_user_id,
			embedding_settings: view.embedding_settings.into(),
			message_history_limit: view.message_history_limit,
			temperature: view.temperature,
			context_length: view.context_length,
			created_at: view.created_at,
			updated_at: view.updated_at,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatBody {
	pub avatar_config_id: Uuid,
	#[serde(default)]
	pub title: Option<String>,
}
impl From<CreateChatBody> for CreateChatRequest {
	fn from(body: CreateChatBody) -> Self {
		Self { avatar_config_id: body.avatar_config_id, title: body.title }
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
	pub chat_id: Uuid,
	pub config_id: Uuid,
	pub title: String,
	pub workspace_id: Uuid,
	pub source_type: String,
	pub source_id: Uuid,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "murmur_domain::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<AvatarChatView> for ChatView {
	fn from(view: AvatarChatView) -> Self {
		Self {
			chat_id: view.chat_id,
			config_id: view.config_id,
			title: view.title,
			workspace_id: view.workspace_id,
			source_type: view.source_type,
			source_id: view.source_id,
			created_at: view.created_at,
			updated_at: view.updated_at,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
	#[serde(default)]
	pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MessagesReply {
	pub messages: Vec<MessageItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageItem {
	pub message_id: Uuid,
	pub query: String,
	pub response: String,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
}
impl From<ChatMessageView> for MessageItem {
	fn from(view: ChatMessageView) -> Self {
		Self {
			message_id: view.message_id,
			query: view.query,
			response: view.response,
			created_at: view.created_at,
		}
	}
}

#[derive(Debug, Serialize)]
pub struct DeletedReply {
	pub deleted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBody {
	pub source_type: SourceType,
	pub source_id: Uuid,
	pub event: IngestEvent,
}
impl From<IngestBody> for IngestRequest {
	fn from(body: IngestBody) -> Self {
		Self { source: EmbeddingSourceRef::new(body.source_type, body.source_id), event: body.event }
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReply {
	pub avatars: usize,
	pub enqueued: usize,
	pub repended: usize,
	pub unchanged: usize,
	pub removed: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl From<IngestReport> for IngestReply {
	fn from(report: IngestReport) -> Self {
		Self {
			avatars: report.avatars,
			enqueued: report.enqueued,
			repended: report.repended,
			unchanged: report.unchanged,
			removed: report.removed,
			error: report.error,
		}
	}
}
