//! Avatar config and chat management.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use murmur_domain::{
	settings::{self, EmbeddingSettings, EmbeddingSettingsPatch},
	source::AvatarSourceType,
};
use murmur_storage::{
	avatars,
	models::{AvatarChat, AvatarChatMessage, AvatarConfig},
	sources,
};

use crate::{Error, MurmurService, Result};

const DEFAULT_MESSAGE_PAGE: u32 = 50;
const MAX_MESSAGE_PAGE: u32 = 200;
const MAX_TITLE_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConfigRequest {
	pub workspace_id: Uuid,
	pub name: String,
	pub system_prompt: String,
	pub source_type: AvatarSourceType,
	pub source_id: Uuid,
	#[serde(default)]
	pub embedding_settings: EmbeddingSettingsPatch,
	pub message_history_limit: Option<u32>,
	pub temperature: Option<f32>,
	pub context_length: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateConfigRequest {
	pub name: Option<String>,
	pub system_prompt: Option<String>,
	#[serde(default)]
	pub embedding_settings: EmbeddingSettingsPatch,
	pub message_history_limit: Option<u32>,
	pub temperature: Option<f32>,
	pub context_length: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarConfigView {
	pub config_id: Uuid,
	pub workspace_id: Uuid,
	pub name: String,
	pub system_prompt: String,
	pub source_type: String,
	pub source_id: Uuid,
	pub created_by_user_id: Uuid,
	pub embedding_settings: EmbeddingSettings,
	pub message_history_limit: u32,
	pub temperature: f32,
	pub context_length: u32,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "murmur_domain::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
	pub avatar_config_id: Uuid,
	pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarChatView {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageView {
	pub message_id: Uuid,
	pub query: String,
	pub response: String,
	#[serde(with = "murmur_domain::time_serde")]
	pub created_at: OffsetDateTime,
}

impl MurmurService {
	pub async fn create_config(
		&self,
		actor_id: Uuid,
		req: CreateConfigRequest,
	) -> Result<AvatarConfigView> {
		let name = required(&req.name, "name")?;

		self.ensure_member(req.workspace_id, actor_id).await?;

		if req.source_type == AvatarSourceType::User && req.source_id != actor_id {
			return Err(Error::MembershipDenied {
				message: "A user avatar can only be created by that user.".to_string(),
			});
		}
		if !sources::source_exists(&self.db, req.workspace_id, req.source_type, req.source_id).await?
		{
			return Err(Error::SourceNotFound {
				message: format!(
					"{} {} is not part of the workspace.",
					req.source_type.as_str(),
					req.source_id
				),
			});
		}

		let settings = EmbeddingSettings::from_defaults(&self.settings_defaults())
			.merged(&req.embedding_settings)?;
		let temperature = req.temperature.unwrap_or(self.cfg.avatars.default_temperature);

		settings::validate_temperature(temperature)?;

		let now = OffsetDateTime::now_utc();
		let config = AvatarConfig {
			config_id: Uuid::new_v4(),
			workspace_id: req.workspace_id,
			name,
			system_prompt: req.system_prompt.trim().to_string(),
			source_type: req.source_type.as_str().to_string(),
			source_id: req.source_id,
			created_by_user_id: actor_id,
			embedding_settings: settings_json(&settings)?,
			message_history_limit: self.clamped_history(req.message_history_limit),
			temperature,
			context_length: self.checked_context_length(req.context_length)?,
			created_at: now,
			updated_at: now,
		};

		avatars::insert_config(&self.db, &config).await?;

		tracing::info!(
			config_id = %config.config_id,
			workspace_id = %config.workspace_id,
			source_type = %config.source_type,
			"Avatar config created."
		);

		Ok(config_view(config, settings))
	}

	/// Applies a partial update. Only the avatar's creator may change it.
	pub async fn update_config(
		&self,
		actor_id: Uuid,
		config_id: Uuid,
		req: UpdateConfigRequest,
	) -> Result<AvatarConfigView> {
		let mut config = self.owned_config(actor_id, config_id).await?;
		let settings = self.stored_settings(&config)?.merged(&req.embedding_settings)?;

		if let Some(name) = req.name.as_deref() {
			config.name = required(name, "name")?;
		}
		if let Some(system_prompt) = req.system_prompt.as_deref() {
			config.system_prompt = system_prompt.trim().to_string();
		}
		if let Some(temperature) = req.temperature {
			settings::validate_temperature(temperature)?;

			config.temperature = temperature;
		}
		if req.message_history_limit.is_some() {
			config.message_history_limit = self.clamped_history(req.message_history_limit);
		}
		if req.context_length.is_some() {
			config.context_length = self.checked_context_length(req.context_length)?;
		}

		config.embedding_settings = settings_json(&settings)?;
		config.updated_at = OffsetDateTime::now_utc();

		if !avatars::update_config(&self.db, &config).await? {
			return Err(Error::ConfigNotFound { config_id });
		}

		Ok(config_view(config, settings))
	}

	/// Deletes a config with its chats and embedding records.
	pub async fn delete_config(&self, actor_id: Uuid, config_id: Uuid) -> Result<bool> {
		self.owned_config(actor_id, config_id).await?;

		let deleted = avatars::delete_config(&self.db, config_id).await?;

		tracing::info!(%config_id, deleted, "Avatar config deleted.");

		Ok(deleted)
	}

	pub async fn create_chat(&self, actor_id: Uuid, req: CreateChatRequest) -> Result<AvatarChatView> {
		let config = avatars::get_config(&self.db, req.avatar_config_id)
			.await?
			.ok_or(Error::ConfigNotFound { config_id: req.avatar_config_id })?;

		self.ensure_member(config.workspace_id, actor_id).await?;

		let title = req
			.title
			.as_deref()
			.map(str::trim)
			.filter(|title| !title.is_empty())
			.unwrap_or(&config.name);
		let chat = new_chat(&config, actor_id, title);

		avatars::insert_chat(&self.db.pool, &chat).await?;

		Ok(chat_view(chat))
	}

	/// The chat's newest messages, oldest first.
	pub async fn list_chat_messages(
		&self,
		actor_id: Uuid,
		chat_id: Uuid,
		limit: Option<u32>,
	) -> Result<Vec<ChatMessageView>> {
		let limit = limit.unwrap_or(DEFAULT_MESSAGE_PAGE);

		if limit == 0 || limit > MAX_MESSAGE_PAGE {
			return Err(Error::invalid(format!("limit must be between 1 and {MAX_MESSAGE_PAGE}.")));
		}

		let chat = self.owned_chat(actor_id, chat_id).await?;
		let messages = avatars::list_chat_messages(&self.db, chat.chat_id, i64::from(limit)).await?;

		Ok(messages.into_iter().map(message_view).collect())
	}

	/// Deletes a chat and its messages.
	pub async fn delete_chat(&self, actor_id: Uuid, chat_id: Uuid) -> Result<bool> {
		self.owned_chat(actor_id, chat_id).await?;

		let deleted = avatars::delete_chat(&self.db, chat_id).await?;

		tracing::info!(%chat_id, deleted, "Avatar chat deleted.");

		Ok(deleted)
	}

	async fn owned_config(&self, actor_id: Uuid, config_id: Uuid) -> Result<AvatarConfig> {
		let config = avatars::get_config(&self.db, config_id)
			.await?
			.ok_or(Error::ConfigNotFound { config_id })?;

		self.ensure_member(config.workspace_id, actor_id).await?;

		if config.created_by_user_id != actor_id {
			return Err(Error::MembershipDenied {
				message: "Only the avatar's creator can change it.".to_string(),
			});
		}

		Ok(config)
	}

	/// Chats are private to their creator. Other actors see them as missing.
	pub(crate) async fn owned_chat(&self, actor_id: Uuid, chat_id: Uuid) -> Result<AvatarChat> {
		let chat =
			avatars::get_chat(&self.db, chat_id).await?.ok_or(Error::ChatNotFound { chat_id })?;

		self.ensure_member(chat.workspace_id, actor_id).await?;

		if chat.created_by_user_id != actor_id {
			return Err(Error::ChatNotFound { chat_id });
		}

		Ok(chat)
	}

	fn clamped_history(&self, requested: Option<u32>) -> i32 {
		// Bounds come from validated config and fit in i32.
		i32::try_from(self.history_bounds().clamp(requested)).unwrap_or(i32::MAX)
	}

	fn checked_context_length(&self, requested: Option<u32>) -> Result<i32> {
		let max = self.cfg.providers.completion.max_prompt_tokens;
		let length = requested.unwrap_or(self.cfg.avatars.default_context_length).min(max);

		if length == 0 {
			return Err(Error::invalid("context_length must be greater than zero."));
		}

		i32::try_from(length).map_err(|_| Error::invalid("context_length is too large."))
	}
}

pub(crate) fn new_chat(config: &AvatarConfig, actor_id: Uuid, title: &str) -> AvatarChat {
	let now = OffsetDateTime::now_utc();

	AvatarChat {
		chat_id: Uuid::new_v4(),
		config_id: config.config_id,
		title: title.chars().take(MAX_TITLE_CHARS).collect(),
		created_by_user_id: actor_id,
		workspace_id: config.workspace_id,
		source_type: config.source_type.clone(),
		source_id: config.source_id,
		created_at: now,
		updated_at: now,
	}
}

fn required(value: &str, field: &str) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::invalid(format!("{field} must be non-empty.")));
	}

	Ok(trimmed.to_string())
}

fn settings_json(settings: &EmbeddingSettings) -> Result<serde_json::Value> {
	serde_json::to_value(settings).map_err(|err| Error::Storage {
		message: format!("Failed to encode embedding_settings: {err}."),
	})
}

fn config_view(config: AvatarConfig, settings: EmbeddingSettings) -> AvatarConfigView {
	AvatarConfigView {
		config_id: config.config_id,
		workspace_id: config.workspace_id,
		name: config.name,
		system_prompt: config.system_prompt,
		source_type: config.source_type,
		source_id: config.source_id,
		created_by_user_id: config.created_by_user_id,
		embedding_settings: settings,
		message_history_limit: u32::try_from(config.message_history_limit).unwrap_or_default(),
		temperature: config.temperature,
		context_length: u32::try_from(config.context_length).unwrap_or_default(),
		created_at: config.created_at,
		updated_at: config.updated_at,
	}
}

fn chat_view(chat: AvatarChat) -> AvatarChatView {
	AvatarChatView {
		chat_id: chat.chat_id,
		config_id: chat.config_id,
		title: chat.title,
		workspace_id: chat.workspace_id,
		source_type: chat.source_type,
		source_id: chat.source_id,
		created_at: chat.created_at,
		updated_at: chat.updated_at,
	}
}

fn message_view(message: AvatarChatMessage) -> ChatMessageView {
	ChatMessageView {
		message_id: message.message_id,
		query: message.query,
		response: message.response,
		created_at: message.created_at,
	}
}
