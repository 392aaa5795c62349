//! Avatar Chat Orchestrator.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use murmur_domain::prompt;
use murmur_storage::{avatars, models::AvatarChatMessage};

use crate::{Error, MurmurService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
	pub message: String,
	pub workspace_id: Uuid,
	pub avatar_config_id: Uuid,
	/// Continues this chat. Without it the actor's latest chat with the avatar is used, or a new
	/// one is started.
	pub chat_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
	pub response: String,
	pub chat_id: Uuid,
	pub message_id: Uuid,
	pub context_items: usize,
}

impl MurmurService {
	/// Answers one message as the avatar and appends the exchange to the chat.
	///
	/// Nothing is written unless the completion succeeds. A completion whose exchange cannot be
	/// stored fails with [`Error::Persistence`].
	pub async fn respond(&self, actor_id: Uuid, req: ChatRequest) -> Result<ChatResponse> {
		let message = req.message.trim();

		if message.is_empty() {
			return Err(Error::invalid("message must be non-empty."));
		}

		self.ensure_member(req.workspace_id, actor_id).await?;

		let config = avatars::get_config(&self.db, req.avatar_config_id)
			.await?
			.filter(|config| config.workspace_id == req.workspace_id)
			.ok_or(Error::ConfigNotFound { config_id: req.avatar_config_id })?;
		let existing_chat = match req.chat_id {
			Some(chat_id) => {
				let chat = self.owned_chat(actor_id, chat_id).await?;

				if chat.config_id != config.config_id {
					return Err(Error::invalid("chatId belongs to a different avatar."));
				}

				Some(chat)
			},
			None => None,
		};
		let settings = self.stored_settings(&config)?;
		let context = self.retrieve(message, req.workspace_id, &config, &settings).await?;
		let budget = usize::try_from(config.context_length)
			.unwrap_or_default()
			.min(self.cfg.providers.completion.max_prompt_tokens as usize);
		let composed =
			prompt::compose(&config.system_prompt, &context, message, budget, &self.tokens)?;

		if composed.dropped_context > 0 {
			tracing::debug!(
				config_id = %config.config_id,
				dropped = composed.dropped_context,
				budget,
				"Context trimmed to fit the prompt budget."
			);
		}

		let response = self
			.providers
			.completion
			.complete(&self.cfg.providers.completion, &composed.messages, config.temperature)
			.await?;
		let chat = match existing_chat {
			Some(chat) => chat,
			None => avatars::latest_or_insert_chat(
				&self.db,
				&crate::avatars::new_chat(&config, actor_id, message),
			)
			.await
			.map_err(persistence)?,
		};
		let record = AvatarChatMessage {
			message_id: Uuid::new_v4(),
			chat_id: chat.chat_id,
			query: message.to_string(),
			response,
			created_at: OffsetDateTime::now_utc(),
		};

		avatars::append_chat_message(&self.db, &record).await.map_err(persistence)?;

		tracing::info!(
			chat_id = %chat.chat_id,
			config_id = %config.config_id,
			context_items = context.len(),
			prompt_tokens = composed.token_count,
			"Avatar responded."
		);

		Ok(ChatResponse {
			response: record.response,
			chat_id: chat.chat_id,
			message_id: record.message_id,
			context_items: context.len(),
		})
	}
}

fn persistence(err: murmur_storage::Error) -> Error {
	tracing::error!(error = %err, "Generated avatar response could not be stored.");

	Error::Persistence { message: err.to_string() }
}
