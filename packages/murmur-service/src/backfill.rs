use serde::{Deserialize, Serialize};
use uuid::Uuid;

use murmur_domain::source::AvatarSourceType;
use murmur_storage::{avatars, sources};

use crate::{Error, MurmurService, Result, ingest::EnsureOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeResponse {
	pub success: bool,
	/// Source messages walked.
	pub count: usize,
	/// Pending records created by this call. Zero on a repeated call.
	pub created: usize,
}

impl MurmurService {
	/// Ensures an embedding record exists for each of the most recent source messages of the
	/// chat's avatar. Safe to repeat.
	pub async fn initialize(&self, actor_id: Uuid, chat_id: Uuid) -> Result<InitializeResponse> {
		let chat = self.owned_chat(actor_id, chat_id).await?;
		let config = avatars::get_config(&self.db, chat.config_id)
			.await?
			.ok_or(Error::ConfigNotFound { config_id: chat.config_id })?;
		let source_type: AvatarSourceType = config.source_type.parse().map_err(|err| {
			Error::Storage { message: format!("Avatar config {}: {err}", config.config_id) }
		})?;

		if !sources::source_exists(&self.db, config.workspace_id, source_type, config.source_id)
			.await?
		{
			return Err(Error::SourceNotFound {
				message: format!(
					"The avatar's {} source {} no longer exists.",
					source_type.as_str(),
					config.source_id
				),
			});
		}

		let limit = self.history_bounds().clamp(u32::try_from(config.message_history_limit).ok());
		let messages = sources::recent_source_messages(
			&self.db,
			config.workspace_id,
			source_type,
			config.source_id,
			i64::from(limit),
		)
		.await?;
		let mut created = 0;

		for message in &messages {
			if message.content.trim().is_empty() {
				continue;
			}
			if self.ensure_embedding(&config, message).await? == EnsureOutcome::Created {
				created += 1;
			}
		}

		tracing::info!(
			%chat_id,
			config_id = %config.config_id,
			limit,
			count = messages.len(),
			created,
			"Avatar history initialized."
		);

		Ok(InitializeResponse { success: true, count: messages.len(), created })
	}
}
