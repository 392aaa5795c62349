//! Ingestion of created and edited chat messages.
//!
//! Every avatar whose source covers the message gets its own pending record. Failures in this
//! bookkeeping are logged and reported but never returned, so the message write that triggered
//! ingestion always succeeds. The batch processor and backfill reconcile anything missed.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use murmur_domain::{
	content_hash,
	source::{AvatarSourceType, EmbeddingSourceRef},
};
use murmur_storage::{
	avatars, embeddings,
	models::{AvatarConfig, NewEmbedding, SourceMessage},
	sources,
};

use crate::{Error, MurmurService, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestEvent {
	Created,
	Edited,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
	pub source: EmbeddingSourceRef,
	pub event: IngestEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
	/// Avatars whose source covers the message.
	pub avatars: usize,
	pub enqueued: usize,
	pub repended: usize,
	pub unchanged: usize,
	/// Records dropped because an edit left the message blank.
	pub removed: usize,
	/// Set when bookkeeping failed. The failure was logged and left for reconciliation.
	pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EnsureOutcome {
	Created,
	Repended,
	Unchanged,
}

impl MurmurService {
	/// Records the embedding work implied by a message write.
	///
	/// Only caller mistakes are returned as errors: an unknown source or an actor outside the
	/// message's workspace.
	pub async fn ingest(&self, actor_id: Uuid, req: IngestRequest) -> Result<IngestReport> {
		let message = match sources::load_source_message(&self.db, req.source).await {
			Ok(Some(message)) => message,
			Ok(None) =>
				return Err(Error::SourceNotFound {
					message: format!("{} {} does not exist.", req.source.source_type(), req.source.id()),
				}),
			Err(err) => return Ok(swallowed(req.source, IngestReport::default(), err.into())),
		};

		self.ensure_member(message.workspace_id, actor_id).await?;

		let mut report = IngestReport::default();

		match self.fan_out(&message, req.event, &mut report).await {
			Ok(()) => {
				tracing::debug!(
					source_type = %req.source.source_type(),
					source_id = %req.source.id(),
					avatars = report.avatars,
					enqueued = report.enqueued,
					repended = report.repended,
					removed = report.removed,
					"Message ingested."
				);

				Ok(report)
			},
			Err(err) => Ok(swallowed(req.source, report, err)),
		}
	}

	async fn fan_out(
		&self,
		message: &SourceMessage,
		event: IngestEvent,
		report: &mut IngestReport,
	) -> Result<()> {
		if message.content.trim().is_empty() {
			if event == IngestEvent::Edited {
				let removed = embeddings::delete_for_source(
					&self.db.pool,
					&message.source_type,
					message.source_id,
				)
				.await?;

				report.removed = usize::try_from(removed).unwrap_or_default();
			}

			return Ok(());
		}

		let configs = self.covering_configs(message).await?;

		report.avatars = configs.len();

		for config in &configs {
			let outcome = match event {
				IngestEvent::Created => self.ensure_embedding(config, message).await?,
				IngestEvent::Edited => self.refresh_embedding(config, message).await?,
			};

			match outcome {
				EnsureOutcome::Created => report.enqueued += 1,
				EnsureOutcome::Repended => report.repended += 1,
				EnsureOutcome::Unchanged => report.unchanged += 1,
			}
		}

		Ok(())
	}

	/// Avatar configs whose source includes `message`.
	async fn covering_configs(&self, message: &SourceMessage) -> Result<Vec<AvatarConfig>> {
		let (source_type, source_ids) = match message.source_type.as_str() {
			"direct_message" => {
				let mut ids = vec![message.sender_id];

				ids.extend(message.receiver_id);

				(AvatarSourceType::User, ids)
			},
			_ => match message.channel_id {
				Some(channel_id) => (AvatarSourceType::Channel, vec![channel_id]),
				None => return Ok(Vec::new()),
			},
		};
		let configs = avatars::configs_for_sources(
			&self.db.pool,
			message.workspace_id,
			source_type.as_str(),
			&source_ids,
		)
		.await?;

		Ok(configs)
	}

	/// Inserts a pending record unless one already exists for this avatar and source.
	pub(crate) async fn ensure_embedding(
		&self,
		config: &AvatarConfig,
		message: &SourceMessage,
	) -> Result<EnsureOutcome> {
		let hash = content_hash(&message.content);
		let record = new_embedding(config, message, &hash);
		let inserted =
			embeddings::insert_pending(&self.db.pool, &record, OffsetDateTime::now_utc()).await?;

		Ok(if inserted.is_some() { EnsureOutcome::Created } else { EnsureOutcome::Unchanged })
	}

	/// Re-pends the record when the content changed, creating it if it never existed.
	async fn refresh_embedding(
		&self,
		config: &AvatarConfig,
		message: &SourceMessage,
	) -> Result<EnsureOutcome> {
		let hash = content_hash(&message.content);
		let record = new_embedding(config, message, &hash);
		let now = OffsetDateTime::now_utc();

		if embeddings::repend_if_changed(&self.db.pool, &record, now).await?.is_some() {
			return Ok(EnsureOutcome::Repended);
		}

		let inserted = embeddings::insert_pending(&self.db.pool, &record, now).await?;

		Ok(if inserted.is_some() { EnsureOutcome::Created } else { EnsureOutcome::Unchanged })
	}
}

fn new_embedding<'a>(
	config: &AvatarConfig,
	message: &'a SourceMessage,
	hash: &'a str,
) -> NewEmbedding<'a> {
	NewEmbedding {
		avatar_config_id: config.config_id,
		workspace_id: message.workspace_id,
		source_type: &message.source_type,
		source_id: message.source_id,
		content: &message.content,
		content_hash: hash,
		speaker: &message.speaker,
	}
}

fn swallowed(source: EmbeddingSourceRef, mut report: IngestReport, err: Error) -> IngestReport {
	tracing::warn!(
		source_type = %source.source_type(),
		source_id = %source.id(),
		error = %err,
		"Embedding bookkeeping failed. Leaving it for reconciliation."
	);

	report.error = Some(err.to_string());

	report
}
