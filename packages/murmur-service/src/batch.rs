//! Batch Processor for pending embedding records.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use murmur_domain::retry::{self, Backoff};
use murmur_storage::{embeddings, models::EmbeddingRecord};

use crate::{Error, MurmurService, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
	pub processed: usize,
	pub successful: usize,
	pub failed: usize,
}

impl MurmurService {
	/// Claims up to `batch_size` due records and computes their vectors.
	///
	/// Per-item failures, including a vector the store rejects, are counted and not returned. Only
	/// a store that cannot record the failure aborts the run, and the claims it leaves behind
	/// expire with their lease.
	pub async fn process_pending_batch(&self, batch_size: Option<u32>) -> Result<BatchReport> {
		let batch_cfg = &self.cfg.batch;
		let batch_size = batch_size.unwrap_or(batch_cfg.batch_size);

		if batch_size == 0 || batch_size > batch_cfg.max_batch_size {
			return Err(Error::invalid(format!(
				"batchSize must be between 1 and {}.",
				batch_cfg.max_batch_size
			)));
		}

		let claim_token = Uuid::new_v4();
		let records = embeddings::claim_pending(
			&self.db,
			i64::from(batch_size),
			claim_token,
			OffsetDateTime::now_utc(),
			batch_cfg.claim_lease_seconds,
		)
		.await?;
		let mut report = BatchReport { processed: records.len(), ..Default::default() };

		if records.is_empty() {
			return Ok(report);
		}

		let outcomes = self.embed_records(&records).await;

		for (record, outcome) in records.iter().zip(outcomes) {
			let now = OffsetDateTime::now_utc();

			match outcome {
				Ok(vec) => match embeddings::mark_computed(
					&self.db,
					record.embedding_id,
					claim_token,
					&vec,
					now,
				)
				.await
				{
					Ok(true) => report.successful += 1,
					Ok(false) => {
						tracing::info!(
							embedding_id = %record.embedding_id,
							"Embedding claim was superseded before the vector was stored."
						);

						report.failed += 1;
					},
					Err(err) => {
						let err = Error::from(err);

						tracing::warn!(
							embedding_id = %record.embedding_id,
							error = %err,
							"Computed vector could not be stored."
						);

						self.release_failed(record, claim_token, &err, now).await?;

						report.failed += 1;
					},
				},
				Err(err) => {
					self.release_failed(record, claim_token, &err, now).await?;

					report.failed += 1;
				},
			}
		}

		tracing::info!(
			processed = report.processed,
			successful = report.successful,
			failed = report.failed,
			"Embedding batch processed."
		);

		Ok(report)
	}

	/// One batched provider call, falling back to per-item calls when it fails so that a single bad
	/// input cannot fail its neighbours.
	async fn embed_records(&self, records: &[EmbeddingRecord]) -> Vec<Result<Vec<f32>>> {
		let texts: Vec<String> = records.iter().map(|record| record.content.clone()).collect();
		let batched = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts, &self.tokens)
			.await
			.and_then(|vectors| {
				if vectors.len() != texts.len() {
					return Err(Error::Provider {
						message: format!(
							"Embedding provider returned {} vectors for {} inputs.",
							vectors.len(),
							texts.len()
						),
					});
				}

				Ok(vectors)
			});

		match batched {
			Ok(vectors) => vectors
				.into_iter()
				.map(|vec| {
					self.check_dimension(&vec)?;

					Ok(vec)
				})
				.collect(),
			Err(err) => {
				tracing::warn!(
					items = records.len(),
					error = %err,
					"Batched embedding call failed. Retrying items one at a time."
				);

				let mut outcomes = Vec::with_capacity(texts.len());

				for text in &texts {
					outcomes.push(self.embed_one(text).await);
				}

				outcomes
			},
		}
	}

	async fn release_failed(
		&self,
		record: &EmbeddingRecord,
		claim_token: Uuid,
		err: &Error,
		now: OffsetDateTime,
	) -> Result<()> {
		let batch_cfg = &self.cfg.batch;
		let attempts = record.attempts.saturating_add(1);
		let backoff = Backoff { base_ms: batch_cfg.base_backoff_ms, max_ms: batch_cfg.max_backoff_ms };
		let error_text = retry::sanitize_error(&err.to_string());
		let parked = attempts >= batch_cfg.max_attempts;

		embeddings::mark_failed(
			&self.db,
			record.embedding_id,
			claim_token,
			attempts,
			batch_cfg.max_attempts,
			&error_text,
			now + backoff.for_attempt(attempts),
			now,
		)
		.await?;

		tracing::warn!(
			embedding_id = %record.embedding_id,
			attempts,
			parked,
			error = %error_text,
			"Embedding computation failed."
		);

		Ok(())
	}
}
