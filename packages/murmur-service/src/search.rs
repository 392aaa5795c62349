//! Context Retriever and the workspace search endpoint.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use murmur_domain::{
	retrieval::{self, RecentCandidate, ResultOrigin, ScoredCandidate, SearchResult},
	settings::EmbeddingSettings,
	source::{AvatarSourceType, EmbeddingSourceRef, SourceType},
};
use murmur_storage::{
	embeddings,
	models::{AvatarConfig, ScoredEmbedding, SourceMessage},
	sources,
};

use crate::{Error, MurmurService, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub workspace_id: Uuid,
	pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
}

impl MurmurService {
	/// Context for one avatar turn: the avatar's own similarity hits in `workspace_id`, filtered
	/// and merged with recent source messages by [`retrieval::select_context`].
	///
	/// Returns an empty list when nothing qualifies.
	pub async fn retrieve(
		&self,
		query: &str,
		workspace_id: Uuid,
		config: &AvatarConfig,
		settings: &EmbeddingSettings,
	) -> Result<Vec<SearchResult>> {
		if config.workspace_id != workspace_id {
			return Err(Error::ConfigNotFound { config_id: config.config_id });
		}

		let query_vec = self.embed_one(query).await?;
		let hits = embeddings::similarity_search(
			&self.db,
			&query_vec,
			workspace_id,
			Some(config.config_id),
			i64::from(settings.max_context_messages),
		)
		.await?;
		let scored = hits.into_iter().map(scored_candidate).collect::<Result<Vec<_>>>()?;
		let recent = if settings.include_recent_messages && settings.recent_messages_count > 0 {
			let source_type: AvatarSourceType = config.source_type.parse().map_err(|err| {
				Error::Storage { message: format!("Avatar config {}: {err}", config.config_id) }
			})?;

			sources::recent_source_messages(
				&self.db,
				workspace_id,
				source_type,
				config.source_id,
				i64::from(settings.recent_messages_count),
			)
			.await?
			.into_iter()
			.map(recent_candidate)
			.collect::<Result<Vec<_>>>()?
		} else {
			Vec::new()
		};

		Ok(retrieval::select_context(scored, recent, settings))
	}

	/// Ranked semantic search across a workspace's shared sources.
	pub async fn search(&self, actor_id: Uuid, req: SearchRequest) -> Result<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid("query must be non-empty."));
		}

		let search_cfg = &self.cfg.search;
		let limit = req.limit.unwrap_or(search_cfg.default_limit);

		if limit == 0 || limit > search_cfg.max_limit {
			return Err(Error::invalid(format!(
				"limit must be between 1 and {}.",
				search_cfg.max_limit
			)));
		}

		self.ensure_member(req.workspace_id, actor_id).await?;

		let query_vec = self.embed_one(query).await?;
		let hits = embeddings::similarity_search(
			&self.db,
			&query_vec,
			req.workspace_id,
			None,
			i64::from(limit),
		)
		.await?;
		let results = hits
			.into_iter()
			.map(|hit| {
				let candidate = scored_candidate(hit)?;

				Ok(SearchResult {
					source: candidate.source,
					content: candidate.content,
					speaker: candidate.speaker,
					similarity_score: candidate.score,
					origin: ResultOrigin::Similarity,
					created_at: candidate.created_at,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(SearchResponse { results })
	}
}

fn source_ref(source_type: &str, source_id: Uuid) -> Result<EmbeddingSourceRef> {
	let source_type: SourceType = source_type
		.parse()
		.map_err(|err| Error::Storage { message: format!("Stored record: {err}") })?;

	Ok(EmbeddingSourceRef::new(source_type, source_id))
}

fn scored_candidate(hit: ScoredEmbedding) -> Result<ScoredCandidate> {
	Ok(ScoredCandidate {
		source: source_ref(&hit.source_type, hit.source_id)?,
		content: hit.content,
		speaker: hit.speaker,
		score: hit.score,
		created_at: hit.created_at,
	})
}

fn recent_candidate(message: SourceMessage) -> Result<RecentCandidate> {
	Ok(RecentCandidate {
		source: source_ref(&message.source_type, message.source_id)?,
		content: message.content,
		speaker: message.speaker,
		created_at: message.created_at,
	})
}
