//! Context selection for avatar turns.

use std::{cmp::Ordering, collections::HashSet};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{settings::EmbeddingSettings, source::EmbeddingSourceRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
	Similarity,
	Recent,
}

/// One retrieved piece of context. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
	pub source: EmbeddingSourceRef,
	pub content: String,
	pub speaker: String,
	pub similarity_score: f32,
	pub origin: ResultOrigin,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
	pub source: EmbeddingSourceRef,
	pub content: String,
	pub speaker: String,
	pub score: f32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct RecentCandidate {
	pub source: EmbeddingSourceRef,
	pub content: String,
	pub speaker: String,
	pub created_at: OffsetDateTime,
}

/// Highest score first; ties go to the most recent item.
pub fn rank_order(
	a_score: f32,
	a_at: OffsetDateTime,
	b_score: f32,
	b_at: OffsetDateTime,
) -> Ordering {
	b_score.partial_cmp(&a_score).unwrap_or(Ordering::Equal).then_with(|| b_at.cmp(&a_at))
}

/// Ranks similarity hits, drops those below the threshold, and fills the residual budget with
/// recent source messages when the avatar asks for them.
///
/// Similarity hits come first in descending score order. Recent messages follow in chronological
/// order and never duplicate a source already selected.
pub fn select_context(
	mut scored: Vec<ScoredCandidate>,
	recent: Vec<RecentCandidate>,
	settings: &EmbeddingSettings,
) -> Vec<SearchResult> {
	let budget = settings.max_context_messages as usize;

	scored.sort_by(|a, b| rank_order(a.score, a.created_at, b.score, b.created_at));

	let mut seen = HashSet::new();
	let mut out: Vec<SearchResult> = scored
		.into_iter()
		.filter(|candidate| candidate.score >= settings.similarity_threshold)
		.filter(|candidate| seen.insert(candidate.source))
		.take(budget)
		.map(|candidate| SearchResult {
			source: candidate.source,
			content: candidate.content,
			speaker: candidate.speaker,
			similarity_score: candidate.score,
			origin: ResultOrigin::Similarity,
			created_at: candidate.created_at,
		})
		.collect();

	if !settings.include_recent_messages {
		return out;
	}

	let residual = budget.saturating_sub(out.len()).min(settings.recent_messages_count as usize);

	if residual == 0 {
		return out;
	}

	let mut recent: Vec<RecentCandidate> = recent
		.into_iter()
		.filter(|candidate| !seen.contains(&candidate.source))
		.collect();

	recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
	recent.truncate(residual);
	recent.reverse();

	out.extend(recent.into_iter().map(|candidate| SearchResult {
		source: candidate.source,
		content: candidate.content,
		speaker: candidate.speaker,
		similarity_score: 0.0,
		origin: ResultOrigin::Recent,
		created_at: candidate.created_at,
	}));

	out
}
