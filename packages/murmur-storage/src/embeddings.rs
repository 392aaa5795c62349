//! Embedding Store over `message_embeddings`.
//!
//! A record is `pending` until a batch run claims it (`processing`, leased through
//! `claim_token`/`claimed_until`). The run then either writes the vector (`computed`) or returns the
//! record to `pending` with backoff, and after too many attempts parks it as `failed`.

use sqlx::PgExecutor;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	format_vector_text,
	models::{EmbeddingRecord, NewEmbedding, ScoredEmbedding, StatusCounts},
};

/// Rows read from the vector index per requested result, before collapsing per source.
pub const SEARCH_OVERFETCH: i64 = 4;
const MIN_SEARCH_CANDIDATES: i64 = 40;
const RECORD_COLUMNS: [&str; 16] = [
	"embedding_id",
	"avatar_config_id",
	"workspace_id",
	"source_type",
	"source_id",
	"content",
	"content_hash",
	"speaker",
	"status",
	"attempts",
	"last_error",
	"available_at",
	"claim_token",
	"claimed_until",
	"created_at",
	"updated_at",
];

fn record_columns(prefix: &str) -> String {
	RECORD_COLUMNS.iter().map(|column| format!("{prefix}{column}")).collect::<Vec<_>>().join(",\n\t")
}

/// Inserts a pending record. Returns `None` when one already exists for the same
/// `(source_type, source_id, avatar_config_id)`.
pub async fn insert_pending<'e, E>(
	executor: E,
	record: &NewEmbedding<'_>,
	now: OffsetDateTime,
) -> Result<Option<Uuid>>
where
	E: PgExecutor<'e>,
{
	let id: Option<Uuid> = sqlx::query_scalar(
		"\
INSERT INTO message_embeddings (
\tembedding_id,
\tavatar_config_id,
\tworkspace_id,
\tsource_type,
\tsource_id,
\tcontent,
\tcontent_hash,
\tspeaker,
\tstatus,
\tavailable_at,
\tcreated_at,
\tupdated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $9, $9)
ON CONFLICT (source_type, source_id, avatar_config_id) DO NOTHING
RETURNING embedding_id",
	)
	.bind(Uuid::new_v4())
	.bind(record.avatar_config_id)
	.bind(record.workspace_id)
	.bind(record.source_type)
	.bind(record.source_id)
	.bind(record.content)
	.bind(record.content_hash)
	.bind(record.speaker)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(id)
}

/// Replaces the content of an existing record and sends it back to `pending`, but only when the
/// content hash differs. Returns the id of the re-pended record.
pub async fn repend_if_changed<'e, E>(
	executor: E,
	record: &NewEmbedding<'_>,
	now: OffsetDateTime,
) -> Result<Option<Uuid>>
where
	E: PgExecutor<'e>,
{
	let id: Option<Uuid> = sqlx::query_scalar(
		"\
UPDATE message_embeddings
SET content = $4,
\tcontent_hash = $5,
\tspeaker = $6,
\tembedding = NULL,
\tstatus = 'pending',
\tattempts = 0,
\tlast_error = NULL,
\tavailable_at = $7,
\tclaim_token = NULL,
\tclaimed_until = NULL,
\tupdated_at = $7
WHERE source_type = $1
\tAND source_id = $2
\tAND avatar_config_id = $3
\tAND content_hash <> $5
RETURNING embedding_id",
	)
	.bind(record.source_type)
	.bind(record.source_id)
	.bind(record.avatar_config_id)
	.bind(record.content)
	.bind(record.content_hash)
	.bind(record.speaker)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(id)
}

/// Pending records in insertion order. Read-only; use [`claim_pending`] to process them.
pub async fn list_pending(db: &Db, limit: i64) -> Result<Vec<EmbeddingRecord>> {
	let sql = format!(
		"\
SELECT
\t{}
FROM message_embeddings
WHERE status = 'pending'
ORDER BY created_at ASC, embedding_id ASC
LIMIT $1",
		record_columns("")
	);
	let rows = sqlx::query_as::<_, EmbeddingRecord>(&sql).bind(limit).fetch_all(&db.pool).await?;

	Ok(rows)
}

/// Atomically leases up to `limit` due records to `claim_token`, oldest first.
///
/// Due means `pending` with `available_at <= now`, or `processing` with an expired lease. Rows
/// locked by a concurrent claim are skipped, so a record is held by at most one run at a time.
pub async fn claim_pending(
	db: &Db,
	limit: i64,
	claim_token: Uuid,
	now: OffsetDateTime,
	lease_seconds: i64,
) -> Result<Vec<EmbeddingRecord>> {
	let sql = format!(
		"\
WITH due AS (
\tSELECT embedding_id
\tFROM message_embeddings
\tWHERE (status = 'pending' AND available_at <= $1)
\t\tOR (status = 'processing' AND claimed_until <= $1)
\tORDER BY created_at ASC, embedding_id ASC
\tLIMIT $2
\tFOR UPDATE SKIP LOCKED
)
UPDATE message_embeddings AS e
SET status = 'processing',
\tclaim_token = $3,
\tclaimed_until = $4,
\tupdated_at = $1
FROM due
WHERE e.embedding_id = due.embedding_id
RETURNING
\t{}",
		record_columns("e.")
	);
	let mut rows = sqlx::query_as::<_, EmbeddingRecord>(&sql)
		.bind(now)
		.bind(limit)
		.bind(claim_token)
		.bind(now + Duration::seconds(lease_seconds))
		.fetch_all(&db.pool)
		.await?;

	// RETURNING carries no order.
	rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.embedding_id.cmp(&b.embedding_id)));

	Ok(rows)
}

/// Stores the vector for a claimed record. Returns `false`, and writes nothing, when the claim was
/// lost to an edit, an expired lease, or an earlier write.
pub async fn mark_computed(
	db: &Db,
	embedding_id: Uuid,
	claim_token: Uuid,
	vec: &[f32],
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE message_embeddings
SET embedding = $3::text::vector,
\tstatus = 'computed',
\tlast_error = NULL,
\tclaim_token = NULL,
\tclaimed_until = NULL,
\tupdated_at = $4
WHERE embedding_id = $1 AND claim_token = $2 AND status = 'processing'",
	)
	.bind(embedding_id)
	.bind(claim_token)
	.bind(format_vector_text(vec))
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Releases a claimed record after a failed attempt. The record becomes `failed` when `attempts`
/// reaches `max_attempts` and is otherwise retried after `available_at`.
#[allow(clippy::too_many_arguments)]
pub async fn mark_failed(
	db: &Db,
	embedding_id: Uuid,
	claim_token: Uuid,
	attempts: i32,
	max_attempts: i32,
	error_text: &str,
	available_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE message_embeddings
SET status = CASE WHEN $3 >= $4 THEN 'failed' ELSE 'pending' END,
\tattempts = $3,
\tlast_error = $5,
\tavailable_at = $6,
\tclaim_token = NULL,
\tclaimed_until = NULL,
\tupdated_at = $7
WHERE embedding_id = $1 AND claim_token = $2 AND status = 'processing'",
	)
	.bind(embedding_id)
	.bind(claim_token)
	.bind(attempts)
	.bind(max_attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

/// Nearest computed records in one workspace by cosine similarity, at most one per source.
///
/// With `avatar_config_id` set, only that avatar's records are searched. Without it, direct
/// messages are excluded since they are private to their participants. The nearest
/// `limit * SEARCH_OVERFETCH` rows are read in distance order so the vector index serves the scan,
/// then collapsed per source.
pub async fn similarity_search(
	db: &Db,
	query_vec: &[f32],
	workspace_id: Uuid,
	avatar_config_id: Option<Uuid>,
	limit: i64,
) -> Result<Vec<ScoredEmbedding>> {
	let candidates = limit.saturating_mul(SEARCH_OVERFETCH).max(MIN_SEARCH_CANDIDATES);
	let rows = sqlx::query_as::<_, ScoredEmbedding>(
		"\
WITH nearest AS (
\tSELECT
\t\tembedding_id,
\t\tavatar_config_id,
\t\tworkspace_id,
\t\tsource_type,
\t\tsource_id,
\t\tcontent,
\t\tspeaker,
\t\tembedding <=> $1::text::vector AS distance,
\t\tcreated_at
\tFROM message_embeddings
\tWHERE workspace_id = $2
\t\tAND status = 'computed'
\t\tAND ($3::uuid IS NULL OR avatar_config_id = $3)
\t\tAND ($3::uuid IS NOT NULL OR source_type <> 'direct_message')
\tORDER BY embedding <=> $1::text::vector
\tLIMIT $5
)
SELECT *
FROM (
\tSELECT DISTINCT ON (source_type, source_id)
\t\tembedding_id,
\t\tavatar_config_id,
\t\tworkspace_id,
\t\tsource_type,
\t\tsource_id,
\t\tcontent,
\t\tspeaker,
\t\t(1 - distance)::real AS score,
\t\tcreated_at
\tFROM nearest
\tORDER BY source_type, source_id, distance ASC, created_at DESC
) AS hits
ORDER BY score DESC, created_at DESC, embedding_id ASC
LIMIT $4",
	)
	.bind(format_vector_text(query_vec))
	.bind(workspace_id)
	.bind(avatar_config_id)
	.bind(limit)
	.bind(candidates)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Removes every record for a source whose text is gone. Returns the number of rows deleted.
pub async fn delete_for_source<'e, E>(executor: E, source_type: &str, source_id: Uuid) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result =
		sqlx::query("DELETE FROM message_embeddings WHERE source_type = $1 AND source_id = $2")
			.bind(source_type)
			.bind(source_id)
			.execute(executor)
			.await?;

	Ok(result.rows_affected())
}

pub async fn get_for_source(
	db: &Db,
	source_type: &str,
	source_id: Uuid,
	avatar_config_id: Uuid,
) -> Result<Option<EmbeddingRecord>> {
	let sql = format!(
		"\
SELECT
\t{}
FROM message_embeddings
WHERE source_type = $1 AND source_id = $2 AND avatar_config_id = $3",
		record_columns("")
	);
	let row = sqlx::query_as::<_, EmbeddingRecord>(&sql)
		.bind(source_type)
		.bind(source_id)
		.bind(avatar_config_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

pub async fn status_counts(db: &Db, avatar_config_id: Option<Uuid>) -> Result<StatusCounts> {
	let rows: Vec<(String, i64)> = sqlx::query_as(
		"\
SELECT status, COUNT(*)
FROM message_embeddings
WHERE $1::uuid IS NULL OR avatar_config_id = $1
GROUP BY status",
	)
	.bind(avatar_config_id)
	.fetch_all(&db.pool)
	.await?;
	let mut counts = StatusCounts::default();

	for (status, count) in rows {
		match status.as_str() {
			"pending" => counts.pending = count,
			"processing" => counts.processing = count,
			"computed" => counts.computed = count,
			"failed" => counts.failed = count,
			other => tracing::warn!(status = other, "Unknown embedding status in store."),
		}
	}

	Ok(counts)
}
