//! Reads of the chat application's message tables.

use uuid::Uuid;

use murmur_domain::source::{AvatarSourceType, EmbeddingSourceRef};

use crate::{Result, db::Db, models::SourceMessage};

const CHANNEL_MESSAGE_SELECT: &str = "\
SELECT
\t'channel_message' AS source_type,
\tm.message_id AS source_id,
\tc.workspace_id,
\tm.channel_id AS channel_id,
\tm.user_id AS sender_id,
\tNULL::uuid AS receiver_id,
\tu.display_name AS speaker,
\tm.content,
\tm.created_at
FROM channel_messages m
JOIN channels c ON c.channel_id = m.channel_id
JOIN users u ON u.user_id = m.user_id";
const THREAD_MESSAGE_SELECT: &str = "\
SELECT
\t'thread_message' AS source_type,
\tm.message_id AS source_id,
\tc.workspace_id,
\tm.channel_id AS channel_id,
\tm.user_id AS sender_id,
\tNULL::uuid AS receiver_id,
\tu.display_name AS speaker,
\tm.content,
\tm.created_at
FROM thread_messages m
JOIN channels c ON c.channel_id = m.channel_id
JOIN users u ON u.user_id = m.user_id";
const DIRECT_MESSAGE_SELECT: &str = "\
SELECT
\t'direct_message' AS source_type,
\tm.message_id AS source_id,
\tm.workspace_id,
\tNULL::uuid AS channel_id,
\tm.sender_id,
\tm.receiver_id AS receiver_id,
\tu.display_name AS speaker,
\tm.content,
\tm.created_at
FROM direct_messages m
JOIN users u ON u.user_id = m.sender_id";
const DOCUMENT_SELECT: &str = "\
SELECT
\t'document' AS source_type,
\td.document_id AS source_id,
\td.workspace_id,
\td.channel_id AS channel_id,
\td.uploaded_by AS sender_id,
\tNULL::uuid AS receiver_id,
\tu.display_name AS speaker,
\td.title || E'\\n' || d.content AS content,
\td.created_at
FROM documents d
JOIN users u ON u.user_id = d.uploaded_by";

pub async fn load_source_message(
	db: &Db,
	source: EmbeddingSourceRef,
) -> Result<Option<SourceMessage>> {
	let sql = match source {
		EmbeddingSourceRef::Channel(_) => format!("{CHANNEL_MESSAGE_SELECT}\nWHERE m.message_id = $1"),
		EmbeddingSourceRef::Thread(_) => format!("{THREAD_MESSAGE_SELECT}\nWHERE m.message_id = $1"),
		EmbeddingSourceRef::Direct(_) => format!("{DIRECT_MESSAGE_SELECT}\nWHERE m.message_id = $1"),
		EmbeddingSourceRef::Document(_) => format!("{DOCUMENT_SELECT}\nWHERE d.document_id = $1"),
	};
	let row = sqlx::query_as::<_, SourceMessage>(&sql)
		.bind(source.id())
		.fetch_optional(&db.pool)
		.await?;

	Ok(row)
}

/// The newest `limit` messages of an avatar's source, newest first.
///
/// A channel source covers its channel and thread messages. A user source covers the direct
/// messages the user sent or received in the workspace.
pub async fn recent_source_messages(
	db: &Db,
	workspace_id: Uuid,
	source_type: AvatarSourceType,
	source_id: Uuid,
	limit: i64,
) -> Result<Vec<SourceMessage>> {
	let sql = match source_type {
		AvatarSourceType::Channel => format!(
			"\
SELECT * FROM (
{CHANNEL_MESSAGE_SELECT}
WHERE m.channel_id = $2 AND c.workspace_id = $1
UNION ALL
{THREAD_MESSAGE_SELECT}
WHERE m.channel_id = $2 AND c.workspace_id = $1
) AS recent
ORDER BY created_at DESC, source_id DESC
LIMIT $3"
		),
		AvatarSourceType::User => format!(
			"\
{DIRECT_MESSAGE_SELECT}
WHERE m.workspace_id = $1 AND (m.sender_id = $2 OR m.receiver_id = $2)
ORDER BY m.created_at DESC, m.message_id DESC
LIMIT $3"
		),
	};
	let rows = sqlx::query_as::<_, SourceMessage>(&sql)
		.bind(workspace_id)
		.bind(source_id)
		.bind(limit)
		.fetch_all(&db.pool)
		.await?;

	Ok(rows)
}

/// Whether an avatar source exists inside the workspace.
pub async fn source_exists(
	db: &Db,
	workspace_id: Uuid,
	source_type: AvatarSourceType,
	source_id: Uuid,
) -> Result<bool> {
	let sql = match source_type {
		AvatarSourceType::Channel =>
			"SELECT EXISTS (SELECT 1 FROM channels WHERE workspace_id = $1 AND channel_id = $2)",
		AvatarSourceType::User =>
			"SELECT EXISTS (SELECT 1 FROM workspace_members WHERE workspace_id = $1 AND user_id = $2)",
	};
	let exists: bool =
		sqlx::query_scalar(sql).bind(workspace_id).bind(source_id).fetch_one(&db.pool).await?;

	Ok(exists)
}
