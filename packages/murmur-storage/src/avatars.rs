//! Avatar configs, chats and their append-only message log.

use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{AvatarChat, AvatarChatMessage, AvatarConfig},
};

const CONFIG_COLUMNS: &str = "\
config_id,
\tworkspace_id,
\tname,
\tsystem_prompt,
\tsource_type,
\tsource_id,
\tcreated_by_user_id,
\tembedding_settings,
\tmessage_history_limit,
\ttemperature,
\tcontext_length,
\tcreated_at,
\tupdated_at";
const CHAT_COLUMNS: &str = "\
chat_id,
\tconfig_id,
\ttitle,
\tcreated_by_user_id,
\tworkspace_id,
\tsource_type,
\tsource_id,
\tcreated_at,
\tupdated_at";

pub async fn insert_config(db: &Db, config: &AvatarConfig) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO avatar_configs (
\tconfig_id,
\tworkspace_id,
\tname,
\tsystem_prompt,
\tsource_type,
\tsource_id,
\tcreated_by_user_id,
\tembedding_settings,
\tmessage_history_limit,
\ttemperature,
\tcontext_length,
\tcreated_at,
\tupdated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
	)
	.bind(config.config_id)
	.bind(config.workspace_id)
	.bind(&config.name)
	.bind(&config.system_prompt)
	.bind(&config.source_type)
	.bind(config.source_id)
	.bind(config.created_by_user_id)
	.bind(&config.embedding_settings)
	.bind(config.message_history_limit)
	.bind(config.temperature)
	.bind(config.context_length)
	.bind(config.created_at)
	.bind(config.updated_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Persists the mutable fields of a config. Identity, source and ownership never change.
pub async fn update_config(db: &Db, config: &AvatarConfig) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE avatar_configs
SET name = $2,
\tsystem_prompt = $3,
\tembedding_settings = $4,
\tmessage_history_limit = $5,
\ttemperature = $6,
\tcontext_length = $7,
\tupdated_at = $8
WHERE config_id = $1",
	)
	.bind(config.config_id)
	.bind(&config.name)
	.bind(&config.system_prompt)
	.bind(&config.embedding_settings)
	.bind(config.message_history_limit)
	.bind(config.temperature)
	.bind(config.context_length)
	.bind(config.updated_at)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn get_config(db: &Db, config_id: Uuid) -> Result<Option<AvatarConfig>> {
	let sql = format!("SELECT\n\t{CONFIG_COLUMNS}\nFROM avatar_configs\nWHERE config_id = $1");
	let row =
		sqlx::query_as::<_, AvatarConfig>(&sql).bind(config_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

/// Configs in the workspace whose source is one of `source_ids`.
pub async fn configs_for_sources<'e, E>(
	executor: E,
	workspace_id: Uuid,
	source_type: &str,
	source_ids: &[Uuid],
) -> Result<Vec<AvatarConfig>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT
\t{CONFIG_COLUMNS}
FROM avatar_configs
WHERE workspace_id = $1 AND source_type = $2 AND source_id = ANY($3)
ORDER BY created_at ASC, config_id ASC"
	);
	let rows = sqlx::query_as::<_, AvatarConfig>(&sql)
		.bind(workspace_id)
		.bind(source_type)
		.bind(source_ids)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

pub async fn delete_config(db: &Db, config_id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM avatar_configs WHERE config_id = $1")
		.bind(config_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn insert_chat<'e, E>(executor: E, chat: &AvatarChat) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO avatar_chats (
\tchat_id,
\tconfig_id,
\ttitle,
\tcreated_by_user_id,
\tworkspace_id,
\tsource_type,
\tsource_id,
\tcreated_at,
\tupdated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
	)
	.bind(chat.chat_id)
	.bind(chat.config_id)
	.bind(&chat.title)
	.bind(chat.created_by_user_id)
	.bind(chat.workspace_id)
	.bind(&chat.source_type)
	.bind(chat.source_id)
	.bind(chat.created_at)
	.bind(chat.updated_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn get_chat(db: &Db, chat_id: Uuid) -> Result<Option<AvatarChat>> {
	let sql = format!("SELECT\n\t{CHAT_COLUMNS}\nFROM avatar_chats\nWHERE chat_id = $1");
	let row = sqlx::query_as::<_, AvatarChat>(&sql).bind(chat_id).fetch_optional(&db.pool).await?;

	Ok(row)
}

/// The most recently active chat a user holds with one avatar.
pub async fn latest_chat<'e, E>(
	executor: E,
	config_id: Uuid,
	user_id: Uuid,
) -> Result<Option<AvatarChat>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT
\t{CHAT_COLUMNS}
FROM avatar_chats
WHERE config_id = $1 AND created_by_user_id = $2
ORDER BY updated_at DESC, chat_id DESC
LIMIT 1"
	);
	let row = sqlx::query_as::<_, AvatarChat>(&sql)
		.bind(config_id)
		.bind(user_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Returns the user's latest chat with the avatar, inserting `chat` when there is none.
///
/// Callers racing on the same avatar and user are serialized by a transaction-scoped advisory
/// lock, so they all land in one chat.
pub async fn latest_or_insert_chat(db: &Db, chat: &AvatarChat) -> Result<AvatarChat> {
	let mut tx = db.pool.begin().await?;

	sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
		.bind(format!("avatar_chat:{}:{}", chat.config_id, chat.created_by_user_id))
		.execute(&mut *tx)
		.await?;

	if let Some(existing) = latest_chat(&mut *tx, chat.config_id, chat.created_by_user_id).await? {
		tx.commit().await?;

		return Ok(existing);
	}

	insert_chat(&mut *tx, chat).await?;
	tx.commit().await?;

	Ok(chat.clone())
}

pub async fn delete_chat(db: &Db, chat_id: Uuid) -> Result<bool> {
	let result =
		sqlx::query("DELETE FROM avatar_chats WHERE chat_id = $1").bind(chat_id).execute(&db.pool).await?;

	Ok(result.rows_affected() == 1)
}

/// Appends one query/response pair and bumps the chat's `updated_at` in one transaction.
pub async fn append_chat_message(db: &Db, message: &AvatarChatMessage) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	sqlx::query(
		"\
INSERT INTO avatar_chat_messages (message_id, chat_id, query, response, created_at)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(message.message_id)
	.bind(message.chat_id)
	.bind(&message.query)
	.bind(&message.response)
	.bind(message.created_at)
	.execute(&mut *tx)
	.await?;
	sqlx::query("UPDATE avatar_chats SET updated_at = $2 WHERE chat_id = $1")
		.bind(message.chat_id)
		.bind(message.created_at)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}

/// The newest `limit` messages of a chat, returned oldest first.
pub async fn list_chat_messages(
	db: &Db,
	chat_id: Uuid,
	limit: i64,
) -> Result<Vec<AvatarChatMessage>> {
	let mut rows = sqlx::query_as::<_, AvatarChatMessage>(
		"\
SELECT message_id, chat_id, query, response, created_at
FROM avatar_chat_messages
WHERE chat_id = $1
ORDER BY created_at DESC, message_id DESC
LIMIT $2",
	)
	.bind(chat_id)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	rows.reverse();

	Ok(rows)
}
