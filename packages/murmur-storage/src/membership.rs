use uuid::Uuid;

use crate::{Result, db::Db};

pub async fn is_workspace_member(db: &Db, workspace_id: Uuid, user_id: Uuid) -> Result<bool> {
	let member: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
\tSELECT 1
\tFROM workspace_members
\tWHERE workspace_id = $1 AND user_id = $2
)",
	)
	.bind(workspace_id)
	.bind(user_id)
	.fetch_one(&db.pool)
	.await?;

	Ok(member)
}
