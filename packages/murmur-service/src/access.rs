use uuid::Uuid;

use murmur_storage::membership;

use crate::{Error, MurmurService, Result};

impl MurmurService {
	/// Fails with [`Error::MembershipDenied`] unless `actor_id` belongs to the workspace.
	pub(crate) async fn ensure_member(&self, workspace_id: Uuid, actor_id: Uuid) -> Result<()> {
		if membership::is_workspace_member(&self.db, workspace_id, actor_id).await? {
			return Ok(());
		}

		tracing::info!(%workspace_id, %actor_id, "Workspace access denied.");

		Err(Error::MembershipDenied {
			message: "Actor is not a member of the workspace.".to_string(),
		})
	}
}
