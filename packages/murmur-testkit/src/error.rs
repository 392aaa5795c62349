pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid {env} value: {source}.", env = crate::DSN_ENV)]
	InvalidDsn { source: sqlx::Error },
	#[error("No admin database reachable (tried {tried}): {source}.")]
	AdminUnreachable { tried: String, source: sqlx::Error },
	#[error("Failed to {action} test database {name}: {source}.")]
	Database { action: &'static str, name: String, source: sqlx::Error },
}
