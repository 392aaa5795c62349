use uuid::Uuid;

use murmur_domain::{prompt::PromptError, retry, settings::SettingsError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Membership denied: {message}")]
	MembershipDenied { message: String },
	#[error("Avatar config {config_id} not found.")]
	ConfigNotFound { config_id: Uuid },
	#[error("Avatar chat {chat_id} not found.")]
	ChatNotFound { chat_id: Uuid },
	#[error("Source not found: {message}")]
	SourceNotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	/// The completion succeeded but the exchange could not be stored.
	#[error("Persistence error: {message}")]
	Persistence { message: String },
}
impl Error {
	pub(crate) fn invalid(message: impl Into<String>) -> Self {
		Self::InvalidRequest { message: message.into() }
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}
impl From<murmur_storage::Error> for Error {
	fn from(err: murmur_storage::Error) -> Self {
		let murmur_storage::Error::Sqlx(inner) = err;

		Self::Storage { message: inner.to_string() }
	}
}
impl From<murmur_providers::Error> for Error {
	fn from(err: murmur_providers::Error) -> Self {
		Self::Provider { message: retry::sanitize_error(&err.to_string()) }
	}
}
impl From<SettingsError> for Error {
	fn from(err: SettingsError) -> Self {
		Self::InvalidRequest { message: err.message }
	}
}
impl From<PromptError> for Error {
	fn from(err: PromptError) -> Self {
		Self::InvalidRequest { message: err.to_string() }
	}
}
