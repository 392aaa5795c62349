pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidRequest { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Provider returned status {status}: {body}")]
	Status { status: u16, body: String },
}
impl Error {
	/// Transport failures, rate limits, and server errors are worth another attempt.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::Reqwest(err) => err.is_timeout() || err.is_connect() || err.is_request(),
			Self::Status { status, .. } => *status == 429 || *status >= 500,
			_ => false,
		}
	}
}
