pub mod completion;
pub mod embedding;

mod error;

pub use error::{Error, Result};

use std::{future::Future, time::Duration};

use reqwest::{
	Client, RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

use murmur_domain::retry::{self, Backoff};

const RETRY_BACKOFF: Backoff = Backoff { base_ms: 250, max_ms: 5_000 };
const MAX_ERROR_BODY_CHARS: usize = 512;

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

/// Sends the request and returns the JSON body, mapping non-2xx responses to [`Error::Status`].
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value> {
	let res = request.send().await?;
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();
		let body: String = retry::sanitize_error(&body).chars().take(MAX_ERROR_BODY_CHARS).collect();

		return Err(Error::Status { status: status.as_u16(), body });
	}

	Ok(res.json().await?)
}

/// Runs `op` up to `max_retries + 1` times, sleeping with exponential backoff between retryable
/// failures.
pub(crate) async fn with_retries<T, F, Fut>(provider_id: &str, max_retries: u32, mut op: F) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt: u32 = 0;

	loop {
		attempt += 1;

		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_retryable() && attempt <= max_retries => {
				let delay = RETRY_BACKOFF.for_attempt(attempt as i32);

				tracing::warn!(
					provider_id,
					attempt,
					error = %retry::sanitize_error(&err.to_string()),
					"Provider call failed. Retrying."
				);

				tokio::time::sleep(Duration::try_from(delay).unwrap_or_default()).await;
			},
			Err(err) => return Err(err),
		}
	}
}
