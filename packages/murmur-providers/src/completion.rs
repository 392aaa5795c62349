use serde_json::Value;

use murmur_config::CompletionProviderConfig;
use murmur_domain::prompt::ChatMessage;

use crate::{Error, Result};

/// Requests one chat completion and returns the assistant text.
pub async fn complete(
	cfg: &CompletionProviderConfig,
	messages: &[ChatMessage],
	temperature: f32,
) -> Result<String> {
	if messages.is_empty() {
		return Err(Error::InvalidRequest {
			message: "Completion messages must not be empty.".to_string(),
		});
	}

	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature,
		"messages": messages,
	});
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let json = crate::with_retries(&cfg.provider_id, cfg.max_retries, || {
		crate::send_json(client.post(&url).headers(headers.clone()).json(&body))
	})
	.await?;

	parse_completion_response(&json)
}

fn parse_completion_response(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing message content.".to_string(),
		})?;

	if content.trim().is_empty() {
		return Err(Error::InvalidResponse {
			message: "Completion response content is empty.".to_string(),
		});
	}

	Ok(content.to_string())
}
