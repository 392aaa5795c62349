use serde_json::Value;

use murmur_config::EmbeddingProviderConfig;
use murmur_tokens::TokenCounter;

use crate::{Error, Result};

/// Embeds `texts` in one request and returns one vector per input, in input order.
///
/// Inputs longer than `max_input_tokens` are truncated from the tail before sending.
pub async fn embed(
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
	counter: &TokenCounter,
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Err(Error::InvalidRequest {
			message: "Embedding input must not be empty.".to_string(),
		});
	}
	if let Some(idx) = texts.iter().position(|text| text.trim().is_empty()) {
		return Err(Error::InvalidRequest {
			message: format!("Embedding input at index {idx} is blank."),
		});
	}

	let max_tokens = cfg.max_input_tokens as usize;
	let input: Vec<&str> = texts
		.iter()
		.map(|text| {
			let cut = counter.truncate(text, max_tokens);

			if cut.truncated {
				tracing::debug!(max_tokens, "Embedding input truncated.");
			}

			cut.text
		})
		.collect();
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": input,
		"encoding_format": cfg.encoding,
		"dimensions": cfg.dimensions,
	});
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)?;
	let json = crate::with_retries(&cfg.provider_id, cfg.max_retries, || {
		crate::send_json(client.post(&url).headers(headers.clone()).json(&body))
	})
	.await?;

	parse_embedding_response(json, texts.len(), cfg.dimensions as usize)
}

fn parse_embedding_response(json: Value, expected: usize, dimensions: usize) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| invalid("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());

		for value in embedding {
			let number = value.as_f64().ok_or_else(|| invalid("Embedding value must be numeric."))?
				as f32;

			if !number.is_finite() {
				return Err(invalid("Embedding value must be finite."));
			}

			vec.push(number);
		}

		if vec.len() != dimensions {
			return Err(invalid(format!(
				"Embedding dimension mismatch. Expected {dimensions}, got {}.",
				vec.len()
			)));
		}

		indexed.push((index, vec));
	}

	if indexed.len() != expected {
		return Err(invalid(format!(
			"Embedding response has {} vectors for {expected} inputs.",
			indexed.len()
		)));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn invalid(message: impl Into<String>) -> Error {
	Error::InvalidResponse { message: message.into() }
}
