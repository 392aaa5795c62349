//! Token counting and deterministic truncation.
//!
//! Counts come from a Hugging Face tokenizer when one is configured and from a
//! characters-per-token estimate otherwise. Truncation always cuts on a grapheme boundary and keeps
//! the head of the text, so the same input and limit always yield the same output.

pub use tokenizers::Tokenizer;
use unicode_segmentation::UnicodeSegmentation;

pub type TokenizerError = tokenizers::Error;

pub fn load_tokenizer(repo: &str) -> Result<Tokenizer, TokenizerError> {
	Tokenizer::from_pretrained(repo, None)
}

pub enum TokenCounter {
	Estimate { chars_per_token: f32 },
	Tokenizer(Box<Tokenizer>),
}
impl TokenCounter {
	pub fn estimate(chars_per_token: f32) -> Self {
		Self::Estimate { chars_per_token }
	}

	pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
		Self::Tokenizer(Box::new(tokenizer))
	}

	pub fn count(&self, text: &str) -> usize {
		if text.is_empty() {
			return 0;
		}

		match self {
			Self::Estimate { chars_per_token } => estimate_tokens(text, *chars_per_token),
			Self::Tokenizer(tokenizer) => match tokenizer.encode(text, false) {
				Ok(encoding) => encoding.len(),
				Err(err) => {
					tracing::error!(error = %err, "Tokenizer failed to encode text. Falling back to estimate.");

					estimate_tokens(text, 4.0)
				},
			},
		}
	}

	/// Returns the longest prefix of `text` whose token count is at most `max_tokens`.
	pub fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> Truncated<'a> {
		if self.count(text) <= max_tokens {
			return Truncated { text, truncated: false };
		}
		if max_tokens == 0 {
			return Truncated { text: "", truncated: true };
		}

		let boundaries: Vec<usize> = text
			.grapheme_indices(true)
			.map(|(idx, grapheme)| idx + grapheme.len())
			.collect();
		// Largest grapheme end offset whose prefix still fits.
		let (mut lo, mut hi) = (0_usize, boundaries.len());

		while lo < hi {
			let mid = (lo + hi).div_ceil(2);

			if self.count(&text[..boundaries[mid - 1]]) <= max_tokens {
				lo = mid;
			} else {
				hi = mid - 1;
			}
		}

		let end = if lo == 0 { 0 } else { boundaries[lo - 1] };

		Truncated { text: &text[..end], truncated: true }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated<'a> {
	pub text: &'a str,
	pub truncated: bool,
}

pub fn estimate_tokens(text: &str, chars_per_token: f32) -> usize {
	let chars = text.chars().count();

	if chars == 0 {
		return 0;
	}

	((chars as f32) / chars_per_token).ceil().max(1.0) as usize
}
