//! Prompt assembly under a token budget.

use serde::{Deserialize, Serialize};

use murmur_tokens::TokenCounter;

use crate::retrieval::SearchResult;

/// Fixed per-message cost of the chat format (role marker and separators).
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;
pub const CONTEXT_HEADER: &str =
	"Relevant conversation context (most relevant first). Use it when it helps answer:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
	pub messages: Vec<ChatMessage>,
	pub token_count: usize,
	/// Context items left out to stay within budget.
	pub dropped_context: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
	#[error(
		"System prompt and message need {required} tokens but the avatar context budget is {budget}."
	)]
	MessageExceedsBudget { required: usize, budget: usize },
}

pub fn render_context_line(item: &SearchResult) -> String {
	format!("{}: {}", item.speaker, item.content)
}

/// Builds `[system prompt, context block, user message]` within `max_tokens`.
///
/// Context items keep the retriever's order. When the block does not fit, items are removed
/// lowest similarity first (later position first among equal scores) until it does. The user's
/// message is never shortened; if it cannot fit next to the system prompt the call fails.
pub fn compose(
	system_prompt: &str,
	context: &[SearchResult],
	user_message: &str,
	max_tokens: usize,
	counter: &TokenCounter,
) -> Result<ComposedPrompt, PromptError> {
	let system_prompt = system_prompt.trim();
	let system_cost = if system_prompt.is_empty() {
		0
	} else {
		counter.count(system_prompt) + MESSAGE_OVERHEAD_TOKENS
	};
	let fixed = system_cost + counter.count(user_message) + MESSAGE_OVERHEAD_TOKENS;

	if fixed > max_tokens {
		return Err(PromptError::MessageExceedsBudget { required: fixed, budget: max_tokens });
	}

	let mut kept: Vec<bool> = vec![true; context.len()];
	// Removal order: ascending score, later position first on ties.
	let mut removal: Vec<usize> = (0..context.len()).collect();

	removal.sort_by(|&a, &b| {
		context[a]
			.similarity_score
			.partial_cmp(&context[b].similarity_score)
			.unwrap_or(std::cmp::Ordering::Equal)
			.then_with(|| b.cmp(&a))
	});

	let mut removal = removal.into_iter();
	let mut block = render_context_block(context, &kept);
	let mut block_cost = context_block_cost(block.as_deref(), counter);

	while fixed + block_cost > max_tokens {
		let Some(idx) = removal.next() else {
			break;
		};

		kept[idx] = false;
		block = render_context_block(context, &kept);
		block_cost = context_block_cost(block.as_deref(), counter);
	}

	let mut messages = Vec::with_capacity(3);

	if !system_prompt.is_empty() {
		messages.push(ChatMessage::system(system_prompt));
	}
	if let Some(block) = block {
		messages.push(ChatMessage::system(block));
	}

	messages.push(ChatMessage::user(user_message));

	Ok(ComposedPrompt {
		messages,
		token_count: fixed + block_cost,
		dropped_context: kept.iter().filter(|keep| !**keep).count(),
	})
}

fn render_context_block(context: &[SearchResult], kept: &[bool]) -> Option<String> {
	let lines: Vec<String> = context
		.iter()
		.zip(kept)
		.filter(|(_, keep)| **keep)
		.map(|(item, _)| render_context_line(item))
		.collect();

	if lines.is_empty() {
		return None;
	}

	Some(format!("{CONTEXT_HEADER}\n{}", lines.join("\n")))
}

fn context_block_cost(block: Option<&str>, counter: &TokenCounter) -> usize {
	block.map(|block| counter.count(block) + MESSAGE_OVERHEAD_TOKENS).unwrap_or(0)
}
