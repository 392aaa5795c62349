use serde::{Deserialize, Serialize};

pub const MAX_RECENT_MESSAGES_COUNT: u32 = 50;
pub const MAX_CONTEXT_MESSAGES: u32 = 100;

/// Retrieval policy of one avatar, stored as JSON on the avatar config row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettings {
	pub recent_messages_count: u32,
	pub similarity_threshold: f32,
	pub max_context_messages: u32,
	pub include_recent_messages: bool,
}
impl EmbeddingSettings {
	pub fn from_defaults(cfg: &SettingsDefaults) -> Self {
		Self {
			recent_messages_count: cfg.recent_messages_count,
			similarity_threshold: cfg.similarity_threshold,
			max_context_messages: cfg.max_context_messages,
			include_recent_messages: cfg.include_recent_messages,
		}
	}

	/// Fills unset fields from `self` and validates the result.
	pub fn merged(&self, patch: &EmbeddingSettingsPatch) -> Result<Self, SettingsError> {
		let merged = Self {
			recent_messages_count: patch
				.recent_messages_count
				.unwrap_or(self.recent_messages_count),
			similarity_threshold: patch.similarity_threshold.unwrap_or(self.similarity_threshold),
			max_context_messages: patch.max_context_messages.unwrap_or(self.max_context_messages),
			include_recent_messages: patch
				.include_recent_messages
				.unwrap_or(self.include_recent_messages),
		};

		merged.validate()?;

		Ok(merged)
	}

	pub fn validate(&self) -> Result<(), SettingsError> {
		if !self.similarity_threshold.is_finite()
			|| !(0.0..=1.0).contains(&self.similarity_threshold)
		{
			return Err(SettingsError::new(
				"embedding_settings.similarity_threshold must be in the range 0.0-1.0.",
			));
		}
		if self.max_context_messages == 0 || self.max_context_messages > MAX_CONTEXT_MESSAGES {
			return Err(SettingsError::new(format!(
				"embedding_settings.max_context_messages must be between 1 and {MAX_CONTEXT_MESSAGES}."
			)));
		}
		if self.recent_messages_count > MAX_RECENT_MESSAGES_COUNT {
			return Err(SettingsError::new(format!(
				"embedding_settings.recent_messages_count must be at most {MAX_RECENT_MESSAGES_COUNT}."
			)));
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingSettingsPatch {
	pub recent_messages_count: Option<u32>,
	pub similarity_threshold: Option<f32>,
	pub max_context_messages: Option<u32>,
	pub include_recent_messages: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SettingsDefaults {
	pub recent_messages_count: u32,
	pub similarity_threshold: f32,
	pub max_context_messages: u32,
	pub include_recent_messages: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct HistoryLimitBounds {
	pub min: u32,
	pub default: u32,
	pub max: u32,
}
impl HistoryLimitBounds {
	pub fn clamp(&self, requested: Option<u32>) -> u32 {
		requested.unwrap_or(self.default).clamp(self.min, self.max)
	}
}

pub fn validate_temperature(temperature: f32) -> Result<(), SettingsError> {
	if !temperature.is_finite() || !(0.0..=2.0).contains(&temperature) {
		return Err(SettingsError::new("temperature must be in the range 0.0-2.0."));
	}

	Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SettingsError {
	pub message: String,
}
impl SettingsError {
	fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}
