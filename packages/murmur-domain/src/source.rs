use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The chat artifact an embedding record was computed from.
///
/// Persisted as a `(source_type, source_id)` column pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source_type", content = "source_id")]
pub enum EmbeddingSourceRef {
	#[serde(rename = "channel_message")]
	Channel(Uuid),
	#[serde(rename = "thread_message")]
	Thread(Uuid),
	#[serde(rename = "direct_message")]
	Direct(Uuid),
	#[serde(rename = "document")]
	Document(Uuid),
}
impl EmbeddingSourceRef {
	pub fn new(source_type: SourceType, id: Uuid) -> Self {
		match source_type {
			SourceType::ChannelMessage => Self::Channel(id),
			SourceType::ThreadMessage => Self::Thread(id),
			SourceType::DirectMessage => Self::Direct(id),
			SourceType::Document => Self::Document(id),
		}
	}

	pub fn source_type(&self) -> SourceType {
		match self {
			Self::Channel(_) => SourceType::ChannelMessage,
			Self::Thread(_) => SourceType::ThreadMessage,
			Self::Direct(_) => SourceType::DirectMessage,
			Self::Document(_) => SourceType::Document,
		}
	}

	pub fn id(&self) -> Uuid {
		match self {
			Self::Channel(id) | Self::Thread(id) | Self::Direct(id) | Self::Document(id) => *id,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	ChannelMessage,
	ThreadMessage,
	DirectMessage,
	Document,
}
impl SourceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ChannelMessage => "channel_message",
			Self::ThreadMessage => "thread_message",
			Self::DirectMessage => "direct_message",
			Self::Document => "document",
		}
	}
}
impl fmt::Display for SourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for SourceType {
	type Err = UnknownVariant;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"channel_message" => Ok(Self::ChannelMessage),
			"thread_message" => Ok(Self::ThreadMessage),
			"direct_message" => Ok(Self::DirectMessage),
			"document" => Ok(Self::Document),
			other => Err(UnknownVariant { kind: "source_type", value: other.to_string() }),
		}
	}
}

/// Where an avatar draws its conversational history from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarSourceType {
	Channel,
	User,
}
impl AvatarSourceType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Channel => "channel",
			Self::User => "user",
		}
	}
}
impl FromStr for AvatarSourceType {
	type Err = UnknownVariant;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"channel" => Ok(Self::Channel),
			"user" => Ok(Self::User),
			other => Err(UnknownVariant { kind: "avatar source_type", value: other.to_string() }),
		}
	}
}

/// Lifecycle of one embedding record.
///
/// `Pending` records wait for the batch processor, `Processing` records are leased to one run,
/// `Computed` records carry a vector, and `Failed` records exhausted their attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
	Pending,
	Processing,
	Computed,
	Failed,
}
impl EmbeddingStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Computed => "computed",
			Self::Failed => "failed",
		}
	}
}
impl FromStr for EmbeddingStatus {
	type Err = UnknownVariant;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw {
			"pending" => Ok(Self::Pending),
			"processing" => Ok(Self::Processing),
			"computed" => Ok(Self::Computed),
			"failed" => Ok(Self::Failed),
			other => Err(UnknownVariant { kind: "embedding status", value: other.to_string() }),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} {value:?}.")]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}
