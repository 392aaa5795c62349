pub mod prompt;
pub mod retrieval;
pub mod retry;
pub mod settings;
pub mod source;
pub mod time_serde;

pub fn content_hash(text: &str) -> String {
	blake3::hash(text.as_bytes()).to_hex().to_string()
}
