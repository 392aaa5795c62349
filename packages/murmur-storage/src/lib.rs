pub mod avatars;
pub mod db;
pub mod embeddings;
pub mod membership;
pub mod models;
pub mod schema;
pub mod sources;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Renders a vector as a pgvector text literal for `$n::text::vector` binds.
pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8 + 2);

	out.push('[');

	for (idx, value) in vec.iter().enumerate() {
		if idx > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn formats_vectors_as_pgvector_literals() {
		assert_eq!(format_vector_text(&[0.5, -1.0, 2.25]), "[0.5,-1,2.25]");
		assert_eq!(format_vector_text(&[]), "[]");
	}
}
