use std::sync::LazyLock;

use regex::Regex;
use time::Duration;

pub const MAX_ERROR_CHARS: usize = 1_024;

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
	pub base_ms: i64,
	pub max_ms: i64,
}
impl Backoff {
	/// Exponential delay for the given 1-based attempt, capped at `max_ms`.
	pub fn for_attempt(&self, attempt: i32) -> Duration {
		let exp = (attempt.max(1) as u32).saturating_sub(1).min(16);
		let delay = self.base_ms.saturating_mul(1_i64 << exp).min(self.max_ms);

		Duration::milliseconds(delay)
	}
}

/// Redacts credentials and caps length so provider errors can be stored and logged.
pub fn sanitize_error(text: &str) -> String {
	let mut out = text.to_string();

	for (pattern, replacement) in REDACTIONS.iter() {
		out = pattern.replace_all(&out, *replacement).into_owned();
	}

	if out.chars().count() > MAX_ERROR_CHARS {
		out = out.chars().take(MAX_ERROR_CHARS).collect();

		out.push_str("...");
	}

	out
}

static REDACTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
	[
		(r"(?i)(bearer\s+)[A-Za-z0-9._~+/=-]+", "${1}[REDACTED]"),
		(
			r#"(?i)("(?:api[_-]?key|access[_-]?token|token|secret|password)"\s*:\s*")[^"]*(")"#,
			"${1}[REDACTED]${2}",
		),
		(
			r#"(?i)\b((?:api[_-]?key|key|access[_-]?token|token|secret|password)\s*[=:]\s*)[^\s&,;"'}]+"#,
			"${1}[REDACTED]",
		),
	]
	.into_iter()
	.filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
	.collect()
});
