//! Caller identity.
//!
//! The upstream auth gateway asserts the user in [`USER_ID_HEADER`]. When
//! `security.api_auth_token` is set, callers must also present it as a bearer token.

use axum::{
	extract::FromRequestParts,
	http::{StatusCode, header, request::Parts},
};
use uuid::Uuid;

use crate::{
	routes::{ApiError, json_error},
	state::AppState,
};

pub const USER_ID_HEADER: &str = "x-murmur-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub Uuid);
impl FromRequestParts<AppState> for Actor {
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		if let Some(expected) = state.service.cfg.security.api_auth_token.as_deref() {
			let presented = parts
				.headers
				.get(header::AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.strip_prefix("Bearer "));

			if presented != Some(expected) {
				return Err(unauthenticated("Missing or invalid bearer token."));
			}
		}

		let raw = parts
			.headers
			.get(USER_ID_HEADER)
			.ok_or_else(|| unauthenticated(format!("Missing {USER_ID_HEADER} header.")))?;
		let user_id = raw
			.to_str()
			.ok()
			.and_then(|value| Uuid::parse_str(value.trim()).ok())
			.ok_or_else(|| unauthenticated(format!("{USER_ID_HEADER} must be a UUID.")))?;

		Ok(Self(user_id))
	}
}

fn unauthenticated(message: impl Into<String>) -> ApiError {
	json_error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message, None)
}
