use axum::{
	Json, Router,
	body::Bytes,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, PathRejection, QueryRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, patch, post},
};
use serde::Serialize;
use uuid::Uuid;

use murmur_service::Error as ServiceError;

use crate::{
	auth::Actor,
	payload::{
		BatchReply, ChatBody, ChatReply, ChatView, ConfigReply, CreateChatBody, CreateConfigBody,
		DeletedReply, EmbeddingsBody, IngestBody, IngestReply, InitializeBody, InitializeReply,
		MessagesQuery, MessagesReply, SearchQuery, SearchReply, UpdateConfigBody,
	},
	state::AppState,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/avatars/chat", post(avatar_chat))
		.route("/avatars/initialize", post(initialize))
		.route("/avatars/configs", post(create_config))
		.route("/avatars/configs/{config_id}", patch(update_config).delete(delete_config))
		.route("/avatars/chats", post(create_chat))
		.route("/avatars/chats/{chat_id}", delete(delete_chat))
		.route("/avatars/chats/{chat_id}/messages", get(list_chat_messages))
		.route("/embeddings", post(process_embeddings))
		.route("/search", get(search))
		.route("/ingest/messages", post(ingest_message))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn avatar_chat(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	payload: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
	let Json(payload) = payload.map_err(bad_json)?;
	let response = state.service.respond(actor_id, payload.into()).await?;

	Ok(Json(response.into()))
}

async fn initialize(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	payload: Result<Json<InitializeBody>, JsonRejection>,
) -> Result<Json<InitializeReply>, ApiError> {
	let Json(payload) = payload.map_err(bad_json)?;
	let response = state.service.initialize(actor_id, payload.chat_id).await?;

	Ok(Json(response.into()))
}

/// Triggers one Batch Processor run. The body is optional.
async fn process_embeddings(
	State(state): State<AppState>,
	Actor(_): Actor,
	body: Bytes,
) -> Result<Json<BatchReply>, ApiError> {
	let payload: EmbeddingsBody = if body.iter().all(u8::is_ascii_whitespace) {
		EmbeddingsBody::default()
	} else {
		serde_json::from_slice(&body).map_err(|err| invalid(format!("Invalid JSON body: {err}.")))?
	};
	let report = state.service.process_pending_batch(payload.batch_size).await?;

	Ok(Json(report.into()))
}

async fn search(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchReply>, ApiError> {
	let Query(query) = query.map_err(|err| invalid(err.body_text()))?;
	let response = state.service.search(actor_id, query.into()).await?;

	Ok(Json(SearchReply { results: response.results.into_iter().map(Into::into).collect() }))
}

async fn create_config(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	payload: Result<Json<CreateConfigBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ConfigReply>), ApiError> {
	let Json(payload) = payload.map_err(bad_json)?;
	let view = state.service.create_config(actor_id, payload.into()).await?;

	Ok((StatusCode::CREATED, Json(view.into())))
}

async fn update_config(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	config_id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<UpdateConfigBody>, JsonRejection>,
) -> Result<Json<ConfigReply>, ApiError> {
	let Path(config_id) = config_id.map_err(bad_path)?;
	let Json(payload) = payload.map_err(bad_json)?;
	let view = state.service.update_config(actor_id, config_id, payload.into()).await?;

	Ok(Json(view.into()))
}

async fn delete_config(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	config_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeletedReply>, ApiError> {
	let Path(config_id) = config_id.map_err(bad_path)?;
	let deleted = state.service.delete_config(actor_id, config_id).await?;

	Ok(Json(DeletedReply { deleted }))
}

async fn create_chat(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	payload: Result<Json<CreateChatBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ChatView>), ApiError> {
	let Json(payload) = payload.map_err(bad_json)?;
	let view = state.service.create_chat(actor_id, payload.into()).await?;

	Ok((StatusCode::CREATED, Json(view.into())))
}

async fn list_chat_messages(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	chat_id: Result<Path<Uuid>, PathRejection>,
	query: Result<Query<MessagesQuery>, QueryRejection>,
) -> Result<Json<MessagesReply>, ApiError> {
	let Path(chat_id) = chat_id.map_err(bad_path)?;
	let Query(query) = query.map_err(|err| invalid(err.body_text()))?;
	let messages = state.service.list_chat_messages(actor_id, chat_id, query.limit).await?;

	Ok(Json(MessagesReply { messages: messages.into_iter().map(Into::into).collect() }))
}

async fn delete_chat(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	chat_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeletedReply>, ApiError> {
	let Path(chat_id) = chat_id.map_err(bad_path)?;
	let deleted = state.service.delete_chat(actor_id, chat_id).await?;

	Ok(Json(DeletedReply { deleted }))
}

/// Hook for the chat application after it stores or edits a message.
async fn ingest_message(
	State(state): State<AppState>,
	Actor(actor_id): Actor,
	payload: Result<Json<IngestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestReply>), ApiError> {
	let Json(payload) = payload.map_err(bad_json)?;
	let report = state.service.ingest(actor_id, payload.into()).await?;

	Ok((StatusCode::ACCEPTED, Json(report.into())))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::MembershipDenied { message } =>
				json_error(StatusCode::FORBIDDEN, "MEMBERSHIP_DENIED", message, None),
			err @ ServiceError::ConfigNotFound { .. } =>
				json_error(StatusCode::NOT_FOUND, "CONFIG_NOT_FOUND", err.to_string(), None),
			err @ ServiceError::ChatNotFound { .. } =>
				json_error(StatusCode::NOT_FOUND, "CHAT_NOT_FOUND", err.to_string(), None),
			ServiceError::SourceNotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "SOURCE_NOT_FOUND", message, None),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Model provider request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"PROVIDER_ERROR",
					"The model provider request failed.",
					None,
				)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"The storage request failed.",
					None,
				)
			},
			ServiceError::Persistence { message } => {
				tracing::error!(error = %message, "Avatar response was generated but not stored.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"PERSISTENCE_ERROR",
					"The response could not be saved. Please retry.",
					None,
				)
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

fn invalid(message: impl Into<String>) -> ApiError {
	json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None)
}

fn bad_json(err: JsonRejection) -> ApiError {
	invalid(err.body_text())
}

fn bad_path(err: PathRejection) -> ApiError {
	invalid(err.body_text())
}
