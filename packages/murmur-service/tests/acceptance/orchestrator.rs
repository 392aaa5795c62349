use uuid::Uuid;

use murmur_domain::{prompt::Role, settings::EmbeddingSettingsPatch};
use murmur_service::{ChatRequest, Error};
use murmur_storage::avatars;

use super::{
	Env, KeywordEmbedding, RecordingCompletion, Workspace, add_member, create_channel_avatar,
	create_chat, seed_channel_messages, seed_workspace, setup,
};

async fn seed_indexed_avatar(env: &Env) -> (Workspace, murmur_service::AvatarConfigView) {
	let workspace = seed_workspace(&env.service).await;

	seed_channel_messages(
		&env.service,
		&workspace,
		&["refund takes 5 days".to_string(), "lunch is at noon".to_string()],
	)
	.await;

	let config = create_channel_avatar(
		&env.service,
		&workspace,
		EmbeddingSettingsPatch {
			similarity_threshold: Some(0.5),
			include_recent_messages: Some(false),
			..Default::default()
		},
	)
	.await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service.initialize(workspace.owner_id, chat_id).await.expect("Failed to initialize.");
	env.service.process_pending_batch(None).await.expect("Failed to process batch.");

	(workspace, config)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn respond_grounds_the_prompt_and_persists_the_exchange() {
	let Some(env) = setup(
		"respond_grounds_the_prompt_and_persists_the_exchange",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let (workspace, config) = seed_indexed_avatar(&env).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let response = env
		.service
		.respond(
			workspace.owner_id,
			ChatRequest {
				message: "When does my refund arrive?".to_string(),
				workspace_id: workspace.workspace_id,
				avatar_config_id: config.config_id,
				chat_id: Some(chat_id),
			},
		)
		.await
		.expect("Failed to respond.");
	let prompt = env.completion.last_prompt();
	let roles: Vec<Role> = prompt.iter().map(|message| message.role).collect();

	assert_eq!(response.chat_id, chat_id);
	assert_eq!(response.context_items, 1);
	assert_eq!(roles, vec![Role::System, Role::System, Role::User]);
	assert_eq!(prompt[0].content, "Answer support questions.");
	assert!(prompt[1].content.contains("refund takes 5 days"));
	assert!(!prompt[1].content.contains("lunch"));
	assert_eq!(prompt[2].content, "When does my refund arrive?");

	let messages = env
		.service
		.list_chat_messages(workspace.owner_id, chat_id, None)
		.await
		.expect("Failed to list chat messages.");

	assert_eq!(messages.len(), 1);
	assert_eq!(messages[0].message_id, response.message_id);
	assert_eq!(messages[0].query, "When does my refund arrive?");
	assert_eq!(messages[0].response, "Answer to: When does my refund arrive?");

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn respond_without_chat_id_continues_the_latest_chat() {
	let Some(env) = setup(
		"respond_without_chat_id_continues_the_latest_chat",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let (workspace, config) = seed_indexed_avatar(&env).await;
	let request = |message: &str| ChatRequest {
		message: message.to_string(),
		workspace_id: workspace.workspace_id,
		avatar_config_id: config.config_id,
		chat_id: None,
	};
	let first = env
		.service
		.respond(workspace.owner_id, request("first question"))
		.await
		.expect("Failed to respond.");
	let second = env
		.service
		.respond(workspace.owner_id, request("second question"))
		.await
		.expect("Failed to respond.");
	let messages = env
		.service
		.list_chat_messages(workspace.owner_id, first.chat_id, None)
		.await
		.expect("Failed to list chat messages.");
	let queries: Vec<&str> = messages.iter().map(|message| message.query.as_str()).collect();

	assert_eq!(first.chat_id, second.chat_id);
	assert_eq!(queries, vec!["first question", "second question"]);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn concurrent_first_turns_share_one_chat() {
	let Some(env) = setup(
		"concurrent_first_turns_share_one_chat",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let request = |message: &str| ChatRequest {
		message: message.to_string(),
		workspace_id: workspace.workspace_id,
		avatar_config_id: config.config_id,
		chat_id: None,
	};
	let (first, second) = tokio::join!(
		env.service.respond(workspace.owner_id, request("refund status?")),
		env.service.respond(workspace.owner_id, request("lunch plans?")),
	);
	let first = first.expect("Failed to respond.");
	let second = second.expect("Failed to respond.");
	let chats: i64 = sqlx::query_scalar(
		"SELECT COUNT(*) FROM avatar_chats WHERE config_id = $1 AND created_by_user_id = $2",
	)
	.bind(config.config_id)
	.bind(workspace.owner_id)
	.fetch_one(&env.service.db.pool)
	.await
	.expect("Failed to count chats.");
	let messages = env
		.service
		.list_chat_messages(workspace.owner_id, first.chat_id, None)
		.await
		.expect("Failed to list chat messages.");

	assert_eq!(first.chat_id, second.chat_id);
	assert_eq!(chats, 1);
	assert_eq!(messages.len(), 2);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn failed_completion_writes_nothing() {
	let Some(env) = setup(
		"failed_completion_writes_nothing",
		KeywordEmbedding::default(),
		RecordingCompletion { fail: true, ..Default::default() },
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let err = env
		.service
		.respond(
			workspace.owner_id,
			ChatRequest {
				message: "Anyone there?".to_string(),
				workspace_id: workspace.workspace_id,
				avatar_config_id: config.config_id,
				chat_id: None,
			},
		)
		.await
		.expect_err("Expected completion failure.");
	let latest = avatars::latest_chat(&env.service.db.pool, config.config_id, workspace.owner_id)
		.await
		.expect("Failed to load latest chat.");

	assert!(matches!(err, Error::Provider { .. }));
	assert!(latest.is_none());

	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service
		.respond(
			workspace.owner_id,
			ChatRequest {
				message: "Still there?".to_string(),
				workspace_id: workspace.workspace_id,
				avatar_config_id: config.config_id,
				chat_id: Some(chat_id),
			},
		)
		.await
		.expect_err("Expected completion failure.");

	let messages = env
		.service
		.list_chat_messages(workspace.owner_id, chat_id, None)
		.await
		.expect("Failed to list chat messages.");

	assert!(messages.is_empty());

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn respond_checks_membership_and_config_workspace() {
	let Some(env) = setup(
		"respond_checks_membership_and_config_workspace",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let home = seed_workspace(&env.service).await;
	let other = seed_workspace(&env.service).await;
	let config =
		create_channel_avatar(&env.service, &home, EmbeddingSettingsPatch::default()).await;
	let outsider = Uuid::new_v4();

	add_member(&env.service, &other, outsider, "eve").await;
	sqlx::query("INSERT INTO workspace_members (workspace_id, user_id) VALUES ($1, $2)")
		.bind(other.workspace_id)
		.bind(home.owner_id)
		.execute(&env.service.db.pool)
		.await
		.expect("Failed to insert member.");

	let request = |workspace_id| ChatRequest {
		message: "hello".to_string(),
		workspace_id,
		avatar_config_id: config.config_id,
		chat_id: None,
	};
	let denied = env
		.service
		.respond(outsider, request(home.workspace_id))
		.await
		.expect_err("Expected membership failure.");
	let misplaced = env
		.service
		.respond(home.owner_id, request(other.workspace_id))
		.await
		.expect_err("Expected missing config.");

	assert!(matches!(denied, Error::MembershipDenied { .. }));
	assert!(matches!(misplaced, Error::ConfigNotFound { config_id } if config_id == config.config_id));
	assert!(env.completion.prompts.lock().expect("Lock poisoned.").is_empty());

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn chats_are_private_to_their_creator() {
	let Some(env) = setup(
		"chats_are_private_to_their_creator",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let colleague = Uuid::new_v4();

	add_member(&env.service, &workspace, colleague, "bo").await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let err = env
		.service
		.list_chat_messages(colleague, chat_id, None)
		.await
		.expect_err("Expected hidden chat.");

	assert!(matches!(err, Error::ChatNotFound { .. }));
	assert!(env.service.delete_chat(workspace.owner_id, chat_id).await.expect("Failed to delete."));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}
