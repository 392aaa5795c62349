use murmur_domain::settings::EmbeddingSettingsPatch;
use murmur_storage::embeddings;

use super::{
	KeywordEmbedding, RecordingCompletion, add_member, create_channel_avatar, create_chat,
	seed_channel_messages, seed_workspace, setup,
};

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn initialize_walks_history_limit_and_batches_drain_it() {
	let Some(env) = setup(
		"initialize_walks_history_limit_and_batches_drain_it",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let contents: Vec<String> = (0..25).map(|idx| format!("support message {idx}")).collect();

	seed_channel_messages(&env.service, &workspace, &contents).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let first = env
		.service
		.initialize(workspace.owner_id, chat_id)
		.await
		.expect("Failed to initialize.");

	assert!(first.success);
	assert_eq!(first.count, 20);
	assert_eq!(first.created, 20);

	let report =
		env.service.process_pending_batch(Some(10)).await.expect("Failed to process batch.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert_eq!((report.processed, report.successful, report.failed), (10, 10, 0));
	assert_eq!(counts.computed, 10);
	assert_eq!(counts.pending, 10);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn initialize_twice_creates_nothing_new() {
	let Some(env) = setup(
		"initialize_twice_creates_nothing_new",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let contents: Vec<String> = (0..12).map(|idx| format!("deploy note {idx}")).collect();

	seed_channel_messages(&env.service, &workspace, &contents).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let first = env
		.service
		.initialize(workspace.owner_id, chat_id)
		.await
		.expect("Failed to initialize.");
	let second = env
		.service
		.initialize(workspace.owner_id, chat_id)
		.await
		.expect("Failed to initialize.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert_eq!(first.count, second.count);
	assert_eq!(first.created, 12);
	assert_eq!(second.created, 0);
	assert_eq!(counts.pending, 12);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn initialize_denies_non_members_before_writing() {
	let Some(env) = setup(
		"initialize_denies_non_members_before_writing",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;

	seed_channel_messages(&env.service, &workspace, &["refund question".to_string()]).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let err = env
		.service
		.initialize(uuid::Uuid::new_v4(), chat_id)
		.await
		.expect_err("Expected membership failure.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert!(matches!(err, murmur_service::Error::MembershipDenied { .. }));
	assert_eq!(counts, Default::default());

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn initialize_hides_other_users_chats() {
	let Some(env) = setup(
		"initialize_hides_other_users_chats",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let colleague = uuid::Uuid::new_v4();

	add_member(&env.service, &workspace, colleague, "bo").await;
	seed_channel_messages(&env.service, &workspace, &["refund question".to_string()]).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;
	let err = env
		.service
		.initialize(colleague, chat_id)
		.await
		.expect_err("Expected the chat to stay private.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert!(matches!(err, murmur_service::Error::ChatNotFound { .. }));
	assert_eq!(counts, Default::default());

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn one_poisoned_item_does_not_fail_the_batch() {
	let Some(env) = setup(
		"one_poisoned_item_does_not_fail_the_batch",
		KeywordEmbedding { poison: Some("POISON".to_string()), ..Default::default() },
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let contents =
		vec!["refund one".to_string(), "POISON payload".to_string(), "refund two".to_string()];

	seed_channel_messages(&env.service, &workspace, &contents).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service.initialize(workspace.owner_id, chat_id).await.expect("Failed to initialize.");

	let report =
		env.service.process_pending_batch(Some(10)).await.expect("Failed to process batch.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert_eq!((report.processed, report.successful, report.failed), (3, 2, 1));
	assert_eq!(counts.computed, 2);
	// The failed item waits out its backoff as pending.
	assert_eq!(counts.pending, 1);
	// One batched call plus one call per item.
	assert_eq!(env.embedding.calls(), 4);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn non_finite_vector_fails_only_its_item() {
	let Some(env) = setup(
		"non_finite_vector_fails_only_its_item",
		KeywordEmbedding { overflow: Some("OVERFLOW".to_string()), ..Default::default() },
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let contents =
		vec!["OVERFLOW payload".to_string(), "refund one".to_string(), "refund two".to_string()];

	seed_channel_messages(&env.service, &workspace, &contents).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service.initialize(workspace.owner_id, chat_id).await.expect("Failed to initialize.");

	let report =
		env.service.process_pending_batch(Some(10)).await.expect("Failed to process batch.");
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert_eq!((report.processed, report.successful, report.failed), (3, 2, 1));
	assert_eq!(counts.computed, 2);
	assert_eq!(counts.pending, 1);
	assert_eq!(counts.processing, 0);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}
