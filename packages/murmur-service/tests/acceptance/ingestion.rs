use uuid::Uuid;

use murmur_domain::{
	settings::{EmbeddingSettings, EmbeddingSettingsPatch},
	source::EmbeddingSourceRef,
};
use murmur_service::{Error, IngestEvent, IngestRequest};
use murmur_storage::{avatars, embeddings};

use super::{
	KeywordEmbedding, RecordingCompletion, create_channel_avatar, seed_channel_messages,
	seed_workspace, setup,
};

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn created_event_enqueues_once_per_avatar() {
	let Some(env) = setup(
		"created_event_enqueues_once_per_avatar",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let first_avatar =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let second_avatar =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let ids =
		seed_channel_messages(&env.service, &workspace, &["refund is late".to_string()]).await;
	let req =
		IngestRequest { source: EmbeddingSourceRef::Channel(ids[0]), event: IngestEvent::Created };
	let first = env.service.ingest(workspace.owner_id, req.clone()).await.expect("Failed to ingest.");
	let second = env.service.ingest(workspace.owner_id, req).await.expect("Failed to ingest.");

	assert_eq!((first.avatars, first.enqueued, first.unchanged), (2, 2, 0));
	assert_eq!((second.avatars, second.enqueued, second.unchanged), (2, 0, 2));
	assert!(first.error.is_none());

	for config in [&first_avatar, &second_avatar] {
		let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
			.await
			.expect("Failed to count records.");

		assert_eq!(counts.pending, 1);
	}

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn edits_repend_only_when_content_changes() {
	let Some(env) = setup(
		"edits_repend_only_when_content_changes",
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
	let ids = seed_channel_messages(&env.service, &workspace, &["lunch at noon".to_string()]).await;
	let source = EmbeddingSourceRef::Channel(ids[0]);

	env.service
		.ingest(workspace.owner_id, IngestRequest { source, event: IngestEvent::Created })
		.await
		.expect("Failed to ingest.");
	env.service.process_pending_batch(None).await.expect("Failed to process batch.");

	let untouched = env
		.service
		.ingest(workspace.owner_id, IngestRequest { source, event: IngestEvent::Edited })
		.await
		.expect("Failed to ingest.");

	assert_eq!((untouched.repended, untouched.unchanged), (0, 1));

	sqlx::query("UPDATE channel_messages SET content = $1, updated_at = now() WHERE message_id = $2")
		.bind("lunch moved to one")
		.bind(ids[0])
		.execute(&env.service.db.pool)
		.await
		.expect("Failed to edit message.");

	let edited = env
		.service
		.ingest(workspace.owner_id, IngestRequest { source, event: IngestEvent::Edited })
		.await
		.expect("Failed to ingest.");
	let record = embeddings::get_for_source(
		&env.service.db,
		source.source_type().as_str(),
		source.id(),
		config.config_id,
	)
	.await
	.expect("Failed to load record.")
	.expect("Expected a record.");

	assert_eq!(edited.repended, 1);
	assert_eq!(record.status, "pending");
	assert_eq!(record.content, "lunch moved to one");
	assert_eq!(record.attempts, 0);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn blanking_a_message_removes_it_from_retrieval() {
	let Some(env) = setup(
		"blanking_a_message_removes_it_from_retrieval",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let view =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let ids =
		seed_channel_messages(&env.service, &workspace, &["refund code is 4411".to_string()]).await;
	let source = EmbeddingSourceRef::Channel(ids[0]);

	env.service
		.ingest(workspace.owner_id, IngestRequest { source, event: IngestEvent::Created })
		.await
		.expect("Failed to ingest.");
	env.service.process_pending_batch(None).await.expect("Failed to process batch.");

	let config = avatars::get_config(&env.service.db, view.config_id)
		.await
		.expect("Failed to load config.")
		.expect("Expected config.");
	let settings = EmbeddingSettings {
		recent_messages_count: 0,
		similarity_threshold: 0.0,
		max_context_messages: 5,
		include_recent_messages: false,
	};
	let before = env
		.service
		.retrieve("refund", workspace.workspace_id, &config, &settings)
		.await
		.expect("Failed to retrieve.");

	assert_eq!(before.len(), 1);

	sqlx::query("UPDATE channel_messages SET content = '  ', updated_at = now() WHERE message_id = $1")
		.bind(ids[0])
		.execute(&env.service.db.pool)
		.await
		.expect("Failed to edit message.");

	let report = env
		.service
		.ingest(workspace.owner_id, IngestRequest { source, event: IngestEvent::Edited })
		.await
		.expect("Failed to ingest.");
	let after = env
		.service
		.retrieve("refund", workspace.workspace_id, &config, &settings)
		.await
		.expect("Failed to retrieve.");
	let record = embeddings::get_for_source(
		&env.service.db,
		source.source_type().as_str(),
		source.id(),
		config.config_id,
	)
	.await
	.expect("Failed to load record.");

	assert_eq!(report.removed, 1);
	assert!(report.error.is_none());
	assert!(after.is_empty());
	assert!(record.is_none());

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn thread_replies_are_covered_by_channel_avatars() {
	let Some(env) = setup(
		"thread_replies_are_covered_by_channel_avatars",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;

	create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;

	let parents =
		seed_channel_messages(&env.service, &workspace, &["deploy tonight?".to_string()]).await;
	let reply_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO thread_messages (message_id, parent_message_id, channel_id, user_id, content)
VALUES ($1, $2, $3, $4, 'deploy after nine')",
	)
	.bind(reply_id)
	.bind(parents[0])
	.bind(workspace.channel_id)
	.bind(workspace.owner_id)
	.execute(&env.service.db.pool)
	.await
	.expect("Failed to insert thread reply.");

	let report = env
		.service
		.ingest(
			workspace.owner_id,
			IngestRequest { source: EmbeddingSourceRef::Thread(reply_id), event: IngestEvent::Created },
		)
		.await
		.expect("Failed to ingest.");

	assert_eq!((report.avatars, report.enqueued), (1, 1));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn caller_mistakes_are_reported() {
	let Some(env) = setup(
		"caller_mistakes_are_reported",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let ids = seed_channel_messages(&env.service, &workspace, &["hello".to_string()]).await;
	let missing = env
		.service
		.ingest(
			workspace.owner_id,
			IngestRequest {
				source: EmbeddingSourceRef::Channel(Uuid::new_v4()),
				event: IngestEvent::Created,
			},
		)
		.await
		.expect_err("Expected missing source.");
	let outsider = env
		.service
		.ingest(
			Uuid::new_v4(),
			IngestRequest { source: EmbeddingSourceRef::Channel(ids[0]), event: IngestEvent::Created },
		)
		.await
		.expect_err("Expected membership failure.");

	assert!(matches!(missing, Error::SourceNotFound { .. }));
	assert!(matches!(outsider, Error::MembershipDenied { .. }));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}
