use ahash::AHashSet;
use uuid::Uuid;

use murmur_domain::{
	retrieval::ResultOrigin,
	settings::{EmbeddingSettings, EmbeddingSettingsPatch},
};
use murmur_service::{Error, SearchRequest};
use murmur_storage::avatars;

use super::{
	Env, KeywordEmbedding, RecordingCompletion, Workspace, create_channel_avatar, create_chat,
	seed_channel_messages, seed_workspace, setup,
};

struct Indexed {
	workspace: Workspace,
	config_id: Uuid,
	message_ids: Vec<Uuid>,
}

async fn index_workspace(env: &Env, contents: &[String]) -> Indexed {
	let workspace = seed_workspace(&env.service).await;
	let message_ids = seed_channel_messages(&env.service, &workspace, contents).await;
	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service.initialize(workspace.owner_id, chat_id).await.expect("Failed to initialize.");

	Indexed { workspace, config_id: config.config_id, message_ids }
}

async fn two_workspaces(env: &Env) -> (Indexed, Indexed) {
	let home = index_workspace(
		env,
		&[
			"refund requested".to_string(),
			"refund approved".to_string(),
			"refund sent".to_string(),
			"lunch order".to_string(),
			"deploy done".to_string(),
		],
	)
	.await;
	let foreign_contents: Vec<String> = (0..5).map(|idx| format!("refund batch {idx}")).collect();
	let foreign = index_workspace(env, &foreign_contents).await;

	loop {
		let report =
			env.service.process_pending_batch(None).await.expect("Failed to process batch.");

		if report.processed == 0 {
			break;
		}
	}

	(home, foreign)
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn search_never_crosses_workspaces() {
	let Some(env) = setup(
		"search_never_crosses_workspaces",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let (home, foreign) = two_workspaces(&env).await;
	let response = env
		.service
		.search(
			home.workspace.owner_id,
			SearchRequest {
				query: "refund".to_string(),
				workspace_id: home.workspace.workspace_id,
				limit: Some(10),
			},
		)
		.await
		.expect("Failed to search.");
	let home_ids: AHashSet<Uuid> = home.message_ids.iter().copied().collect();
	let foreign_ids: AHashSet<Uuid> = foreign.message_ids.iter().copied().collect();

	assert_eq!(response.results.len(), 5);
	assert!(response.results.iter().all(|item| home_ids.contains(&item.source.id())));
	assert!(response.results.iter().all(|item| !foreign_ids.contains(&item.source.id())));
	assert!(
		response
			.results
			.windows(2)
			.all(|pair| pair[0].similarity_score >= pair[1].similarity_score)
	);
	assert!(response.results[..3].iter().all(|item| item.content.starts_with("refund")));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn search_rejects_outsiders_and_blank_queries() {
	let Some(env) = setup(
		"search_rejects_outsiders_and_blank_queries",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let (home, foreign) = two_workspaces(&env).await;
	let outsider = env
		.service
		.search(
			foreign.workspace.owner_id,
			SearchRequest {
				query: "refund".to_string(),
				workspace_id: home.workspace.workspace_id,
				limit: None,
			},
		)
		.await
		.expect_err("Expected membership failure.");
	let blank = env
		.service
		.search(
			home.workspace.owner_id,
			SearchRequest {
				query: "   ".to_string(),
				workspace_id: home.workspace.workspace_id,
				limit: None,
			},
		)
		.await
		.expect_err("Expected invalid request.");

	assert!(matches!(outsider, Error::MembershipDenied { .. }));
	assert!(matches!(blank, Error::InvalidRequest { .. }));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn retrieve_honours_threshold_and_context_budget() {
	let Some(env) = setup(
		"retrieve_honours_threshold_and_context_budget",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let (home, foreign) = two_workspaces(&env).await;
	let config = avatars::get_config(&env.service.db, home.config_id)
		.await
		.expect("Failed to load config.")
		.expect("Expected config.");
	let settings = |threshold| EmbeddingSettings {
		recent_messages_count: 0,
		similarity_threshold: threshold,
		max_context_messages: 3,
		include_recent_messages: false,
	};
	// Matches no stored message exactly, so no score reaches 1.0.
	let query = "refund for the lunch";
	let strict = env
		.service
		.retrieve(query, home.workspace.workspace_id, &config, &settings(1.0))
		.await
		.expect("Failed to retrieve.");
	let open = env
		.service
		.retrieve(query, home.workspace.workspace_id, &config, &settings(0.0))
		.await
		.expect("Failed to retrieve.");
	let home_ids: AHashSet<Uuid> = home.message_ids.iter().copied().collect();

	assert!(strict.is_empty());
	assert_eq!(open.len(), 3);
	assert!(open.iter().all(|item| item.origin == ResultOrigin::Similarity));
	assert!(open.iter().all(|item| home_ids.contains(&item.source.id())));
	assert!(open.windows(2).all(|pair| pair[0].similarity_score >= pair[1].similarity_score));

	let err = env
		.service
		.retrieve(query, foreign.workspace.workspace_id, &config, &settings(0.0))
		.await
		.expect_err("Expected scoping failure.");

	assert!(matches!(err, Error::ConfigNotFound { .. }));

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}
