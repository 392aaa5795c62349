use ahash::AHashSet;

use murmur_domain::settings::EmbeddingSettingsPatch;
use murmur_storage::embeddings;

use super::{
	KeywordEmbedding, RecordingCompletion, create_channel_avatar, create_chat,
	seed_channel_messages, seed_workspace, setup,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires external Postgres. Set MURMUR_PG_DSN to run."]
async fn concurrent_batches_split_the_pending_set() {
	let Some(env) = setup(
		"concurrent_batches_split_the_pending_set",
		KeywordEmbedding::default(),
		RecordingCompletion::default(),
	)
	.await
	else {
		return;
	};
	let workspace = seed_workspace(&env.service).await;
	let contents: Vec<String> = (0..30).map(|idx| format!("lunch plan {idx}")).collect();

	seed_channel_messages(&env.service, &workspace, &contents).await;

	let config =
		create_channel_avatar(&env.service, &workspace, EmbeddingSettingsPatch::default()).await;
	let chat_id = create_chat(&env.service, &workspace, &config).await;

	env.service.initialize(workspace.owner_id, chat_id).await.expect("Failed to initialize.");

	let pending_before: AHashSet<_> = embeddings::list_pending(&env.service.db, 100)
		.await
		.expect("Failed to list pending.")
		.into_iter()
		.map(|record| record.embedding_id)
		.collect();
	let (a, b, c) = tokio::join!(
		env.service.process_pending_batch(Some(10)),
		env.service.process_pending_batch(Some(10)),
		env.service.process_pending_batch(Some(10)),
	);
	let reports = [
		a.expect("Failed to process batch."),
		b.expect("Failed to process batch."),
		c.expect("Failed to process batch."),
	];
	let processed: usize = reports.iter().map(|report| report.processed).sum();
	let successful: usize = reports.iter().map(|report| report.successful).sum();
	let counts = embeddings::status_counts(&env.service.db, Some(config.config_id))
		.await
		.expect("Failed to count records.");

	assert_eq!(pending_before.len(), 20);
	assert_eq!(processed, 20);
	assert_eq!(successful, 20);
	assert_eq!(counts.computed, 20);
	assert_eq!(counts.pending + counts.processing, 0);

	env.test_db.cleanup().await.expect("Failed to cleanup test database.");
}
