use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use serde_json::{Map, json};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

use peerrank_config::{EmbeddingProviderConfig, Reclaim, Worker};
use peerrank_domain::{EntityKind, JobKind, JobStatus};
use peerrank_storage::{db::Db, entities, jobs, recommendations};
use peerrank_testkit::{TestStore, seed};
use peerrank_worker::{
	provider::{BoxFuture, EmbeddingProvider},
	worker::{self, CycleOutcome, WorkerState},
};

/// Returns the same vector for every text and records what it was asked to embed.
struct FixedEmbedder {
	vec: Vec<f32>,
	seen: Mutex<Vec<String>>,
}
impl FixedEmbedder {
	fn new(vec: Vec<f32>) -> Arc<Self> {
		Arc::new(Self { vec, seen: Mutex::new(Vec::new()) })
	}

	fn seen(&self) -> Vec<String> {
		self.seen.lock().expect("Embedder lock poisoned.").clone()
	}
}
impl EmbeddingProvider for FixedEmbedder {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, peerrank_providers::Result<Vec<f32>>> {
		self.seen.lock().expect("Embedder lock poisoned.").push(text.to_string());

		let vec = self.vec.clone();

		Box::pin(async move { Ok(vec) })
	}
}

struct FailingEmbedder;
impl EmbeddingProvider for FailingEmbedder {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		_: &'a str,
	) -> BoxFuture<'a, peerrank_providers::Result<Vec<f32>>> {
		Box::pin(async {
			Err(peerrank_providers::Error::Embedding {
				message: "Embedding service returned 503.".to_string(),
			})
		})
	}
}

fn embedding_config() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "ollama".to_string(),
		api_base: "http://127.0.0.1:11434".to_string(),
		api_key: String::new(),
		path: "/api/embeddings".to_string(),
		model: "nomic-embed-text".to_string(),
		dimensions: 3,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn worker_config() -> Worker {
	Worker {
		top_k: 10,
		idle_backoff_ms: 20,
		error_backoff_ms: 20,
		connect_backoff_ms: 20,
		reclaim: Reclaim { enabled: false, stale_after_seconds: 900, interval_seconds: 60 },
	}
}

fn state(db: Db, embedder: Arc<dyn EmbeddingProvider>) -> WorkerState {
	WorkerState { db, embedder, embedding: embedding_config(), worker: worker_config() }
}

/// Tags 1-3, subject 42 tagged `graphs` and `go`, three vectorized offers.
async fn seed_market(db: &Db, subject_embedding: Option<&[f32]>) {
	seed::tags(db, &[(1, "graphs"), (2, "go"), (3, "rust")]).await.expect("Failed to seed tags.");
	seed::entity(db, EntityKind::Subject, 42, Some("built search systems"), subject_embedding)
		.await
		.expect("Failed to seed subject.");
	seed::tag_entity(db, EntityKind::Subject, 42, &[1, 2]).await.expect("Failed to tag subject.");

	for (offer_id, description, embedding) in [
		(1, "search engineer", [1.0_f32, 0.0, 0.0]),
		(2, "graph engineer", [0.8, 0.6, 0.0]),
		(3, "frontend", [0.0, 1.0, 0.0]),
	] {
		seed::entity(db, EntityKind::Offer, offer_id, Some(description), Some(embedding.as_slice()))
			.await
			.expect("Failed to seed offer.");
	}
}

async fn target_ids(db: &Db, source: EntityKind, source_id: i64) -> Vec<i64> {
	recommendations::list_edges(db, source, source_id)
		.await
		.expect("Listing failed.")
		.iter()
		.map(|edge| edge.target_id)
		.collect()
}

async fn status_of(db: &Db, job_id: i64) -> (JobStatus, Option<String>) {
	let job = jobs::fetch_job(db, job_id).await.expect("Fetch failed.").expect("Job exists.");

	(job.status().expect("Status must parse."), job.last_error)
}

#[tokio::test]
async fn shutdown_stops_worker_while_storage_is_unreachable() {
	let pool = PgPoolOptions::new()
		.max_connections(1)
		.acquire_timeout(Duration::from_millis(100))
		.connect_lazy("postgres://peer@127.0.0.1:1/peerrank")
		.expect("Failed to build lazy pool.");
	let state = state(Db { pool }, FixedEmbedder::new(vec![1.0, 0.0, 0.0]));
	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let stopper = tokio::spawn(async move {
		tokio::time::sleep(Duration::from_millis(300)).await;

		let _ = shutdown_tx.send(true);
	});
	let result = tokio::time::timeout(Duration::from_secs(10), worker::run_worker(&state, shutdown_rx))
		.await
		.expect("Worker did not stop after shutdown.");

	assert!(result.is_ok(), "Unreachable storage must not be fatal: {result:?}.");

	stopper.await.expect("Stopper panicked.");
}

#[tokio::test]
async fn worker_exits_immediately_when_shutdown_already_requested() {
	let pool = PgPoolOptions::new()
		.connect_lazy("postgres://peer@127.0.0.1:1/peerrank")
		.expect("Failed to build lazy pool.");
	let state = state(Db { pool }, FixedEmbedder::new(vec![1.0, 0.0, 0.0]));
	let (_shutdown_tx, shutdown_rx) = watch::channel(true);

	tokio::time::timeout(Duration::from_secs(1), worker::run_worker(&state, shutdown_rx))
		.await
		.expect("Worker did not stop.")
		.expect("Worker failed.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn subject_job_stores_vector_and_ranks_offers() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping subject_job_stores_vector_and_ranks_offers; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();

	seed_market(db, None).await;

	let job_id = jobs::enqueue_job(db, JobKind::UpdateSubjectVector, &json!({ "subject_id": 42 }))
		.await
		.expect("Failed to enqueue job.");
	let embedder = FixedEmbedder::new(vec![1.0, 0.0, 0.0]);
	let state = state(db.clone(), embedder.clone());
	let outcome = worker::process_next_job(&state).await.expect("Cycle failed.");

	assert_eq!(outcome, CycleOutcome::Completed { job_id });
	assert_eq!(embedder.seen(), vec!["Bio: built search systems. Skills: go, graphs".to_string()]);
	assert_eq!(status_of(db, job_id).await, (JobStatus::Completed, None));
	assert_eq!(
		entities::fetch_embedding(db, EntityKind::Subject, 42).await.expect("Fetch failed."),
		Some(vec![1.0, 0.0, 0.0])
	);

	let edges =
		recommendations::list_edges(db, EntityKind::Subject, 42).await.expect("Listing failed.");
	let ranked: Vec<(i64, i32)> = edges.iter().map(|edge| (edge.target_id, edge.rank)).collect();

	assert_eq!(ranked, vec![(1, 1), (2, 2), (3, 3)]);
	assert!(edges.windows(2).all(|pair| pair[0].score >= pair[1].score));
	assert_eq!(worker::process_next_job(&state).await.expect("Cycle failed."), CycleOutcome::Idle);

	store.cleanup().await.expect("Failed to cleanup test store.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn offer_job_records_missing_required_tags() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping offer_job_records_missing_required_tags; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();

	seed_market(db, Some([1.0, 0.0, 0.0].as_slice())).await;
	seed::tag_entity(db, EntityKind::Offer, 3, &[2, 3]).await.expect("Failed to tag offer.");

	let job_id = jobs::enqueue_job(db, JobKind::UpdateOfferVector, &json!({ "offer_id": "3" }))
		.await
		.expect("Failed to enqueue job.");
	let state = state(db.clone(), FixedEmbedder::new(vec![1.0, 0.0, 0.0]));

	assert_eq!(
		worker::process_next_job(&state).await.expect("Cycle failed."),
		CycleOutcome::Completed { job_id }
	);

	let edges =
		recommendations::list_edges(db, EntityKind::Offer, 3).await.expect("Listing failed.");

	assert_eq!(edges.len(), 1);
	assert_eq!(edges[0].target_id, 42);
	assert_eq!(edges[0].rank, 1);
	assert_eq!(edges[0].missing_tags, vec!["rust".to_string()]);

	store.cleanup().await.expect("Failed to cleanup test store.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn payload_without_entity_id_fails_without_mutation() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping payload_without_entity_id_fails_without_mutation; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();

	seed_market(db, None).await;

	let job_id = jobs::enqueue_job(db, JobKind::UpdateOfferVector, &json!({ "subject_id": 1 }))
		.await
		.expect("Failed to enqueue job.");
	let embedder = FixedEmbedder::new(vec![0.0, 0.0, 1.0]);
	let state = state(db.clone(), embedder.clone());

	assert_eq!(
		worker::process_next_job(&state).await.expect("Cycle failed."),
		CycleOutcome::Failed { job_id }
	);

	let (status, last_error) = status_of(db, job_id).await;

	assert_eq!(status, JobStatus::Failed);
	assert!(last_error.is_some_and(|reason| reason.contains("offer_id")));
	assert!(embedder.seen().is_empty(), "No embedding call for an invalid payload.");
	assert_eq!(
		entities::fetch_embedding(db, EntityKind::Offer, 1).await.expect("Fetch failed."),
		Some(vec![1.0, 0.0, 0.0])
	);

	store.cleanup().await.expect("Failed to cleanup test store.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn embedding_failure_keeps_previous_vector_and_edges() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping embedding_failure_keeps_previous_vector_and_edges; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();

	seed_market(db, Some([0.0, 1.0, 0.0].as_slice())).await;
	seed::edges(db, EntityKind::Subject, 42, &[(3, 1.0)]).await.expect("Failed to seed edges.");

	let job_id = jobs::enqueue_job(db, JobKind::UpdateSubjectVector, &json!({ "subject_id": 42 }))
		.await
		.expect("Failed to enqueue job.");
	let state = state(db.clone(), Arc::new(FailingEmbedder));

	assert_eq!(
		worker::process_next_job(&state).await.expect("Cycle failed."),
		CycleOutcome::Failed { job_id }
	);

	let (status, last_error) = status_of(db, job_id).await;

	assert_eq!(status, JobStatus::Failed);
	assert!(last_error.is_some_and(|reason| reason.contains("503")));
	assert_eq!(
		entities::fetch_embedding(db, EntityKind::Subject, 42).await.expect("Fetch failed."),
		Some(vec![0.0, 1.0, 0.0])
	);
	assert_eq!(target_ids(db, EntityKind::Subject, 42).await, vec![3]);

	store.cleanup().await.expect("Failed to cleanup test store.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn unknown_job_type_and_missing_entity_fail_softly() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping unknown_job_type_and_missing_entity_fail_softly; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();
	let unknown: i64 = sqlx::query_scalar(
		"INSERT INTO jobs_queue (job_type, payload, status) VALUES ('REINDEX_ALL', '{}', 'pending') RETURNING job_id",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to enqueue job.");
	let missing = jobs::enqueue_job(db, JobKind::UpdateSubjectVector, &json!({ "subject_id": 404 }))
		.await
		.expect("Failed to enqueue job.");
	let state = state(db.clone(), FixedEmbedder::new(vec![1.0, 0.0, 0.0]));

	assert_eq!(
		worker::process_next_job(&state).await.expect("Cycle failed."),
		CycleOutcome::Failed { job_id: unknown }
	);
	assert_eq!(
		worker::process_next_job(&state).await.expect("Cycle failed."),
		CycleOutcome::Failed { job_id: missing }
	);

	let (_, unknown_error) = status_of(db, unknown).await;
	let (_, missing_error) = status_of(db, missing).await;

	assert!(unknown_error.is_some_and(|reason| reason.contains("REINDEX_ALL")));
	assert_eq!(missing_error.as_deref(), Some("subject 404 not found."));

	store.cleanup().await.expect("Failed to cleanup test store.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set PEERRANK_PG_DSN to run."]
async fn ranking_failure_rolls_back_and_leaves_job_processing() {
	let Some(store) = TestStore::from_env().await.expect("Failed to create test store.") else {
		eprintln!("Skipping ranking_failure_rolls_back_and_leaves_job_processing; set PEERRANK_PG_DSN to run.");

		return;
	};
	let db = store.db();

	seed_market(db, Some([0.0, 1.0, 0.0].as_slice())).await;
	seed::edges(db, EntityKind::Subject, 42, &[(3, 1.0)]).await.expect("Failed to seed edges.");

	let job_id = jobs::enqueue_job(db, JobKind::UpdateSubjectVector, &json!({ "subject_id": 42 }))
		.await
		.expect("Failed to enqueue job.");
	// Two components against a vector(3) column: Postgres rejects the store mid-transaction.
	let state = state(db.clone(), FixedEmbedder::new(vec![1.0, 0.0]));
	let result = worker::process_next_job(&state).await;

	assert!(result.is_err(), "Storage rejection must abort the cycle: {result:?}.");
	assert_eq!(status_of(db, job_id).await, (JobStatus::Processing, None));
	assert_eq!(
		entities::fetch_embedding(db, EntityKind::Subject, 42).await.expect("Fetch failed."),
		Some(vec![0.0, 1.0, 0.0])
	);
	assert_eq!(target_ids(db, EntityKind::Subject, 42).await, vec![3]);

	let edges =
		recommendations::list_edges(db, EntityKind::Subject, 42).await.expect("Listing failed.");

	assert!((edges[0].score - 1.0).abs() < 1e-6);

	store.cleanup().await.expect("Failed to cleanup test store.");
}
