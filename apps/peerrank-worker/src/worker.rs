use std::{collections::HashSet, sync::Arc, time::Duration as StdDuration};

use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tokio::{sync::watch, time as tokio_time};

use peerrank_config::{EmbeddingProviderConfig, Worker};
use peerrank_domain::{EntityKind, JobOutcome, RankedEdge, ranking, text};
use peerrank_storage::{
	db::Db,
	entities, jobs,
	models::{EdgeInsert, Job},
	recommendations,
};

use crate::{Error, Result, provider::EmbeddingProvider};

const MAX_JOB_ERROR_CHARS: usize = 1_024;

pub struct WorkerState {
	pub db: Db,
	pub embedder: Arc<dyn EmbeddingProvider>,
	pub embedding: EmbeddingProviderConfig,
	pub worker: Worker,
}

/// What one claim cycle did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CycleOutcome {
	/// No pending job was available.
	Idle,
	Completed { job_id: i64 },
	Failed { job_id: i64 },
}

/// Expected failures that finalize a job as `failed` and let the worker continue.
#[derive(Debug, thiserror::Error)]
pub enum SoftFailure {
	#[error("Unknown job type {0:?}.")]
	UnknownJobType(String),
	#[error("Payload is missing a valid {key}.")]
	MissingEntityId { key: &'static str },
	#[error("{} {entity_id} not found.", kind.as_str())]
	EntityNotFound { kind: EntityKind, entity_id: i64 },
	#[error(transparent)]
	Embedding(#[from] peerrank_providers::Error),
}

struct Enriched {
	kind: EntityKind,
	entity_id: i64,
	vec: Vec<f32>,
	tags: Vec<String>,
}

/// Runs claim cycles until `shutdown` turns true or its sender is dropped.
///
/// The signal is checked before every claim and interrupts every backoff sleep. A job already
/// claimed is always carried to the end of its cycle.
pub async fn run_worker(state: &WorkerState, mut shutdown: watch::Receiver<bool>) -> Result<()> {
	let idle_backoff = StdDuration::from_millis(state.worker.idle_backoff_ms);
	let error_backoff = StdDuration::from_millis(state.worker.error_backoff_ms);
	let connect_backoff = StdDuration::from_millis(state.worker.connect_backoff_ms);
	let mut last_reclaim: Option<OffsetDateTime> = None;

	tracing::info!(top_k = state.worker.top_k, "Worker started.");

	loop {
		if *shutdown.borrow() {
			tracing::info!("Shutdown requested. Worker stopping.");

			return Ok(());
		}

		if state.worker.reclaim.enabled {
			let now = OffsetDateTime::now_utc();
			let interval = seconds(state.worker.reclaim.interval_seconds);

			if last_reclaim.map(|at| now - at >= interval).unwrap_or(true) {
				let stale_after = seconds(state.worker.reclaim.stale_after_seconds);

				match jobs::reclaim_stale_jobs(&state.db, stale_after).await {
					Ok(_) => last_reclaim = Some(now),
					Err(err) => tracing::error!(error = %err, "Stale job reclaim failed."),
				}
			}
		}

		let delay = match process_next_job(state).await {
			Ok(CycleOutcome::Idle) => Some(idle_backoff),
			Ok(_) => None,
			Err(err) if err.is_connection_failure() => {
				tracing::warn!(error = %err, "Storage unreachable. Backing off.");

				Some(connect_backoff)
			},
			Err(err) => {
				tracing::error!(error = %err, "Worker cycle failed. Backing off.");

				Some(error_backoff)
			},
		};

		if let Some(delay) = delay
			&& sleep_or_shutdown(delay, &mut shutdown).await
		{
			tracing::info!("Shutdown requested. Worker stopping.");

			return Ok(());
		}
	}
}

/// Claims at most one job and carries it to a terminal status.
///
/// An `Err` means the cycle was aborted: any open transaction has been rolled back and a claimed
/// job stays in `processing` unless a reclaim sweep already took it back.
pub async fn process_next_job(state: &WorkerState) -> Result<CycleOutcome> {
	let Some(job) = jobs::claim_job(&state.db).await? else {
		return Ok(CycleOutcome::Idle);
	};

	tracing::info!(job_id = job.job_id, job_type = %job.job_type, "Claimed job.");

	let outcome = carry_job(state, &job).await;

	match &outcome {
		Err(Error::Storage(peerrank_storage::Error::Conflict(_))) => {
			tracing::warn!(
				job_id = job.job_id,
				"Job was reclaimed before it finished. Result discarded."
			);
		},
		Err(err) => {
			tracing::warn!(job_id = job.job_id, error = %err, "Job aborted. It stays in processing.");
		},
		Ok(_) => {},
	}

	outcome
}

async fn carry_job(state: &WorkerState, job: &Job) -> Result<CycleOutcome> {
	let enriched = match enrich(state, job).await? {
		Ok(enriched) => enriched,
		Err(failure) => return fail_job(state, job, &failure).await,
	};

	match rank_and_complete(state, job.job_id, &enriched).await? {
		Ok(edge_count) => {
			tracing::info!(
				job_id = job.job_id,
				entity = enriched.kind.as_str(),
				entity_id = enriched.entity_id,
				edge_count,
				"Vector updated and recommendations refreshed."
			);

			Ok(CycleOutcome::Completed { job_id: job.job_id })
		},
		Err(failure) => fail_job(state, job, &failure).await,
	}
}

async fn enrich(state: &WorkerState, job: &Job) -> Result<Result<Enriched, SoftFailure>> {
	let kind = match job.kind() {
		Ok(job_kind) => job_kind.entity(),
		Err(_) => return Ok(Err(SoftFailure::UnknownJobType(job.job_type.clone()))),
	};
	let key = kind.payload_key();
	let Some(entity_id) = entity_id_from_payload(&job.payload, key) else {
		return Ok(Err(SoftFailure::MissingEntityId { key }));
	};
	let Some(source) = entities::fetch_entity_source(&state.db, kind, entity_id).await? else {
		return Ok(Err(SoftFailure::EntityNotFound { kind, entity_id }));
	};
	let text = text::build_entity_text(kind, source.text.as_deref(), &source.tags);
	let vec = match state.embedder.embed(&state.embedding, &text).await {
		Ok(vec) => vec,
		Err(err) => return Ok(Err(err.into())),
	};

	Ok(Ok(Enriched { kind, entity_id, vec, tags: source.tags }))
}

/// Stores the vector, replaces the ranked edges and completes the job in one transaction.
async fn rank_and_complete(
	state: &WorkerState,
	job_id: i64,
	enriched: &Enriched,
) -> Result<Result<usize, SoftFailure>> {
	let Enriched { kind, entity_id, vec, .. } = enriched;
	let mut tx = state.db.pool.begin().await?;

	match entities::update_embedding_tx(&mut tx, *kind, *entity_id, vec).await {
		Ok(()) => {},
		Err(peerrank_storage::Error::NotFound(_)) =>
			return Ok(Err(SoftFailure::EntityNotFound { kind: *kind, entity_id: *entity_id })),
		Err(err) => return Err(err.into()),
	}

	let scored = recommendations::score_candidates_tx(&mut tx, *kind, vec).await?;
	let ranked = ranking::rank_candidates(scored, state.worker.top_k as usize);
	let edges = match kind {
		EntityKind::Subject => edge_inserts(&ranked, |_| Vec::new()),
		EntityKind::Offer => {
			let target_ids: Vec<i64> = ranked.iter().map(|edge| edge.target_id).collect();
			let held =
				entities::fetch_tag_names_tx(&mut tx, EntityKind::Subject, &target_ids).await?;

			edge_inserts(&ranked, |target_id| {
				missing_tags(&enriched.tags, held.get(&target_id).map(Vec::as_slice).unwrap_or(&[]))
			})
		},
	};

	recommendations::replace_edges_tx(&mut tx, *kind, *entity_id, &edges).await?;
	jobs::finalize_job_tx(&mut tx, job_id, JobOutcome::Completed, None).await?;
	tx.commit().await?;

	Ok(Ok(edges.len()))
}

async fn fail_job(state: &WorkerState, job: &Job, failure: &SoftFailure) -> Result<CycleOutcome> {
	let reason = job_error_text(failure);

	tracing::warn!(job_id = job.job_id, job_type = %job.job_type, error = %reason, "Job failed.");

	jobs::finalize_job(&state.db, job.job_id, JobOutcome::Failed, Some(&reason)).await?;

	Ok(CycleOutcome::Failed { job_id: job.job_id })
}

fn edge_inserts<F>(ranked: &[RankedEdge], mut missing: F) -> Vec<EdgeInsert>
where
	F: FnMut(i64) -> Vec<String>,
{
	ranked
		.iter()
		.map(|edge| EdgeInsert {
			target_id: edge.target_id,
			score: edge.score,
			rank: edge.rank,
			missing_tags: missing(edge.target_id),
		})
		.collect()
}

/// Required tags the candidate does not hold, in the order they were required.
fn missing_tags(required: &[String], held: &[String]) -> Vec<String> {
	let held: HashSet<&str> = held.iter().map(String::as_str).collect();

	required.iter().filter(|tag| !held.contains(tag.as_str())).cloned().collect()
}

/// Entity id from a job payload. Accepts JSON integers and integer strings.
fn entity_id_from_payload(payload: &Value, key: &str) -> Option<i64> {
	match payload.get(key)? {
		Value::Number(number) => number.as_i64(),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
}

/// `last_error` text: the failure on one line, capped at `MAX_JOB_ERROR_CHARS`.
///
/// Embedding errors arrive with request URLs already stripped of credentials.
fn job_error_text(failure: &SoftFailure) -> String {
	let text = failure.to_string();
	let mut out = text.split_whitespace().collect::<Vec<_>>().join(" ");

	if out.chars().count() > MAX_JOB_ERROR_CHARS {
		out = out.chars().take(MAX_JOB_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

fn seconds(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Sleeps for `delay`; returns true when shutdown was requested meanwhile.
async fn sleep_or_shutdown(delay: StdDuration, shutdown: &mut watch::Receiver<bool>) -> bool {
	let changed = tokio::select! {
		_ = tokio_time::sleep(delay) => return false,
		changed = shutdown.changed() => changed,
	};

	changed.is_err() || *shutdown.borrow()
}
