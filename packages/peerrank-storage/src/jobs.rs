use serde_json::Value;
use sqlx::{Postgres, Transaction};
use time::{Duration, OffsetDateTime};

use peerrank_domain::{JobKind, JobOutcome, JobStatus, UnknownValue};

use crate::{Error, Result, db::Db, models::Job};

const JOB_COLUMNS: &str = "\
	job_id,
	job_type,
	payload,
	status,
	last_error,
	created_at,
	claimed_at,
	finished_at";

/// Inserts a pending job. Producers normally own this; the worker never calls it.
pub async fn enqueue_job(db: &Db, kind: JobKind, payload: &Value) -> Result<i64> {
	let job_id: i64 = sqlx::query_scalar(
		"INSERT INTO jobs_queue (job_type, payload, status) VALUES ($1, $2, 'pending') RETURNING job_id",
	)
	.bind(kind.as_str())
	.bind(payload)
	.fetch_one(&db.pool)
	.await?;

	Ok(job_id)
}

pub async fn fetch_job(db: &Db, job_id: i64) -> Result<Option<Job>> {
	let sql = format!("SELECT {JOB_COLUMNS} FROM jobs_queue WHERE job_id = $1");
	let job = sqlx::query_as::<_, Job>(&sql).bind(job_id).fetch_optional(&db.pool).await?;

	Ok(job)
}

/// Claims the oldest pending job and moves it to `processing`.
///
/// Rows locked by a concurrent claimant are skipped rather than waited on, so two callers never
/// receive the same job. The transition commits before returning; no lock is held afterwards.
pub async fn claim_job(db: &Db) -> Result<Option<Job>> {
	let now = OffsetDateTime::now_utc();
	let mut tx = db.pool.begin().await?;
	let sql = format!(
		"\
SELECT {JOB_COLUMNS}
FROM jobs_queue
WHERE status = 'pending'
ORDER BY created_at ASC, job_id ASC
LIMIT 1
FOR UPDATE SKIP LOCKED"
	);
	let row = sqlx::query_as::<_, Job>(&sql).fetch_optional(&mut *tx).await?;
	let job = if let Some(mut job) = row {
		sqlx::query(
			"UPDATE jobs_queue SET status = 'processing', claimed_at = $1 WHERE job_id = $2",
		)
		.bind(now)
		.bind(job.job_id)
		.execute(&mut *tx)
		.await?;

		job.status = JobStatus::Processing.as_str().to_string();
		job.claimed_at = Some(now);

		Some(job)
	} else {
		None
	};

	tx.commit().await?;

	Ok(job)
}

/// Moves a `processing` job to its terminal status in its own transaction.
pub async fn finalize_job(
	db: &Db,
	job_id: i64,
	outcome: JobOutcome,
	last_error: Option<&str>,
) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	finalize_job_tx(&mut tx, job_id, outcome, last_error).await?;

	tx.commit().await?;

	Ok(())
}

/// Moves a `processing` job to its terminal status inside the caller's transaction.
///
/// The row is locked before the transition is checked. A job in any other status is left
/// untouched and reported as a conflict, so a terminal status is never overwritten.
pub async fn finalize_job_tx(
	tx: &mut Transaction<'_, Postgres>,
	job_id: i64,
	outcome: JobOutcome,
	last_error: Option<&str>,
) -> Result<()> {
	let row: Option<(String,)> =
		sqlx::query_as("SELECT status FROM jobs_queue WHERE job_id = $1 FOR UPDATE")
			.bind(job_id)
			.fetch_optional(&mut **tx)
			.await?;
	let Some((current,)) = row else {
		return Err(Error::NotFound(format!("Job {job_id}.")));
	};
	let current: JobStatus =
		current.parse().map_err(|err: UnknownValue| Error::InvalidArgument(err.to_string()))?;
	let next = outcome.status();

	if !current.can_transition_to(next) {
		return Err(Error::Conflict(format!("Job {job_id} is {current} and cannot become {next}.")));
	}

	sqlx::query(
		"\
UPDATE jobs_queue
SET status = $1,
	last_error = $2,
	finished_at = $3
WHERE job_id = $4",
	)
	.bind(next.as_str())
	.bind(last_error)
	.bind(OffsetDateTime::now_utc())
	.bind(job_id)
	.execute(&mut **tx)
	.await?;

	Ok(())
}

/// Returns jobs stuck in `processing` for longer than `stale_after` to `pending`.
pub async fn reclaim_stale_jobs(db: &Db, stale_after: Duration) -> Result<u64> {
	let cutoff = OffsetDateTime::now_utc().checked_sub(stale_after).ok_or_else(|| {
		Error::InvalidArgument(format!("Reclaim threshold {stale_after} is out of range."))
	})?;
	let result = sqlx::query(
		"\
UPDATE jobs_queue
SET status = 'pending',
	claimed_at = NULL
WHERE status = 'processing' AND claimed_at < $1",
	)
	.bind(cutoff)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() > 0 {
		tracing::warn!(count = result.rows_affected(), "Reclaimed stale processing jobs.");
	}

	Ok(result.rows_affected())
}
