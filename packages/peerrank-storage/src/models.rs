use serde_json::Value;
use time::OffsetDateTime;

use peerrank_domain::{JobKind, JobStatus, UnknownValue};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
	pub job_id: i64,
	pub job_type: String,
	pub payload: Value,
	pub status: String,
	pub last_error: Option<String>,
	pub created_at: OffsetDateTime,
	pub claimed_at: Option<OffsetDateTime>,
	pub finished_at: Option<OffsetDateTime>,
}
impl Job {
	pub fn kind(&self) -> Result<JobKind, UnknownValue> {
		self.job_type.parse()
	}

	pub fn status(&self) -> Result<JobStatus, UnknownValue> {
		self.status.parse()
	}
}

/// Raw attributes an entity's embedding text is built from.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntitySource {
	pub text: Option<String>,
	pub tags: Vec<String>,
}

/// One stored recommendation row, read back in rank order.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecommendationEdge {
	pub source_id: i64,
	pub target_id: i64,
	pub score: f32,
	pub rank: i32,
	pub missing_tags: Vec<String>,
}

/// An edge about to replace the stored set of its source.
#[derive(Debug, Clone)]
pub struct EdgeInsert {
	pub target_id: i64,
	pub score: f32,
	pub rank: i32,
	/// Only persisted for offer sources.
	pub missing_tags: Vec<String>,
}
