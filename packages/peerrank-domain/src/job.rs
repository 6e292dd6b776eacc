use std::{fmt, str::FromStr};

use crate::EntityKind;

#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value {value:?}.")]
pub struct UnknownValue {
	pub kind: &'static str,
	pub value: String,
}

/// Wire name stored in `jobs_queue.job_type`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobKind {
	UpdateSubjectVector,
	UpdateOfferVector,
}
impl JobKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::UpdateSubjectVector => "UPDATE_SUBJECT_VECTOR",
			Self::UpdateOfferVector => "UPDATE_OFFER_VECTOR",
		}
	}

	/// Entity whose vector the job refreshes.
	pub fn entity(self) -> EntityKind {
		match self {
			Self::UpdateSubjectVector => EntityKind::Subject,
			Self::UpdateOfferVector => EntityKind::Offer,
		}
	}
}
impl FromStr for JobKind {
	type Err = UnknownValue;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"UPDATE_SUBJECT_VECTOR" => Ok(Self::UpdateSubjectVector),
			"UPDATE_OFFER_VECTOR" => Ok(Self::UpdateOfferVector),
			other => Err(UnknownValue { kind: "job kind", value: other.to_string() }),
		}
	}
}

/// Lifecycle of a queued job: `pending -> processing -> {completed, failed}`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}
impl JobStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Pending, Self::Processing)
				| (Self::Processing, Self::Completed)
				| (Self::Processing, Self::Failed)
		)
	}
}
impl FromStr for JobStatus {
	type Err = UnknownValue;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"pending" => Ok(Self::Pending),
			"processing" => Ok(Self::Processing),
			"completed" => Ok(Self::Completed),
			"failed" => Ok(Self::Failed),
			other => Err(UnknownValue { kind: "job status", value: other.to_string() }),
		}
	}
}
impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Terminal status written by finalize.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JobOutcome {
	Completed,
	Failed,
}
impl JobOutcome {
	pub fn status(self) -> JobStatus {
		match self {
			Self::Completed => JobStatus::Completed,
			Self::Failed => JobStatus::Failed,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_statuses_do_not_transition() {
		for next in
			[JobStatus::Pending, JobStatus::Processing, JobStatus::Completed, JobStatus::Failed]
		{
			assert!(!JobStatus::Completed.can_transition_to(next));
			assert!(!JobStatus::Failed.can_transition_to(next));
		}
	}

	#[test]
	fn pending_only_moves_to_processing() {
		assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
		assert!(!JobStatus::Pending.can_transition_to(JobStatus::Failed));
	}

	#[test]
	fn job_kind_parses_wire_names() {
		assert_eq!("UPDATE_OFFER_VECTOR".parse::<JobKind>().ok(), Some(JobKind::UpdateOfferVector));
		assert!("UPDATE_USER_VECTOR".parse::<JobKind>().is_err());
	}
}
