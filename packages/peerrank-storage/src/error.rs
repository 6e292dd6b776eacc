#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
}
impl Error {
	/// True when the database could not be reached, as opposed to a statement failing.
	pub fn is_connection_failure(&self) -> bool {
		matches!(
			self,
			Self::Sqlx(
				sqlx::Error::Io(_)
					| sqlx::Error::Tls(_)
					| sqlx::Error::PoolTimedOut
					| sqlx::Error::PoolClosed
					| sqlx::Error::WorkerCrashed
			)
		)
	}
}
