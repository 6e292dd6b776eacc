pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] peerrank_storage::Error),
}
impl Error {
	/// Storage unreachable. Retried after the connection backoff, never fatal.
	pub fn is_connection_failure(&self) -> bool {
		match self {
			Self::Storage(err) => err.is_connection_failure(),
		}
	}
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage(err.into())
	}
}
