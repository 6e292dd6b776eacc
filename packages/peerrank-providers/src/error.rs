pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the embedding service.
///
/// Transport errors, timeouts, non-success statuses and malformed bodies all collapse into
/// `Embedding`; callers treat every variant as a failed job, never as a crash.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid embedding input: {message}")]
	InvalidInput { message: String },
	#[error("Embedding request failed: {message}")]
	Embedding { message: String },
}
impl Error {
	pub(crate) fn embedding(message: impl Into<String>) -> Self {
		Self::Embedding { message: message.into() }
	}
}
impl From<reqwest::Error> for Error {
	fn from(mut err: reqwest::Error) -> Self {
		if let Some(url) = err.url_mut() {
			redact_url(url);
		}

		Self::embedding(err.to_string())
	}
}
impl From<reqwest::header::InvalidHeaderName> for Error {
	fn from(err: reqwest::header::InvalidHeaderName) -> Self {
		Self::embedding(err.to_string())
	}
}
impl From<reqwest::header::InvalidHeaderValue> for Error {
	fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
		Self::embedding(err.to_string())
	}
}

/// Strips credentials and query parameters, which may carry API keys, from a request URL.
fn redact_url(url: &mut reqwest::Url) {
	let _ = url.set_username("");
	let _ = url.set_password(None);

	url.set_query(None);
}
