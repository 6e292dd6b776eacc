use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub worker: Worker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	/// Address of the liveness probe listener.
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	/// Wire dialect of the embedding service. One of "ollama" or "openai".
	pub provider_id: String,
	pub api_base: String,
	/// Blank means the request carries no Authorization header.
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Vector length stored for subjects and offers. Responses of any other length are rejected.
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Worker {
	/// Maximum number of recommendation edges kept per source entity.
	pub top_k: u32,
	pub idle_backoff_ms: u64,
	pub error_backoff_ms: u64,
	pub connect_backoff_ms: u64,
	pub reclaim: Reclaim,
}

/// Periodic reset of jobs left in `processing` by a crashed worker.
#[derive(Debug, Clone, Deserialize)]
pub struct Reclaim {
	pub enabled: bool,
	pub stale_after_seconds: u64,
	pub interval_seconds: u64,
}
