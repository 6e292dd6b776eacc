mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Reclaim, Service, Storage, Worker,
};

use std::{fs, path::Path};

pub const MAX_TOP_K: u32 = 10;
/// Upper bound for reclaim thresholds and intervals, 30 days.
pub const MAX_RECLAIM_SECONDS: u64 = 2_592_000;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("providers.embedding.api_base", &cfg.providers.embedding.api_base),
		("providers.embedding.model", &cfg.providers.embedding.model),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;

	if !matches!(embedding.provider_id.as_str(), "ollama" | "openai") {
		return Err(Error::Validation {
			message: "providers.embedding.provider_id must be one of ollama or openai.".to_string(),
		});
	}
	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if embedding.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: "providers.embedding.default_headers values must be strings.".to_string(),
		});
	}
	if cfg.worker.top_k == 0 || cfg.worker.top_k > MAX_TOP_K {
		return Err(Error::Validation {
			message: format!("worker.top_k must be in the range 1-{MAX_TOP_K}."),
		});
	}

	for (label, value) in [
		("worker.idle_backoff_ms", cfg.worker.idle_backoff_ms),
		("worker.error_backoff_ms", cfg.worker.error_backoff_ms),
		("worker.connect_backoff_ms", cfg.worker.connect_backoff_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.worker.reclaim.enabled {
		for (label, value) in [
			("worker.reclaim.stale_after_seconds", cfg.worker.reclaim.stale_after_seconds),
			("worker.reclaim.interval_seconds", cfg.worker.reclaim.interval_seconds),
		] {
			if value == 0 || value > MAX_RECLAIM_SECONDS {
				return Err(Error::Validation {
					message: format!(
						"{label} must be in the range 1-{MAX_RECLAIM_SECONDS} when enabled."
					),
				});
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let embedding = &mut cfg.providers.embedding;

	embedding.provider_id = embedding.provider_id.trim().to_ascii_lowercase();
	embedding.api_key = embedding.api_key.trim().to_string();

	if embedding.api_base.ends_with('/') && embedding.path.starts_with('/') {
		embedding.api_base = embedding.api_base.trim_end_matches('/').to_string();
	}
}
