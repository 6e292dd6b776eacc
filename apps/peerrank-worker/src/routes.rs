use std::{str::FromStr, sync::Arc};

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;
use sqlx::postgres::PgConnectOptions;

#[derive(Clone)]
pub struct ProbeState {
	pub storage: Arc<str>,
}
impl ProbeState {
	pub fn new(dsn: &str) -> Self {
		Self { storage: storage_endpoint(dsn).into() }
	}
}

#[derive(Debug, Serialize)]
struct StatusResponse {
	status: &'static str,
	storage: String,
}

pub fn router(state: ProbeState) -> Router {
	Router::new().route("/", get(status)).route("/health", get(health)).with_state(state)
}

async fn status(State(state): State<ProbeState>) -> Json<StatusResponse> {
	Json(StatusResponse { status: "running", storage: state.storage.to_string() })
}

async fn health() -> StatusCode {
	StatusCode::OK
}

/// `host:port/database` of the configured store. Credentials never leave the DSN.
pub fn storage_endpoint(dsn: &str) -> String {
	let Ok(options) = PgConnectOptions::from_str(dsn) else {
		return "unknown".to_string();
	};
	let database = options.get_database().unwrap_or("postgres");

	format!("{}:{}/{database}", options.get_host(), options.get_port())
}
