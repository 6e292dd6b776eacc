pub mod provider;
pub mod routes;
pub mod worker;

mod error;

pub use error::{Error, Result};

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing_subscriber::EnvFilter;

use peerrank_storage::db::Db;

use crate::{provider::HttpEmbedding, routes::ProbeState, worker::WorkerState};

#[derive(Debug, Parser)]
#[command(
	version = peerrank_cli::VERSION,
	rename_all = "kebab",
	styles = peerrank_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = peerrank_config::load(&args.config)?;

	init_tracing(&config);

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let (shutdown_tx, shutdown_rx) = watch::channel(false);

	tokio::spawn({
		let shutdown_tx = shutdown_tx.clone();

		async move {
			shutdown_signal().await;
			tracing::info!("Shutdown signal received.");

			let _ = shutdown_tx.send(true);
		}
	});

	let listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "Liveness probe listening.");

	let probe = routes::router(ProbeState::new(&config.storage.postgres.dsn));
	let server = tokio::spawn({
		let mut shutdown_rx = shutdown_rx.clone();

		async move {
			axum::serve(listener, probe)
				.with_graceful_shutdown(async move {
					let _ = shutdown_rx.wait_for(|stop| *stop).await;
				})
				.await
		}
	});
	let connect_backoff = Duration::from_millis(config.worker.connect_backoff_ms);
	let worked = match connect_with_retry(&config, connect_backoff, shutdown_rx.clone()).await? {
		Some(db) => {
			let state = WorkerState {
				db,
				embedder: Arc::new(HttpEmbedding),
				embedding: config.providers.embedding,
				worker: config.worker,
			};

			worker::run_worker(&state, shutdown_rx).await
		},
		None => Ok(()),
	};

	let _ = shutdown_tx.send(true);

	server.await??;
	worked?;

	tracing::info!("Worker exited.");

	Ok(())
}

fn init_tracing(config: &peerrank_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Connects and applies the schema, retrying while the database is unreachable.
///
/// Returns `None` when shutdown is requested before a connection succeeds.
async fn connect_with_retry(
	config: &peerrank_config::Config,
	backoff: Duration,
	mut shutdown: watch::Receiver<bool>,
) -> Result<Option<Db>> {
	loop {
		if *shutdown.borrow() {
			return Ok(None);
		}

		let attempt = async {
			let db = Db::connect(&config.storage.postgres).await?;

			db.ensure_schema(config.providers.embedding.dimensions).await?;

			Ok::<_, Error>(db)
		};

		match attempt.await {
			Ok(db) => return Ok(Some(db)),
			Err(err) if err.is_connection_failure() => {
				tracing::warn!(error = %err, "Storage unreachable. Retrying connection.");
			},
			Err(err) => return Err(err),
		}

		tokio::select! {
			_ = tokio::time::sleep(backoff) => {},
			changed = shutdown.changed() => {
				if changed.is_err() {
					return Ok(None);
				}
			},
		}
	}
}

async fn shutdown_signal() {
	let ctrl_c = async {
		let _ = tokio::signal::ctrl_c().await;
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(err) => {
				tracing::warn!(error = %err, "Failed to install SIGTERM handler.");
				std::future::pending::<()>().await;
			},
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
