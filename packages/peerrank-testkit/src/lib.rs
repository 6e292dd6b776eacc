pub mod seed;

mod error;

pub use error::{Error, Result};

use std::{env, future::Future, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

use peerrank_config::Postgres;
use peerrank_storage::db::Db;

/// Vector length of every scratch schema.
pub const TEST_VECTOR_DIM: u32 = 3;

const DSN_VAR: &str = "PEERRANK_PG_DSN";
const POOL_MAX_CONNS: u32 = 8;
const MAINTENANCE_DATABASES: [&str; 2] = ["postgres", "template1"];

/// A scratch database with the PeerRank schema applied, dropped on `cleanup` or on drop.
pub struct TestStore {
	db: Db,
	name: String,
	maintenance: PgConnectOptions,
	dropped: bool,
}
impl TestStore {
	/// Creates a store on the server named by `PEERRANK_PG_DSN`, `None` when it is unset.
	pub async fn from_env() -> Result<Option<Self>> {
		match env_dsn() {
			Some(base_dsn) => Self::create(&base_dsn).await.map(Some),
			None => Ok(None),
		}
	}

	pub async fn create(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn)
			.map_err(|err| Error::Message(format!("Failed to parse {DSN_VAR}: {err}.")))?;
		let (maintenance, mut conn) = connect_maintenance(&base).await?;
		let name = format!("peerrank_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
			.await
			.map_err(|err| Error::Message(format!("Failed to create {name}: {err}.")))?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		match open(dsn).await {
			Ok(db) => Ok(Self { db, name, maintenance, dropped: false }),
			Err(err) => {
				if let Err(drop_err) = drop_database(&name, &maintenance).await {
					eprintln!("Test store cleanup failed: {drop_err}.");
				}

				Err(err)
			},
		}
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.db.pool.close().await;
		drop_database(&self.name, &self.maintenance).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestStore {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let maintenance = self.maintenance.clone();
		let worker = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test store cleanup failed: {err}.");

					return;
				},
			};

			if let Err(err) = runtime.block_on(drop_database(&name, &maintenance)) {
				eprintln!("Test store cleanup failed: {err}.");
			}
		});
		let _ = worker.join();
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok().filter(|dsn| !dsn.trim().is_empty())
}

/// Runs `f` against a fresh store and drops the store afterwards, whatever `f` returned.
pub async fn with_test_store<F, Fut, T>(base_dsn: &str, f: F) -> Result<T>
where
	F: FnOnce(Db) -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let store = TestStore::create(base_dsn).await?;
	let result = f(store.db.clone()).await;

	if let Err(err) = store.cleanup().await {
		eprintln!("Test store cleanup failed: {err}.");

		if result.is_ok() {
			return Err(err);
		}
	}

	result
}

async fn open(dsn: String) -> Result<Db> {
	let db = Db::connect(&Postgres { dsn, pool_max_conns: POOL_MAX_CONNS }).await?;

	db.ensure_schema(TEST_VECTOR_DIM).await?;

	Ok(db)
}

async fn connect_maintenance(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last_err = None;

	for database in MAINTENANCE_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last_err = Some(err),
		}
	}

	Err(Error::Message(format!("Failed to reach a maintenance database: {last_err:?}.")))
}

async fn drop_database(name: &str, maintenance: &PgConnectOptions) -> Result<()> {
	let mut conn = PgConnection::connect_with(maintenance).await?;

	sqlx::query(
		"\
SELECT pg_terminate_backend(pid)
FROM pg_stat_activity
WHERE datname = $1 AND pid <> pg_backend_pid()",
	)
	.bind(name)
	.fetch_all(&mut conn)
	.await?;
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}""#).as_str())
		.await
		.map_err(|err| Error::Message(format!("Failed to drop {name}: {err}.")))?;

	Ok(())
}
