//! Disposable Postgres databases for integration tests.
//!
//! Each [`TestDatabase`] is a uniquely named database created next to the one `MURMUR_PG_DSN`
//! points at. It is dropped on [`TestDatabase::cleanup`] or, failing that, when the value goes out
//! of scope.

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use uuid::Uuid;

pub const DSN_ENV: &str = "MURMUR_PG_DSN";

/// Databases that accept `CREATE DATABASE` on a stock server, tried in order.
const ADMIN_DATABASES: [&str; 2] = ["postgres", "template1"];

pub struct TestDatabase {
	name: String,
	dsn: String,
	admin: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	pub async fn new(base_dsn: &str) -> Result<Self> {
		let base = PgConnectOptions::from_str(base_dsn).map_err(|source| Error::InvalidDsn { source })?;
		let (admin, mut conn) = admin_connection(&base).await?;
		let name = format!("murmur_test_{}", Uuid::new_v4().simple());

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await.map_err(|source| {
			Error::Database { action: "create", name: name.clone(), source }
		})?;

		let dsn = base.database(&name).to_url_lossy().to_string();

		Ok(Self { name, dsn, admin, dropped: false })
	}

	pub fn dsn(&self) -> &str {
		&self.dsn
	}

	/// Drops the database. Open pools on it are disconnected.
	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.name, &self.admin).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let name = self.name.clone();
		let admin = self.admin.clone();
		// The test's runtime may be shutting down, so the drop gets a thread and runtime of its own.
		let outcome = thread::spawn(move || {
			tokio::runtime::Builder::new_current_thread()
				.enable_all()
				.build()
				.map_err(|err| err.to_string())?
				.block_on(drop_database(&name, &admin))
				.map_err(|err| err.to_string())
		})
		.join();

		match outcome {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Test database cleanup failed: {err}"),
			Err(_) => eprintln!("Test database cleanup panicked."),
		}
	}
}

/// The base DSN, or `None` when Postgres-backed tests should skip.
pub fn env_dsn() -> Option<String> {
	env::var(DSN_ENV).ok().filter(|dsn| !dsn.trim().is_empty())
}

async fn admin_connection(base: &PgConnectOptions) -> Result<(PgConnectOptions, PgConnection)> {
	let mut last = None;

	for database in ADMIN_DATABASES {
		let options = base.clone().database(database);

		match PgConnection::connect_with(&options).await {
			Ok(conn) => return Ok((options, conn)),
			Err(err) => last = Some(err),
		}
	}

	let source = last.unwrap_or(sqlx::Error::PoolClosed);

	Err(Error::AdminUnreachable { tried: ADMIN_DATABASES.join(", "), source })
}

async fn drop_database(name: &str, admin: &PgConnectOptions) -> Result<()> {
	let database_error =
		|source| Error::Database { action: "drop", name: name.to_string(), source };
	let mut conn = PgConnection::connect_with(admin).await.map_err(database_error)?;

	// `WITH (FORCE)` terminates sessions still attached to the database (Postgres 13+).
	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str())
		.await
		.map_err(database_error)?;

	Ok(())
}
