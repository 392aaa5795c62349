use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Result, schema};

const SCHEMA_LOCK_ID: i64 = 7_120_115;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(cfg: &murmur_config::Postgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}

	/// Builds the pool without opening a connection. The first query connects.
	pub fn connect_lazy(cfg: &murmur_config::Postgres) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect_lazy(&cfg.dsn)?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self, vector_dim: u32) -> Result<()> {
		let sql = schema::render_schema(vector_dim);
		// Advisory locks are per connection. A transaction keeps the lock on one connection and
		// releases it on commit.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(SCHEMA_LOCK_ID).execute(&mut *tx).await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		tracing::info!(vector_dim, "Database schema ensured.");

		Ok(())
	}
}
