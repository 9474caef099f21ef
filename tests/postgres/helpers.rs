//! Shared helpers for `PostgreSQL` integration tests.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use eyre::Result;
use pg_embedded_setup_unpriv::TestCluster;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Connection pool handed to both repositories.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// SQL creating the planning schema.
pub const PLANNING_SQL: &str =
    include_str!("../../migrations/2026-01-10-000000_create_planning/up.sql");

/// SQL creating the sync schema.
pub const SYNC_SQL: &str = include_str!("../../migrations/2026-01-17-000000_create_sync/up.sql");

/// Template database name for the pre-migrated schema.
pub const TEMPLATE_DB: &str = "plansync_test_template";

/// Creates a multi-threaded runtime so concurrent repository calls really
/// run side by side.
///
/// # Errors
///
/// Returns an error if the runtime cannot be built.
pub fn test_runtime() -> Result<Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?)
}

/// Ensures the template database exists with both migrations applied.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub fn ensure_template(cluster: &TestCluster) -> Result<()> {
    cluster
        .ensure_template_exists(TEMPLATE_DB, |db_name| {
            let url = cluster.connection().database_url(db_name);
            let mut conn = PgConnection::establish(&url).map_err(|e| eyre::eyre!("{e}"))?;
            conn.batch_execute(PLANNING_SQL)
                .map_err(|e| eyre::eyre!("planning schema: {e}"))?;
            conn.batch_execute(SYNC_SQL)
                .map_err(|e| eyre::eyre!("sync schema: {e}"))?;
            Ok(())
        })?;
    Ok(())
}

/// Per-test database cloned from the template and dropped with the guard.
///
/// Declare the guard before anything holding a pool so the pool closes its
/// connections first.
pub struct TestDatabase {
    cluster: &'static TestCluster,
    name: String,
}

impl TestDatabase {
    /// Clones the template into a fresh database named after `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if the template or the database cannot be created.
    pub fn create(cluster: &'static TestCluster, prefix: &str) -> Result<Self> {
        ensure_template(cluster)?;
        let name = format!("{prefix}_{}", Uuid::new_v4().simple());
        cluster.create_database_from_template(name.as_str(), TEMPLATE_DB)?;
        Ok(Self { cluster, name })
    }

    /// Connection URL of the database.
    #[must_use]
    pub fn url(&self) -> String {
        self.cluster.connection().database_url(&self.name)
    }

    /// Builds a pool with room for `max_size` concurrent transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot connect.
    pub fn pool(&self, max_size: u32) -> Result<PgPool> {
        Ok(Pool::builder()
            .max_size(max_size)
            .build(ConnectionManager::<PgConnection>::new(self.url()))?)
    }

    /// Opens a direct connection for raw SQL.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub fn connect(&self) -> Result<PgConnection> {
        Ok(PgConnection::establish(&self.url())?)
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if let Err(e) = self.cluster.drop_database(self.name.as_str()) {
            eprintln!("Warning: failed to drop test database {}: {e}", self.name);
        }
    }
}
