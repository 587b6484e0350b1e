use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::StorageError;

// ============================================================================
// Database
// ============================================================================

/// SQLite-backed indicator collection.
///
/// A collection lives in a table named after its namespace,
/// `"<database>.<collection>"`, so several logical databases can share one
/// SQLite file. The table itself carries no uniqueness constraint; the unique
/// index on `indicator` is created by [`Database::ensure_unique_index`] so that
/// a failure there never prevents the collection from opening.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
    pub(crate) namespace: String,
}

impl Database {
    /// Open the store and create the collection table if needed.
    ///
    /// `uri` may be a `sqlite:` URL, a file path, or `:memory:`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidName` if `database` or `collection` is not
    /// a plain identifier, `StorageError::Open` if the store cannot be reached,
    /// and `StorageError::Schema` if the collection table cannot be created.
    pub async fn open(uri: &str, database: &str, collection: &str) -> Result<Self, StorageError> {
        for name in [database, collection] {
            if !is_valid_name(name) {
                return Err(StorageError::InvalidName(name.to_string()));
            }
        }

        let in_memory = uri == ":memory:" || uri == "sqlite::memory:";
        let url = if uri.starts_with("sqlite:") {
            uri.to_string()
        } else {
            format!("sqlite:{}?mode=rwc", uri)
        };

        let mut options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::Open)?
            .pragma("busy_timeout", "5000");
        // An explicit `mode=` in the URL wins; otherwise the first run creates the file.
        if !url.contains("mode=") {
            options = options.create_if_missing(true);
        }

        // In-memory stores vanish with their last connection, so pin exactly one.
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(2)
        };

        let pool = pool_options
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::Open)?;

        let db = Self {
            pool,
            namespace: format!("{}.{}", database, collection),
        };
        db.migrate().await?;
        tracing::debug!(namespace = %db.namespace, "Indicator store opened");
        Ok(db)
    }

    /// `"<database>.<collection>"`
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Close every pooled connection.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::debug!(namespace = %self.namespace, "Indicator store closed");
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        let schema_error = |source: sqlx::Error| StorageError::Schema {
            namespace: self.namespace.clone(),
            source,
        };

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{}" (
                id INTEGER PRIMARY KEY,
                source TEXT NOT NULL,
                indicator TEXT NOT NULL,
                ingested_at TEXT NOT NULL
            )
        "#,
            self.namespace
        ))
        .execute(&self.pool)
        .await
        .map_err(schema_error)?;

        Ok(())
    }

    /// Create the unique index on `indicator` (no-op if it exists).
    ///
    /// Fails if the collection already holds duplicate indicators.
    pub async fn ensure_unique_index(&self) -> Result<(), StorageError> {
        sqlx::query(&format!(
            r#"CREATE UNIQUE INDEX IF NOT EXISTS "{ns}.indicator_unique" ON "{ns}"(indicator)"#,
            ns = self.namespace
        ))
        .execute(&self.pool)
        .await
        .map_err(|source| StorageError::Index {
            namespace: self.namespace.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Database and collection names must be plain identifiers because they are
/// interpolated into quoted SQL identifiers.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
