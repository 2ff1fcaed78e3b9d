pub mod config;
pub mod migrate;
pub mod operations;
pub mod schema;

mod postgres;
mod sql_text;
mod sqlite;
mod statement;
mod value;

use sqlx::{PgPool, Postgres, Sqlite, SqlitePool, Transaction};
use thiserror::Error;

pub use config::{DbConfig, SqliteConfig, SqliteJournalMode};
pub use schema::{translate_ddl, ColumnAddition, ColumnDef, ColumnType, TableDef};
pub use statement::{Dialect, SortOrder, Statement, StatementKind};
pub use value::{decode_text, ColumnIndex, DbRow, ExecOutcome, SqlValue};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sql error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("statement expects {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("column {column} has unsupported type {type_name}")]
    UnsupportedColumnType { column: String, type_name: String },
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("column {0} is null")]
    UnexpectedNull(String),
    #[error("column {column}: expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("failed to add column {table}.{column}: {source}")]
    Migration {
        table: String,
        column: String,
        #[source]
        source: sqlx::Error,
    },
}

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sql error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("schema error: {0}")]
    Schema(#[from] DbError),
}

/// Outcome of [`Database::update_or_insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated { rows: u64 },
    Inserted { id: Option<i64> },
}

/// Process-wide storage handle over whichever backend won at startup.
///
/// Cloning is cheap; clones share the same bounded pool.
#[derive(Clone)]
pub struct Database {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl Database {
    /// Connects to the server database when one is configured, otherwise (or
    /// when it cannot be reached) opens the embedded file.
    pub async fn connect(config: &DbConfig) -> Result<Self, DbInitError> {
        if let Some(url) = config.server_url.as_deref() {
            match postgres::connect(url, config).await {
                Ok(pool) => {
                    tracing::info!(dialect = %Dialect::Postgres, "database backend selected");
                    return Ok(Self::from_pg_pool(pool));
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %config.sqlite.path.display(),
                        "server database unreachable, falling back to embedded backend"
                    );
                }
            }
        }

        let pool = sqlite::connect(&config.sqlite).await?;
        tracing::info!(
            dialect = %Dialect::Sqlite,
            path = %config.sqlite.path.display(),
            "database backend selected"
        );
        Ok(Self::from_sqlite_pool(pool))
    }

    pub async fn connect_and_migrate(config: &DbConfig) -> Result<Self, DbInitError> {
        let db = Self::connect(config).await?;
        migrate::ensure_schema(&db).await?;
        Ok(db)
    }

    pub fn from_pg_pool(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    pub fn from_sqlite_pool(pool: SqlitePool) -> Self {
        Self {
            backend: Backend::Sqlite(pool),
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self.backend {
            Backend::Postgres(_) => Dialect::Postgres,
            Backend::Sqlite(_) => Dialect::Sqlite,
        }
    }

    pub async fn execute(
        &self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, DbError> {
        check_params(statement, params)?;
        match &self.backend {
            Backend::Postgres(pool) => postgres::execute(pool, statement, params).await,
            Backend::Sqlite(pool) => sqlite::execute(pool, statement, params).await,
        }
    }

    /// Result columns must decode to integer, real, boolean, text, bytes or a
    /// timestamp. Server-side `NUMERIC` is rejected with
    /// [`DbError::UnsupportedColumnType`], so aggregates such as `AVG(int)` or
    /// `SUM(bigint)` need a cast to `DOUBLE PRECISION` or `BIGINT`. The same
    /// holds for [`Database::fetch_optional`] and [`Database::fetch_one`].
    pub async fn fetch_all(
        &self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<Vec<DbRow>, DbError> {
        check_params(statement, params)?;
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_all(pool, statement, params).await,
            Backend::Sqlite(pool) => sqlite::fetch_all(pool, statement, params).await,
        }
    }

    pub async fn fetch_optional(
        &self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<Option<DbRow>, DbError> {
        check_params(statement, params)?;
        match &self.backend {
            Backend::Postgres(pool) => postgres::fetch_optional(pool, statement, params).await,
            Backend::Sqlite(pool) => sqlite::fetch_optional(pool, statement, params).await,
        }
    }

    pub async fn fetch_one(
        &self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<DbRow, DbError> {
        self.fetch_optional(statement, params)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    pub async fn begin(&self) -> Result<Session, DbError> {
        let tx = match &self.backend {
            Backend::Postgres(pool) => SessionTx::Postgres(pool.begin().await?),
            Backend::Sqlite(pool) => SessionTx::Sqlite(pool.begin().await?),
        };
        Ok(Session {
            tx,
            last_insert_id: None,
        })
    }

    /// Runs `update`; when it touched no rows runs `insert`. Both statements
    /// share one transaction. On the server backend two concurrent callers
    /// can still both insert unless the table carries a unique constraint.
    pub async fn update_or_insert(
        &self,
        update: &Statement,
        update_params: &[SqlValue],
        insert: &Statement,
        insert_params: &[SqlValue],
    ) -> Result<UpsertOutcome, DbError> {
        let mut session = self.begin().await?;

        let updated = session.execute(update, update_params).await?;
        let outcome = if updated.rows_affected > 0 {
            UpsertOutcome::Updated {
                rows: updated.rows_affected,
            }
        } else {
            let inserted = session.execute(insert, insert_params).await?;
            UpsertOutcome::Inserted {
                id: inserted.last_insert_id,
            }
        };

        session.commit().await?;
        Ok(outcome)
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.fetch_one(&Statement::raw("SELECT 1"), &[]).await?;
        Ok(())
    }

    pub async fn close(&self) {
        match &self.backend {
            Backend::Postgres(pool) => pool.close().await,
            Backend::Sqlite(pool) => pool.close().await,
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect())
            .finish()
    }
}

/// An explicit transaction. Dropping it without [`Session::commit`] rolls
/// back.
pub struct Session {
    tx: SessionTx,
    last_insert_id: Option<i64>,
}

enum SessionTx {
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl Session {
    pub fn dialect(&self) -> Dialect {
        match self.tx {
            SessionTx::Postgres(_) => Dialect::Postgres,
            SessionTx::Sqlite(_) => Dialect::Sqlite,
        }
    }

    pub async fn execute(
        &mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<ExecOutcome, DbError> {
        check_params(statement, params)?;
        let outcome = match &mut self.tx {
            SessionTx::Postgres(tx) => postgres::execute(&mut **tx, statement, params).await?,
            SessionTx::Sqlite(tx) => sqlite::execute(&mut **tx, statement, params).await?,
        };
        if outcome.last_insert_id.is_some() {
            self.last_insert_id = outcome.last_insert_id;
        }
        Ok(outcome)
    }

    pub async fn fetch_all(
        &mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<Vec<DbRow>, DbError> {
        check_params(statement, params)?;
        match &mut self.tx {
            SessionTx::Postgres(tx) => postgres::fetch_all(&mut **tx, statement, params).await,
            SessionTx::Sqlite(tx) => sqlite::fetch_all(&mut **tx, statement, params).await,
        }
    }

    pub async fn fetch_optional(
        &mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<Option<DbRow>, DbError> {
        check_params(statement, params)?;
        match &mut self.tx {
            SessionTx::Postgres(tx) => postgres::fetch_optional(&mut **tx, statement, params).await,
            SessionTx::Sqlite(tx) => sqlite::fetch_optional(&mut **tx, statement, params).await,
        }
    }

    pub async fn fetch_one(
        &mut self,
        statement: &Statement,
        params: &[SqlValue],
    ) -> Result<DbRow, DbError> {
        self.fetch_optional(statement, params)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))
    }

    /// Key generated by the most recent insert issued through this session.
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    pub async fn commit(self) -> Result<(), DbError> {
        match self.tx {
            SessionTx::Postgres(tx) => tx.commit().await?,
            SessionTx::Sqlite(tx) => tx.commit().await?,
        }
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), DbError> {
        match self.tx {
            SessionTx::Postgres(tx) => tx.rollback().await?,
            SessionTx::Sqlite(tx) => tx.rollback().await?,
        }
        Ok(())
    }
}

fn check_params(statement: &Statement, params: &[SqlValue]) -> Result<(), DbError> {
    let expected = statement.placeholder_count();
    if expected != params.len() {
        return Err(DbError::ParameterCount {
            expected,
            actual: params.len(),
        });
    }
    Ok(())
}
