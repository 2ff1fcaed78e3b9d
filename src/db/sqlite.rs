use std::sync::Arc;

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, SqlitePool, TypeInfo, ValueRef};

use crate::db::config::SqliteConfig;
use crate::db::statement::{Dialect, Statement, StatementKind};
use crate::db::value::{DbRow, ExecOutcome, SqlValue};
use crate::db::{DbError, DbInitError};

pub(crate) async fn connect(config: &SqliteConfig) -> Result<SqlitePool, DbInitError> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pooled connections may be used from any worker thread.
    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(config.journal_mode.to_sqlx())
        .busy_timeout(config.busy_timeout)
        .foreign_keys(config.foreign_keys);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await?;

    Ok(pool)
}

pub(crate) async fn execute<'c, E>(
    executor: E,
    statement: &Statement,
    params: &[SqlValue],
) -> Result<ExecOutcome, DbError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = statement.render(Dialect::Sqlite);
    tracing::trace!(dialect = "sqlite", sql = %sql, "execute");

    let result = bind(sqlx::query(&sql), params).execute(executor).await?;
    // A conflicting insert writes no row, and caller-keyed tables have no
    // generated key to report.
    let last_insert_id = (statement.kind() == StatementKind::Insert
        && statement.key_column().is_some()
        && result.rows_affected() > 0)
        .then(|| result.last_insert_rowid());

    Ok(ExecOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id,
    })
}

pub(crate) async fn fetch_all<'c, E>(
    executor: E,
    statement: &Statement,
    params: &[SqlValue],
) -> Result<Vec<DbRow>, DbError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = statement.render(Dialect::Sqlite);
    tracing::trace!(dialect = "sqlite", sql = %sql, "fetch_all");

    let rows = bind(sqlx::query(&sql), params).fetch_all(executor).await?;
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns = column_names(first);
    rows.iter().map(|row| decode_row(row, &columns)).collect()
}

pub(crate) async fn fetch_optional<'c, E>(
    executor: E,
    statement: &Statement,
    params: &[SqlValue],
) -> Result<Option<DbRow>, DbError>
where
    E: Executor<'c, Database = Sqlite>,
{
    let sql = statement.render(Dialect::Sqlite);
    tracing::trace!(dialect = "sqlite", sql = %sql, "fetch_optional");

    let row = bind(sqlx::query(&sql), params).fetch_optional(executor).await?;
    row.map(|row| decode_row(&row, &column_names(&row))).transpose()
}

fn bind<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &'q [SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Integer(v) => query.bind(*v),
            SqlValue::Real(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_deref()),
            SqlValue::Blob(v) => query.bind(v.as_deref()),
            SqlValue::Bool(v) => query.bind(*v),
        };
    }
    query
}

fn column_names(row: &SqliteRow) -> Arc<[String]> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

// Storage class comes from the value itself; the declared column type only
// decides how a NULL is typed.
fn decode_row(row: &SqliteRow, columns: &Arc<[String]>) -> Result<DbRow, DbError> {
    let mut values = Vec::with_capacity(columns.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            typed_null(column.type_info().name())
        } else {
            let storage = raw.type_info().name().to_string();
            match storage.as_str() {
                "INTEGER" | "BOOLEAN" => SqlValue::Integer(Some(row.try_get(idx)?)),
                "REAL" | "NUMERIC" => SqlValue::Real(Some(row.try_get(idx)?)),
                "BLOB" => SqlValue::Blob(Some(row.try_get(idx)?)),
                _ => SqlValue::Text(Some(row.try_get(idx)?)),
            }
        };
        values.push(value);
    }

    Ok(DbRow::new(Arc::clone(columns), values))
}

fn typed_null(declared: &str) -> SqlValue {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => SqlValue::Integer(None),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => SqlValue::Real(None),
        "BLOB" => SqlValue::Blob(None),
        _ => SqlValue::Text(None),
    }
}
