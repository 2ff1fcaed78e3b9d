use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgColumn, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, PgPool, Postgres, Row, TypeInfo};

use crate::db::config::DbConfig;
use crate::db::statement::{Dialect, Statement};
use crate::db::value::{DbRow, ExecOutcome, SqlValue};
use crate::db::DbError;

pub(crate) async fn connect(url: &str, config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.server_max_connections.max(1))
        .acquire_timeout(config.acquire_timeout)
        .connect(url)
        .await
}

pub(crate) async fn execute<'c, E>(
    executor: E,
    statement: &Statement,
    params: &[SqlValue],
) -> Result<ExecOutcome, DbError>
where
    E: Executor<'c, Database = Postgres>,
{
    let sql = statement.render(Dialect::Postgres);
    tracing::trace!(dialect = "postgres", sql = %sql, "execute");

    if statement.returns_generated_key(Dialect::Postgres) {
        let rows = bind(sqlx::query(&sql), params).fetch_all(executor).await?;
        let last_insert_id = match rows.first() {
            Some(row) => generated_key(row, statement.key_column())?,
            None => None,
        };
        return Ok(ExecOutcome {
            rows_affected: rows.len() as u64,
            last_insert_id,
        });
    }

    let result = bind(sqlx::query(&sql), params).execute(executor).await?;
    Ok(ExecOutcome {
        rows_affected: result.rows_affected(),
        last_insert_id: None,
    })
}

pub(crate) async fn fetch_all<'c, E>(
    executor: E,
    statement: &Statement,
    params: &[SqlValue],
) -> Result<Vec<DbRow>, DbError>
where
    E: Executor<'c, Database = Postgres>,
{
    let sql = statement.render(Dialect::Postgres);
    tracing::trace!(dialect = "postgres", sql = %sql, "fetch_all");

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
    E: Executor<'c, Database = Postgres>,
{
    let sql = statement.render(Dialect::Postgres);
    tracing::trace!(dialect = "postgres", sql = %sql, "fetch_optional");

    let row = bind(sqlx::query(&sql), params).fetch_optional(executor).await?;
    row.map(|row| decode_row(&row, &column_names(&row))).transpose()
}

fn bind<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
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

fn generated_key(row: &PgRow, key_column: Option<&str>) -> Result<Option<i64>, DbError> {
    let idx = key_column
        .and_then(|key| row.columns().iter().position(|c| c.name() == key))
        .unwrap_or(0);
    let Some(column) = row.columns().get(idx) else {
        return Ok(None);
    };
    Ok(decode_value(row, idx, column)?.as_i64())
}

fn column_names(row: &PgRow) -> Arc<[String]> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn decode_row(row: &PgRow, columns: &Arc<[String]>) -> Result<DbRow, DbError> {
    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| decode_value(row, idx, column))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DbRow::new(Arc::clone(columns), values))
}

// Integers and floats are widened so callers see the same value shape as on
// the embedded backend.
fn decode_value(row: &PgRow, idx: usize, column: &PgColumn) -> Result<SqlValue, DbError> {
    let value = match column.type_info().name() {
        "INT2" => SqlValue::Integer(row.try_get::<Option<i16>, _>(idx)?.map(i64::from)),
        "INT4" => SqlValue::Integer(row.try_get::<Option<i32>, _>(idx)?.map(i64::from)),
        "INT8" => SqlValue::Integer(row.try_get(idx)?),
        "FLOAT4" => SqlValue::Real(row.try_get::<Option<f32>, _>(idx)?.map(f64::from)),
        "FLOAT8" => SqlValue::Real(row.try_get(idx)?),
        "BOOL" => SqlValue::Bool(row.try_get(idx)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" => SqlValue::Text(row.try_get(idx)?),
        "BYTEA" => SqlValue::Blob(row.try_get(idx)?),
        "TIMESTAMPTZ" => SqlValue::Text(
            row.try_get::<Option<DateTime<Utc>>, _>(idx)?
                .map(|t| t.to_rfc3339()),
        ),
        "TIMESTAMP" => SqlValue::Text(
            row.try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        ),
        "DATE" => SqlValue::Text(row.try_get::<Option<NaiveDate>, _>(idx)?.map(|d| d.to_string())),
        other => {
            return Err(DbError::UnsupportedColumnType {
                column: column.name().to_string(),
                type_name: other.to_string(),
            })
        }
    };
    Ok(value)
}
