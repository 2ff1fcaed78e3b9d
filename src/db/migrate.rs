use crate::db::schema::{ColumnAddition, COLUMN_ADDITIONS, TABLES};
use crate::db::{Database, DbError, Dialect, Statement};
use crate::params;

/// Creates every table that is missing, then adds the columns that older
/// databases lack. Safe to run on every start.
pub async fn ensure_schema(db: &Database) -> Result<(), DbError> {
    let dialect = db.dialect();
    tracing::info!(dialect = %dialect, tables = TABLES.len(), "Ensuring database schema...");

    for table in TABLES {
        db.execute(&Statement::raw(table.create_sql(dialect)), &[])
            .await?;
    }

    for addition in COLUMN_ADDITIONS {
        apply_addition(db, addition).await?;
    }

    tracing::info!("Database schema ready");
    Ok(())
}

async fn apply_addition(db: &Database, addition: &ColumnAddition) -> Result<(), DbError> {
    let column = addition.column.name;

    if column_exists(db, addition.table, column).await? {
        tracing::debug!(table = addition.table, column, "column already present");
        return Ok(());
    }

    let sql = addition.alter_sql(db.dialect());
    match db.execute(&Statement::raw(sql), &[]).await {
        Ok(_) => {
            tracing::info!(table = addition.table, column, "column added");
            Ok(())
        }
        Err(DbError::Sqlx(source)) => Err(DbError::Migration {
            table: addition.table.to_string(),
            column: column.to_string(),
            source,
        }),
        Err(other) => Err(other),
    }
}

pub async fn column_exists(db: &Database, table: &str, column: &str) -> Result<bool, DbError> {
    let probe = match db.dialect() {
        Dialect::Sqlite => Statement::raw("SELECT name FROM pragma_table_info(?)"),
        Dialect::Postgres => Statement::raw(
            "SELECT column_name::text AS name FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name::text = ?",
        ),
    };

    let rows = db.fetch_all(&probe, &params![table]).await?;
    for row in rows {
        if let Some(name) = row.get_string("name")? {
            if name.eq_ignore_ascii_case(column) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
