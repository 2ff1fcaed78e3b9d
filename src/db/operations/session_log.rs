use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, Statement};
use crate::params;

use super::now_timestamp;

#[derive(Debug, Clone, Serialize)]
pub struct ActionLogEntry {
    pub user_id: Option<i64>,
    pub group_id: Option<i64>,
    pub action: String,
    pub timestamp: String,
    pub details: String,
}

pub async fn log_action(
    db: &Database,
    user_id: Option<i64>,
    group_id: Option<i64>,
    action: &str,
    details: &str,
) -> Result<(), DbError> {
    let statement = Statement::insert(
        "session_history",
        &["user_id", "group_id", "action", "timestamp", "details"],
    );
    db.execute(
        &statement,
        &params![user_id, group_id, action, now_timestamp(), details],
    )
    .await?;
    Ok(())
}

pub async fn user_actions(db: &Database, user_id: i64) -> Result<Vec<ActionLogEntry>, DbError> {
    let statement = Statement::select(
        "session_history",
        &["user_id", "group_id", "action", "timestamp", "details"],
    )
    .where_eq("user_id")
    .order_by("timestamp", SortOrder::Asc);

    db.fetch_all(&statement, &params![user_id])
        .await?
        .into_iter()
        .map(|row| {
            Ok(ActionLogEntry {
                user_id: row.get_i64("user_id")?,
                group_id: row.get_i64("group_id")?,
                action: row.get_string("action")?.unwrap_or_default(),
                timestamp: row.get_string("timestamp")?.unwrap_or_default(),
                details: row.get_string("details")?.unwrap_or_default(),
            })
        })
        .collect()
}
