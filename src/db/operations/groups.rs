use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, Statement};
use crate::params;

use super::{log_action, now_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileGroup {
    pub id: i64,
    pub group_name: String,
}

pub async fn create_group(db: &Database, user_id: i64, group_name: &str) -> Result<i64, DbError> {
    let statement = Statement::insert("file_groups", &["user_id", "group_name", "created_at"]);
    let outcome = db
        .execute(&statement, &params![user_id, group_name, now_timestamp()])
        .await?;
    let group_id = outcome
        .last_insert_id
        .ok_or_else(|| DbError::UnexpectedNull("file_groups.id".to_string()))?;

    log_action(
        db,
        Some(user_id),
        Some(group_id),
        "create_group",
        &format!("Created group: {group_name}"),
    )
    .await?;

    Ok(group_id)
}

pub async fn list_groups(db: &Database, user_id: i64) -> Result<Vec<FileGroup>, DbError> {
    let statement = Statement::select("file_groups", &["id", "group_name"])
        .where_eq("user_id")
        .order_by("id", SortOrder::Asc);

    db.fetch_all(&statement, &params![user_id])
        .await?
        .into_iter()
        .map(|row| {
            Ok(FileGroup {
                id: row
                    .get_i64("id")?
                    .ok_or_else(|| DbError::UnexpectedNull("id".to_string()))?,
                group_name: row.get_string("group_name")?.unwrap_or_default(),
            })
        })
        .collect()
}
