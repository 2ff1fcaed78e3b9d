use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, Statement};
use crate::params;

use super::now_timestamp;

#[derive(Debug, Clone)]
pub struct NewFile<'a> {
    pub group_id: i64,
    pub file_name: &'a str,
    pub file_type: &'a str,
    pub content: &'a [u8],
    /// Text pulled out of binary formats such as PDF, preferred over the raw
    /// content when the group report is assembled.
    pub extracted_text: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
    pub uploaded_at: String,
}

pub async fn insert_file(db: &Database, file: &NewFile<'_>) -> Result<StoredFile, DbError> {
    let uploaded_at = now_timestamp();
    let statement = Statement::insert(
        "files",
        &[
            "group_id",
            "file_name",
            "file_type",
            "file_content",
            "extracted_text",
            "uploaded_at",
        ],
    );
    let outcome = db
        .execute(
            &statement,
            &params![
                file.group_id,
                file.file_name,
                file.file_type,
                file.content,
                file.extracted_text,
                uploaded_at.as_str()
            ],
        )
        .await?;

    Ok(StoredFile {
        id: outcome
            .last_insert_id
            .ok_or_else(|| DbError::UnexpectedNull("files.id".to_string()))?,
        file_name: file.file_name.to_string(),
        file_type: file.file_type.to_string(),
        uploaded_at,
    })
}

pub async fn list_files(db: &Database, group_id: i64) -> Result<Vec<StoredFile>, DbError> {
    let statement = Statement::select("files", &["id", "file_name", "file_type", "uploaded_at"])
        .where_eq("group_id")
        .order_by("id", SortOrder::Asc);

    db.fetch_all(&statement, &params![group_id])
        .await?
        .into_iter()
        .map(|row| {
            Ok(StoredFile {
                id: row
                    .get_i64("id")?
                    .ok_or_else(|| DbError::UnexpectedNull("id".to_string()))?,
                file_name: row.get_string("file_name")?.unwrap_or_default(),
                file_type: row.get_string("file_type")?.unwrap_or_default(),
                uploaded_at: row.get_string("uploaded_at")?.unwrap_or_default(),
            })
        })
        .collect()
}

pub async fn file_content(db: &Database, file_id: i64) -> Result<Option<Vec<u8>>, DbError> {
    let statement = Statement::select("files", &["file_content"]).where_eq("id");
    match db.fetch_optional(&statement, &params![file_id]).await? {
        Some(row) => row.get_bytes("file_content"),
        None => Ok(None),
    }
}

pub async fn delete_file(db: &Database, file_id: i64) -> Result<bool, DbError> {
    let statement = Statement::delete("files").where_eq("id");
    let outcome = db.execute(&statement, &params![file_id]).await?;
    Ok(outcome.rows_affected > 0)
}

pub async fn group_has_files(db: &Database, group_id: i64) -> Result<bool, DbError> {
    let statement =
        Statement::raw("SELECT EXISTS(SELECT 1 FROM files WHERE group_id = ?) AS present");
    let row = db.fetch_one(&statement, &params![group_id]).await?;
    Ok(row.get_bool("present")?.unwrap_or(false))
}

/// Concatenated text of every file in the group, one file per line.
pub async fn group_report_text(db: &Database, group_id: i64) -> Result<String, DbError> {
    let statement = Statement::select("files", &["extracted_text", "file_content"])
        .where_eq("group_id")
        .order_by("id", SortOrder::Asc);
    let rows = db.fetch_all(&statement, &params![group_id]).await?;

    let mut report = String::new();
    for row in rows {
        let text = match row.get_string("extracted_text")? {
            Some(text) if !text.is_empty() => text,
            _ => row.get_text_lossy("file_content")?.unwrap_or_default(),
        };
        report.push_str(&text);
        report.push('\n');
    }
    Ok(report)
}
