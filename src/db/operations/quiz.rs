use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, Statement};
use crate::params;

use super::{log_action, now_timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizResultRecord {
    pub subject: String,
    pub quiz_date: String,
    pub total_marks: f64,
    pub details: serde_json::Value,
}

pub async fn save_quiz_result(
    db: &Database,
    user_id: i64,
    group_id: i64,
    subject: &str,
    marks: &[f64],
    details: &serde_json::Value,
) -> Result<i64, DbError> {
    let total_marks: f64 = marks.iter().sum();
    let statement = Statement::insert(
        "quiz_results",
        &["user_id", "group_id", "subject", "quiz_date", "total_marks", "details"],
    );
    let outcome = db
        .execute(
            &statement,
            &params![
                user_id,
                group_id,
                subject,
                now_timestamp(),
                total_marks,
                details.to_string()
            ],
        )
        .await?;
    let id = outcome
        .last_insert_id
        .ok_or_else(|| DbError::UnexpectedNull("quiz_results.id".to_string()))?;

    log_action(
        db,
        Some(user_id),
        Some(group_id),
        "quiz",
        &format!("Quiz on {subject} scored {total_marks}"),
    )
    .await?;

    Ok(id)
}

pub async fn list_quiz_results(
    db: &Database,
    user_id: i64,
    group_id: i64,
) -> Result<Vec<QuizResultRecord>, DbError> {
    let statement = Statement::select(
        "quiz_results",
        &["subject", "quiz_date", "total_marks", "details"],
    )
    .where_eq("user_id")
    .where_eq("group_id")
    .order_by("quiz_date", SortOrder::Asc);

    db.fetch_all(&statement, &params![user_id, group_id])
        .await?
        .into_iter()
        .map(|row| {
            let details = row
                .get_string("details")?
                .and_then(|raw| serde_json::from_str(&raw).ok())
                .unwrap_or_else(|| serde_json::json!({}));
            Ok(QuizResultRecord {
                subject: row.get_string("subject")?.unwrap_or_default(),
                quiz_date: row.get_string("quiz_date")?.unwrap_or_default(),
                total_marks: row.get_f64("total_marks")?.unwrap_or_default(),
                details,
            })
        })
        .collect()
}
