use serde::Serialize;

use crate::db::{Database, DbError, Statement};
use crate::params;

use super::now_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSyllabus {
    pub syllabus_content: String,
    pub saved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSyllabus {
    pub syllabus_content: String,
    pub ratings: serde_json::Value,
    pub saved_at: Option<String>,
}

/// Returns the timestamp written.
pub async fn save_course_syllabus(
    db: &Database,
    course_id: &str,
    content: &str,
) -> Result<String, DbError> {
    let saved_at = now_timestamp();
    let update = Statement::update("syllabus", &["syllabus_content", "saved_at"]).where_eq("course_id");
    let insert = Statement::insert("syllabus", &["course_id", "syllabus_content", "saved_at"]);

    db.update_or_insert(
        &update,
        &params![content, saved_at.as_str(), course_id],
        &insert,
        &params![course_id, content, saved_at.as_str()],
    )
    .await?;
    Ok(saved_at)
}

pub async fn course_syllabus(
    db: &Database,
    course_id: &str,
) -> Result<Option<CourseSyllabus>, DbError> {
    let statement =
        Statement::select("syllabus", &["syllabus_content", "saved_at"]).where_eq("course_id");
    let Some(row) = db.fetch_optional(&statement, &params![course_id]).await? else {
        return Ok(None);
    };
    Ok(Some(CourseSyllabus {
        syllabus_content: row.get_string("syllabus_content")?.unwrap_or_default(),
        saved_at: row.get_string("saved_at")?,
    }))
}

// syllabus_for_students keys groups by their id rendered as text.
pub async fn save_group_syllabus(
    db: &Database,
    group_id: i64,
    content: &str,
    ratings: &serde_json::Value,
) -> Result<String, DbError> {
    let saved_at = now_timestamp();
    let group_key = group_id.to_string();
    let ratings = ratings.to_string();
    let update = Statement::update(
        "syllabus_for_students",
        &["syllabus_content", "topics_ratings", "saved_at"],
    )
    .where_eq("group_id");
    let insert = Statement::insert(
        "syllabus_for_students",
        &["group_id", "syllabus_content", "topics_ratings", "saved_at"],
    );

    db.update_or_insert(
        &update,
        &params![content, ratings.as_str(), saved_at.as_str(), group_key.as_str()],
        &insert,
        &params![group_key.as_str(), content, ratings.as_str(), saved_at.as_str()],
    )
    .await?;
    Ok(saved_at)
}

pub async fn group_syllabus(db: &Database, group_id: i64) -> Result<Option<GroupSyllabus>, DbError> {
    let statement = Statement::select(
        "syllabus_for_students",
        &["syllabus_content", "topics_ratings", "saved_at"],
    )
    .where_eq("group_id");
    let Some(row) = db
        .fetch_optional(&statement, &params![group_id.to_string()])
        .await?
    else {
        return Ok(None);
    };

    let ratings = row
        .get_string("topics_ratings")?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| serde_json::json!({}));

    Ok(Some(GroupSyllabus {
        syllabus_content: row.get_string("syllabus_content")?.unwrap_or_default(),
        ratings,
        saved_at: row.get_string("saved_at")?,
    }))
}
