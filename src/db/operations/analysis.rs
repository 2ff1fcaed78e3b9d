use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, Statement, UpsertOutcome};
use crate::params;

use super::now_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub analysis: String,
    pub timetable: String,
    pub roadmap: String,
    pub timestamp: String,
}

/// Keeps one analysis row per group, replacing the previous one.
pub async fn save_analysis_result(
    db: &Database,
    group_id: i64,
    analysis: &str,
    timetable: &str,
    roadmap: &str,
) -> Result<UpsertOutcome, DbError> {
    let timestamp = now_timestamp();
    let update = Statement::update(
        "analysis_results",
        &["analysis", "timetable", "roadmap", "timestamp"],
    )
    .where_eq("group_id");
    let insert = Statement::insert(
        "analysis_results",
        &["group_id", "analysis", "timetable", "roadmap", "timestamp"],
    );

    db.update_or_insert(
        &update,
        &params![analysis, timetable, roadmap, timestamp.as_str(), group_id],
        &insert,
        &params![group_id, analysis, timetable, roadmap, timestamp.as_str()],
    )
    .await
}

pub async fn latest_analysis(
    db: &Database,
    group_id: i64,
) -> Result<Option<AnalysisRecord>, DbError> {
    let statement = Statement::select(
        "analysis_results",
        &["analysis", "timetable", "roadmap", "timestamp"],
    )
    .where_eq("group_id")
    .order_by("timestamp", SortOrder::Desc)
    .limit(1);

    let Some(row) = db.fetch_optional(&statement, &params![group_id]).await? else {
        return Ok(None);
    };
    Ok(Some(AnalysisRecord {
        analysis: row.get_string("analysis")?.unwrap_or_default(),
        timetable: row.get_string("timetable")?.unwrap_or_default(),
        roadmap: row.get_string("roadmap")?.unwrap_or_default(),
        timestamp: row.get_string("timestamp")?.unwrap_or_default(),
    }))
}
