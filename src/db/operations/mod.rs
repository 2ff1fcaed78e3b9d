pub mod analysis;
pub mod chat;
pub mod files;
pub mod groups;
pub mod quiz;
pub mod session_log;
pub mod syllabus;

pub use analysis::*;
pub use chat::*;
pub use files::*;
pub use groups::*;
pub use quiz::*;
pub use session_log::*;
pub use syllabus::*;

use chrono::{SecondsFormat, Utc};

/// Timestamp format shared by every table: RFC 3339, UTC, microseconds, so
/// text ordering matches time ordering.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
