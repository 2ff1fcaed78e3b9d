use serde::Serialize;

use crate::db::{Database, DbError, SortOrder, SqlValue, Statement};
use crate::params;

use super::now_timestamp;

const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub user_id: i64,
    pub group_id: i64,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub message: String,
    pub timestamp: String,
}

/// Which history table a conversation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannel {
    Text,
    Image,
    Video,
}

impl ChatChannel {
    pub fn table(self) -> &'static str {
        match self {
            ChatChannel::Text => "chat_history",
            ChatChannel::Image => "chat_history_image",
            ChatChannel::Video => "chat_history_video",
        }
    }
}

/// Media reference stored alongside an image or video exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAttachment<'a> {
    None,
    Image { id: &'a str, path: &'a str },
    Video { id: &'a str, url: &'a str },
}

impl ChatAttachment<'_> {
    fn channel(&self) -> ChatChannel {
        match self {
            ChatAttachment::None => ChatChannel::Text,
            ChatAttachment::Image { .. } => ChatChannel::Image,
            ChatAttachment::Video { .. } => ChatChannel::Video,
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            ChatAttachment::None => &[],
            ChatAttachment::Image { .. } => &["image_id", "image_path"],
            ChatAttachment::Video { .. } => &["video_id", "video_url"],
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        match *self {
            ChatAttachment::None => Vec::new(),
            ChatAttachment::Image { id, path } => params![id, path],
            ChatAttachment::Video { id, url } => params![id, url],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatExchange<'a> {
    pub user_id: i64,
    pub group_id: i64,
    pub session_id: &'a str,
    pub attachment: ChatAttachment<'a>,
    pub user_message: &'a str,
    pub assistant_message: &'a str,
}

pub fn new_chat_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn session_title(first_message: &str) -> String {
    let mut title: String = first_message.chars().take(TITLE_CHARS).collect();
    if first_message.chars().count() > TITLE_CHARS {
        title.push_str("...");
    }
    title
}

/// Creates the session on first use. Returns whether it was created.
pub async fn ensure_chat_session(
    db: &Database,
    session_id: &str,
    user_id: i64,
    group_id: i64,
    first_message: &str,
) -> Result<bool, DbError> {
    let lookup = Statement::select("chat_sessions", &["id"]).where_eq("id");
    if db.fetch_optional(&lookup, &params![session_id]).await?.is_some() {
        return Ok(false);
    }

    let insert = Statement::insert(
        "chat_sessions",
        &["id", "user_id", "group_id", "title", "created_at"],
    )
    .without_generated_key();
    db.execute(
        &insert,
        &params![
            session_id,
            user_id,
            group_id,
            session_title(first_message),
            now_timestamp()
        ],
    )
    .await?;
    Ok(true)
}

pub async fn list_chat_sessions(
    db: &Database,
    user_id: i64,
    group_id: i64,
) -> Result<Vec<ChatSession>, DbError> {
    let statement = Statement::select(
        "chat_sessions",
        &["id", "user_id", "group_id", "title", "created_at"],
    )
    .where_eq("user_id")
    .where_eq("group_id")
    .order_by("created_at", SortOrder::Desc);

    db.fetch_all(&statement, &params![user_id, group_id])
        .await?
        .into_iter()
        .map(|row| {
            Ok(ChatSession {
                id: row.get_string("id")?.unwrap_or_default(),
                user_id: row.get_i64("user_id")?.unwrap_or_default(),
                group_id: row.get_i64("group_id")?.unwrap_or_default(),
                title: row.get_string("title")?.unwrap_or_default(),
                created_at: row.get_string("created_at")?.unwrap_or_default(),
            })
        })
        .collect()
}

/// Stores the user turn and the assistant reply together.
pub async fn append_chat_exchange(db: &Database, exchange: &ChatExchange<'_>) -> Result<(), DbError> {
    let attachment = exchange.attachment;
    let mut columns = vec!["user_id", "group_id", "session_id"];
    columns.extend_from_slice(attachment.columns());
    columns.extend_from_slice(&["role", "message", "timestamp"]);
    let statement = Statement::insert(attachment.channel().table(), &columns);

    let timestamp = now_timestamp();
    let mut session = db.begin().await?;
    for (role, message) in [
        ("user", exchange.user_message),
        ("assistant", exchange.assistant_message),
    ] {
        let mut values = params![exchange.user_id, exchange.group_id, exchange.session_id];
        values.extend(attachment.values());
        values.extend(params![role, message, timestamp.as_str()]);
        session.execute(&statement, &values).await?;
    }
    session.commit().await
}

/// Messages of one session, or the legacy session-less history when
/// `session_id` is `None`.
pub async fn chat_history(
    db: &Database,
    channel: ChatChannel,
    user_id: i64,
    group_id: i64,
    session_id: Option<&str>,
) -> Result<Vec<ChatMessage>, DbError> {
    let table = channel.table();
    let (statement, values) = match session_id {
        Some(session_id) => (
            Statement::raw(format!(
                "SELECT role, message, timestamp FROM {table} \
                 WHERE user_id = ? AND group_id = ? AND session_id = ? ORDER BY timestamp, id"
            )),
            params![user_id, group_id, session_id],
        ),
        None => (
            Statement::raw(format!(
                "SELECT role, message, timestamp FROM {table} \
                 WHERE user_id = ? AND group_id = ? AND session_id IS NULL ORDER BY timestamp, id"
            )),
            params![user_id, group_id],
        ),
    };

    db.fetch_all(&statement, &values)
        .await?
        .into_iter()
        .map(|row| {
            Ok(ChatMessage {
                role: row.get_string("role")?.unwrap_or_default(),
                message: row.get_string("message")?.unwrap_or_default(),
                timestamp: row.get_string("timestamp")?.unwrap_or_default(),
            })
        })
        .collect()
}
