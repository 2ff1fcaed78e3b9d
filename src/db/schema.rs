use crate::db::sql_text::{self, Token};
use crate::db::statement::Dialect;

/// Column types of the canonical (embedded) DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    AutoIncrementKey,
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    pub fn canonical_sql(self) -> &'static str {
        match self {
            ColumnType::AutoIncrementKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    /// Trailing constraint text, e.g. `UNIQUE` or `REFERENCES users(id)`.
    pub constraints: &'static str,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            constraints: "",
        }
    }

    pub const fn with(mut self, constraints: &'static str) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn canonical_sql(&self) -> String {
        if self.constraints.is_empty() {
            format!("{} {}", self.name, self.ty.canonical_sql())
        } else {
            format!("{} {} {}", self.name, self.ty.canonical_sql(), self.constraints)
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableDef {
    pub fn canonical_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDef::canonical_sql)
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, columns)
    }

    pub fn create_sql(&self, dialect: Dialect) -> String {
        let sql = self.canonical_sql();
        match dialect {
            Dialect::Sqlite => sql,
            Dialect::Postgres => translate_ddl(&sql),
        }
    }
}

/// A column added to a table that may predate it.
#[derive(Debug, Clone, Copy)]
pub struct ColumnAddition {
    pub table: &'static str,
    pub column: ColumnDef,
}

impl ColumnAddition {
    pub fn alter_sql(&self, dialect: Dialect) -> String {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.table,
            self.column.canonical_sql()
        );
        match dialect {
            Dialect::Sqlite => sql,
            Dialect::Postgres => translate_ddl(&sql),
        }
    }
}

/// Rewrites embedded-engine type tokens to their server equivalents.
///
/// Works on the token stream, so quoted identifiers, literals and comments
/// are never touched.
pub fn translate_ddl(sql: &str) -> String {
    let tokens = sql_text::tokenize(sql);
    let mut out = String::with_capacity(sql.len() + 16);
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];

        if token.is_keyword("INTEGER") {
            if let Some(end) = autoincrement_key_end(&tokens, i) {
                out.push_str("SERIAL PRIMARY KEY");
                i = end + 1;
                continue;
            }
        }

        if token.is_keyword("AUTOINCREMENT") {
            let kept = out.trim_end().len();
            out.truncate(kept);
        } else if token.is_keyword("BLOB") {
            out.push_str("BYTEA");
        } else if token.is_keyword("REAL") {
            out.push_str("DOUBLE PRECISION");
        } else {
            out.push_str(token.text());
        }
        i += 1;
    }

    out
}

// Index of the AUTOINCREMENT token when `INTEGER PRIMARY KEY AUTOINCREMENT`
// starts at `start`.
fn autoincrement_key_end(tokens: &[Token<'_>], start: usize) -> Option<usize> {
    let mut index = start;
    for expected in ["PRIMARY", "KEY", "AUTOINCREMENT"] {
        let (next, word) = sql_text::next_word_after(tokens, index)?;
        if !word.eq_ignore_ascii_case(expected) {
            return None;
        }
        index = next;
    }
    Some(index)
}

use ColumnType::{AutoIncrementKey, Blob, Integer, Real, Text};

const fn col(name: &'static str, ty: ColumnType) -> ColumnDef {
    ColumnDef::new(name, ty)
}

/// Every table the application uses, in creation order.
pub const TABLES: &[TableDef] = &[
    TableDef {
        name: "admin_users",
        columns: &[
            col("id", AutoIncrementKey),
            col("username", Text).with("UNIQUE"),
            col("email", Text),
            col("password", Text),
            col("admin_code", Text).with("UNIQUE"),
        ],
    },
    TableDef {
        name: "users",
        columns: &[
            col("id", AutoIncrementKey),
            col("username", Text).with("UNIQUE"),
            col("password", Text),
            col("course_id", Text),
            col("education_level", Text),
            col("admin_id", Integer).with("REFERENCES admin_users(id)"),
        ],
    },
    TableDef {
        name: "admin_otp",
        columns: &[col("code", Text).with("PRIMARY KEY"), col("created_at", Text)],
    },
    TableDef {
        name: "file_groups",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_name", Text),
            col("created_at", Text),
        ],
    },
    TableDef {
        name: "files",
        columns: &[
            col("id", AutoIncrementKey),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("file_name", Text),
            col("file_type", Text),
            col("file_content", Blob),
            col("extracted_text", Text),
            col("uploaded_at", Text),
        ],
    },
    TableDef {
        name: "syllabus",
        columns: &[
            col("id", AutoIncrementKey),
            col("course_id", Text),
            col("syllabus_content", Text),
            col("saved_at", Text),
        ],
    },
    TableDef {
        name: "syllabus_for_students",
        columns: &[
            col("id", AutoIncrementKey),
            col("group_id", Text),
            col("syllabus_content", Text),
            col("topics_ratings", Text),
            col("saved_at", Text),
        ],
    },
    TableDef {
        name: "analysis_results",
        columns: &[
            col("id", AutoIncrementKey),
            col("group_id", Integer).with("UNIQUE REFERENCES file_groups(id)"),
            col("analysis", Text),
            col("timetable", Text),
            col("roadmap", Text),
            col("timestamp", Text),
        ],
    },
    TableDef {
        name: "chat_sessions",
        columns: &[
            col("id", Text).with("PRIMARY KEY"),
            col("user_id", Integer),
            col("group_id", Integer),
            col("title", Text),
            col("created_at", Text),
        ],
    },
    TableDef {
        name: "chat_history",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("session_id", Text).with("REFERENCES chat_sessions(id)"),
            col("role", Text),
            col("message", Text),
            col("timestamp", Text),
        ],
    },
    TableDef {
        name: "chat_history_image",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("session_id", Text).with("REFERENCES chat_sessions(id)"),
            col("image_id", Text),
            col("image_path", Text),
            col("role", Text),
            col("message", Text),
            col("timestamp", Text),
        ],
    },
    TableDef {
        name: "chat_history_video",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("session_id", Text).with("REFERENCES chat_sessions(id)"),
            col("video_id", Text),
            col("video_url", Text),
            col("role", Text),
            col("message", Text),
            col("timestamp", Text),
        ],
    },
    TableDef {
        name: "session_history",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("action", Text),
            col("timestamp", Text),
            col("details", Text),
        ],
    },
    TableDef {
        name: "quiz_results",
        columns: &[
            col("id", AutoIncrementKey),
            col("user_id", Integer).with("REFERENCES users(id)"),
            col("group_id", Integer).with("REFERENCES file_groups(id)"),
            col("subject", Text),
            col("quiz_date", Text),
            col("total_marks", Real),
            col("details", Text),
        ],
    },
];

/// Columns introduced after their table first shipped.
pub const COLUMN_ADDITIONS: &[ColumnAddition] = &[
    ColumnAddition {
        table: "users",
        column: col("admin_id", Integer).with("REFERENCES admin_users(id)"),
    },
    ColumnAddition {
        table: "chat_history",
        column: col("session_id", Text),
    },
    ColumnAddition {
        table: "chat_history_image",
        column: col("session_id", Text),
    },
    ColumnAddition {
        table: "chat_history_video",
        column: col("session_id", Text),
    },
    ColumnAddition {
        table: "files",
        column: col("extracted_text", Text),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_autoincrement_key() {
        let sql = "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, n INTEGER)";
        assert_eq!(
            translate_ddl(sql),
            "CREATE TABLE t (id SERIAL PRIMARY KEY, n INTEGER)"
        );
    }

    #[test]
    fn test_translate_blob_and_real() {
        let sql = "CREATE TABLE t (data BLOB, score REAL)";
        assert_eq!(
            translate_ddl(sql),
            "CREATE TABLE t (data BYTEA, score DOUBLE PRECISION)"
        );
    }

    #[test]
    fn test_translate_keeps_quoted_and_comment_text() {
        let sql = "CREATE TABLE t (\"REAL\" TEXT DEFAULT 'BLOB' -- REAL\n)";
        assert_eq!(translate_ddl(sql), sql);
    }

    #[test]
    fn test_translate_drops_stray_autoincrement() {
        let sql = "CREATE TABLE t (id INTEGER NOT NULL AUTOINCREMENT)";
        assert_eq!(translate_ddl(sql), "CREATE TABLE t (id INTEGER NOT NULL)");
    }

    #[test]
    fn test_translate_is_case_insensitive() {
        let sql = "create table t (id integer primary key autoincrement, b blob)";
        assert_eq!(
            translate_ddl(sql),
            "create table t (id SERIAL PRIMARY KEY, b BYTEA)"
        );
    }

    #[test]
    fn test_create_sql_per_dialect() {
        let table = TABLES.iter().find(|t| t.name == "quiz_results").unwrap();
        let sqlite = table.create_sql(Dialect::Sqlite);
        let postgres = table.create_sql(Dialect::Postgres);

        assert!(sqlite.starts_with("CREATE TABLE IF NOT EXISTS quiz_results"));
        assert!(sqlite.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sqlite.contains("total_marks REAL"));
        assert!(postgres.contains("id SERIAL PRIMARY KEY"));
        assert!(postgres.contains("total_marks DOUBLE PRECISION"));
        assert!(!postgres.contains("AUTOINCREMENT"));
    }

    #[test]
    fn test_alter_sql() {
        let addition = COLUMN_ADDITIONS[0];
        assert_eq!(
            addition.alter_sql(Dialect::Sqlite),
            "ALTER TABLE users ADD COLUMN admin_id INTEGER REFERENCES admin_users(id)"
        );
    }

    #[test]
    fn test_additions_target_known_tables() {
        for addition in COLUMN_ADDITIONS {
            let table = TABLES.iter().find(|t| t.name == addition.table);
            assert!(table.is_some(), "unknown table {}", addition.table);
        }
    }
}
