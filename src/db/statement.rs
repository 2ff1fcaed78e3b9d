use std::fmt;

use crate::db::sql_text::{self, Token};

/// SQL engine behind the active connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Embedded single-file engine (SQLite).
    Sqlite,
    /// Client/server engine (PostgreSQL).
    Postgres,
}

impl Dialect {
    pub const fn as_str(self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    Ddl,
    Other,
}

impl StatementKind {
    fn from_keyword(keyword: Option<&str>) -> Self {
        match keyword {
            Some("INSERT") => StatementKind::Insert,
            Some("UPDATE") => StatementKind::Update,
            Some("DELETE") => StatementKind::Delete,
            Some("SELECT") => StatementKind::Select,
            Some("CREATE") | Some("ALTER") | Some("DROP") => StatementKind::Ddl,
            _ => StatementKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

const DEFAULT_KEY_COLUMN: &str = "id";

/// A statement written once with `?` placeholders and rendered per dialect.
///
/// Builder statements (`insert`, `update`, `select`, `delete`) are rendered
/// straight from their parts. `raw` statements are rewritten token by token,
/// so `?` inside literals, quoted identifiers or comments is left untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    body: Body,
    key_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Body {
    Raw(String),
    Insert {
        table: String,
        columns: Vec<String>,
    },
    Update {
        table: String,
        set: Vec<String>,
        filter: Vec<String>,
    },
    Select {
        table: String,
        columns: Vec<String>,
        filter: Vec<String>,
        order_by: Option<(String, SortOrder)>,
        limit: Option<u64>,
    },
    Delete {
        table: String,
        filter: Vec<String>,
    },
}

impl Statement {
    pub fn raw(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = StatementKind::from_keyword(sql_text::leading_keyword(&sql).as_deref());
        let key_column = (kind == StatementKind::Insert).then(|| DEFAULT_KEY_COLUMN.to_string());
        Self {
            kind,
            body: Body::Raw(sql),
            key_column,
        }
    }

    pub fn insert(table: &str, columns: &[&str]) -> Self {
        Self {
            kind: StatementKind::Insert,
            body: Body::Insert {
                table: table.to_string(),
                columns: owned(columns),
            },
            key_column: Some(DEFAULT_KEY_COLUMN.to_string()),
        }
    }

    pub fn update(table: &str, set: &[&str]) -> Self {
        Self {
            kind: StatementKind::Update,
            body: Body::Update {
                table: table.to_string(),
                set: owned(set),
                filter: Vec::new(),
            },
            key_column: None,
        }
    }

    pub fn select(table: &str, columns: &[&str]) -> Self {
        Self {
            kind: StatementKind::Select,
            body: Body::Select {
                table: table.to_string(),
                columns: owned(columns),
                filter: Vec::new(),
                order_by: None,
                limit: None,
            },
            key_column: None,
        }
    }

    pub fn delete(table: &str) -> Self {
        Self {
            kind: StatementKind::Delete,
            body: Body::Delete {
                table: table.to_string(),
                filter: Vec::new(),
            },
            key_column: None,
        }
    }

    /// Adds `column = ?` to the WHERE clause. Conditions are joined with AND.
    /// Ignored for statements without a WHERE clause of their own.
    pub fn where_eq(mut self, column: &str) -> Self {
        match &mut self.body {
            Body::Update { filter, .. }
            | Body::Select { filter, .. }
            | Body::Delete { filter, .. } => filter.push(column.to_string()),
            Body::Raw(_) | Body::Insert { .. } => {
                debug_assert!(false, "where_eq on a statement without a filter");
            }
        }
        self
    }

    pub fn order_by(mut self, column: &str, order: SortOrder) -> Self {
        if let Body::Select { order_by, .. } = &mut self.body {
            *order_by = Some((column.to_string(), order));
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        if let Body::Select { limit, .. } = &mut self.body {
            *limit = Some(n);
        }
        self
    }

    /// Column returned as the generated key on the server dialect.
    pub fn returning_key(mut self, column: &str) -> Self {
        if self.kind == StatementKind::Insert {
            self.key_column = Some(column.to_string());
        }
        self
    }

    /// For inserts into tables whose key is supplied by the caller.
    pub fn without_generated_key(mut self) -> Self {
        self.key_column = None;
        self
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn key_column(&self) -> Option<&str> {
        self.key_column.as_deref()
    }

    pub fn placeholder_count(&self) -> usize {
        match &self.body {
            Body::Raw(sql) => sql_text::count_placeholders(sql),
            Body::Insert { columns, .. } => columns.len(),
            Body::Update { set, filter, .. } => set.len() + filter.len(),
            Body::Select { filter, .. } | Body::Delete { filter, .. } => filter.len(),
        }
    }

    /// Whether executing this statement on `dialect` yields a result row
    /// carrying the generated key.
    pub fn returns_generated_key(&self, dialect: Dialect) -> bool {
        if dialect != Dialect::Postgres || self.kind != StatementKind::Insert {
            return false;
        }
        match &self.body {
            Body::Raw(sql) => {
                self.key_column.is_some()
                    || sql_text::contains_keyword(&sql_text::tokenize(sql), "RETURNING")
            }
            _ => self.key_column.is_some(),
        }
    }

    pub fn render(&self, dialect: Dialect) -> String {
        let mut placeholders = Placeholders::new(dialect);
        match &self.body {
            Body::Raw(sql) => self.render_raw(sql, dialect),
            Body::Insert { table, columns } => {
                let cols = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>();
                let values = columns.iter().map(|_| placeholders.next()).collect::<Vec<_>>();
                let mut sql = format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(table),
                    cols.join(", "),
                    values.join(", ")
                );
                if let (Dialect::Postgres, Some(key)) = (dialect, self.key_column.as_deref()) {
                    sql.push_str(" RETURNING ");
                    sql.push_str(&quote_ident(key));
                }
                sql
            }
            Body::Update { table, set, filter } => {
                let assignments = set
                    .iter()
                    .map(|c| format!("{} = {}", quote_ident(c), placeholders.next()))
                    .collect::<Vec<_>>();
                let mut sql = format!("UPDATE {} SET {}", quote_ident(table), assignments.join(", "));
                push_filter(&mut sql, filter, &mut placeholders);
                sql
            }
            Body::Select {
                table,
                columns,
                filter,
                order_by,
                limit,
            } => {
                let cols = if columns.is_empty() {
                    "*".to_string()
                } else {
                    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
                };
                let mut sql = format!("SELECT {} FROM {}", cols, quote_ident(table));
                push_filter(&mut sql, filter, &mut placeholders);
                if let Some((column, order)) = order_by {
                    let dir = match order {
                        SortOrder::Asc => "ASC",
                        SortOrder::Desc => "DESC",
                    };
                    sql.push_str(&format!(" ORDER BY {} {}", quote_ident(column), dir));
                }
                if let Some(n) = limit {
                    sql.push_str(&format!(" LIMIT {n}"));
                }
                sql
            }
            Body::Delete { table, filter } => {
                let mut sql = format!("DELETE FROM {}", quote_ident(table));
                push_filter(&mut sql, filter, &mut placeholders);
                sql
            }
        }
    }

    fn render_raw(&self, sql: &str, dialect: Dialect) -> String {
        if dialect == Dialect::Sqlite {
            return sql.to_string();
        }

        let mut tokens = sql_text::tokenize(sql);
        let append_returning = self.kind == StatementKind::Insert
            && self.key_column.is_some()
            && !sql_text::contains_keyword(&tokens, "RETURNING");
        if append_returning {
            sql_text::trim_statement_end(&mut tokens);
        }

        let mut placeholders = Placeholders::new(dialect);
        let mut out = String::with_capacity(sql.len() + 16);
        for token in &tokens {
            match token {
                Token::Placeholder => out.push_str(&placeholders.next()),
                other => out.push_str(other.text()),
            }
        }

        if append_returning {
            if let Some(key) = self.key_column.as_deref() {
                out.push_str(" RETURNING ");
                out.push_str(&quote_ident(key));
            }
        }
        out
    }
}

struct Placeholders {
    dialect: Dialect,
    next: usize,
}

impl Placeholders {
    fn new(dialect: Dialect) -> Self {
        Self { dialect, next: 1 }
    }

    fn next(&mut self) -> String {
        let n = self.next;
        self.next += 1;
        match self.dialect {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }
}

fn push_filter(sql: &mut String, filter: &[String], placeholders: &mut Placeholders) {
    if filter.is_empty() {
        return;
    }
    let conditions = filter
        .iter()
        .map(|c| format!("{} = {}", quote_ident(c), placeholders.next()))
        .collect::<Vec<_>>();
    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
