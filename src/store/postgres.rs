//! PostgreSQL store (`sqlx`).
//!
//! Queries are plain parameterized SQL. Owner scoping and status predicates
//! live in the `WHERE` clause of each statement, so transitions are a single
//! conditional `UPDATE` and never a read-then-write.

use async_trait::async_trait;
use sqlx::{
    Connection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::time::Duration;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    NewUser, Note, NoteFilter, NoteStatus, NoteStore, StatusCounts, StoreError, User,
    UserCredentials, UserStore,
};

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = "id, email, name, google_id, password_hash IS NOT NULL AS has_password, created_at, updated_at";
const NOTE_COLUMNS: &str = "id, user_id, title, content, status, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;
        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `sql/schema.sql`, one statement at a time.
    ///
    /// # Errors
    /// Returns the first failing statement's error.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&statement)
                .execute(&self.pool)
                .instrument(db_span("DDL", "schema.sql"))
                .await?;
        }
        Ok(())
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Splits a schema file into statements, assuming each ends with `;` at end of line.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

/// Escape `LIKE` metacharacters and wrap the term for a substring match.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return StoreError::UniqueViolation(constraint);
        }
    }
    StoreError::Database(err)
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        google_id: row.try_get("google_id")?,
        has_password: row.try_get("has_password")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn note_from_row(row: &PgRow) -> Result<Note, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(Note {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        status: status
            .parse()
            .map_err(|err: super::UnknownStatus| StoreError::CorruptRow(err.to_string()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1");
        let row = sqlx::query(&query)
            .bind(google_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<UserCredentials>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", "SELECT ... FROM users WHERE email = $1"))
            .await?;
        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: user_from_row(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let query = format!(
            "INSERT INTO users (id, email, name, password_hash, google_id) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(&user.google_id)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", "INSERT INTO users ..."))
            .await
            .map_err(unique_violation)?;
        user_from_row(&row)
    }

    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "UPDATE users SET google_id = $2, updated_at = now() WHERE id = $1 AND google_id IS NULL RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(google_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await
            .map_err(unique_violation)?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl NoteStore for PgStore {
    async fn insert(&self, owner: Uuid, title: &str, content: &str) -> Result<Note, StoreError> {
        let query = format!(
            "INSERT INTO notes (id, user_id, title, content, status) VALUES ($1, $2, $3, $4, $5) RETURNING {NOTE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(title)
            .bind(content)
            .bind(NoteStatus::Active.as_str())
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await?;
        note_from_row(&row)
    }

    async fn find(&self, owner: Uuid, id: Uuid) -> Result<Option<Note>, StoreError> {
        let query = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = $1 AND user_id = $2");
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        row.as_ref().map(note_from_row).transpose()
    }

    async fn find_many(
        &self,
        filter: &NoteFilter,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Note>, StoreError> {
        let query = format!(
            r"
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE user_id = $1
              AND status = $2
              AND ($3::text IS NULL OR title ILIKE $3 OR content ILIKE $3)
            ORDER BY updated_at DESC, created_at DESC, id DESC
            OFFSET $4
            LIMIT $5
            "
        );
        let rows = sqlx::query(&query)
            .bind(filter.owner)
            .bind(filter.status.as_str())
            .bind(filter.search.as_deref().map(like_pattern))
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await?;
        rows.iter().map(note_from_row).collect()
    }

    async fn count(&self, filter: &NoteFilter) -> Result<i64, StoreError> {
        let query = r"
            SELECT COUNT(*) AS count
            FROM notes
            WHERE user_id = $1
              AND status = $2
              AND ($3::text IS NULL OR title ILIKE $3 OR content ILIKE $3)
            ";
        let row = sqlx::query(query)
            .bind(filter.owner)
            .bind(filter.status.as_str())
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;
        Ok(row.try_get("count")?)
    }

    async fn update_content(
        &self,
        owner: Uuid,
        id: Uuid,
        title: &str,
        content: &str,
    ) -> Result<Option<Note>, StoreError> {
        let query = format!(
            "UPDATE notes SET title = $3, content = $4, updated_at = now() WHERE id = $1 AND user_id = $2 RETURNING {NOTE_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner)
            .bind(title)
            .bind(content)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await?;
        row.as_ref().map(note_from_row).transpose()
    }

    async fn update_status(
        &self,
        owner: Uuid,
        id: Uuid,
        from: &[NoteStatus],
        to: NoteStatus,
    ) -> Result<Option<Note>, StoreError> {
        let query = format!(
            "UPDATE notes SET status = $4, updated_at = now() WHERE id = $1 AND user_id = $2 AND status = ANY($3) RETURNING {NOTE_COLUMNS}"
        );
        let sources: Vec<String> = from.iter().map(|status| status.as_str().to_string()).collect();
        let row = sqlx::query(&query)
            .bind(id)
            .bind(owner)
            .bind(sources)
            .bind(to.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await?;
        row.as_ref().map(note_from_row).transpose()
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let query = "DELETE FROM notes WHERE id = $1 AND user_id = $2";
        let result = sqlx::query(query)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_status(&self, owner: Uuid) -> Result<StatusCounts, StoreError> {
        let query = "SELECT status, COUNT(*) AS count FROM notes WHERE user_id = $1 GROUP BY status";
        let rows = sqlx::query(query)
            .bind(owner)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await?;

        let mut counts = StatusCounts::default();
        for row in &rows {
            let status: String = row.try_get("status")?;
            let status: NoteStatus = status
                .parse()
                .map_err(|err: super::UnknownStatus| StoreError::CorruptRow(err.to_string()))?;
            counts.add(status, row.try_get("count")?);
        }
        Ok(counts)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_splits_into_statements() {
        let statements = split_sql_statements(SCHEMA_SQL);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].starts_with("CREATE TABLE IF NOT EXISTS users"));
        assert!(statements[1].starts_with("CREATE TABLE IF NOT EXISTS notes"));
        assert!(statements[2].starts_with("CREATE INDEX IF NOT EXISTS"));
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("milk"), "%milk%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
