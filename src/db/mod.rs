//! Database layer for the SQLite store.
//!
//! This module handles:
//! - Connection pool management with WAL mode
//! - Schema migrations
//! - Classification of constraint violations
//! - Transactional queries for pull requests, users and teams

pub mod pool;
pub mod pull_requests;
pub mod teams;
pub mod users;

use crate::error::AppError;
use std::path::Path;
use thiserror::Error;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// Schema migrations, applied in order and recorded by name.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial_schema",
    include_str!("migrations/0001_initial_schema.sql"),
)];

/// SQLite extended result codes for key violations.
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";
const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";

/// Initialize the database with the default pool size.
pub async fn initialize(db_path: &Path) -> Result<pool::DbPool, DbError> {
    initialize_with(db_path, pool::DEFAULT_MAX_CONNECTIONS).await
}

/// Initialize the database: create the file if needed and run migrations.
///
/// # Arguments
/// * `db_path` - Path to the SQLite database file
/// * `max_connections` - Upper bound on pooled connections
pub async fn initialize_with(db_path: &Path, max_connections: u32) -> Result<pool::DbPool, DbError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbError::Migration(format!("Failed to create database directory: {}", e))
        })?;
    }

    let pool = pool::create_pool(db_path, max_connections).await?;
    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run all pending database migrations.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), DbError> {
    let mut conn = pool.acquire().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(&mut *conn)
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied: Option<(i64,)> = sqlx::query_as("SELECT id FROM _migrations WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

        if applied.is_some() {
            continue;
        }

        let statements = split_sql_statements(sql);
        if statements.is_empty() {
            return Err(DbError::Migration(format!("Migration {} is empty", name)));
        }

        for statement in statements {
            sqlx::query(&statement)
                .execute(&mut *conn)
                .await
                .map_err(|e| DbError::Migration(format!("{}: {}", name, e)))?;
        }

        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;

        log::info!(target: "review_assigner::db", "Applied migration {}", name);
    }

    Ok(())
}

/// Split a migration file into statements.
///
/// Drops `--` comments and only treats `;` as a terminator outside of
/// parentheses and string literals.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut paren_depth: u32 = 0;
    let mut in_string = false;

    for line in sql.lines() {
        let code = if in_string {
            line
        } else {
            match line.find("--") {
                Some(idx) if !line[..idx].contains('\'') => &line[..idx],
                _ => line,
            }
        };

        for ch in code.chars() {
            match ch {
                '\'' => {
                    in_string = !in_string;
                    current.push(ch);
                }
                '(' if !in_string => {
                    paren_depth += 1;
                    current.push(ch);
                }
                ')' if !in_string => {
                    paren_depth = paren_depth.saturating_sub(1);
                    current.push(ch);
                }
                ';' if !in_string && paren_depth == 0 => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            current.push(' ');
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        statements.push(last.to_string());
    }

    statements
}

/// Attach a message to a raw `sqlx` failure, turning it into an internal error.
pub(crate) trait QueryContext<T> {
    fn context(self, message: &'static str) -> Result<T, AppError>;
}

impl<T> QueryContext<T> for Result<T, sqlx::Error> {
    fn context(self, message: &'static str) -> Result<T, AppError> {
        self.map_err(|e| AppError::internal_with_source(message, e))
    }
}

/// Current Unix timestamp in seconds.
pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Whether the error is a primary key or unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_unique_violation()
            || matches!(
                db.code().as_deref(),
                Some(SQLITE_CONSTRAINT_PRIMARYKEY | SQLITE_CONSTRAINT_UNIQUE)
            )
    })
}

/// Whether the error is a foreign key violation.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| {
        db.is_foreign_key_violation()
            || db.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY)
    })
}
