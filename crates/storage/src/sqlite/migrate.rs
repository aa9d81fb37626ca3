use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema bootstrap.
///
/// Version 1 creates sessions, per-answer rows, per-domain score records,
/// recommendations, and their indexes.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_sessions (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    mode TEXT NOT NULL CHECK (mode IN ('quick', 'full')),
                    question_limit INTEGER NOT NULL CHECK (question_limit > 0),
                    started_at TEXT NOT NULL,
                    completed_at TEXT NOT NULL,
                    total_questions INTEGER NOT NULL CHECK (total_questions >= 0),
                    correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
                    CHECK (total_questions <= question_limit),
                    CHECK (correct_answers <= total_questions)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS quiz_answers (
                    session_id TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    question_id INTEGER NOT NULL,
                    domain TEXT NOT NULL,
                    difficulty TEXT NOT NULL,
                    answer TEXT NOT NULL,
                    correct INTEGER NOT NULL CHECK (correct IN (0, 1)),
                    time_taken_ms INTEGER NOT NULL CHECK (time_taken_ms >= 0),
                    answered_at TEXT NOT NULL,
                    PRIMARY KEY (session_id, position),
                    UNIQUE (session_id, question_id),
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS score_records (
                    session_id TEXT NOT NULL,
                    domain TEXT NOT NULL,
                    correct INTEGER NOT NULL CHECK (correct >= 0),
                    total INTEGER NOT NULL CHECK (total > 0),
                    PRIMARY KEY (session_id, domain),
                    CHECK (correct <= total),
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS recommendations (
                    session_id TEXT NOT NULL,
                    rank INTEGER NOT NULL CHECK (rank > 0),
                    domain TEXT NOT NULL,
                    accuracy_pct REAL NOT NULL CHECK (accuracy_pct BETWEEN 0 AND 100),
                    rationale TEXT NOT NULL,
                    resources TEXT NOT NULL,
                    estimate TEXT NOT NULL,
                    advice TEXT,
                    generated_at TEXT NOT NULL,
                    PRIMARY KEY (session_id, rank),
                    FOREIGN KEY (session_id) REFERENCES quiz_sessions(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_quiz_sessions_user_completed
                    ON quiz_sessions (user_id, completed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
