use chrono::{DateTime, Utc};
use quiz_core::model::{QuizMode, QuizSession, ScoreRecord, SessionId, SessionResult, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, map_answer_row, map_score_row, mode_from_str, ser, session_id_from_str, u32_from_i64,
    u64_to_i64, user_id_from_str, write_err,
};
use crate::repository::{SessionRepository, StorageError, result_of};

struct SessionHeader {
    id: SessionId,
    user_id: UserId,
    mode: QuizMode,
    question_limit: u32,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}

fn map_header_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionHeader, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    Ok(SessionHeader {
        id: session_id_from_str(&id)?,
        user_id: user_id_from_str(row.try_get("user_id").map_err(ser)?)?,
        mode: mode_from_str(&mode)?,
        question_limit: u32_from_i64(
            "question_limit",
            row.try_get::<i64, _>("question_limit").map_err(ser)?,
        )?,
        started_at: row.try_get("started_at").map_err(ser)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

impl SqliteRepository {
    async fn fetch_header(&self, id: SessionId) -> Result<SessionHeader, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, user_id, mode, question_limit, started_at, completed_at
                FROM quiz_sessions
                WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref()
            .map(map_header_row)
            .transpose()?
            .ok_or(StorageError::NotFound)
    }

    async fn fetch_scores(
        &self,
        id: SessionId,
    ) -> Result<Vec<ScoreRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT domain, correct, total
                FROM score_records
                WHERE session_id = ?1
                ORDER BY domain ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_score_row).collect()
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn append_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let result = result_of(session)?;
        let id = session.id().to_string();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (
                    id, user_id, mode, question_limit, started_at, completed_at,
                    total_questions, correct_answers
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(&id)
        .bind(session.user_id().as_str())
        .bind(session.mode().as_str())
        .bind(i64::from(session.question_limit()))
        .bind(session.started_at())
        .bind(result.completed_at())
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.correct_answers()))
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;

        for (position, answer) in session.answers().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                    INSERT INTO quiz_answers (
                        session_id, position, question_id, domain, difficulty,
                        answer, correct, time_taken_ms, answered_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(&id)
            .bind(position)
            .bind(u64_to_i64("question_id", answer.question_id.value())?)
            .bind(answer.domain.as_str())
            .bind(answer.difficulty.as_str())
            .bind(&answer.answer)
            .bind(i64::from(answer.correct))
            .bind(answer.time_taken.num_milliseconds().max(0))
            .bind(answer.answered_at)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        for record in result.records() {
            sqlx::query(
                r"
                    INSERT INTO score_records (session_id, domain, correct, total)
                    VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(&id)
            .bind(record.domain().as_str())
            .bind(i64::from(record.correct()))
            .bind(i64::from(record.total()))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            session_id = %id,
            answers = session.answers().len(),
            "session appended"
        );
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<QuizSession, StorageError> {
        let header = self.fetch_header(id).await?;

        let rows = sqlx::query(
            r"
                SELECT question_id, domain, difficulty, answer, correct,
                       time_taken_ms, answered_at
                FROM quiz_answers
                WHERE session_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let answers = rows
            .iter()
            .map(map_answer_row)
            .collect::<Result<Vec<_>, _>>()?;

        QuizSession::from_persisted(
            header.id,
            header.user_id,
            header.mode,
            header.question_limit,
            header.started_at,
            header.completed_at,
            answers,
        )
        .map_err(ser)
    }

    async fn get_result(&self, id: SessionId) -> Result<SessionResult, StorageError> {
        let header = self.fetch_header(id).await?;
        let records = self.fetch_scores(id).await?;
        Ok(SessionResult::from_persisted(
            header.id,
            header.user_id,
            header.mode,
            header.started_at,
            header.completed_at,
            records,
        ))
    }

    async fn list_history(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<SessionResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, mode, question_limit, started_at, completed_at
                FROM quiz_sessions
                WHERE user_id = ?1
                ORDER BY completed_at DESC, rowid DESC
                LIMIT ?2
            ",
        )
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let header = map_header_row(row)?;
            let records = self.fetch_scores(header.id).await?;
            out.push(SessionResult::from_persisted(
                header.id,
                header.user_id,
                header.mode,
                header.started_at,
                header.completed_at,
                records,
            ));
        }
        Ok(out)
    }
}
