use chrono::Duration;
use quiz_core::model::{
    AnswerRecord, Difficulty, Domain, QuestionId, QuizMode, Recommendation, ScoreRecord,
    SessionId, StudyEstimate, UserId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// Maps constraint violations on writes to domain-level storage errors.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StorageError::Conflict,
        Some(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        Some(db) if db.is_check_violation() => StorageError::Invalid(db.message().to_string()),
        _ => conn(e),
    }
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn session_id_from_str(s: &str) -> Result<SessionId, StorageError> {
    s.parse::<SessionId>().map_err(ser)
}

pub(crate) fn mode_from_str(s: &str) -> Result<QuizMode, StorageError> {
    match s {
        "quick" => Ok(QuizMode::Quick),
        "full" => Ok(QuizMode::Full),
        _ => Err(StorageError::Serialization(format!("invalid mode: {s}"))),
    }
}

pub(crate) fn map_answer_row(row: &sqlx::sqlite::SqliteRow) -> Result<AnswerRecord, StorageError> {
    let question_id: i64 = row.try_get("question_id").map_err(ser)?;
    let question_id = u64::try_from(question_id)
        .map(QuestionId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid question_id: {question_id}")))?;
    let difficulty: String = row.try_get("difficulty").map_err(ser)?;
    let correct: i64 = row.try_get("correct").map_err(ser)?;
    let time_taken_ms: i64 = row.try_get("time_taken_ms").map_err(ser)?;

    Ok(AnswerRecord {
        question_id,
        domain: Domain::new(row.try_get::<String, _>("domain").map_err(ser)?).map_err(ser)?,
        difficulty: difficulty.parse::<Difficulty>().map_err(ser)?,
        answer: row.try_get("answer").map_err(ser)?,
        correct: correct != 0,
        time_taken: Duration::milliseconds(time_taken_ms),
        answered_at: row.try_get("answered_at").map_err(ser)?,
    })
}

pub(crate) fn map_score_row(row: &sqlx::sqlite::SqliteRow) -> Result<ScoreRecord, StorageError> {
    let domain = Domain::new(row.try_get::<String, _>("domain").map_err(ser)?).map_err(ser)?;
    let correct = u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?;
    let total = u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?;
    ScoreRecord::new(domain, correct, total).map_err(ser)
}

pub(crate) fn map_recommendation_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Recommendation, StorageError> {
    let resources: String = row.try_get("resources").map_err(ser)?;
    let estimate: String = row.try_get("estimate").map_err(ser)?;
    Ok(Recommendation {
        rank: u32_from_i64("rank", row.try_get::<i64, _>("rank").map_err(ser)?)?,
        domain: Domain::new(row.try_get::<String, _>("domain").map_err(ser)?).map_err(ser)?,
        accuracy_pct: row.try_get("accuracy_pct").map_err(ser)?,
        rationale: row.try_get("rationale").map_err(ser)?,
        resources: serde_json::from_str(&resources).map_err(ser)?,
        estimate: estimate.parse::<StudyEstimate>().map_err(ser)?,
        advice: row.try_get("advice").map_err(ser)?,
    })
}

pub(crate) fn user_id_from_str(s: String) -> Result<UserId, StorageError> {
    UserId::new(s).map_err(ser)
}
