use chrono::{DateTime, Utc};
use quiz_core::model::{RecommendationResult, SessionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, map_recommendation_row, ser, write_err};
use crate::repository::{RecommendationRepository, StorageError};

#[async_trait::async_trait]
impl RecommendationRepository for SqliteRepository {
    async fn replace_recommendations(
        &self,
        result: &RecommendationResult,
    ) -> Result<(), StorageError> {
        let id = result.session_id().to_string();
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let known = sqlx::query("SELECT 1 FROM quiz_sessions WHERE id = ?1")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        if known.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query("DELETE FROM recommendations WHERE session_id = ?1")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for item in result.items() {
            let resources = serde_json::to_string(&item.resources).map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO recommendations (
                        session_id, rank, domain, accuracy_pct, rationale,
                        resources, estimate, advice, generated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )
            .bind(&id)
            .bind(i64::from(item.rank))
            .bind(item.domain.as_str())
            .bind(item.accuracy_pct)
            .bind(&item.rationale)
            .bind(resources)
            .bind(item.estimate.as_str())
            .bind(item.advice.as_deref())
            .bind(result.generated_at())
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn get_recommendations(
        &self,
        session_id: SessionId,
    ) -> Result<Option<RecommendationResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT rank, domain, accuracy_pct, rationale, resources,
                       estimate, advice, generated_at
                FROM recommendations
                WHERE session_id = ?1
                ORDER BY rank ASC
            ",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let generated_at: DateTime<Utc> = first.try_get("generated_at").map_err(ser)?;
        let items = rows
            .iter()
            .map(map_recommendation_row)
            .collect::<Result<Vec<_>, _>>()?;

        RecommendationResult::new(session_id, generated_at, items)
            .map(Some)
            .map_err(ser)
    }
}
