//! Excursion repository implementation

use super::rows::{ExcursionRow, PhotoRow};
use super::{commit, db_error, PgBookingStore};
use async_trait::async_trait;
use tourdesk_core::{
    models::{Excursion, ExcursionPhoto, NewExcursion},
    traits::ExcursionRepository,
    AppResult,
};
use tracing::{debug, info, instrument};

#[async_trait]
impl ExcursionRepository for PgBookingStore {
    #[instrument(skip(self, input), fields(title = %input.title))]
    async fn create_excursion(&self, owner_id: i64, input: &NewExcursion) -> AppResult<Excursion> {
        let mut tx = self.begin().await?;

        let row = sqlx::query_as::<sqlx::Postgres, ExcursionRow>(
            r#"
            INSERT INTO excursions (title, description, place, contact_email, owner_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, place, contact_email, owner_id, is_active, created_at
            "#,
        )
        .bind(&input.title)
        .bind(&input.description)
        .bind(&input.place)
        .bind(&input.contact_email)
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("create excursion", e))?;

        for (index, url) in input.photo_urls.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO excursion_photos (excursion_id, photo_url, order_index)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(row.id)
            .bind(url)
            .bind(index as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("attach excursion photo", e))?;
        }

        commit(tx).await?;

        info!("Created excursion {} for owner {}", row.id, owner_id);
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_excursion(&self, id: i64) -> AppResult<Option<Excursion>> {
        debug!("Finding excursion by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, ExcursionRow>(
            r#"
            SELECT id, title, description, place, contact_email, owner_id, is_active, created_at
            FROM excursions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find excursion", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_excursions(
        &self,
        owner_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Excursion>> {
        let rows = sqlx::query_as::<sqlx::Postgres, ExcursionRow>(
            r#"
            SELECT id, title, description, place, contact_email, owner_id, is_active, created_at
            FROM excursions
            WHERE ($1::BIGINT IS NULL OR owner_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list excursions", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_photos(&self, excursion_id: i64) -> AppResult<Vec<ExcursionPhoto>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PhotoRow>(
            r#"
            SELECT id, excursion_id, photo_url, order_index
            FROM excursion_photos
            WHERE excursion_id = $1
            ORDER BY order_index, id
            "#,
        )
        .bind(excursion_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list excursion photos", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
