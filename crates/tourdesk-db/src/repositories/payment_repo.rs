//! Payment repository implementation

use super::rows::{PaymentRow, ReservationRow};
use super::{commit, db_error, PgBookingStore};
use async_trait::async_trait;
use tourdesk_core::{
    models::{ConfirmOutcome, ConfirmStep, NewPayment, Payment, PaymentStatus, Reservation},
    traits::PaymentRepository,
    AppError, AppResult,
};
use tracing::{debug, info, instrument};

#[async_trait]
impl PaymentRepository for PgBookingStore {
    #[instrument(skip(self, payment), fields(reservation_id = payment.reservation_id))]
    async fn insert_payment(&self, payment: &NewPayment) -> AppResult<Payment> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            INSERT INTO payments (reservation_id, gateway_payment_id, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, reservation_id, gateway_payment_id, amount, currency, status,
                      created_at, updated_at
            "#,
        )
        .bind(payment.reservation_id)
        .bind(&payment.gateway_payment_id)
        .bind(payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("insert payment", e))?;

        info!(
            "Stored payment {} ({}) for reservation {}",
            row.id, row.gateway_payment_id, row.reservation_id
        );
        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn find_payment_by_gateway_id(&self, gateway_payment_id: &str) -> AppResult<Option<Payment>> {
        debug!("Finding payment by gateway id: {}", gateway_payment_id);

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            SELECT id, reservation_id, gateway_payment_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE gateway_payment_id = $1
            "#,
        )
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find payment", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_payment_by_reservation(&self, reservation_id: i64) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            SELECT id, reservation_id, gateway_payment_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE reservation_id = $1
            "#,
        )
        .bind(reservation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find payment", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn update_payment_status(
        &self,
        id: i64,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update payment status", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self))]
    async fn record_payment_success(&self, payment_id: i64) -> AppResult<ConfirmOutcome> {
        let mut tx = self.begin().await?;

        let payment: Payment = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            SELECT id, reservation_id, gateway_payment_id, amount, currency, status,
                   created_at, updated_at
            FROM payments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock payment", e))?
        .ok_or_else(|| AppError::NotFound(format!("payment {}", payment_id)))?
        .into();

        let reservation: Reservation = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
            r#"
            SELECT id, session_id, user_id, full_name, phone_number, email,
                   participants_count, is_paid, is_cancelled, booked_at
            FROM reservations
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(payment.reservation_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("lock reservation", e))?
        .ok_or(AppError::ReservationNotFound(payment.reservation_id))?
        .into();

        if payment.status == PaymentStatus::Created {
            sqlx::query(
                r#"
                UPDATE payments
                SET status = 'succeeded', updated_at = NOW()
                WHERE id = $1 AND status = 'created'
                "#,
            )
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("mark payment succeeded", e))?;
        }

        let outcome = match reservation.state().confirm(reservation.id) {
            Ok(ConfirmStep::Apply) => {
                let row = sqlx::query_as::<sqlx::Postgres, ReservationRow>(
                    r#"
                    UPDATE reservations
                    SET is_paid = TRUE
                    WHERE id = $1 AND is_cancelled = FALSE
                    RETURNING id, session_id, user_id, full_name, phone_number, email,
                              participants_count, is_paid, is_cancelled, booked_at
                    "#,
                )
                .bind(reservation.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| db_error("mark reservation paid", e))?;
                ConfirmOutcome::Confirmed(row.into())
            }
            Ok(ConfirmStep::NoOp) => ConfirmOutcome::AlreadyPaid(reservation),
            Err(_) => ConfirmOutcome::ReservationCancelled(reservation),
        };

        commit(tx).await?;
        Ok(outcome)
    }
}
