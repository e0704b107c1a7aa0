use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::rows::json_text;
use shared_database::DbPool;
use shared_models::error::DbError;
use shared_models::pagination::Pagination;

use crate::models::{CreatePaymentRequest, Payment, PaymentError, PaymentQuery, UpdatePaymentRequest};

pub struct PaymentService {
    pool: DbPool,
}

impl PaymentService {
    pub fn new(pool: &DbPool) -> Self {
        Self { pool: pool.clone() }
    }

    pub async fn create_payment(&self, request: CreatePaymentRequest) -> Result<Payment, PaymentError> {
        let intent_id = request.payment_intent_id.trim().to_string();
        if intent_id.is_empty() {
            return Err(PaymentError::ValidationError("paymentIntentId is required".to_string()));
        }
        if request.amount <= 0 {
            return Err(PaymentError::ValidationError("amount must be greater than zero".to_string()));
        }
        let currency = normalize_currency(&request.currency)?;

        if let Some(appointment_id) = request.appointment_id {
            self.ensure_appointment_belongs(appointment_id, request.patient_id).await?;
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO payments (id, patient_id, appointment_id, payment_intent_id, amount, currency, status, \
             metadata, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(request.patient_id.to_string())
        .bind(request.appointment_id.map(|a| a.to_string()))
        .bind(&intent_id)
        .bind(request.amount)
        .bind(&currency)
        .bind(request.status.as_str())
        .bind(json_text(request.metadata.as_ref()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result.map_err(DbError::from) {
            Ok(_) => {}
            Err(DbError::UniqueViolation(_)) => {
                warn!("Duplicate payment intent {}", intent_id);
                return Err(PaymentError::DuplicateIntent(intent_id));
            }
            Err(e) => return Err(e.into()),
        }

        info!("Payment {} recorded ({} {})", id, request.amount, currency);
        self.get_payment(id).await
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, PaymentError> {
        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(payment_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    pub async fn list_payments(&self, query: PaymentQuery) -> Result<Vec<Payment>, PaymentError> {
        let (limit, offset) = Pagination {
            limit: query.limit,
            offset: query.offset,
        }
        .resolve();

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM payments WHERE 1 = 1");
        if let Some(patient_id) = query.patient_id {
            builder.push(" AND patient_id = ").push_bind(patient_id.to_string());
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let payments = builder.build_query_as::<Payment>().fetch_all(&self.pool).await?;
        debug!("Found {} payments", payments.len());
        Ok(payments)
    }

    pub async fn update_payment(&self, payment_id: Uuid, request: UpdatePaymentRequest) -> Result<Payment, PaymentError> {
        self.get_payment(payment_id).await?;

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE payments SET updated_at = ");
        builder.push_bind(Utc::now());
        if let Some(status) = request.status {
            builder.push(", status = ").push_bind(status.as_str());
        }
        if let Some(metadata) = request.metadata {
            builder.push(", metadata = ").push_bind(metadata.to_string());
        }
        builder.push(" WHERE id = ").push_bind(payment_id.to_string());
        builder.build().execute(&self.pool).await?;

        info!("Payment {} updated", payment_id);
        self.get_payment(payment_id).await
    }

    pub async fn delete_payment(&self, payment_id: Uuid) -> Result<(), PaymentError> {
        let result = sqlx::query("DELETE FROM payments WHERE id = ?")
            .bind(payment_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PaymentError::NotFound);
        }
        info!("Payment {} deleted", payment_id);
        Ok(())
    }

    async fn ensure_appointment_belongs(&self, appointment_id: Uuid, patient_id: Uuid) -> Result<(), PaymentError> {
        let owner: Option<String> = sqlx::query_scalar("SELECT patient_id FROM appointments WHERE id = ?")
            .bind(appointment_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match owner {
            None => Err(PaymentError::ValidationError(format!(
                "Appointment {} does not exist",
                appointment_id
            ))),
            Some(owner) if owner != patient_id.to_string() => Err(PaymentError::ValidationError(format!(
                "Appointment {} belongs to another patient",
                appointment_id
            ))),
            Some(_) => Ok(()),
        }
    }
}

/// Three-letter ISO 4217 code, stored lowercase.
pub fn normalize_currency(currency: &str) -> Result<String, PaymentError> {
    let code = currency.trim().to_lowercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_lowercase()) {
        Ok(code)
    } else {
        Err(PaymentError::ValidationError(format!("Invalid currency code: {}", currency)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_lowercased_and_checked() {
        assert_eq!(normalize_currency(" BRL ").unwrap(), "brl");
        assert!(normalize_currency("usdollar").is_err());
        assert!(normalize_currency("us1").is_err());
    }
}
