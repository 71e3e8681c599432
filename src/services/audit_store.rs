//! services/audit_store.rs
//! Almacenes append-only para los registros de entrega.

use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};

use crate::models::delivery_model::{Channel, DeliveryAttempt};

/// Cantidad de registros devueltos al consultar por destinatario.
pub const RECIPIENT_HISTORY_LIMIT: i64 = 50;

/// Destino de los registros. Solo agrega; nunca actualiza ni borra.
/// Debe aceptar escritores concurrentes.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, attempt: &DeliveryAttempt) -> Result<()>;

    /// Registros de un anuncio, en orden de escritura.
    async fn list_for_announcement(&self, announcement_id: &str) -> Result<Vec<DeliveryAttempt>>;

    /// Últimos registros de un destinatario, del más nuevo al más viejo.
    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<DeliveryAttempt>>;
}

#[derive(Clone, Debug)]
pub struct SqliteAuditStore {
    db_pool: Pool<Sqlite>,
}

impl SqliteAuditStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SqliteAuditStore { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Failed to run delivery_attempts migrations")?;
        Ok(())
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn append(&self, attempt: &DeliveryAttempt) -> Result<()> {
        let response = serde_json::to_string(&attempt.response)?;

        sqlx::query(
            r#"
            INSERT INTO delivery_attempts (
                id, announcement_id, recipient_id, channel,
                success, response, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.announcement_id)
        .bind(&attempt.recipient_id)
        .bind(attempt.channel.as_str())
        .bind(attempt.success)
        .bind(response)
        .bind(attempt.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.db_pool)
        .await
        .context("Error insertando delivery_attempt")?;

        Ok(())
    }

    async fn list_for_announcement(&self, announcement_id: &str) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query(
            r#"
            SELECT id, announcement_id, recipient_id, channel,
                   success, response, created_at
            FROM delivery_attempts
            WHERE announcement_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(announcement_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Error listando delivery_attempts por anuncio")?;

        rows.iter().map(attempt_from_row).collect()
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<DeliveryAttempt>> {
        let rows = sqlx::query(
            r#"
            SELECT id, announcement_id, recipient_id, channel,
                   success, response, created_at
            FROM delivery_attempts
            WHERE recipient_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(recipient_id)
        .bind(RECIPIENT_HISTORY_LIMIT)
        .fetch_all(&self.db_pool)
        .await
        .context("Error listando delivery_attempts por destinatario")?;

        rows.iter().map(attempt_from_row).collect()
    }
}

fn attempt_from_row(row: &SqliteRow) -> Result<DeliveryAttempt> {
    let channel: String = row.try_get("channel")?;
    let response: String = row.try_get("response")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(DeliveryAttempt {
        id: row.try_get("id")?,
        announcement_id: row.try_get("announcement_id")?,
        recipient_id: row.try_get("recipient_id")?,
        channel: channel.parse::<Channel>()?,
        success: row.try_get("success")?,
        response: serde_json::from_str(&response)?,
        timestamp: created_at.parse::<DateTime<Utc>>()?,
    })
}

/// Almacén en memoria, para tests o para embeber el núcleo sin base de datos.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    attempts: Mutex<Vec<DeliveryAttempt>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<DeliveryAttempt> {
        self.attempts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, attempt: &DeliveryAttempt) -> Result<()> {
        self.attempts
            .lock()
            .map_err(|_| anyhow!("InMemoryAuditStore envenenado"))?
            .push(attempt.clone());
        Ok(())
    }

    async fn list_for_announcement(&self, announcement_id: &str) -> Result<Vec<DeliveryAttempt>> {
        let guard = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("InMemoryAuditStore envenenado"))?;
        Ok(guard
            .iter()
            .filter(|a| a.announcement_id == announcement_id)
            .cloned()
            .collect())
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<DeliveryAttempt>> {
        let guard = self
            .attempts
            .lock()
            .map_err(|_| anyhow!("InMemoryAuditStore envenenado"))?;
        Ok(guard
            .iter()
            .rev()
            .filter(|a| a.recipient_id == recipient_id)
            .take(RECIPIENT_HISTORY_LIMIT as usize)
            .cloned()
            .collect())
    }
}
