//! Activity logging: mutating handlers publish domain events onto a
//! broadcast bus; a background writer persists them into `event_store`
//! with a SHA-256 hash chain. Observational only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub severity: Severity,
    pub payload: Value,
}

pub type EventBus = broadcast::Sender<DomainEvent>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<DomainEvent>) {
    broadcast::channel(1024)
}

/// Publish a `<entity>.<action>` event for any entity implementing
/// [`Loggable`]. Send failures mean no subscriber is listening; that is
/// fine for short-lived test apps.
pub fn log_activity<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
) {
    let payload = match serde_json::to_value(entity) {
        Ok(value) => value,
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize activity payload");
            return;
        }
    };

    let event = DomainEvent {
        id: Uuid::new_v4(),
        name: format!("{}.{}", T::entity_type(), action),
        occurred_at: Utc::now(),
        actor_id,
        subject_id: Some(entity.subject_id()),
        severity: entity.severity_for_action(action),
        payload,
    };

    let _ = event_bus.send(event);
}

/// Drain the bus into `event_store`, chaining each row to the previous via
/// SHA256(prev_hash || payload).
pub fn spawn_event_store_writer(pool: SqlitePool, mut receiver: broadcast::Receiver<DomainEvent>) {
    tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event store writer lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            if let Err(err) = persist_event(&pool, &event).await {
                tracing::error!(error = %err, event = %event.name, "failed to persist event");
            }
        }
    });
}

async fn persist_event(pool: &SqlitePool, event: &DomainEvent) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_string(&event.payload).unwrap_or_default();

    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM event_store ORDER BY created_at DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let hash = chain_hash(prev_hash.as_deref(), &payload);

    sqlx::query(
        "INSERT INTO event_store (id, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(event.id)
    .bind(&event.name)
    .bind(event.occurred_at)
    .bind(event.actor_id)
    .bind(event.subject_id)
    .bind(&payload)
    .bind(event.severity.as_str())
    .bind(&prev_hash)
    .bind(&hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

fn chain_hash(prev_hash: Option<&str>, payload: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
