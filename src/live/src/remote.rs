use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RemoteStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("record {0} no longer exists")]
    Missing(Uuid),

    #[error("remote store unavailable")]
    Unavailable,
}

/// The durable mirror of one user's live game, read by the server-side
/// push-delivery process while the client is closed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LiveGameRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub team_id: i64,
    pub timer_state: serde_json::Value,
    pub pitch_state: serde_json::Value,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PendingSub,
    GameFinished,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PendingSub => "pending_sub",
            NotificationKind::GameFinished => "game_finished",
        }
    }
}

/// Durable notification row consumed by the external push trigger.
#[derive(Debug, Clone)]
pub struct NotificationRecord {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub related_id: Option<Uuid>,
}

/// Remote persistence seam. The synchronizer and dispatcher only see this
/// trait; production uses Postgres, tests and mock mode an in-memory store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The newest active record for a user, if any.
    async fn find_active(&self, user_id: Uuid) -> Result<Option<LiveGameRecord>, RemoteStoreError>;

    async fn insert(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError>;

    async fn update(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError>;

    async fn deactivate(&self, id: Uuid) -> Result<(), RemoteStoreError>;

    async fn insert_notification(&self, record: &NotificationRecord)
    -> Result<(), RemoteStoreError>;
}

pub struct PostgresRemoteStore {
    pool: PgPool,
}

impl PostgresRemoteStore {
    pub async fn connect(url: &str) -> Result<Self, RemoteStoreError> {
        let pool = PgPoolOptions::new().max_connections(4).connect(url).await?;

        let migrations = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        sqlx::migrate::Migrator::new(migrations).await?.run(&pool).await?;

        Ok(PostgresRemoteStore { pool })
    }
}

#[async_trait]
impl RemoteStore for PostgresRemoteStore {
    async fn find_active(&self, user_id: Uuid) -> Result<Option<LiveGameRecord>, RemoteStoreError> {
        let record = sqlx::query_as::<_, LiveGameRecord>(
            "SELECT id, user_id, team_id, timer_state, pitch_state, is_active, updated_at \
             FROM live_game_states \
             WHERE user_id = $1 AND is_active = TRUE \
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError> {
        sqlx::query(
            "INSERT INTO live_game_states \
             (id, user_id, team_id, timer_state, pitch_state, is_active, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.team_id)
        .bind(&record.timer_state)
        .bind(&record.pitch_state)
        .bind(record.is_active)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError> {
        let result = sqlx::query(
            "UPDATE live_game_states \
             SET team_id = $2, timer_state = $3, pitch_state = $4, \
                 is_active = $5, updated_at = $6 \
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(record.team_id)
        .bind(&record.timer_state)
        .bind(&record.pitch_state)
        .bind(record.is_active)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RemoteStoreError::Missing(record.id));
        }

        Ok(())
    }

    async fn deactivate(&self, id: Uuid) -> Result<(), RemoteStoreError> {
        sqlx::query(
            "UPDATE live_game_states SET is_active = FALSE, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_notification(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), RemoteStoreError> {
        sqlx::query(
            "INSERT INTO notifications (user_id, type, message, related_id) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(record.user_id)
        .bind(record.kind.as_str())
        .bind(&record.message)
        .bind(record.related_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory remote store for tests and for running without a database
/// (mock mode).
#[derive(Default)]
pub struct MemoryRemoteStore {
    records: Mutex<Vec<LiveGameRecord>>,
    notifications: Mutex<Vec<NotificationRecord>>,
    failing: AtomicBool,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write fail until called again with `false`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<LiveGameRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.notifications.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), RemoteStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable);
        }

        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn find_active(&self, user_id: Uuid) -> Result<Option<LiveGameRecord>, RemoteStoreError> {
        self.check_available()?;

        let records = self.records.lock().unwrap();

        Ok(records
            .iter()
            .filter(|r| r.user_id == user_id && r.is_active)
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn insert(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError> {
        self.check_available()?;

        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn update(&self, record: &LiveGameRecord) -> Result<(), RemoteStoreError> {
        self.check_available()?;

        let mut records = self.records.lock().unwrap();

        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RemoteStoreError::Missing(record.id)),
        }
    }

    async fn deactivate(&self, id: Uuid) -> Result<(), RemoteStoreError> {
        self.check_available()?;

        let mut records = self.records.lock().unwrap();

        if let Some(existing) = records.iter_mut().find(|r| r.id == id) {
            existing.is_active = false;
            existing.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn insert_notification(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), RemoteStoreError> {
        self.check_available()?;

        self.notifications.lock().unwrap().push(record.clone());
        Ok(())
    }
}
