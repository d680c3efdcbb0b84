//! Device registration storage.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use ripple_common::types::{DeviceRegistration, normalize_address};

use crate::NotifierError;

#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// All registrations for an account.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceRegistration>, NotifierError>;

    /// Register a token for an account; re-registering refreshes `updated_at`.
    async fn register(
        &self,
        user_id: &str,
        device_token: &str,
    ) -> Result<DeviceRegistration, NotifierError>;

    /// Remove one registration. Returns whether a row was deleted.
    async fn delete(&self, user_id: &str, device_token: &str) -> Result<bool, NotifierError>;
}

#[derive(Clone)]
pub struct PgDeviceStore {
    pool: PgPool,
}

impl PgDeviceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for PgDeviceStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceRegistration>, NotifierError> {
        let devices: Vec<DeviceRegistration> = sqlx::query_as(
            "SELECT * FROM device_registrations WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(normalize_address(user_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(devices)
    }

    async fn register(
        &self,
        user_id: &str,
        device_token: &str,
    ) -> Result<DeviceRegistration, NotifierError> {
        let user_id = normalize_address(user_id);

        sqlx::query("INSERT INTO app_accounts (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(&user_id)
            .execute(&self.pool)
            .await?;

        let device: DeviceRegistration = sqlx::query_as(
            r#"
            INSERT INTO device_registrations (user_id, device_token)
            VALUES ($1, $2)
            ON CONFLICT (user_id, device_token) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(&user_id)
        .bind(device_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(device)
    }

    async fn delete(&self, user_id: &str, device_token: &str) -> Result<bool, NotifierError> {
        let result =
            sqlx::query("DELETE FROM device_registrations WHERE user_id = $1 AND device_token = $2")
                .bind(normalize_address(user_id))
                .bind(device_token)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: Mutex<Vec<DeviceRegistration>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<DeviceRegistration>>, NotifierError> {
        self.devices
            .lock()
            .map_err(|_| NotifierError::Store("device store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<DeviceRegistration>, NotifierError> {
        let user_id = normalize_address(user_id);
        Ok(self
            .lock()?
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn register(
        &self,
        user_id: &str,
        device_token: &str,
    ) -> Result<DeviceRegistration, NotifierError> {
        let user_id = normalize_address(user_id);
        let now = Utc::now();
        let mut devices = self.lock()?;

        if let Some(existing) = devices
            .iter_mut()
            .find(|d| d.user_id == user_id && d.device_token == device_token)
        {
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let device = DeviceRegistration {
            user_id,
            device_token: device_token.to_string(),
            created_at: now,
            updated_at: now,
        };
        devices.push(device.clone());
        Ok(device)
    }

    async fn delete(&self, user_id: &str, device_token: &str) -> Result<bool, NotifierError> {
        let user_id = normalize_address(user_id);
        let mut devices = self.lock()?;
        let before = devices.len();
        devices.retain(|d| !(d.user_id == user_id && d.device_token == device_token));
        Ok(devices.len() < before)
    }
}
