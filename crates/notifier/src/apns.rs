//! APNs provider: token-authenticated HTTP/2 client for Apple's push gateway.
//!
//! The connection is built on first use from [`ApnsConfig`] and memoized in a
//! [`LazyConnection`]. Missing credentials are a configuration error at that
//! point, not at process startup. `shutdown` drops the connection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use ripple_common::config::ApnsConfig;
use ripple_common::types::redact;

use crate::NotifierError;
use crate::gateway::{PushGateway, PushOutcome};
use crate::lazy::LazyConnection;
use crate::sanitizer::SanitizedNotification;

pub const PRODUCTION_ENDPOINT: &str = "https://api.push.apple.com";
pub const SANDBOX_ENDPOINT: &str = "https://api.sandbox.push.apple.com";

/// Sound used when the notification does not name one.
pub const DEFAULT_SOUND: &str = "default";

/// Immediate delivery.
const PRIORITY_HIGH: &str = "10";

/// Provider tokens are valid for an hour; refresh well before that.
const TOKEN_REFRESH_SECS: i64 = 50 * 60;

/// Validated provider credentials.
#[derive(Debug, Clone)]
pub struct ApnsCredentials {
    pub key_pem: String,
    pub key_id: String,
    pub team_id: String,
    pub bundle_id: String,
}

impl ApnsCredentials {
    /// Collect credentials from config, reading the key file if only a path is given.
    pub async fn from_config(config: &ApnsConfig) -> Result<Self, NotifierError> {
        let (Some(key_id), Some(team_id), Some(bundle_id)) =
            (&config.key_id, &config.team_id, &config.bundle_id)
        else {
            return Err(missing_credentials(config));
        };

        let key_pem = if let Some(key) = &config.key {
            // Keys passed through env vars often carry literal "\n" sequences
            key.replace("\\n", "\n")
        } else if let Some(path) = &config.key_path {
            tokio::fs::read_to_string(path).await.map_err(|e| {
                NotifierError::Config(format!("cannot read APNs key at {}: {}", path, e))
            })?
        } else {
            return Err(missing_credentials(config));
        };

        Ok(Self {
            key_pem,
            key_id: key_id.clone(),
            team_id: team_id.clone(),
            bundle_id: bundle_id.clone(),
        })
    }
}

fn missing_credentials(config: &ApnsConfig) -> NotifierError {
    let mut missing = Vec::new();
    if config.key.is_none() && config.key_path.is_none() {
        missing.push("APNS_KEY or APNS_KEY_PATH");
    }
    if config.key_id.is_none() {
        missing.push("APNS_KEY_ID");
    }
    if config.team_id.is_none() {
        missing.push("APNS_TEAM_ID");
    }
    if config.bundle_id.is_none() {
        missing.push("APNS_BUNDLE_ID");
    }
    NotifierError::Config(format!("missing APNs credentials: {}", missing.join(", ")))
}

#[derive(Debug, Serialize)]
struct ProviderClaims<'a> {
    iss: &'a str,
    iat: i64,
}

/// Signs and caches the ES256 provider token.
struct TokenSigner {
    key: EncodingKey,
    key_id: String,
    team_id: String,
    cached: Mutex<Option<(String, i64)>>,
}

impl TokenSigner {
    fn new(credentials: &ApnsCredentials) -> Result<Self, NotifierError> {
        let key = EncodingKey::from_ec_pem(credentials.key_pem.as_bytes())
            .map_err(|e| NotifierError::Config(format!("invalid APNs signing key: {}", e)))?;
        Ok(Self {
            key,
            key_id: credentials.key_id.clone(),
            team_id: credentials.team_id.clone(),
            cached: Mutex::new(None),
        })
    }

    fn token(&self) -> Result<String, NotifierError> {
        let now = Utc::now().timestamp();
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| NotifierError::Gateway("token cache lock poisoned".to_string()))?;

        if let Some((token, issued_at)) = cached.as_ref()
            && now - issued_at < TOKEN_REFRESH_SECS
        {
            return Ok(token.clone());
        }

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = ProviderClaims {
            iss: &self.team_id,
            iat: now,
        };
        let token = encode(&header, &claims, &self.key)
            .map_err(|e| NotifierError::Config(format!("failed to sign APNs token: {}", e)))?;

        *cached = Some((token.clone(), now));
        Ok(token)
    }
}

/// A live gateway connection.
pub struct ApnsConnection {
    http: Client,
    endpoint: String,
    topic: String,
    signer: TokenSigner,
}

impl ApnsConnection {
    pub async fn connect(config: &ApnsConfig, endpoint: &str) -> Result<Self, NotifierError> {
        let credentials = ApnsCredentials::from_config(config).await?;
        let signer = TokenSigner::new(&credentials)?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(15))
            .pool_idle_timeout(Duration::from_secs(600));
        // APNs only speaks HTTP/2 over TLS
        if endpoint.starts_with("https://") {
            builder = builder.http2_prior_knowledge();
        }
        let http = builder
            .build()
            .map_err(|e| NotifierError::Config(format!("cannot build APNs client: {}", e)))?;

        tracing::info!(endpoint, topic = %credentials.bundle_id, "APNs connection initialized");

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            topic: credentials.bundle_id,
            signer,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApnsErrorBody {
    reason: Option<String>,
}

/// Lifecycle-managed APNs gateway.
pub struct ApnsClient {
    config: ApnsConfig,
    endpoint: String,
    connection: LazyConnection<ApnsConnection>,
}

impl ApnsClient {
    pub fn new(config: ApnsConfig) -> Self {
        let endpoint = if config.production {
            PRODUCTION_ENDPOINT
        } else {
            SANDBOX_ENDPOINT
        };
        Self {
            config,
            endpoint: endpoint.to_string(),
            connection: LazyConnection::new(),
        }
    }

    /// Point the client at a different gateway host.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Establish the connection now instead of on first send.
    pub async fn init(&self) -> Result<(), NotifierError> {
        self.ensure_ready().await
    }

    /// Release the connection, if one was opened.
    pub async fn shutdown(&self) {
        if self.connection.take().await.is_some() {
            tracing::info!("APNs connection closed");
        }
    }

    async fn connection(&self) -> Result<Arc<ApnsConnection>, NotifierError> {
        self.connection
            .get_or_try_init(|| ApnsConnection::connect(&self.config, &self.endpoint))
            .await
            .inspect_err(|e| tracing::error!(error = %e, "APNs initialization failed"))
    }
}

/// Build the APNs JSON body: `aps` plus the sanitized data keys at the top level.
pub fn build_payload(notification: &SanitizedNotification) -> Value {
    let mut aps = Map::new();
    aps.insert(
        "alert".to_string(),
        json!({ "title": notification.title, "body": notification.body }),
    );
    aps.insert(
        "sound".to_string(),
        Value::String(
            notification
                .sound
                .clone()
                .unwrap_or_else(|| DEFAULT_SOUND.to_string()),
        ),
    );
    if let Some(badge) = &notification.badge {
        aps.insert("badge".to_string(), Value::Number(badge.clone()));
    }

    let mut payload = notification.data.clone();
    payload.insert("aps".to_string(), Value::Object(aps));
    Value::Object(payload)
}

#[async_trait]
impl PushGateway for ApnsClient {
    async fn ensure_ready(&self) -> Result<(), NotifierError> {
        self.connection().await.map(|_| ())
    }

    async fn send(
        &self,
        device_token: &str,
        notification: &SanitizedNotification,
    ) -> Result<PushOutcome, NotifierError> {
        let conn = self.connection().await?;
        let token = conn.signer.token()?;
        let url = format!("{}/3/device/{}", conn.endpoint, device_token);

        let response = conn
            .http
            .post(&url)
            .bearer_auth(token)
            .header("apns-topic", &conn.topic)
            .header("apns-push-type", "alert")
            .header("apns-priority", PRIORITY_HIGH)
            .json(&build_payload(notification))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(PushOutcome::Delivered);
        }

        let reason = response
            .json::<ApnsErrorBody>()
            .await
            .ok()
            .and_then(|body| body.reason);

        tracing::debug!(
            device = %redact(device_token),
            status = status.as_u16(),
            reason = reason.as_deref().unwrap_or("-"),
            "APNs rejected notification"
        );

        Ok(PushOutcome::Rejected {
            status: Some(status.as_u16()),
            reason,
        })
    }
}
