//! Callhook configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CallhookError, Result};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallhookConfig {
    /// Cloud project that owns the document store and the push sender.
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl CallhookConfig {
    /// Load config from the default path (~/.callhook/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path. Environment overrides are not applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CallhookError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CallhookError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Overlay environment variables onto the file config.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).filter(|v| !v.is_empty());

        if let Some(project) = non_empty("CALLHOOK_PROJECT_ID").or_else(|| non_empty("GOOGLE_CLOUD_PROJECT")) {
            self.project_id = project;
        }
        if let Some(token) = non_empty("CALLHOOK_ACCESS_TOKEN") {
            self.auth.access_token = token;
        }
        if let Some(token) = non_empty("CALLHOOK_GATEWAY_TOKEN") {
            self.gateway.auth_token = Some(token);
        }
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        let needs_project = self.store.backend == StoreBackend::Firestore
            || self.push.backend == PushBackend::Fcm;
        if needs_project && self.project_id.trim().is_empty() {
            return Err(CallhookError::Config(
                "project_id is required for the firestore store or fcm push backend".into(),
            ));
        }
        self.retention.signaling.validate("signaling")?;
        self.retention.calls.validate("calls")?;
        if self.dispatch.collection.is_empty() {
            return Err(CallhookError::Config("dispatch.collection must not be empty".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Callhook home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".callhook")
    }
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Firestore,
    Sqlite,
    Memory,
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_database")]
    pub database: String,
    /// Override the Firestore base URL (e.g. the local emulator).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

fn default_store_backend() -> StoreBackend { StoreBackend::Firestore }
fn default_database() -> String { "(default)".into() }
fn default_sqlite_path() -> String { "~/.callhook/local.db".into() }
fn default_store_timeout() -> u64 { 30 }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database: default_database(),
            endpoint: None,
            sqlite_path: default_sqlite_path(),
            timeout_secs: default_store_timeout(),
        }
    }
}

/// Which push transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushBackend {
    Fcm,
    DryRun,
}

/// Push transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_push_backend")]
    pub backend: PushBackend,
    #[serde(default = "default_fcm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_push_timeout")]
    pub timeout_secs: u64,
    /// Ask FCM to validate without delivering.
    #[serde(default)]
    pub validate_only: bool,
}

fn default_push_backend() -> PushBackend { PushBackend::Fcm }
fn default_fcm_endpoint() -> String { "https://fcm.googleapis.com".into() }
fn default_push_timeout() -> u64 { 10 }

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            backend: default_push_backend(),
            endpoint: default_fcm_endpoint(),
            timeout_secs: default_push_timeout(),
            validate_only: false,
        }
    }
}

/// Credentials for the cloud APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Static OAuth2 bearer token. Empty = ask the metadata server.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token".into()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            metadata_url: default_metadata_url(),
        }
    }
}

/// Notification dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_notifications_collection")]
    pub collection: String,
    /// Only records with this `type` are delivered.
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    #[serde(default = "default_click_action")]
    pub click_action: String,
    #[serde(default = "default_android_channel")]
    pub android_channel_id: String,
    #[serde(default = "default_apns_category")]
    pub apns_category: String,
    #[serde(default = "default_sound")]
    pub sound: String,
}

fn default_notifications_collection() -> String { "notifications".into() }
fn default_trigger_type() -> String { "incoming_call".into() }
fn default_click_action() -> String { "FLUTTER_NOTIFICATION_CLICK".into() }
fn default_android_channel() -> String { "calls_channel".into() }
fn default_apns_category() -> String { "CALL_CATEGORY".into() }
fn default_sound() -> String { "default".into() }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            collection: default_notifications_collection(),
            trigger_type: default_trigger_type(),
            click_action: default_click_action(),
            android_channel_id: default_android_channel(),
            apns_category: default_apns_category(),
            sound: default_sound(),
        }
    }
}

/// Retention sweeps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub signaling: SignalingRetention,
    #[serde(default)]
    pub calls: CallRetention,
}

/// Signaling records: pure age-based retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingRetention {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_signaling_collection")]
    pub collection: String,
    #[serde(default = "default_signaling_field")]
    pub timestamp_field: String,
    #[serde(default = "default_signaling_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_signaling_interval")]
    pub interval_secs: u64,
    /// Cap on records deleted per sweep. None = everything that matches.
    #[serde(default)]
    pub limit: Option<usize>,
}

fn bool_true() -> bool { true }
fn default_signaling_collection() -> String { "signaling".into() }
fn default_signaling_field() -> String { "timestamp".into() }
fn default_signaling_age() -> u64 { 5 * 60 }
fn default_signaling_interval() -> u64 { 5 * 60 }

impl Default for SignalingRetention {
    fn default() -> Self {
        Self {
            enabled: true,
            collection: default_signaling_collection(),
            timestamp_field: default_signaling_field(),
            max_age_secs: default_signaling_age(),
            interval_secs: default_signaling_interval(),
            limit: None,
        }
    }
}

impl SignalingRetention {
    fn validate(&self, name: &str) -> Result<()> {
        check_sweep(name, &self.collection, self.max_age_secs, self.interval_secs, self.limit)
    }
}

/// Call records: only ended calls, aged by when they ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRetention {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_calls_collection")]
    pub collection: String,
    #[serde(default = "default_status_field")]
    pub status_field: String,
    #[serde(default = "default_ended_status")]
    pub ended_status: String,
    #[serde(default = "default_ended_at_field")]
    pub ended_at_field: String,
    #[serde(default = "default_call_age")]
    pub max_age_secs: u64,
    #[serde(default = "default_call_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_calls_collection() -> String { "calls".into() }
fn default_status_field() -> String { "status".into() }
fn default_ended_status() -> String { "ended".into() }
fn default_ended_at_field() -> String { "endedAt".into() }
fn default_call_age() -> u64 { 24 * 60 * 60 }
fn default_call_interval() -> u64 { 24 * 60 * 60 }

impl Default for CallRetention {
    fn default() -> Self {
        Self {
            enabled: true,
            collection: default_calls_collection(),
            status_field: default_status_field(),
            ended_status: default_ended_status(),
            ended_at_field: default_ended_at_field(),
            max_age_secs: default_call_age(),
            interval_secs: default_call_interval(),
            limit: None,
        }
    }
}

impl CallRetention {
    fn validate(&self, name: &str) -> Result<()> {
        check_sweep(name, &self.collection, self.max_age_secs, self.interval_secs, self.limit)
    }
}

/// Longest accepted retention age: 100 years.
pub const MAX_RETENTION_SECS: u64 = 100 * 365 * 24 * 60 * 60;

fn check_sweep(
    name: &str,
    collection: &str,
    max_age_secs: u64,
    interval_secs: u64,
    limit: Option<usize>,
) -> Result<()> {
    if collection.is_empty() {
        return Err(CallhookError::Config(format!("retention.{name}.collection must not be empty")));
    }
    if max_age_secs == 0 || interval_secs == 0 {
        return Err(CallhookError::Config(format!(
            "retention.{name}: max_age_secs and interval_secs must be > 0"
        )));
    }
    if max_age_secs > MAX_RETENTION_SECS {
        return Err(CallhookError::Config(format!(
            "retention.{name}.max_age_secs {max_age_secs} exceeds {MAX_RETENTION_SECS}"
        )));
    }
    if limit == Some(0) {
        return Err(CallhookError::Config(format!("retention.{name}.limit must be > 0")));
    }
    Ok(())
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Shared secret expected in `X-Callhook-Token`. None = open.
    #[serde(default)]
    pub auth_token: Option<String>,
}

fn default_port() -> u16 { 8080 }
fn default_host() -> String { "0.0.0.0".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            auth_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CallhookConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.dispatch.collection, "notifications");
        assert_eq!(config.dispatch.trigger_type, "incoming_call");
        assert_eq!(config.retention.signaling.max_age_secs, 300);
        assert_eq!(config.retention.calls.max_age_secs, 86_400);
        assert_eq!(config.retention.calls.ended_at_field, "endedAt");
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            project_id = "demo-project"

            [store]
            backend = "sqlite"
            sqlite_path = "/tmp/callhook.db"

            [push]
            backend = "dry_run"

            [retention.signaling]
            max_age_secs = 120
            limit = 400
        "#;

        let config: CallhookConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project_id, "demo-project");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.push.backend, PushBackend::DryRun);
        assert_eq!(config.retention.signaling.max_age_secs, 120);
        assert_eq!(config.retention.signaling.limit, Some(400));
        assert_eq!(config.retention.signaling.collection, "signaling");
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: CallhookConfig = toml::from_str("").unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert!(config.gateway.auth_token.is_none());
        assert_eq!(config.push.endpoint, "https://fcm.googleapis.com");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("GOOGLE_CLOUD_PROJECT", "from-gcp"),
            ("CALLHOOK_ACCESS_TOKEN", "ya29.token"),
            ("CALLHOOK_GATEWAY_TOKEN", ""),
        ]);
        let mut config = CallhookConfig::default();
        config.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.project_id, "from-gcp");
        assert_eq!(config.auth.access_token, "ya29.token");
        assert!(config.gateway.auth_token.is_none());
    }

    #[test]
    fn test_validate() {
        let mut config = CallhookConfig::default();
        assert!(config.validate().is_err());

        config.project_id = "p".into();
        assert!(config.validate().is_ok());

        config.retention.signaling.max_age_secs = 0;
        assert!(config.validate().is_err());

        let mut local = CallhookConfig::default();
        local.store.backend = StoreBackend::Memory;
        local.push.backend = PushBackend::DryRun;
        assert!(local.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_oversized_max_age() {
        let mut config = CallhookConfig::default();
        config.project_id = "p".into();

        config.retention.signaling.max_age_secs = u64::MAX;
        assert!(config.validate().is_err());

        config.retention.signaling.max_age_secs = MAX_RETENTION_SECS + 1;
        assert!(config.validate().is_err());

        config.retention.signaling.max_age_secs = MAX_RETENTION_SECS;
        assert!(config.validate().is_ok());

        config.retention.calls.max_age_secs = 10_000_000_000_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_home_dir() {
        let home = CallhookConfig::home_dir();
        assert!(home.to_string_lossy().contains("callhook"));
    }
}
