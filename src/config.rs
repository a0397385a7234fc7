//! Konfiguration des Coordinators
//!
//! Defaults sind im Code, Umgebungsvariablen überschreiben sie
//! (z.B. `SIGNALING_URL`, `CALL_RECONNECT_TIMEOUT_MS`).

use crate::error::ConfigError;
use crate::reconnect::BackoffPolicy;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Default Signaling-Endpunkt für lokale Entwicklung
pub const DEFAULT_SIGNALING_URL: &str = "ws://127.0.0.1:8787/ws";

/// Ladetimeout für Raum erstellen / betreten
pub const DEFAULT_LOADING_TIMEOUT_MS: u64 = 300_000;

pub const DEFAULT_RING_TIMEOUT_MS: u64 = 60_000;

/// Wie lange darf das Signaling während eines Anrufs weg sein
pub const DEFAULT_RECONNECT_TIMEOUT_MS: u64 = 300_000;

/// Anzeigedauer eines Terminal-Zustands bevor auf `NONE` zurückgesetzt wird
pub const DEFAULT_DISPLAY_WINDOW_MS: u64 = 3_000;

pub const DEFAULT_BUTTONS_BLOCK_MS: u64 = 3_000;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// WebSocket-Endpunkt, beim Laden geprüft
    pub signaling_url: String,
    /// Eigene User-ID; taucht nie im Roster auf
    pub local_user_id: String,
    pub loading_timeout: Duration,
    pub ring_timeout: Duration,
    pub reconnect_timeout: Duration,
    pub terminal_display_window: Duration,
    pub buttons_block_window: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            signaling_url: DEFAULT_SIGNALING_URL.to_string(),
            local_user_id: Uuid::new_v4().to_string(),
            loading_timeout: Duration::from_millis(DEFAULT_LOADING_TIMEOUT_MS),
            ring_timeout: Duration::from_millis(DEFAULT_RING_TIMEOUT_MS),
            reconnect_timeout: Duration::from_millis(DEFAULT_RECONNECT_TIMEOUT_MS),
            terminal_display_window: Duration::from_millis(DEFAULT_DISPLAY_WINDOW_MS),
            buttons_block_window: Duration::from_millis(DEFAULT_BUTTONS_BLOCK_MS),
            backoff: BackoffPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Lädt die Konfiguration aus der Prozess-Umgebung
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Wie `from_env`, aber mit beliebiger Quelle (für Tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SIGNALING_URL") {
            let parsed = Url::parse(&url)?;
            if !matches!(parsed.scheme(), "ws" | "wss" | "http" | "https") {
                return Err(ConfigError::InvalidValue {
                    key: "SIGNALING_URL",
                    reason: format!("unsupported scheme '{}'", parsed.scheme()),
                });
            }
            config.signaling_url = parsed.to_string();
        }
        if let Some(id) = lookup("CALL_LOCAL_USER_ID") {
            if id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "CALL_LOCAL_USER_ID",
                    reason: "must not be empty".to_string(),
                });
            }
            config.local_user_id = id;
        }

        let millis = |key: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| ConfigError::InvalidValue {
                        key,
                        reason: e.to_string(),
                    }),
                None => Ok(fallback),
            }
        };

        config.loading_timeout = millis("CALL_LOADING_TIMEOUT_MS", config.loading_timeout)?;
        config.ring_timeout = millis("CALL_RING_TIMEOUT_MS", config.ring_timeout)?;
        config.reconnect_timeout = millis("CALL_RECONNECT_TIMEOUT_MS", config.reconnect_timeout)?;
        config.terminal_display_window =
            millis("CALL_DISPLAY_WINDOW_MS", config.terminal_display_window)?;
        config.buttons_block_window = millis("CALL_BUTTONS_BLOCK_MS", config.buttons_block_window)?;

        Ok(config)
    }
}
