//! User settings.
//!
//! Persisted by the backend as camelCase JSON. Every field has a default so
//! a partial or older settings file still loads.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sklad_common::{Error, Result};

/// Auto-lock timeout applied when none is configured.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Colour scheme of the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    #[default]
    System,
}

/// Vault related settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecuritySettings {
    /// Auto-lock timeout in seconds. Zero selects [`DEFAULT_LOCK_TIMEOUT`].
    pub lock_timeout: u64,
    /// Clear the clipboard some time after copying a secret.
    pub clear_clipboard: bool,
    /// Whether a master password has been set up.
    pub master_password_enabled: bool,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT.as_secs(),
            clear_clipboard: false,
            master_password_enabled: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub security: SecuritySettings,
    pub notifications_enabled: bool,
    pub launch_at_startup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            security: SecuritySettings::default(),
            notifications_enabled: true,
            launch_at_startup: false,
        }
    }
}

impl Settings {
    /// Effective auto-lock timeout.
    pub fn lock_timeout(&self) -> Duration {
        match self.security.lock_timeout {
            0 => DEFAULT_LOCK_TIMEOUT,
            secs => Duration::from_secs(secs),
        }
    }

    pub fn master_password_enabled(&self) -> bool {
        self.security.master_password_enabled
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// File name of the settings document in the data directory.
pub const SETTINGS_FILENAME: &str = "settings.json";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.lock_timeout(), Duration::from_secs(300));
        assert!(!settings.master_password_enabled());
        assert!(settings.notifications_enabled);
        assert_eq!(settings.theme, Theme::System);
    }

    #[test]
    fn test_zero_timeout_means_default() {
        let mut settings = Settings::default();
        settings.security.lock_timeout = 0;
        assert_eq!(settings.lock_timeout(), DEFAULT_LOCK_TIMEOUT);

        settings.security.lock_timeout = 30;
        assert_eq!(settings.lock_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_camel_case_on_disk() {
        let json = Settings::default().to_json().unwrap();
        assert!(json.contains("\"masterPasswordEnabled\": false"));
        assert!(json.contains("\"lockTimeout\": 300"));
        assert!(json.contains("\"notificationsEnabled\": true"));
        assert!(json.contains("\"theme\": \"system\""));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let settings =
            Settings::from_json(r#"{"theme":"dark","security":{"masterPasswordEnabled":true}}"#)
                .unwrap();

        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.master_password_enabled());
        assert_eq!(settings.security.lock_timeout, 300);
        assert!(settings.notifications_enabled);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        assert!(matches!(
            Settings::from_json("{not json"),
            Err(Error::Serialization(_))
        ));
    }
}
