//! `rsvp.toml` configuration parser.
//!
//! Every section is optional in the file. After parsing, the environment
//! variables the service has always honoured are overlaid on top, so a
//! deployment can run from env alone.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid event date {value:?} (expected YYYY-MM-DD)")]
    EventDate { value: String },

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub channel: ChannelConfig,
    pub export: ExportConfig,
    pub event: EventConfig,
    pub limits: LimitsConfig,
    pub reminder: ReminderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            static_dir: PathBuf::from(".."),
            max_body_bytes: 4 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub rsvp_path: PathBuf,
    /// Defaults to `tg_users.json` next to `rsvp_path`.
    pub identity_path: Option<PathBuf>,
    /// Defaults to `reminder_sent.json` next to `rsvp_path`.
    pub reminder_sent_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rsvp_path: PathBuf::from("data/rsvps.json"),
            identity_path: None,
            reminder_sent_path: None,
        }
    }
}

impl StorageConfig {
    fn sibling(&self, name: &str) -> PathBuf {
        self.rsvp_path
            .parent()
            .map(|dir| dir.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }

    pub fn identity_path(&self) -> PathBuf {
        self.identity_path
            .clone()
            .unwrap_or_else(|| self.sibling("tg_users.json"))
    }

    pub fn reminder_sent_path(&self) -> PathBuf {
        self.reminder_sent_path
            .clone()
            .unwrap_or_else(|| self.sibling("reminder_sent.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub api_key: String,
    /// Organizer address that receives one notice per submission.
    pub organizer: String,
    pub from: String,
    pub api_base: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            organizer: String::new(),
            from: "RSVP <onboarding@resend.dev>".to_string(),
            api_base: "https://api.resend.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Bot token; the channel is disabled when absent.
    pub bot_token: Option<String>,
    pub api_base: String,
    /// Page opened by the `/start` web-app button.
    pub web_app_url: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://api.telegram.org".to_string(),
            web_app_url: "https://example.com".to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn enabled(&self) -> bool {
        self.bot_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Shared secret for `/api/export`; export is refused when unset.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Event date in the service's local calendar. Reminders are disabled
    /// when unset.
    pub date: Option<String>,
    pub date_display: String,
    pub time_display: String,
    pub place_name: String,
    pub place_url: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            date: None,
            date_display: "22 July 2026".to_string(),
            time_display: "16:30".to_string(),
            place_name: "Venue, City".to_string(),
            place_url: "#".to_string(),
        }
    }
}

impl EventConfig {
    /// Parse the configured event date, if any.
    pub fn parsed_date(&self) -> Result<Option<NaiveDate>, ConfigError> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| ConfigError::EventDate {
                    value: raw.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window_secs: 60,
        }
    }
}

/// Which addresses are written to the sent-reminder set after a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FencePolicy {
    /// Only addresses the email collaborator confirmed.
    #[default]
    Delivered,
    /// Every attempted address, including failed sends.
    Attempted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub days_before: u32,
    /// Local hour of the daily check.
    pub check_hour: u32,
    pub startup_delay_secs: u64,
    /// Re-check delay after failed sends on the trigger day.
    pub retry_secs: u64,
    pub fence: FencePolicy,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            days_before: 10,
            check_hour: 9,
            startup_delay_secs: 60,
            retry_secs: 15 * 60,
            fence: FencePolicy::Delivered,
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from an optional file, then overlay the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Overlay environment values obtained through `lookup`. Blank values
    /// are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = get("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = get("STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        if let Some(path) = get("RSVP_DATA_PATH") {
            self.storage.rsvp_path = PathBuf::from(path);
        }
        if let Some(key) = get("RESEND_API_KEY") {
            self.email.api_key = key;
        }
        if let Some(to) = get("RSVP_TO_EMAIL") {
            self.email.organizer = to;
        }
        if let Some(from) = get("RSVP_FROM_EMAIL") {
            self.email.from = from;
        }
        if let Some(secret) = get("EXPORT_SECRET") {
            self.export.secret = Some(secret);
        }
        if let Some(token) = get("TELEGRAM_BOT_TOKEN") {
            self.channel.bot_token = Some(token);
        }
        if let Some(date) = get("WEDDING_DATE") {
            self.event.date = Some(date);
        }
        if let Some(v) = get("WEDDING_PLACE_NAME") {
            self.event.place_name = v;
        }
        if let Some(v) = get("WEDDING_PLACE_URL") {
            self.event.place_url = v;
        }
        if let Some(v) = get("WEDDING_DATE_DISPLAY") {
            self.event.date_display = v;
        }
        if let Some(v) = get("WEDDING_TIME_DISPLAY") {
            self.event.time_display = v;
        }
    }

    /// Check required settings and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("email.api_key (RESEND_API_KEY)"));
        }
        if self.email.organizer.trim().is_empty() {
            return Err(ConfigError::Missing("email.organizer (RSVP_TO_EMAIL)"));
        }
        if self.limits.max_requests == 0 || self.limits.window_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "limits",
                reason: "max_requests and window_secs must be positive".to_string(),
            });
        }
        if self.reminder.check_hour > 23 {
            return Err(ConfigError::Invalid {
                name: "reminder.check_hour",
                reason: format!("{} is not an hour of the day", self.reminder.check_hour),
            });
        }
        self.event.parsed_date()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_legacy_layout() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.identity_path(), PathBuf::from("data/tg_users.json"));
        assert_eq!(
            config.storage.reminder_sent_path(),
            PathBuf::from("data/reminder_sent.json")
        );
        assert_eq!(config.limits.max_requests, 5);
        assert_eq!(config.reminder.days_before, 10);
        assert!(!config.channel.enabled());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml_str = r#"
[email]
api_key = "re_123"
organizer = "host@example.com"

[event]
date = "2026-07-22"

[reminder]
fence = "attempted"
"#;
        let config: ServiceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.email.organizer, "host@example.com");
        assert_eq!(config.reminder.fence, FencePolicy::Attempted);
        assert_eq!(
            config.event.parsed_date().unwrap(),
            NaiveDate::from_ymd_opt(2026, 7, 22)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = ServiceConfig::default();
        let vars = env(&[
            ("PORT", "9090"),
            ("RSVP_DATA_PATH", "/srv/rsvp/list.json"),
            ("RESEND_API_KEY", "re_abc"),
            ("RSVP_TO_EMAIL", " host@example.com "),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("EXPORT_SECRET", ""),
        ]);
        config.apply_env(|name| vars.get(name).cloned());

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.email.organizer, "host@example.com");
        assert_eq!(
            config.storage.identity_path(),
            PathBuf::from("/srv/rsvp/tg_users.json")
        );
        assert!(config.channel.enabled());
        assert_eq!(config.export.secret, None);
    }

    #[test]
    fn missing_email_settings_fail_validation() {
        let config = ServiceConfig::default();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn bad_event_date_fails_validation() {
        let mut config = ServiceConfig::default();
        config.email.api_key = "k".to_string();
        config.email.organizer = "o@example.com".to_string();
        config.event.date = Some("22.07.2026".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EventDate { .. })
        ));
    }
}
