//! Typed settings.
//!
//! The `settings` table is key/value TEXT, but the key space is closed:
//! every key has a declared value shape, checked before anything is written.
//! Unknown keys and wrong-shaped values are validation errors.

use std::fmt;
use std::str::FromStr;

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::LedgerDb;
use crate::error::ServiceError;
use crate::util::now_ts;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    AgentName,
    Theme,
    PollIntervalSecs,
    Timezone,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::AgentName => "agent_name",
            SettingKey::Theme => "theme",
            SettingKey::PollIntervalSecs => "poll_interval_secs",
            SettingKey::Timezone => "timezone",
        }
    }
}

impl FromStr for SettingKey {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agent_name" => Ok(SettingKey::AgentName),
            "theme" => Ok(SettingKey::Theme),
            "poll_interval_secs" => Ok(SettingKey::PollIntervalSecs),
            "timezone" => Ok(SettingKey::Timezone),
            other => Err(ServiceError::Validation(format!(
                "unknown setting key: {other}"
            ))),
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const THEMES: [&str; 3] = ["dark", "light", "system"];
const POLL_MIN: i64 = 1;
const POLL_MAX: i64 = 3600;

/// Check a JSON value against the key's declared shape.
fn validate_value(key: SettingKey, value: &Value) -> Result<(), ServiceError> {
    match key {
        SettingKey::AgentName | SettingKey::Timezone => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(()),
            _ => Err(ServiceError::Validation(format!(
                "{key} must be a non-empty string"
            ))),
        },
        SettingKey::Theme => match value.as_str() {
            Some(s) if THEMES.contains(&s) => Ok(()),
            _ => Err(ServiceError::Validation(
                "theme must be one of dark, light, system".to_string(),
            )),
        },
        SettingKey::PollIntervalSecs => match value.as_i64() {
            Some(n) if (POLL_MIN..=POLL_MAX).contains(&n) => Ok(()),
            _ => Err(ServiceError::Validation(format!(
                "poll_interval_secs must be an integer between {POLL_MIN} and {POLL_MAX}"
            ))),
        },
    }
}

/// Write one setting, validating the value shape first.
pub fn set(db: &LedgerDb, key: SettingKey, value: &Value) -> Result<(), ServiceError> {
    validate_value(key, value)?;
    db.conn_ref().execute(
        "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key.as_str(), value.to_string(), now_ts()],
    )?;
    Ok(())
}

/// Read one setting's raw JSON value, if present.
pub fn get(db: &LedgerDb, key: SettingKey) -> Result<Option<Value>, ServiceError> {
    let raw: Option<String> = db
        .conn_ref()
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(s) => serde_json::from_str(&s).map(Some).map_err(|e| {
            ServiceError::Inconsistency(format!("setting {key} holds malformed JSON: {e}"))
        }),
    }
}

/// The full settings snapshot with defaults filled in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub agent_name: String,
    pub theme: String,
    pub poll_interval_secs: i64,
    pub timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            agent_name: "agent".to_string(),
            theme: "dark".to_string(),
            poll_interval_secs: 30,
            timezone: "UTC".to_string(),
        }
    }
}

pub fn load(db: &LedgerDb) -> Result<Settings, ServiceError> {
    let mut settings = Settings::default();
    if let Some(v) = get(db, SettingKey::AgentName)? {
        if let Some(s) = v.as_str() {
            settings.agent_name = s.to_string();
        }
    }
    if let Some(v) = get(db, SettingKey::Theme)? {
        if let Some(s) = v.as_str() {
            settings.theme = s.to_string();
        }
    }
    if let Some(v) = get(db, SettingKey::PollIntervalSecs)? {
        if let Some(n) = v.as_i64() {
            settings.poll_interval_secs = n;
        }
    }
    if let Some(v) = get(db, SettingKey::Timezone)? {
        if let Some(s) = v.as_str() {
            settings.timezone = s.to_string();
        }
    }
    Ok(settings)
}
