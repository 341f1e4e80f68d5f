// Profiles and their typed configuration values
use super::error::{ConfigError, ConfigResult};
use super::keys::{ConfigKey, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub type ProfileId = i64;

/// What to do with an emulator during a long gap between tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdleBehavior {
    /// Send the game to background, keep the emulator process
    Background,
    /// Close the emulator and give its slot back
    CloseEmulator,
}

impl IdleBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdleBehavior::Background => "background",
            IdleBehavior::CloseEmulator => "close_emulator",
        }
    }
}

impl FromStr for IdleBehavior {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "background" => Ok(IdleBehavior::Background),
            "close_emulator" => Ok(IdleBehavior::CloseEmulator),
            other => Err(ConfigError::InvalidValue {
                key: ConfigKey::IdleBehavior.name(),
                value: other.to_string(),
                expected: ConfigKey::IdleBehavior.kind().describe(),
            }),
        }
    }
}

impl fmt::Display for IdleBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A profile's `[config]` table.
///
/// Values are kept as written in the file; typed getters validate against the
/// key's kind and fall back to the declared default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileConfig {
    values: BTreeMap<String, toml::Value>,
}

impl ProfileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw string form of a key, default included.
    pub fn raw(&self, key: ConfigKey) -> String {
        match self.values.get(key.name()) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Some(other) => other.to_string(),
            None => key.default_value().to_string(),
        }
    }

    fn checked(&self, key: ConfigKey) -> String {
        let raw = self.raw(key);
        if key.kind().accepts(&raw) {
            raw
        } else {
            log::warn!(
                "⚠️ Invalid value '{raw}' for {key} (expected {}), using default '{}'",
                key.kind().describe(),
                key.default_value()
            );
            key.default_value().to_string()
        }
    }

    pub fn get_bool(&self, key: ConfigKey) -> bool {
        self.checked(key).trim().parse().unwrap_or(false)
    }

    pub fn get_int(&self, key: ConfigKey) -> i64 {
        self.checked(key).trim().parse().unwrap_or(0)
    }

    pub fn get_text(&self, key: ConfigKey) -> String {
        self.checked(key)
    }

    pub fn get_list(&self, key: ConfigKey) -> Vec<String> {
        self.checked(key)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn get_minutes(&self, key: ConfigKey) -> Duration {
        Duration::from_secs(self.get_int(key).max(0) as u64 * 60)
    }

    pub fn idle_behavior(&self) -> IdleBehavior {
        self.checked(ConfigKey::IdleBehavior)
            .parse()
            .unwrap_or(IdleBehavior::CloseEmulator)
    }

    pub fn max_idle(&self) -> Duration {
        self.get_minutes(ConfigKey::MaxIdleMinutes)
    }

    /// Set a value from its string form, validated against the key's kind.
    pub fn set(&mut self, key: ConfigKey, raw: &str) -> ConfigResult<()> {
        let kind = key.kind();
        if !kind.accepts(raw) {
            return Err(ConfigError::InvalidValue {
                key: key.name(),
                value: raw.to_string(),
                expected: kind.describe(),
            });
        }
        let raw = raw.trim();
        let value = match kind {
            ValueKind::Bool => toml::Value::Boolean(raw.parse().unwrap_or(false)),
            ValueKind::Integer => toml::Value::Integer(raw.parse().unwrap_or(0)),
            ValueKind::Text | ValueKind::List | ValueKind::Choice(_) => {
                toml::Value::String(raw.to_string())
            }
        };
        self.values.insert(key.name().to_string(), value);
        Ok(())
    }

    pub fn with(mut self, key: ConfigKey, raw: &str) -> ConfigResult<Self> {
        self.set(key, raw)?;
        Ok(self)
    }

    /// Names present in the table that are not catalog keys.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| ConfigKey::from_name(name).is_none())
            .collect()
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    /// adb serial of the emulator this profile drives
    pub emulator: String,
    /// Emulator manager instance id, used by the launch/close commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Higher is served first when emulator slots are contended
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: ProfileConfig,
}

impl Profile {
    pub fn new(id: ProfileId, name: impl Into<String>, emulator: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            emulator: emulator.into(),
            instance: None,
            priority: 0,
            enabled: true,
            config: ProfileConfig::default(),
        }
    }
}
