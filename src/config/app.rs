// Application configuration file (TOML)
use super::error::{ConfigError, ConfigResult};
use super::profile::{Profile, ProfileId};
use crate::adb::EmulatorCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "scheduler.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Emulator instances allowed to run at once
    pub max_emulator_slots: usize,
    /// Delay between starting consecutive profile queues
    pub start_stagger_ms: u64,
    pub templates_dir: PathBuf,
    /// Android package name of the game
    pub game_package: String,
    /// JSON file for task state, kept across restarts when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_emulator_slots: 1,
            start_stagger_ms: 1000,
            templates_dir: PathBuf::from("templates"),
            game_package: "com.gof.global".to_string(),
            state_file: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub emulator: EmulatorCommands,
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(text)?;
        for profile in &config.profiles {
            for key in profile.config.unknown_keys() {
                log::warn!("⚠️ Profile '{}': ignoring unknown config key '{key}'", profile.name);
            }
        }
        Ok(config)
    }

    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    pub async fn save(&self, path: &Path) -> ConfigResult<()> {
        let text = toml::to_string_pretty(self)?;
        tokio::fs::write(path, text)
            .await
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn profile(&self, id: ProfileId) -> ConfigResult<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.id == id)
            .ok_or(ConfigError::UnknownProfile(id))
    }

    /// adb serial -> emulator manager instance, for profiles that set one.
    pub fn emulator_instances(&self) -> HashMap<String, String> {
        self.profiles
            .iter()
            .filter_map(|p| p.instance.clone().map(|i| (p.emulator.clone(), i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigKey;

    const SAMPLE: &str = r#"
[scheduler]
max_emulator_slots = 2
templates_dir = "assets/templates"

[emulator]
launch = ["MuMuManager.exe", "control", "-v", "{instance}", "launch"]
close = ["MuMuManager.exe", "control", "-v", "{instance}", "shutdown"]

[[profiles]]
id = 1
name = "main"
emulator = "127.0.0.1:16384"
instance = "0"
priority = 100

[profiles.config]
max_idle_minutes = 10
idle_behavior = "background"

[[profiles]]
id = 2
name = "farm"
emulator = "127.0.0.1:16416"
enabled = false
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.scheduler.max_emulator_slots, 2);
        assert_eq!(config.scheduler.start_stagger_ms, 1000);
        assert_eq!(config.emulator.boot_timeout_secs, 120);
        assert_eq!(config.profiles.len(), 2);

        let main = config.profile(1).unwrap();
        assert_eq!(main.priority, 100);
        assert_eq!(main.config.get_int(ConfigKey::MaxIdleMinutes), 10);
        assert!(!config.profile(2).unwrap().enabled);
        assert!(matches!(config.profile(9), Err(ConfigError::UnknownProfile(9))));

        let instances = config.emulator_instances();
        assert_eq!(instances.get("127.0.0.1:16384").map(String::as_str), Some("0"));
        assert_eq!(instances.len(), 1);
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.toml");
        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.profiles[1]
            .config
            .set(ConfigKey::AutoHelpAlliance, "true")
            .unwrap();
        config.save(&path).await.unwrap();

        let reloaded = AppConfig::load(&path).await.unwrap();
        assert!(reloaded.profiles[1].config.get_bool(ConfigKey::AutoHelpAlliance));
        assert_eq!(reloaded.profiles[0].instance.as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let err = AppConfig::load(Path::new("/nonexistent/scheduler.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
