// Profile persistence seen by the scheduler
use super::app::AppConfig;
use super::error::{ConfigError, ConfigResult};
use super::keys::ConfigKey;
use super::profile::{Profile, ProfileId};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_profiles(&self) -> ConfigResult<Vec<Profile>>;

    /// Fresh copy of one profile, used to pick up edits between task runs.
    async fn load_profile(&self, id: ProfileId) -> ConfigResult<Profile>;

    async fn save_value(&self, id: ProfileId, key: ConfigKey, value: &str) -> ConfigResult<()>;
}

/// Profiles stored in the `[[profiles]]` tables of the TOML config file.
///
/// The file is re-read on every load so edits made while running are picked up.
pub struct TomlProfileStore {
    path: PathBuf,
    // serialises read-modify-write cycles
    write_lock: Mutex<()>,
}

impl TomlProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ProfileStore for TomlProfileStore {
    async fn load_profiles(&self) -> ConfigResult<Vec<Profile>> {
        Ok(AppConfig::load(&self.path).await?.profiles)
    }

    async fn load_profile(&self, id: ProfileId) -> ConfigResult<Profile> {
        let config = AppConfig::load(&self.path).await?;
        config.profile(id).cloned()
    }

    async fn save_value(&self, id: ProfileId, key: ConfigKey, value: &str) -> ConfigResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut config = AppConfig::load(&self.path).await?;
        let profile = config
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ConfigError::UnknownProfile(id))?;
        profile.config.set(key, value)?;
        config.save(&self.path).await?;
        log::debug!("💾 Saved {key}={value} for profile {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_value_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler.toml");
        tokio::fs::write(
            &path,
            "[[profiles]]\nid = 7\nname = \"alt\"\nemulator = \"emulator-5554\"\n",
        )
        .await
        .unwrap();

        let store = TomlProfileStore::new(&path);
        store
            .save_value(7, ConfigKey::ReconnectionMinutes, "5")
            .await
            .unwrap();

        let profile = store.load_profile(7).await.unwrap();
        assert_eq!(profile.config.get_int(ConfigKey::ReconnectionMinutes), 5);
        assert_eq!(store.load_profiles().await.unwrap().len(), 1);

        let err = store.save_value(8, ConfigKey::ReconnectionMinutes, "5").await.unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile(8)));
    }
}
