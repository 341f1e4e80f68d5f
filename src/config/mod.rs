//! Configuration: the key catalog, profiles and the TOML config file.

pub mod app;
pub mod error;
pub mod keys;
pub mod profile;
pub mod store;

pub use app::{AppConfig, DEFAULT_CONFIG_FILE, SchedulerSettings};
pub use error::{ConfigError, ConfigResult};
pub use keys::{ConfigKey, ValueKind};
pub use profile::{IdleBehavior, Profile, ProfileConfig, ProfileId};
pub use store::{ProfileStore, TomlProfileStore};
