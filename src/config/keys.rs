//! Catalog of per-profile configuration keys.
//!
//! Each key has a declared value kind and a string-encoded default, so a
//! profile's `[config]` table only needs to carry the values it overrides.

use std::fmt;

/// Kind of value a key holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Integer,
    Text,
    /// Comma separated list of words
    List,
    Choice(&'static [&'static str]),
}

impl ValueKind {
    pub fn accepts(&self, raw: &str) -> bool {
        let raw = raw.trim();
        match self {
            ValueKind::Bool => raw.parse::<bool>().is_ok(),
            ValueKind::Integer => raw.parse::<i64>().is_ok(),
            ValueKind::Text | ValueKind::List => true,
            ValueKind::Choice(options) => options.contains(&raw),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ValueKind::Bool => "true or false".to_string(),
            ValueKind::Integer => "an integer".to_string(),
            ValueKind::Text => "text".to_string(),
            ValueKind::List => "a comma separated list".to_string(),
            ValueKind::Choice(options) => format!("one of {}", options.join(", ")),
        }
    }
}

pub const IDLE_BEHAVIORS: &[&str] = &["background", "close_emulator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigKey {
    MaxIdleMinutes,
    IdleBehavior,
    ReconnectionMinutes,
    AutoHelpAlliance,
    AutoScheduleDailyMissions,
    DailyMissionsEnabled,
    DailyMissionsIntervalMinutes,
    GatherEnabled,
    GatherResources,
    GatherIntervalMinutes,
    OnlineRewardsEnabled,
    OnlineRewardsIntervalMinutes,
    MailRewardsEnabled,
    MailRewardsIntervalMinutes,
    AllianceChestsEnabled,
    AllianceChestsIntervalMinutes,
    TrainTroopsEnabled,
    TrainTroopsIntervalMinutes,
    IntelEnabled,
    IntelIntervalMinutes,
    IntelMinStamina,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 21] = [
        ConfigKey::MaxIdleMinutes,
        ConfigKey::IdleBehavior,
        ConfigKey::ReconnectionMinutes,
        ConfigKey::AutoHelpAlliance,
        ConfigKey::AutoScheduleDailyMissions,
        ConfigKey::DailyMissionsEnabled,
        ConfigKey::DailyMissionsIntervalMinutes,
        ConfigKey::GatherEnabled,
        ConfigKey::GatherResources,
        ConfigKey::GatherIntervalMinutes,
        ConfigKey::OnlineRewardsEnabled,
        ConfigKey::OnlineRewardsIntervalMinutes,
        ConfigKey::MailRewardsEnabled,
        ConfigKey::MailRewardsIntervalMinutes,
        ConfigKey::AllianceChestsEnabled,
        ConfigKey::AllianceChestsIntervalMinutes,
        ConfigKey::TrainTroopsEnabled,
        ConfigKey::TrainTroopsIntervalMinutes,
        ConfigKey::IntelEnabled,
        ConfigKey::IntelIntervalMinutes,
        ConfigKey::IntelMinStamina,
    ];

    /// (file name, kind, default)
    const fn spec(self) -> (&'static str, ValueKind, &'static str) {
        use ValueKind::*;
        match self {
            ConfigKey::MaxIdleMinutes => ("max_idle_minutes", Integer, "15"),
            ConfigKey::IdleBehavior => ("idle_behavior", Choice(IDLE_BEHAVIORS), "close_emulator"),
            ConfigKey::ReconnectionMinutes => ("reconnection_minutes", Integer, "0"),
            ConfigKey::AutoHelpAlliance => ("auto_help_alliance", Bool, "false"),
            ConfigKey::AutoScheduleDailyMissions => ("auto_schedule_daily_missions", Bool, "false"),
            ConfigKey::DailyMissionsEnabled => ("daily_missions_enabled", Bool, "true"),
            ConfigKey::DailyMissionsIntervalMinutes => ("daily_missions_interval_minutes", Integer, "120"),
            ConfigKey::GatherEnabled => ("gather_enabled", Bool, "false"),
            ConfigKey::GatherResources => ("gather_resources", List, "meat,wood"),
            ConfigKey::GatherIntervalMinutes => ("gather_interval_minutes", Integer, "90"),
            ConfigKey::OnlineRewardsEnabled => ("online_rewards_enabled", Bool, "true"),
            ConfigKey::OnlineRewardsIntervalMinutes => ("online_rewards_interval_minutes", Integer, "60"),
            ConfigKey::MailRewardsEnabled => ("mail_rewards_enabled", Bool, "true"),
            ConfigKey::MailRewardsIntervalMinutes => ("mail_rewards_interval_minutes", Integer, "240"),
            ConfigKey::AllianceChestsEnabled => ("alliance_chests_enabled", Bool, "false"),
            ConfigKey::AllianceChestsIntervalMinutes => ("alliance_chests_interval_minutes", Integer, "180"),
            ConfigKey::TrainTroopsEnabled => ("train_troops_enabled", Bool, "false"),
            ConfigKey::TrainTroopsIntervalMinutes => ("train_troops_interval_minutes", Integer, "60"),
            ConfigKey::IntelEnabled => ("intel_enabled", Bool, "false"),
            ConfigKey::IntelIntervalMinutes => ("intel_interval_minutes", Integer, "45"),
            ConfigKey::IntelMinStamina => ("intel_min_stamina", Integer, "20"),
        }
    }

    pub const fn name(self) -> &'static str {
        self.spec().0
    }

    pub const fn kind(self) -> ValueKind {
        self.spec().1
    }

    pub const fn default_value(self) -> &'static str {
        self.spec().2
    }

    pub fn from_name(name: &str) -> Option<ConfigKey> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
