// Closed catalog of task types
use crate::config::ConfigKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Bootstrap: restores the game to a known screen
    Initialize,
    DailyMissions,
    Gather,
    OnlineRewards,
    MailRewards,
    AllianceChests,
    TrainTroops,
    Intel,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Initialize,
        TaskType::DailyMissions,
        TaskType::Gather,
        TaskType::OnlineRewards,
        TaskType::MailRewards,
        TaskType::AllianceChests,
        TaskType::TrainTroops,
        TaskType::Intel,
    ];

    /// Stable numeric id
    pub const fn id(self) -> u32 {
        match self {
            TaskType::Initialize => 0,
            TaskType::DailyMissions => 1,
            TaskType::Gather => 2,
            TaskType::OnlineRewards => 3,
            TaskType::MailRewards => 4,
            TaskType::AllianceChests => 5,
            TaskType::TrainTroops => 6,
            TaskType::Intel => 7,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TaskType::Initialize => "Initialize",
            TaskType::DailyMissions => "Daily Missions",
            TaskType::Gather => "Gather Resources",
            TaskType::OnlineRewards => "Online Rewards",
            TaskType::MailRewards => "Mail Rewards",
            TaskType::AllianceChests => "Alliance Chests",
            TaskType::TrainTroops => "Train Troops",
            TaskType::Intel => "Intel",
        }
    }

    /// Boolean key that switches the task on, `None` for tasks that always run.
    pub const fn enabled_key(self) -> Option<ConfigKey> {
        match self {
            TaskType::Initialize => None,
            TaskType::DailyMissions => Some(ConfigKey::DailyMissionsEnabled),
            TaskType::Gather => Some(ConfigKey::GatherEnabled),
            TaskType::OnlineRewards => Some(ConfigKey::OnlineRewardsEnabled),
            TaskType::MailRewards => Some(ConfigKey::MailRewardsEnabled),
            TaskType::AllianceChests => Some(ConfigKey::AllianceChestsEnabled),
            TaskType::TrainTroops => Some(ConfigKey::TrainTroopsEnabled),
            TaskType::Intel => Some(ConfigKey::IntelEnabled),
        }
    }

    pub const fn is_bootstrap(self) -> bool {
        matches!(self, TaskType::Initialize)
    }

    pub fn from_id(id: u32) -> Option<TaskType> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
