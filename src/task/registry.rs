//! Task type -> constructor table.

use super::bodies::{DailyMissions, Gather, Initialize, Routine, routine};
use super::kind::TaskType;
use super::scheduled::ScheduledTask;
use crate::config::{ConfigKey, Profile};
use std::collections::BTreeMap;

/// Builds a fresh task for a profile; the second argument is the discriminator.
pub type TaskFactory = fn(&Profile, &str) -> ScheduledTask;
/// Discriminators a profile needs instances for, `[""]` for unkeyed types.
pub type KeySource = fn(&Profile) -> Vec<String>;

#[derive(Clone, Copy)]
struct Entry {
    factory: TaskFactory,
    keys: KeySource,
}

fn unkeyed(_: &Profile) -> Vec<String> {
    vec![String::new()]
}

fn gather_resources(profile: &Profile) -> Vec<String> {
    profile.config.get_list(ConfigKey::GatherResources)
}

fn initialize(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::Initialize, profile, Initialize).recurring(false)
}

fn daily_missions(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::DailyMissions, profile, DailyMissions)
}

fn gather(profile: &Profile, resource: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::Gather, profile, Gather::new(resource)).with_discriminator(resource)
}

fn online_rewards(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::OnlineRewards, profile, Routine::new(&routine::ONLINE_REWARDS))
}

fn mail_rewards(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::MailRewards, profile, Routine::new(&routine::MAIL_REWARDS))
}

fn alliance_chests(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::AllianceChests, profile, Routine::new(&routine::ALLIANCE_CHESTS))
}

fn train_troops(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::TrainTroops, profile, Routine::new(&routine::TRAIN_TROOPS))
}

fn intel(profile: &Profile, _: &str) -> ScheduledTask {
    ScheduledTask::new(TaskType::Intel, profile, Routine::new(&routine::INTEL))
}

const BUNDLED: [(TaskType, TaskFactory, KeySource); 8] = [
    (TaskType::Initialize, initialize, unkeyed),
    (TaskType::DailyMissions, daily_missions, unkeyed),
    (TaskType::Gather, gather, gather_resources),
    (TaskType::OnlineRewards, online_rewards, unkeyed),
    (TaskType::MailRewards, mail_rewards, unkeyed),
    (TaskType::AllianceChests, alliance_chests, unkeyed),
    (TaskType::TrainTroops, train_troops, unkeyed),
    (TaskType::Intel, intel, unkeyed),
];

pub struct TaskRegistry {
    entries: BTreeMap<TaskType, Entry>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (task_type, factory, keys) in BUNDLED {
            registry.register(task_type, factory, keys);
        }
        registry
    }
}

impl TaskRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register or replace the constructor of a task type.
    pub fn register(&mut self, task_type: TaskType, factory: TaskFactory, keys: KeySource) {
        self.entries.insert(task_type, Entry { factory, keys });
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.entries.contains_key(&task_type)
    }

    pub fn task_types(&self) -> impl Iterator<Item = TaskType> + '_ {
        self.entries.keys().copied()
    }

    /// One task of an unkeyed type, or the first configured instance of a keyed one.
    pub fn create(&self, task_type: TaskType, profile: &Profile) -> Option<ScheduledTask> {
        self.create_all(task_type, profile).into_iter().next()
    }

    pub fn create_keyed(&self, task_type: TaskType, profile: &Profile, key: &str) -> Option<ScheduledTask> {
        self.entries
            .get(&task_type)
            .map(|entry| (entry.factory)(profile, key))
    }

    /// Every instance `profile` needs of `task_type`.
    pub fn create_all(&self, task_type: TaskType, profile: &Profile) -> Vec<ScheduledTask> {
        let Some(entry) = self.entries.get(&task_type) else {
            return Vec::new();
        };
        (entry.keys)(profile)
            .iter()
            .map(|key| (entry.factory)(profile, key))
            .collect()
    }

    /// Tasks a profile starts with: every enabled, registered, non-bootstrap type.
    pub fn initial_tasks(&self, profile: &Profile) -> Vec<ScheduledTask> {
        self.task_types()
            .filter(|t| !t.is_bootstrap())
            .filter(|t| t.enabled_key().is_none_or(|key| profile.config.get_bool(key)))
            .flat_map(|t| self.create_all(t, profile))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileConfig;

    fn profile() -> Profile {
        let mut p = Profile::new(4, "four", "emulator-5554");
        p.config = ProfileConfig::new()
            .with(ConfigKey::GatherEnabled, "true")
            .unwrap()
            .with(ConfigKey::GatherResources, "coal, iron")
            .unwrap()
            .with(ConfigKey::MailRewardsEnabled, "false")
            .unwrap();
        p
    }

    #[test]
    fn test_bundled_registry_covers_catalog() {
        let registry = TaskRegistry::default();
        for t in TaskType::ALL {
            assert!(registry.contains(t), "{t} missing");
        }
        let init = registry.create(TaskType::Initialize, &profile()).unwrap();
        assert!(init.is_bootstrap());
        assert!(!init.is_recurring());
    }

    #[test]
    fn test_gather_instances_are_keyed_by_resource() {
        let registry = TaskRegistry::default();
        let tasks = registry.create_all(TaskType::Gather, &profile());
        let keys: Vec<_> = tasks.iter().map(|t| t.discriminator().to_string()).collect();
        assert_eq!(keys, vec!["coal", "iron"]);
        assert_ne!(tasks[0], tasks[1]);
        assert_eq!(tasks[0].name(), "Gather Resources (coal)");
    }

    #[test]
    fn test_initial_tasks_follow_enabled_keys() {
        let registry = TaskRegistry::default();
        let types: Vec<_> = registry
            .initial_tasks(&profile())
            .iter()
            .map(|t| t.task_type())
            .collect();
        // defaults: daily missions and online rewards on, mail switched off above
        assert_eq!(
            types,
            vec![
                TaskType::DailyMissions,
                TaskType::Gather,
                TaskType::Gather,
                TaskType::OnlineRewards
            ]
        );
    }

    #[test]
    fn test_empty_registry_creates_nothing() {
        let registry = TaskRegistry::empty();
        assert!(registry.create(TaskType::Intel, &profile()).is_none());
        assert!(registry.create_all(TaskType::Intel, &profile()).is_empty());
    }
}
