//! Simple tasks described by a table of template taps.
//!
//! Each routine walks its steps in order, tapping the template of each step.
//! A missing required step ends the run early (there is nothing to collect);
//! optional steps are skipped when absent. The task then reschedules itself
//! on its interval key.

use crate::config::ConfigKey;
use crate::task::context::TaskContext;
use crate::task::error::TaskError;
use crate::task::kind::TaskType;
use crate::task::navigation::ScreenLocation;
use crate::task::scheduled::{Schedule, TaskBody};
use crate::vision::templates;
use async_trait::async_trait;
use std::time::Duration;

/// Stamina spent by one intel mission
const INTEL_STAMINA_COST: u32 = 10;
/// Wait for regeneration when stamina is short
const LOW_STAMINA_RETRY: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub template: &'static str,
    pub optional: bool,
    pub wait: Duration,
}

const fn tap(template: &'static str) -> Step {
    Step {
        template,
        optional: false,
        wait: Duration::from_millis(700),
    }
}

const fn maybe(template: &'static str) -> Step {
    Step {
        template,
        optional: true,
        wait: Duration::from_millis(700),
    }
}

#[derive(Debug)]
pub struct RoutineSpec {
    pub task_type: TaskType,
    pub location: ScreenLocation,
    pub interval_key: ConfigKey,
    pub steps: &'static [Step],
    pub consumes_stamina: bool,
    pub provides_daily_progress: bool,
}

pub const ONLINE_REWARDS: RoutineSpec = RoutineSpec {
    task_type: TaskType::OnlineRewards,
    location: ScreenLocation::Home,
    interval_key: ConfigKey::OnlineRewardsIntervalMinutes,
    steps: &[tap(templates::ONLINE_REWARDS_CHEST), maybe(templates::CLOSE_BUTTON)],
    consumes_stamina: false,
    provides_daily_progress: false,
};

pub const MAIL_REWARDS: RoutineSpec = RoutineSpec {
    task_type: TaskType::MailRewards,
    location: ScreenLocation::Any,
    interval_key: ConfigKey::MailRewardsIntervalMinutes,
    steps: &[tap(templates::MAIL_BUTTON), maybe(templates::MAIL_CLAIM_ALL)],
    consumes_stamina: false,
    provides_daily_progress: false,
};

pub const ALLIANCE_CHESTS: RoutineSpec = RoutineSpec {
    task_type: TaskType::AllianceChests,
    location: ScreenLocation::Home,
    interval_key: ConfigKey::AllianceChestsIntervalMinutes,
    steps: &[
        tap(templates::ALLIANCE_BUTTON),
        tap(templates::ALLIANCE_CHESTS_TAB),
        maybe(templates::ALLIANCE_CHESTS_CLAIM),
    ],
    consumes_stamina: false,
    provides_daily_progress: false,
};

pub const TRAIN_TROOPS: RoutineSpec = RoutineSpec {
    task_type: TaskType::TrainTroops,
    location: ScreenLocation::Home,
    interval_key: ConfigKey::TrainTroopsIntervalMinutes,
    steps: &[tap(templates::BARRACKS), tap(templates::TRAIN_BUTTON)],
    consumes_stamina: false,
    provides_daily_progress: true,
};

pub const INTEL: RoutineSpec = RoutineSpec {
    task_type: TaskType::Intel,
    location: ScreenLocation::World,
    interval_key: ConfigKey::IntelIntervalMinutes,
    steps: &[
        tap(templates::INTEL_BUTTON),
        tap(templates::INTEL_MISSION),
        maybe(templates::INTEL_VIEW),
    ],
    consumes_stamina: true,
    provides_daily_progress: true,
};

#[derive(Debug)]
pub struct Routine {
    spec: &'static RoutineSpec,
}

impl Routine {
    pub fn new(spec: &'static RoutineSpec) -> Self {
        Self { spec }
    }

    /// Whether the cached stamina covers a run. Unknown stamina is given a try.
    fn has_stamina(&self, ctx: &TaskContext) -> bool {
        let minimum = ctx.profile.config.get_int(ConfigKey::IntelMinStamina).max(0) as u32;
        ctx.stamina.get().is_none_or(|s| s >= minimum.max(INTEL_STAMINA_COST))
    }
}

#[async_trait]
impl TaskBody for Routine {
    fn required_location(&self) -> Option<ScreenLocation> {
        Some(self.spec.location)
    }

    fn consumes_stamina(&self) -> bool {
        self.spec.consumes_stamina
    }

    fn provides_daily_mission_progress(&self) -> bool {
        self.spec.provides_daily_progress
    }

    async fn execute(&mut self, ctx: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError> {
        schedule.reschedule_in(ctx.profile.config.get_minutes(self.spec.interval_key));

        if self.spec.consumes_stamina && !self.has_stamina(ctx) {
            log::info!(
                "[{}] ⚡ Not enough stamina for {}, retrying later",
                ctx.profile.name,
                self.spec.task_type
            );
            schedule.reschedule_in(LOW_STAMINA_RETRY);
            return Ok(());
        }

        let mut completed = true;
        for step in self.spec.steps {
            if ctx.tap_template(step.template).await? {
                ctx.pause(step.wait).await?;
            } else if !step.optional {
                log::info!(
                    "[{}] {}: '{}' not available, nothing to do",
                    ctx.profile.name,
                    self.spec.task_type,
                    step.template
                );
                completed = false;
                break;
            }
        }

        if completed && self.spec.consumes_stamina {
            ctx.stamina.consume(INTEL_STAMINA_COST);
        }
        ctx.back().await?;
        Ok(())
    }
}
