//! The unit of work a profile queue runs.
//!
//! A [`ScheduledTask`] pairs the scheduling state every task shares
//! ([`Schedule`]) with the gameplay logic of one task type ([`TaskBody`]).
//! Identity is structural: concrete body type, profile, task type and
//! discriminator. Ordering puts the bootstrap task first, then earliest due.

use super::context::TaskContext;
use super::error::{FailureCategory, TaskError};
use super::kind::TaskType;
use super::navigation::{self, ScreenLocation};
use super::stamina;
use crate::config::{Profile, ProfileId};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::time::Instant;

/// Gameplay logic of one task type.
#[async_trait]
pub trait TaskBody: Send + Sync {
    /// Screen the task must start from, `None` to skip navigation.
    fn required_location(&self) -> Option<ScreenLocation> {
        None
    }

    fn requires_game_foreground(&self) -> bool {
        true
    }

    fn consumes_stamina(&self) -> bool {
        false
    }

    fn provides_daily_mission_progress(&self) -> bool {
        false
    }

    /// Perform the task and reschedule it through `schedule` if it should run again.
    async fn execute(&mut self, ctx: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError>;
}

/// When a task runs next, and whether it runs again at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    scheduled_at: Instant,
    recurring: bool,
    last_execution: Option<DateTime<Local>>,
}

impl Schedule {
    pub fn new(scheduled_at: Instant, recurring: bool) -> Self {
        Self {
            scheduled_at,
            recurring,
            last_execution: None,
        }
    }

    pub fn scheduled_at(&self) -> Instant {
        self.scheduled_at
    }

    pub fn is_recurring(&self) -> bool {
        self.recurring
    }

    pub fn set_recurring(&mut self, recurring: bool) {
        self.recurring = recurring;
    }

    pub fn last_execution(&self) -> Option<DateTime<Local>> {
        self.last_execution
    }

    /// Signed time until the task is due; negative when overdue.
    pub fn delay(&self) -> chrono::Duration {
        let now = Instant::now();
        let (magnitude, sign) = if self.scheduled_at >= now {
            (self.scheduled_at - now, 1)
        } else {
            (now - self.scheduled_at, -1)
        };
        let millis = i64::try_from(magnitude.as_millis()).unwrap_or(i64::MAX);
        chrono::Duration::milliseconds(sign * millis)
    }

    /// Wall clock time of the next run.
    pub fn next_execution(&self) -> DateTime<Local> {
        Local::now() + self.delay()
    }

    pub fn reschedule_in(&mut self, delay: Duration) {
        self.scheduled_at = Instant::now() + delay;
    }

    pub fn reschedule_now(&mut self) {
        self.scheduled_at = Instant::now();
    }

    /// Schedule for a wall clock time. The offset from the current wall clock is
    /// applied to the monotonic clock, so a time in the past means due now.
    pub fn reschedule_at(&mut self, when: DateTime<Local>) {
        let offset = when - Local::now();
        let now = Instant::now();
        self.scheduled_at = match offset.to_std() {
            Ok(ahead) => now + ahead,
            Err(_) => now
                .checked_sub((-offset).to_std().unwrap_or_default())
                .unwrap_or(now),
        };
    }

    pub(crate) fn mark_executed(&mut self) {
        self.last_execution = Some(Local::now());
    }
}

pub struct ScheduledTask {
    task_type: TaskType,
    profile_id: ProfileId,
    profile_name: String,
    discriminator: String,
    body_type: TypeId,
    body: Box<dyn TaskBody>,
    schedule: Schedule,
}

impl ScheduledTask {
    /// A task for `profile`, due now and recurring.
    pub fn new<B: TaskBody + 'static>(task_type: TaskType, profile: &Profile, body: B) -> Self {
        Self {
            task_type,
            profile_id: profile.id,
            profile_name: profile.name.clone(),
            discriminator: String::new(),
            body_type: TypeId::of::<B>(),
            body: Box::new(body),
            schedule: Schedule::new(Instant::now(), true),
        }
    }

    /// Distinguish instances of the same task type within a profile.
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = discriminator.into();
        self
    }

    pub fn recurring(mut self, recurring: bool) -> Self {
        self.schedule.set_recurring(recurring);
        self
    }

    pub fn scheduled_in(mut self, delay: Duration) -> Self {
        self.schedule.reschedule_in(delay);
        self
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn profile_id(&self) -> ProfileId {
        self.profile_id
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    pub fn name(&self) -> String {
        if self.discriminator.is_empty() {
            self.task_type.name().to_string()
        } else {
            format!("{} ({})", self.task_type.name(), self.discriminator)
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.task_type.is_bootstrap()
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn schedule_mut(&mut self) -> &mut Schedule {
        &mut self.schedule
    }

    pub fn scheduled_at(&self) -> Instant {
        self.schedule.scheduled_at()
    }

    pub fn delay(&self) -> chrono::Duration {
        self.schedule.delay()
    }

    pub fn is_recurring(&self) -> bool {
        self.schedule.is_recurring()
    }

    pub fn provides_daily_mission_progress(&self) -> bool {
        self.body.provides_daily_mission_progress()
    }

    /// Bootstrap first, then earliest scheduled.
    pub fn schedule_cmp(&self, other: &Self) -> Ordering {
        other
            .is_bootstrap()
            .cmp(&self.is_bootstrap())
            .then(self.scheduled_at().cmp(&other.scheduled_at()))
    }

    /// Prepare the game for the body and run it.
    ///
    /// Reloads the profile (best effort), checks the game is in the
    /// foreground, navigates to the required screen and refreshes a stale
    /// stamina reading before handing over to [`TaskBody::execute`].
    pub async fn run(&mut self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        match ctx.store.load_profile(self.profile_id).await {
            Ok(profile) => ctx.profile = profile,
            Err(e) => log::warn!("[{}] Could not refresh profile: {e}", self.profile_name),
        }

        if self.body.requires_game_foreground()
            && !ctx
                .driver
                .is_package_in_foreground(ctx.emulator(), &ctx.game_package)
                .await?
        {
            return Err(TaskError::HomeNotFound(format!(
                "{} is not in the foreground",
                ctx.game_package
            )));
        }

        if let Some(location) = self.body.required_location() {
            navigation::ensure_location(ctx, location).await?;
        }

        if self.body.consumes_stamina() && ctx.stamina.is_stale() {
            if let Err(e) = stamina::refresh(ctx).await {
                if e.category() != FailureCategory::Uncategorized {
                    return Err(e);
                }
                log::warn!("[{}] Stamina refresh failed: {e}", self.profile_name);
            }
        }

        self.schedule.mark_executed();
        self.body.execute(ctx, &mut self.schedule).await
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.body_type == other.body_type
            && self.profile_id == other.profile_id
            && self.task_type == other.task_type
            && self.discriminator == other.discriminator
    }
}

impl Eq for ScheduledTask {}

impl Hash for ScheduledTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.body_type.hash(state);
        self.profile_id.hash(state);
        self.task_type.hash(state);
        self.discriminator.hash(state);
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("task_type", &self.task_type)
            .field("profile_id", &self.profile_id)
            .field("discriminator", &self.discriminator)
            .field("schedule", &self.schedule)
            .finish()
    }
}
