//! The per-profile task loop.
//!
//! Each enabled profile owns one [`ProfileTaskQueue`]. Its loop pops due tasks
//! in schedule order, runs them against the profile's emulator, reacts to
//! failures by category and puts recurring tasks back. Between tasks it runs
//! periodic screen checks (see `background.rs`) and powers the emulator down
//! when the next task is far away (see `idle.rs`).

use super::heap::{TaskHeap, TaskSnapshot};
use super::state::{PauseState, PowerState, QueueControl};
use super::{QueueError, QueueServices};
use crate::config::{ConfigKey, Profile, ProfileId};
use crate::slots::{SlotError, SlotRequest};
use crate::status::{TaskStateRecord, format_hms};
use crate::task::{FailureCategory, ScheduledTask, StaminaCache, TaskContext, TaskError, TaskType};
use crate::vision::templates;
use chrono::Local;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Minimum length of an idle iteration
pub(crate) const LOOP_CADENCE: Duration = Duration::from_secs(1);
/// Background checks run every this many iterations
pub(crate) const BACKGROUND_CHECK_EVERY: u64 = 60;
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);
/// Retry delay for a recurring task that failed without rescheduling itself
pub(crate) const FAILURE_RETRY_DELAY: Duration = Duration::from_secs(60);

/// What one pass over the head of the queue did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskRun {
    NothingDue,
    Succeeded,
    Failed,
}

impl TaskRun {
    pub(crate) fn ran(self) -> bool {
        self != TaskRun::NothingDue
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub struct ProfileTaskQueue {
    profile: Mutex<Profile>,
    slot_request: SlotRequest,
    pub(crate) services: QueueServices,
    pub(crate) tasks: TaskHeap,
    stamina: Arc<StaminaCache>,
    running: AtomicBool,
    control: Mutex<QueueControl>,
    /// Serialises background checks, idle decisions and pause/resume/stop
    pub(crate) maintenance: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProfileTaskQueue {
    pub fn new(profile: Profile, services: QueueServices) -> Arc<Self> {
        Arc::new(Self {
            slot_request: SlotRequest::from(&profile),
            profile: Mutex::new(profile),
            services,
            tasks: TaskHeap::new(),
            stamina: Arc::new(StaminaCache::new()),
            running: AtomicBool::new(false),
            control: Mutex::new(QueueControl::default()),
            maintenance: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
            handle: Mutex::new(None),
        })
    }

    /// Latest copy of the profile, refreshed after every task.
    pub fn profile(&self) -> Profile {
        lock(&self.profile).clone()
    }

    pub fn profile_id(&self) -> ProfileId {
        self.slot_request.holder
    }

    pub fn name(&self) -> &str {
        &self.slot_request.name
    }

    pub fn priority(&self) -> i64 {
        self.slot_request.priority
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn control(&self) -> MutexGuard<'_, QueueControl> {
        lock(&self.control)
    }

    pub fn pause_state(&self) -> PauseState {
        self.control().pause
    }

    pub fn power_state(&self) -> PowerState {
        self.control().power
    }

    pub fn needs_reconnect(&self) -> bool {
        self.control().needs_reconnect
    }

    /// When the head task is due, as of the last loop iteration.
    pub fn delay_until(&self) -> Option<Instant> {
        self.control().delay_until
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn scheduled_tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.snapshot()
    }

    pub fn is_task_scheduled(&self, task_type: TaskType) -> bool {
        self.tasks.contains_type(task_type)
    }

    pub(crate) fn task_context(&self) -> TaskContext {
        TaskContext {
            profile: self.profile(),
            driver: Arc::clone(&self.services.driver),
            vision: Arc::clone(&self.services.vision),
            store: Arc::clone(&self.services.store),
            stamina: Arc::clone(&self.stamina),
            game_package: self.services.game_package.clone(),
            cancel: lock(&self.cancel).clone(),
        }
    }

    pub(crate) async fn publish(&self, status: &str) {
        self.services
            .status
            .publish_status(self.profile_id(), status)
            .await;
    }

    async fn record_state<F>(&self, task_type: TaskType, update: F)
    where
        F: FnOnce(&mut TaskStateRecord) + Send,
    {
        let status = &self.services.status;
        let mut state = status
            .task_state(self.profile_id(), task_type)
            .await
            .unwrap_or_default();
        update(&mut state);
        status
            .record_task_state(self.profile_id(), task_type, state)
            .await;
    }

    /// Queue the profile's initial tasks, honouring persisted next-execution times.
    pub async fn seed_tasks(&self) -> usize {
        let profile = self.profile();
        let mut added = 0;
        for mut task in self.services.registry.initial_tasks(&profile) {
            let persisted = self
                .services
                .status
                .task_state(profile.id, task.task_type())
                .await
                .and_then(|s| s.next_execution);
            if let Some(next) = persisted.filter(|next| *next > Local::now()) {
                task.schedule_mut().reschedule_at(next);
            }
            if self.add_task(task).await {
                added += 1;
            }
        }
        log::info!("[{}] 📋 Seeded {added} tasks", self.name());
        added
    }

    /// Queue a task unless an equal one is already queued.
    pub async fn add_task(&self, task: ScheduledTask) -> bool {
        let task_type = task.task_type();
        let next = task.schedule().next_execution();
        let name = task.name();
        if !self.tasks.push(task) {
            log::debug!("[{}] {name} already queued", self.name());
            return false;
        }
        self.record_state(task_type, |s| {
            s.scheduled = true;
            s.next_execution = Some(next);
        })
        .await;
        true
    }

    /// Remove every queued task of `task_type`.
    pub async fn remove_task(&self, task_type: TaskType) -> usize {
        let removed = self.tasks.remove_type(task_type);
        if removed > 0 {
            self.record_state(task_type, |s| {
                s.scheduled = false;
                s.next_execution = None;
            })
            .await;
        }
        removed
    }

    /// Run `task_type` as soon as possible.
    ///
    /// Queued tasks of that type are moved up to now. Otherwise new instances
    /// are created with the given recurrence.
    pub async fn execute_task_now(&self, task_type: TaskType, recurring: bool) -> Result<(), QueueError> {
        if !self.services.registry.contains(task_type) {
            return Err(QueueError::UnknownTaskType(task_type));
        }
        if self.tasks.advance_type(task_type, Instant::now()) {
            log::info!("[{}] ⏩ {task_type} moved up to run now", self.name());
            return Ok(());
        }

        let tasks = self.services.registry.create_all(task_type, &self.profile());
        if tasks.is_empty() {
            return Err(QueueError::NothingToSchedule(task_type));
        }
        for task in tasks {
            self.add_task(task.recurring(recurring)).await;
        }
        log::info!("[{}] ⏩ {task_type} queued to run now", self.name());
        Ok(())
    }

    /// No regular task falls inside the idle window, so the loop starts powered down.
    pub fn starts_idle(&self) -> bool {
        let window = self.profile().config.max_idle();
        match self.tasks.earliest_regular() {
            Some(at) => at.saturating_duration_since(Instant::now()) > window,
            None => true,
        }
    }

    /// Spawn the loop. Returns false if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let token = CancellationToken::new();
        *lock(&self.cancel) = token.clone();
        if self.starts_idle() {
            let behavior = self.profile().config.idle_behavior();
            self.control().power = PowerState::PoweredDown(behavior);
        }

        let queue = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = queue.run_loop() => {}
            }
        });
        *lock(&self.handle) = Some(handle);
        true
    }

    /// Stop the loop, drop every queued task and give the slot back.
    pub async fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        lock(&self.cancel).cancel();

        let handle = lock(&self.handle).take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle).await.is_err() {
                log::warn!("[{}] ⚠️ Loop did not stop in time, aborting it", self.name());
                handle.abort();
            }
        }

        let _guard = self.maintenance.lock().await;
        for task_type in self.tasks.drain() {
            self.record_state(task_type, |s| {
                s.scheduled = false;
                s.executing = false;
                s.next_execution = None;
            })
            .await;
        }
        if self.services.slots.is_holder(self.profile_id()) {
            self.services.slots.release(self.profile_id());
        }
        *self.control() = QueueControl::default();
        if was_running {
            log::info!("[{}] ⏹️ Task queue stopped", self.name());
            self.publish("Stopped").await;
        }
    }

    pub async fn pause(&self) {
        let _guard = self.maintenance.lock().await;
        self.control().pause = PauseState::Manual;
        log::info!("[{}] ⏸️ Paused", self.name());
        self.publish("Paused").await;
    }

    /// Lift a manual or timed pause. A pending reconnect is attempted on the next iteration.
    ///
    /// Leaving a pause with the emulator awake re-initialises the game, the same
    /// as when a timed pause runs out on its own.
    pub async fn resume(&self) {
        let _guard = self.maintenance.lock().await;
        let reinitialize = {
            let mut control = self.control();
            let was_paused = control.pause.is_paused();
            control.pause = match control.pause {
                PauseState::AwaitingReconnect => PauseState::AwaitingReconnect,
                _ if control.needs_reconnect => PauseState::AwaitingReconnect,
                _ => PauseState::Active,
            };
            was_paused && control.pause == PauseState::Active && control.power == PowerState::Awake
        };
        if reinitialize {
            self.inject_initialize().await;
        }
        log::info!("[{}] ▶️ Resumed", self.name());
        self.publish("Resumed").await;
    }

    async fn run_loop(&self) {
        log::info!("[{}] ▶️ Task queue started", self.name());
        self.startup().await;

        let mut iteration: u64 = 0;
        while self.is_running() {
            let started = Instant::now();
            iteration += 1;

            match self.pause_state() {
                PauseState::Active => {}
                PauseState::Manual => {
                    tokio::time::sleep(LOOP_CADENCE).await;
                    continue;
                }
                PauseState::AwaitingReconnect => self.resume_after_pause().await,
                timed @ PauseState::Timed { .. } => {
                    if timed.expires_at().is_some_and(|at| at > Instant::now()) {
                        tokio::time::sleep(LOOP_CADENCE).await;
                        continue;
                    }
                    self.resume_after_pause().await;
                }
            }
            if self.pause_state().is_paused() {
                tokio::time::sleep(LOOP_CADENCE).await;
                continue;
            }

            let run = self.run_due_task().await;

            let delay_until = self.tasks.peek().map(|head| head.scheduled_at);
            self.control().delay_until = delay_until;

            if iteration % BACKGROUND_CHECK_EVERY == 0 {
                self.run_background_checks().await;
            }

            self.manage_idle(delay_until).await;

            match run {
                TaskRun::Succeeded => tokio::task::yield_now().await,
                // Recovery tasks queued by a failure are due at once, keep them to the cadence
                TaskRun::Failed => tokio::time::sleep_until(started + LOOP_CADENCE).await,
                TaskRun::NothingDue => {
                    self.publish_idle_status().await;
                    tokio::time::sleep_until(started + LOOP_CADENCE).await;
                }
            }
        }
    }

    async fn startup(&self) {
        if let PowerState::PoweredDown(_) = self.power_state() {
            let until = self.tasks.earliest_regular();
            self.publish(&super::idle::idling_until(until)).await;
            return;
        }
        if self.bring_up_emulator().await {
            self.inject_initialize().await;
        }
    }

    pub(crate) async fn acquire_slot(&self) -> Result<(), SlotError> {
        let status = Arc::clone(&self.services.status);
        let profile_id = self.profile_id();
        self.services
            .slots
            .acquire(&self.slot_request, move |position| {
                if position == 0 {
                    return;
                }
                let status = Arc::clone(&status);
                tokio::spawn(async move {
                    status
                        .publish_status(profile_id, &format!("Waiting for emulator slot (position {position})"))
                        .await;
                });
            })
            .await
    }

    /// Hold a slot and have the emulator running. False when either failed.
    pub(crate) async fn bring_up_emulator(&self) -> bool {
        let emulator = self.profile().emulator;
        let driver = &self.services.driver;
        let running = driver.is_running(&emulator).await;

        if !running || !self.services.slots.is_holder(self.profile_id()) {
            if let Err(e) = self.acquire_slot().await {
                log::warn!("[{}] ⚠️ No emulator slot: {e}", self.name());
                return false;
            }
        }
        if !running {
            log::info!("[{}] 🚀 Launching emulator {emulator}", self.name());
            self.publish("Launching emulator").await;
            if let Err(e) = driver.launch_emulator(&emulator).await {
                log::error!("[{}] ❌ Could not launch {emulator}: {e}", self.name());
                self.services.slots.release(self.profile_id());
                return false;
            }
        }
        true
    }

    pub(crate) async fn inject_initialize(&self) {
        let Some(task) = self
            .services
            .registry
            .create(TaskType::Initialize, &self.profile())
        else {
            log::warn!("[{}] ⚠️ No Initialize task registered", self.name());
            return;
        };
        if self.add_task(task).await {
            log::debug!("[{}] Queued Initialize", self.name());
        }
    }

    /// Leave a timed or reconnect pause: emulator up, reconnect if needed, re-initialise.
    async fn resume_after_pause(&self) {
        let needs_reconnect = self.needs_reconnect();
        if !self.bring_up_emulator().await {
            return;
        }
        if needs_reconnect {
            let ctx = self.task_context();
            match ctx.tap_template(templates::RECONNECT_BUTTON).await {
                Ok(true) => log::info!("[{}] 🔄 Reconnected", self.name()),
                Ok(false) => log::debug!("[{}] Reconnect button not on screen", self.name()),
                Err(e) => log::warn!("[{}] ⚠️ Reconnect attempt failed: {e}", self.name()),
            }
        }
        {
            let mut control = self.control();
            control.pause = PauseState::Active;
            control.power = PowerState::Awake;
            control.needs_reconnect = false;
        }
        self.inject_initialize().await;
        self.publish("Resumed").await;
    }

    /// Pop and run the head task if it is due.
    pub(crate) async fn run_due_task(&self) -> TaskRun {
        if let PowerState::PoweredDown(_) = self.power_state() {
            return TaskRun::NothingDue;
        }
        let Some(task) = self.tasks.pop_due(Instant::now()) else {
            return TaskRun::NothingDue;
        };

        if task.is_bootstrap() && !self.regular_task_within_idle_window() {
            log::debug!("[{}] Skipping {}: nothing due soon", self.name(), task.name());
            self.record_state(task.task_type(), |s| {
                s.scheduled = false;
                s.next_execution = None;
            })
            .await;
            return TaskRun::NothingDue;
        }

        if self.execute(task).await {
            TaskRun::Succeeded
        } else {
            TaskRun::Failed
        }
    }

    fn regular_task_within_idle_window(&self) -> bool {
        let window = self.profile().config.max_idle();
        self.tasks
            .earliest_regular()
            .is_some_and(|at| at.saturating_duration_since(Instant::now()) < window)
    }

    /// Run one task and put it back if recurring. Returns whether it succeeded.
    pub(crate) async fn execute(&self, mut task: ScheduledTask) -> bool {
        let task_type = task.task_type();
        let name = task.name();
        let scheduled_before = task.scheduled_at();

        self.record_state(task_type, |s| s.executing = true).await;
        self.publish(&format!("Executing {name}")).await;
        log::info!("[{}] ▶️ Executing {name}", self.name());

        let mut ctx = self.task_context();
        let result = AssertUnwindSafe(task.run(&mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(TaskError::Panicked(panic_message(payload.as_ref()))));
        *lock(&self.profile) = ctx.profile;

        let failed = result.is_err();
        match result {
            Ok(()) => log::info!("[{}] ✅ {name} done", self.name()),
            Err(e) => self.handle_failure(&name, e).await,
        }

        if task.is_recurring() && task.scheduled_at() == scheduled_before {
            if failed {
                log::debug!("[{}] Retrying {name} in {}s", self.name(), FAILURE_RETRY_DELAY.as_secs());
                task.schedule_mut().reschedule_in(FAILURE_RETRY_DELAY);
            } else {
                log::warn!("[{}] ⚠️ {name} did not reschedule itself, running it again now", self.name());
                task.schedule_mut().reschedule_now();
            }
        }

        if task.provides_daily_mission_progress()
            && task_type != TaskType::DailyMissions
            && self.profile().config.get_bool(ConfigKey::AutoScheduleDailyMissions)
        {
            self.schedule_daily_missions_now().await;
        }

        let recurring = task.is_recurring();
        let next = task.schedule().next_execution();
        let last = task.schedule().last_execution();
        self.record_state(task_type, |s| {
            s.executing = false;
            s.last_execution = last.or(s.last_execution);
            s.scheduled = recurring;
            s.next_execution = recurring.then_some(next);
        })
        .await;

        if recurring {
            self.tasks.push(task);
        } else {
            log::debug!("[{}] {name} was one-shot, dropped", self.name());
        }
        !failed
    }

    async fn handle_failure(&self, name: &str, error: TaskError) {
        match error.category() {
            FailureCategory::NavigationLost => {
                log::warn!("[{}] 🧭 {name}: {error}, re-initializing", self.name());
                self.inject_initialize().await;
            }
            FailureCategory::TransportLost => {
                log::error!("[{}] 🔌 {name}: {error}, re-initializing", self.name());
                self.inject_initialize().await;
            }
            FailureCategory::ReconnectRequired => {
                let minutes = self
                    .profile()
                    .config
                    .get_int(ConfigKey::ReconnectionMinutes)
                    .max(0) as u64;
                let status = {
                    let mut control = self.control();
                    control.needs_reconnect = true;
                    if minutes > 0 {
                        control.pause = PauseState::Timed {
                            since: Instant::now(),
                            duration: Duration::from_secs(minutes * 60),
                        };
                        format!("Reconnect required, waiting {minutes} minutes")
                    } else {
                        control.pause = PauseState::AwaitingReconnect;
                        "Reconnect required, reconnecting".to_string()
                    }
                };
                log::warn!("[{}] 🔄 {name}: {error}", self.name());
                self.publish(&status).await;
            }
            FailureCategory::ExplicitStop => {
                log::info!("[{}] ⏹️ {name} stopped: {error}", self.name());
            }
            FailureCategory::Uncategorized => {
                log::error!("[{}] ❌ {name} failed: {error}", self.name());
            }
        }
    }

    async fn schedule_daily_missions_now(&self) {
        if self.tasks.advance_type(TaskType::DailyMissions, Instant::now()) {
            log::debug!("[{}] Daily missions moved up", self.name());
            return;
        }
        if let Some(task) = self
            .services
            .registry
            .create(TaskType::DailyMissions, &self.profile())
        {
            self.add_task(task).await;
        }
    }

    async fn publish_idle_status(&self) {
        if self.pause_state().is_paused() || self.power_state() != PowerState::Awake {
            return;
        }
        let status = match self.tasks.peek() {
            Some(head) => format!(
                "Idling for {}, next task: {}",
                format_hms(head.scheduled_at.saturating_duration_since(Instant::now())),
                head.name
            ),
            None => "Idling, no tasks scheduled".to_string(),
        };
        self.publish(&status).await;
    }
}
