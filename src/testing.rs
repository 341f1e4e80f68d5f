//! In-memory collaborators for unit tests.

use crate::adb::{AdbError, AdbResult, EmulatorDriver, ImageCapture};
use crate::config::{ConfigError, ConfigKey, ConfigResult, Profile, ProfileId, ProfileStore};
use crate::geometry::{Area, Point};
use crate::queue::QueueServices;
use crate::slots::EmulatorSlotController;
use crate::status::StatusBoard;
use crate::task::{
    Schedule, ScreenLocation, StaminaCache, TaskBody, TaskContext, TaskError, TaskRegistry,
};
use crate::vision::{MatchResult, Screenshot, Vision, VisionError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const GAME_PACKAGE: &str = "com.example.game";
/// Where [`FakeVision`] reports every hit
pub const HIT: Point = Point { x: 100, y: 100 };

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Tap(Point),
    Swipe,
    Back,
    LaunchApp,
    LaunchEmulator,
    CloseEmulator,
    SendToBackground,
    Screenshot,
}

struct DriverState {
    calls: Vec<DriverCall>,
    running: bool,
    foreground: bool,
    fail_launch: bool,
    transport_down: bool,
    foreground_checks: usize,
}

/// Records every call; the emulator starts running with the game in front.
pub struct FakeDriver {
    state: Mutex<DriverState>,
    png: Vec<u8>,
}

impl FakeDriver {
    pub fn new() -> Self {
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(8, 8))
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        Self {
            state: Mutex::new(DriverState {
                calls: Vec::new(),
                running: true,
                foreground: true,
                fail_launch: false,
                transport_down: false,
                foreground_checks: 0,
            }),
            png,
        }
    }

    fn record(&self, call: DriverCall) {
        lock(&self.state).calls.push(call);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        lock(&self.state).calls.iter().filter(|c| pred(c)).count()
    }

    pub fn set_running(&self, running: bool) {
        lock(&self.state).running = running;
    }

    pub fn set_foreground(&self, foreground: bool) {
        lock(&self.state).foreground = foreground;
    }

    pub fn fail_launch(&self, fail: bool) {
        lock(&self.state).fail_launch = fail;
    }

    /// Foreground checks time out while the transport is down.
    pub fn set_transport_down(&self, down: bool) {
        lock(&self.state).transport_down = down;
    }

    pub fn foreground_checks(&self) -> usize {
        lock(&self.state).foreground_checks
    }

    pub fn running(&self) -> bool {
        lock(&self.state).running
    }
}

#[async_trait]
impl EmulatorDriver for FakeDriver {
    async fn capture_screenshot(&self, _: &str) -> AdbResult<ImageCapture> {
        self.record(DriverCall::Screenshot);
        Ok(ImageCapture {
            bytes: self.png.clone(),
            duration_ms: 1,
        })
    }

    async fn tap(&self, _: &str, point: Point) -> AdbResult<()> {
        self.record(DriverCall::Tap(point));
        Ok(())
    }

    async fn swipe(&self, _: &str, _: Point, _: Point) -> AdbResult<()> {
        self.record(DriverCall::Swipe);
        Ok(())
    }

    async fn press_back(&self, _: &str) -> AdbResult<()> {
        self.record(DriverCall::Back);
        Ok(())
    }

    async fn is_running(&self, _: &str) -> bool {
        self.running()
    }

    async fn is_package_in_foreground(&self, _: &str, _: &str) -> AdbResult<bool> {
        let mut state = lock(&self.state);
        state.foreground_checks += 1;
        if state.transport_down {
            return Err(AdbError::Timeout {
                duration: Duration::from_secs(5),
                description: "foreground check".into(),
            });
        }
        Ok(state.running && state.foreground)
    }

    async fn launch_emulator(&self, emulator: &str) -> AdbResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::LaunchEmulator);
        if state.fail_launch {
            return Err(AdbError::EmulatorCommandFailed {
                command: format!("launch {emulator}"),
                description: "scripted failure".into(),
            });
        }
        state.running = true;
        Ok(())
    }

    async fn close_emulator(&self, _: &str) -> AdbResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::CloseEmulator);
        state.running = false;
        state.foreground = false;
        Ok(())
    }

    async fn launch_app(&self, _: &str, _: &str) -> AdbResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::LaunchApp);
        state.foreground = true;
        Ok(())
    }

    async fn send_to_background(&self, _: &str) -> AdbResult<()> {
        let mut state = lock(&self.state);
        state.calls.push(DriverCall::SendToBackground);
        state.foreground = false;
        Ok(())
    }
}

#[derive(Default)]
struct VisionState {
    visible: HashSet<String>,
    /// trigger -> (hide, show), applied when the trigger is found
    transitions: HashMap<String, (String, String)>,
    text: String,
}

/// Templates are "on screen" when shown; every hit is at [`HIT`].
#[derive(Default)]
pub struct FakeVision {
    state: Mutex<VisionState>,
}

impl FakeVision {
    pub fn show(&self, template: &str) {
        lock(&self.state).visible.insert(template.to_string());
    }

    pub fn hide(&self, template: &str) {
        lock(&self.state).visible.remove(template);
    }

    /// Once `trigger` is found, `hide` disappears and `show` appears.
    pub fn on_found(&self, trigger: &str, hide: &str, show: &str) {
        lock(&self.state)
            .transitions
            .insert(trigger.to_string(), (hide.to_string(), show.to_string()));
    }

    pub fn set_text(&self, text: &str) {
        lock(&self.state).text = text.to_string();
    }

    fn lookup(&self, template: &str) -> bool {
        let mut state = lock(&self.state);
        if !state.visible.contains(template) {
            return false;
        }
        if let Some((hide, show)) = state.transitions.get(template).cloned() {
            state.visible.remove(&hide);
            state.visible.insert(show);
        }
        true
    }

    fn result(&self, template: &str) -> MatchResult {
        if self.lookup(template) {
            MatchResult {
                found: true,
                point: HIT,
                score: 1.0,
            }
        } else {
            MatchResult::not_found(0.0)
        }
    }
}

#[async_trait]
impl Vision for FakeVision {
    async fn search(&self, _: &Screenshot, template: &str, _: Option<Area>, _: f32) -> Result<MatchResult, VisionError> {
        Ok(self.result(template))
    }

    async fn search_grayscale(
        &self,
        _: &Screenshot,
        template: &str,
        _: Option<Area>,
        _: f32,
    ) -> Result<MatchResult, VisionError> {
        Ok(self.result(template))
    }

    async fn search_all(
        &self,
        _: &Screenshot,
        template: &str,
        _: Option<Area>,
        _: f32,
        max_results: usize,
    ) -> Result<Vec<MatchResult>, VisionError> {
        let hit = self.result(template);
        Ok(if hit.found && max_results > 0 { vec![hit] } else { Vec::new() })
    }

    async fn read_text(&self, _: &Screenshot, _: Area) -> Result<String, VisionError> {
        Ok(lock(&self.state).text.clone())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<BTreeMap<ProfileId, Profile>>,
}

impl MemoryStore {
    pub fn put(&self, profile: Profile) {
        lock(&self.profiles).insert(profile.id, profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_profiles(&self) -> ConfigResult<Vec<Profile>> {
        Ok(lock(&self.profiles).values().cloned().collect())
    }

    async fn load_profile(&self, id: ProfileId) -> ConfigResult<Profile> {
        lock(&self.profiles)
            .get(&id)
            .cloned()
            .ok_or(ConfigError::UnknownProfile(id))
    }

    async fn save_value(&self, id: ProfileId, key: ConfigKey, value: &str) -> ConfigResult<()> {
        let mut profiles = lock(&self.profiles);
        let profile = profiles.get_mut(&id).ok_or(ConfigError::UnknownProfile(id))?;
        profile.config.set(key, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailWith {
    Uncategorized,
    Navigation,
    Reconnect,
    Transport,
    Stop,
}

impl FailWith {
    fn error(self) -> TaskError {
        match self {
            FailWith::Uncategorized => TaskError::Failed("scripted failure".into()),
            FailWith::Navigation => TaskError::NavigationFailed {
                target: ScreenLocation::Home,
                attempts: 1,
            },
            FailWith::Reconnect => TaskError::ReconnectRequired,
            FailWith::Transport => TaskError::Transport(AdbError::Timeout {
                duration: Duration::from_secs(5),
                description: "scripted".into(),
            }),
            FailWith::Stop => TaskError::Stopped("scripted".into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Succeed,
    Fail(FailWith),
    Panic,
}

/// Task body with a fixed outcome that counts its runs.
pub struct ScriptedBody {
    outcome: Outcome,
    runs: Arc<AtomicUsize>,
    foreground: bool,
    reschedule: Option<Duration>,
    daily_progress: bool,
}

impl ScriptedBody {
    fn with(outcome: Outcome) -> Self {
        Self {
            outcome,
            runs: Arc::new(AtomicUsize::new(0)),
            foreground: false,
            reschedule: None,
            daily_progress: false,
        }
    }

    pub fn succeed() -> Self {
        Self::with(Outcome::Succeed)
    }

    pub fn failing(with: FailWith) -> Self {
        Self::with(Outcome::Fail(with))
    }

    pub fn panicking() -> Self {
        Self::with(Outcome::Panic)
    }

    pub fn needs_foreground(mut self) -> Self {
        self.foreground = true;
        self
    }

    /// Reschedule itself this far ahead on every run.
    pub fn rescheduling_in(mut self, delay: Duration) -> Self {
        self.reschedule = Some(delay);
        self
    }

    pub fn with_daily_progress(mut self) -> Self {
        self.daily_progress = true;
        self
    }

    pub fn runs(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.runs)
    }
}

#[async_trait]
impl TaskBody for ScriptedBody {
    fn requires_game_foreground(&self) -> bool {
        self.foreground
    }

    fn provides_daily_mission_progress(&self) -> bool {
        self.daily_progress
    }

    async fn execute(&mut self, _: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.reschedule {
            schedule.reschedule_in(delay);
        }
        match self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(with) => Err(with.error()),
            Outcome::Panic => panic!("scripted panic"),
        }
    }
}

/// One profile wired to fakes.
pub struct Fixture {
    pub driver: Arc<FakeDriver>,
    pub vision: Arc<FakeVision>,
    pub store: Arc<MemoryStore>,
    pub status: Arc<StatusBoard>,
    pub slots: Arc<EmulatorSlotController>,
    pub profile: Profile,
    pub stamina: Arc<StaminaCache>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_slots(1)
    }

    pub fn with_slots(max_slots: usize) -> Self {
        let profile = Profile::new(1, "main", "emulator-5554");
        let store = Arc::new(MemoryStore::default());
        store.put(profile.clone());
        Self {
            driver: Arc::new(FakeDriver::new()),
            vision: Arc::new(FakeVision::default()),
            store,
            status: Arc::new(StatusBoard::new()),
            slots: Arc::new(EmulatorSlotController::new(max_slots)),
            profile,
            stamina: Arc::new(StaminaCache::new()),
        }
    }

    pub fn context(&self) -> TaskContext {
        TaskContext {
            profile: self.profile.clone(),
            driver: self.driver.clone(),
            vision: self.vision.clone(),
            store: self.store.clone(),
            stamina: Arc::clone(&self.stamina),
            game_package: GAME_PACKAGE.to_string(),
            cancel: CancellationToken::new(),
        }
    }

    /// Queue services over the fakes with the bundled registry.
    pub fn services(&self) -> QueueServices {
        QueueServices {
            slots: Arc::clone(&self.slots),
            registry: Arc::new(TaskRegistry::default()),
            driver: self.driver.clone(),
            vision: self.vision.clone(),
            store: self.store.clone(),
            status: self.status.clone(),
            game_package: GAME_PACKAGE.to_string(),
        }
    }
}
