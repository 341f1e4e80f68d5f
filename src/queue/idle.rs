// Powering the emulator down between distant tasks and back up before they are due
use super::profile_queue::ProfileTaskQueue;
use super::state::PowerState;
use crate::config::IdleBehavior;
use chrono::Local;
use std::time::Duration;
use tokio::time::Instant;

/// Wake this long before the next task is due
pub(crate) const WAKE_AHEAD: Duration = Duration::from_secs(60);

pub(crate) fn idling_until(until: Option<Instant>) -> String {
    match until {
        Some(at) => {
            let wait = at.saturating_duration_since(Instant::now());
            let wall = Local::now() + chrono::Duration::from_std(wait).unwrap_or_default();
            format!("Idling until {}", wall.format("%Y-%m-%d %H:%M:%S"))
        }
        None => "Idling until a task is scheduled".to_string(),
    }
}

enum IdleAction {
    Stay,
    Wake,
}

impl ProfileTaskQueue {
    /// Power down when the next task is further away than `max_idle_minutes`,
    /// wake up again once it is less than a minute away.
    pub(crate) async fn manage_idle(&self, delay_until: Option<Instant>) {
        let action = {
            let _guard = self.maintenance.lock().await;
            if self.pause_state().is_paused() {
                return;
            }
            let gap = delay_until.map(|at| at.saturating_duration_since(Instant::now()));
            match self.power_state() {
                PowerState::Awake => {
                    let window = self.profile().config.max_idle();
                    if gap.is_none_or(|gap| gap > window) {
                        self.power_down(delay_until).await;
                    }
                    IdleAction::Stay
                }
                PowerState::PoweredDown(_) if gap.is_some_and(|gap| gap < WAKE_AHEAD) => IdleAction::Wake,
                PowerState::PoweredDown(_) => IdleAction::Stay,
            }
        };
        // waking may wait on a slot for a long time, so it runs without the lock
        if let IdleAction::Wake = action {
            self.wake().await;
        }
    }

    async fn power_down(&self, delay_until: Option<Instant>) {
        let profile = self.profile();
        let behavior = profile.config.idle_behavior();
        let driver = &self.services.driver;
        match behavior {
            IdleBehavior::Background => {
                log::info!("[{}] 💤 Sending game to background", self.name());
                if let Err(e) = driver.send_to_background(&profile.emulator).await {
                    log::warn!("[{}] ⚠️ Could not background the game: {e}", self.name());
                }
            }
            IdleBehavior::CloseEmulator => {
                log::info!("[{}] 💤 Closing emulator {}", self.name(), profile.emulator);
                if let Err(e) = driver.close_emulator(&profile.emulator).await {
                    log::warn!("[{}] ⚠️ Could not close emulator: {e}", self.name());
                }
                if self.services.slots.is_holder(self.profile_id()) {
                    self.services.slots.release(self.profile_id());
                }
            }
        }
        self.control().power = PowerState::PoweredDown(behavior);
        self.publish(&idling_until(delay_until)).await;
    }

    async fn wake(&self) {
        log::info!("[{}] ⏰ Waking up for the next task", self.name());
        if !self.bring_up_emulator().await {
            // stays powered down and retries next iteration
            return;
        }
        self.control().power = PowerState::Awake;
        self.inject_initialize().await;
    }
}
