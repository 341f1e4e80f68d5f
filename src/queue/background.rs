// Periodic screen checks between tasks
use super::profile_queue::ProfileTaskQueue;
use super::state::{PauseState, PowerState};
use crate::config::ConfigKey;
use crate::vision::templates;
use std::time::Duration;
use tokio::time::Instant;

/// How long a running in-game event pauses the queue
pub(crate) const EVENT_PAUSE: Duration = Duration::from_secs(30 * 60);

impl ProfileTaskQueue {
    /// Look for a running event and, when enabled, pending alliance help.
    ///
    /// Only runs while the queue is active, awake and the emulator is up.
    /// Failures are logged and otherwise ignored.
    pub(crate) async fn run_background_checks(&self) {
        let _guard = self.maintenance.lock().await;
        if self.pause_state().is_paused() || self.power_state() != PowerState::Awake {
            return;
        }
        let ctx = self.task_context();
        if !ctx.driver.is_running(ctx.emulator()).await {
            return;
        }

        let shot = match ctx.screenshot().await {
            Ok(shot) => shot,
            Err(e) => {
                log::debug!("[{}] Background check skipped: {e}", self.name());
                return;
            }
        };

        match ctx.find_in(&shot, templates::EVENT_RUNNING).await {
            Ok(event) if event.found => {
                self.control().pause = PauseState::Timed {
                    since: Instant::now(),
                    duration: EVENT_PAUSE,
                };
                log::info!("[{}] 🎉 Event running, pausing for 30 minutes", self.name());
                self.publish("Event running, paused for 30 minutes").await;
                return;
            }
            Ok(_) => {}
            Err(e) => log::debug!("[{}] Event check failed: {e}", self.name()),
        }

        if !ctx.profile.config.get_bool(ConfigKey::AutoHelpAlliance) {
            return;
        }
        match ctx.find_in(&shot, templates::ALLIANCE_HELP).await {
            Ok(help) if help.found => match ctx.tap(help.point).await {
                Ok(()) => log::info!("[{}] 🤝 Helped alliance", self.name()),
                Err(e) => log::debug!("[{}] Alliance help tap failed: {e}", self.name()),
            },
            Ok(_) => {}
            Err(e) => log::debug!("[{}] Alliance help check failed: {e}", self.name()),
        }
    }
}
