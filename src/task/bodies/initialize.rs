// Bootstrap task: bring the game to a known screen
use crate::task::context::TaskContext;
use crate::task::error::TaskError;
use crate::task::navigation::{self, MAX_NAVIGATION_ATTEMPTS, ScreenLocation};
use crate::task::scheduled::{Schedule, TaskBody};
use async_trait::async_trait;
use std::time::Duration;

const LAUNCH_POLL: Duration = Duration::from_secs(5);
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(90);
const DISMISS_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Default)]
pub struct Initialize;

impl Initialize {
    async fn ensure_game_running(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        let emulator = ctx.emulator();
        if ctx.driver.is_package_in_foreground(emulator, &ctx.game_package).await? {
            return Ok(());
        }
        log::info!("[{}] 🚀 Launching {}", ctx.profile.name, ctx.game_package);
        ctx.driver.launch_app(emulator, &ctx.game_package).await?;

        let deadline = tokio::time::Instant::now() + LAUNCH_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            ctx.pause(LAUNCH_POLL).await?;
            if ctx.driver.is_package_in_foreground(emulator, &ctx.game_package).await? {
                return Ok(());
            }
        }
        Err(TaskError::HomeNotFound(format!(
            "{} did not reach the foreground within {}s",
            ctx.game_package,
            LAUNCH_TIMEOUT.as_secs()
        )))
    }
}

#[async_trait]
impl TaskBody for Initialize {
    fn requires_game_foreground(&self) -> bool {
        false
    }

    async fn execute(&mut self, ctx: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError> {
        schedule.set_recurring(false);
        self.ensure_game_running(ctx).await?;

        // loading screens and popups come first, back out of them
        for _ in 0..MAX_NAVIGATION_ATTEMPTS {
            let shot = ctx.screenshot().await?;
            if let Some(location) = navigation::detect(ctx, &shot).await? {
                log::info!("[{}] ✅ Game ready on {location} screen", ctx.profile.name);
                return Ok(());
            }
            let close = ctx.find_in(&shot, crate::vision::templates::CLOSE_BUTTON).await?;
            if close.found {
                ctx.tap(close.point).await?;
            } else {
                ctx.back().await?;
            }
            ctx.pause(DISMISS_DELAY).await?;
        }
        Err(TaskError::NavigationFailed {
            target: ScreenLocation::Any,
            attempts: MAX_NAVIGATION_ATTEMPTS,
        })
    }
}
