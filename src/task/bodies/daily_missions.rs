// Claim completed daily missions
use crate::config::ConfigKey;
use crate::task::context::TaskContext;
use crate::task::error::TaskError;
use crate::task::navigation::ScreenLocation;
use crate::task::scheduled::{Schedule, TaskBody};
use crate::vision::templates;
use async_trait::async_trait;
use std::time::Duration;

const MAX_CLAIMS: usize = 10;
const CLAIM_DELAY: Duration = Duration::from_millis(600);

#[derive(Debug, Default)]
pub struct DailyMissions;

#[async_trait]
impl TaskBody for DailyMissions {
    fn required_location(&self) -> Option<ScreenLocation> {
        Some(ScreenLocation::Home)
    }

    async fn execute(&mut self, ctx: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError> {
        let interval = ctx
            .profile
            .config
            .get_minutes(ConfigKey::DailyMissionsIntervalMinutes);
        schedule.reschedule_in(interval);

        if !ctx.tap_template(templates::DAILY_MISSIONS_BUTTON).await? {
            return Err(TaskError::Failed("daily missions button not found".into()));
        }
        ctx.pause(CLAIM_DELAY).await?;

        let mut claimed = 0;
        while claimed < MAX_CLAIMS {
            let shot = ctx.screenshot().await?;
            let claims = ctx
                .vision
                .search_all(&shot, templates::DAILY_MISSION_CLAIM, None, templates::DEFAULT_THRESHOLD, 1)
                .await?;
            let Some(claim) = claims.first() else {
                break;
            };
            ctx.tap(claim.point).await?;
            claimed += 1;
            ctx.pause(CLAIM_DELAY).await?;
        }
        log::info!("[{}] 📅 Claimed {claimed} daily missions", ctx.profile.name);
        ctx.back().await?;
        Ok(())
    }
}
