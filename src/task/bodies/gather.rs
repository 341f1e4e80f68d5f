// Send a gathering march for one resource
use crate::config::ConfigKey;
use crate::task::context::TaskContext;
use crate::task::error::TaskError;
use crate::task::navigation::ScreenLocation;
use crate::task::scheduled::{Schedule, TaskBody};
use crate::vision::templates;
use async_trait::async_trait;
use std::time::Duration;

/// Retry delay when no march is free
const NO_MARCH_RETRY: Duration = Duration::from_secs(5 * 60);
const STEP_DELAY: Duration = Duration::from_millis(700);

#[derive(Debug)]
pub struct Gather {
    resource: String,
}

impl Gather {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

#[async_trait]
impl TaskBody for Gather {
    fn required_location(&self) -> Option<ScreenLocation> {
        Some(ScreenLocation::World)
    }

    async fn execute(&mut self, ctx: &TaskContext, schedule: &mut Schedule) -> Result<(), TaskError> {
        let interval = ctx.profile.config.get_minutes(ConfigKey::GatherIntervalMinutes);
        let tab = templates::gather_tab(&self.resource);

        for step in [templates::SEARCH_BUTTON, tab.as_str(), templates::GATHER_BUTTON] {
            if !ctx.tap_template(step).await? {
                ctx.back().await?;
                return Err(TaskError::Failed(format!(
                    "gather {}: '{step}' not found",
                    self.resource
                )));
            }
            ctx.pause(STEP_DELAY).await?;
        }

        if ctx.tap_template(templates::MARCH_DEPLOY).await? {
            log::info!("[{}] 🪵 Gathering {}", ctx.profile.name, self.resource);
            schedule.reschedule_in(interval);
        } else {
            log::info!("[{}] No free march for {}, retrying later", ctx.profile.name, self.resource);
            ctx.back().await?;
            schedule.reschedule_in(NO_MARCH_RETRY);
        }
        Ok(())
    }
}
