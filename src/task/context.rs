// Everything a task body can reach while it runs
use super::error::TaskError;
use super::stamina::StaminaCache;
use crate::adb::EmulatorDriver;
use crate::config::{Profile, ProfileStore};
use crate::geometry::{Area, Point};
use crate::vision::{MatchResult, Screenshot, Vision, templates};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct TaskContext {
    /// Profile as last loaded from the store
    pub profile: Profile,
    pub driver: Arc<dyn EmulatorDriver>,
    pub vision: Arc<dyn Vision>,
    pub store: Arc<dyn ProfileStore>,
    pub stamina: Arc<StaminaCache>,
    pub game_package: String,
    pub cancel: CancellationToken,
}

impl TaskContext {
    pub fn emulator(&self) -> &str {
        &self.profile.emulator
    }

    pub fn check_stop(&self) -> Result<(), TaskError> {
        if self.cancel.is_cancelled() {
            return Err(TaskError::Stopped(format!("profile {} is stopping", self.profile.name)));
        }
        Ok(())
    }

    /// Sleep that ends early with [`TaskError::Stopped`] when the queue stops.
    pub async fn pause(&self, duration: Duration) -> Result<(), TaskError> {
        tokio::select! {
            _ = self.cancel.cancelled() => self.check_stop(),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    pub async fn screenshot(&self) -> Result<Screenshot, TaskError> {
        self.check_stop()?;
        let capture = self.driver.capture_screenshot(self.emulator()).await?;
        Ok(Screenshot::decode(&capture.bytes)?)
    }

    pub async fn find_in(&self, shot: &Screenshot, template: &str) -> Result<MatchResult, TaskError> {
        Ok(self
            .vision
            .search(shot, template, None, templates::DEFAULT_THRESHOLD)
            .await?)
    }

    pub async fn find(&self, template: &str) -> Result<MatchResult, TaskError> {
        let shot = self.screenshot().await?;
        self.find_in(&shot, template).await
    }

    pub async fn tap(&self, point: Point) -> Result<(), TaskError> {
        self.check_stop()?;
        self.driver.tap(self.emulator(), point).await?;
        Ok(())
    }

    /// Tap a template if it is on screen. Returns whether it was found.
    pub async fn tap_template(&self, template: &str) -> Result<bool, TaskError> {
        let found = self.find(template).await?;
        if !found.found {
            log::debug!("[{}] '{template}' not on screen (score {:.3})", self.profile.name, found.score);
            return Ok(false);
        }
        self.tap(found.point).await?;
        Ok(true)
    }

    pub async fn tap_random(&self, area: Area, count: u32, delay: Duration) -> Result<(), TaskError> {
        self.check_stop()?;
        self.driver.tap_random(self.emulator(), area, count, delay).await?;
        Ok(())
    }

    pub async fn back(&self) -> Result<(), TaskError> {
        self.check_stop()?;
        self.driver.press_back(self.emulator()).await?;
        Ok(())
    }

    pub async fn read_text(&self, shot: &Screenshot, area: Area) -> Result<String, TaskError> {
        Ok(self.vision.read_text(shot, area).await?)
    }
}
