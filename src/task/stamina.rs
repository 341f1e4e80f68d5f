// Cached stamina reading per profile
use super::context::TaskContext;
use super::error::TaskError;
use crate::geometry::Area;
use crate::vision::{ocr, templates};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A reading older than this is refreshed before a stamina task runs
pub const STAMINA_STALE_AFTER: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default)]
pub struct StaminaCache {
    reading: Mutex<Option<(u32, Instant)>>,
}

impl StaminaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u32> {
        self.reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|(value, _)| value)
    }

    pub fn set(&self, value: u32) {
        *self.reading.lock().unwrap_or_else(PoisonError::into_inner) = Some((value, Instant::now()));
    }

    /// Spend `amount` from the cached value without touching its age.
    pub fn consume(&self, amount: u32) {
        if let Some((value, _)) = self
            .reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            *value = value.saturating_sub(amount);
        }
    }

    pub fn is_stale(&self) -> bool {
        match *self.reading.lock().unwrap_or_else(PoisonError::into_inner) {
            Some((_, at)) => at.elapsed() >= STAMINA_STALE_AFTER,
            None => true,
        }
    }
}

/// Read stamina from the counter next to the stamina icon and cache it.
pub async fn refresh(ctx: &TaskContext) -> Result<Option<u32>, TaskError> {
    let shot = ctx.screenshot().await?;
    let icon = ctx.find_in(&shot, templates::STAMINA_ICON).await?;
    if !icon.found {
        log::debug!("[{}] Stamina icon not visible", ctx.profile.name);
        return Ok(None);
    }
    let area = Area::new(icon.point.x + 16, icon.point.y.saturating_sub(16), 140, 32);
    let text = ctx.read_text(&shot, area).await?;
    let value = ocr::parse_leading_number(&text);
    match value {
        Some(stamina) => {
            log::info!("[{}] ⚡ Stamina {stamina}", ctx.profile.name);
            ctx.stamina.set(stamina);
        }
        None => log::debug!("[{}] Could not read stamina from '{text}'", ctx.profile.name),
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[tokio::test(start_paused = true)]
    async fn test_cache_goes_stale() {
        let cache = StaminaCache::new();
        assert!(cache.is_stale());
        cache.set(80);
        assert!(!cache.is_stale());
        cache.consume(30);
        assert_eq!(cache.get(), Some(50));

        tokio::time::advance(STAMINA_STALE_AFTER).await;
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reads_counter() {
        let fx = Fixture::new();
        fx.vision.show(templates::STAMINA_ICON);
        fx.vision.set_text("85/120");
        let ctx = fx.context();

        assert_eq!(refresh(&ctx).await.unwrap(), Some(85));
        assert_eq!(ctx.stamina.get(), Some(85));
        assert!(!ctx.stamina.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_without_icon_keeps_cache() {
        let fx = Fixture::new();
        let ctx = fx.context();
        assert_eq!(refresh(&ctx).await.unwrap(), None);
        assert_eq!(ctx.stamina.get(), None);
    }
}
