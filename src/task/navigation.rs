//! Screen location detection and navigation between home and world.

use super::context::TaskContext;
use super::error::TaskError;
use crate::vision::{Screenshot, templates};
use std::fmt;
use std::time::Duration;

pub const MAX_NAVIGATION_ATTEMPTS: u32 = 10;
const SETTLE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenLocation {
    Home,
    World,
    /// Either home or world
    Any,
}

impl ScreenLocation {
    pub fn accepts(self, current: ScreenLocation) -> bool {
        self == ScreenLocation::Any || self == current
    }
}

impl fmt::Display for ScreenLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScreenLocation::Home => "home",
            ScreenLocation::World => "world",
            ScreenLocation::Any => "home or world",
        })
    }
}

/// Where the game currently is. `None` when an overlay or unknown screen is showing.
///
/// Fails with [`TaskError::ReconnectRequired`] when the reconnect prompt is up.
pub async fn detect(ctx: &TaskContext, shot: &Screenshot) -> Result<Option<ScreenLocation>, TaskError> {
    if ctx.find_in(shot, templates::RECONNECT_PROMPT).await?.found {
        return Err(TaskError::ReconnectRequired);
    }
    if ctx.find_in(shot, templates::HOME_MARKER).await?.found {
        return Ok(Some(ScreenLocation::Home));
    }
    if ctx.find_in(shot, templates::WORLD_MARKER).await?.found {
        return Ok(Some(ScreenLocation::World));
    }
    Ok(None)
}

/// Drive the game to `target`, giving up after [`MAX_NAVIGATION_ATTEMPTS`].
pub async fn ensure_location(ctx: &TaskContext, target: ScreenLocation) -> Result<(), TaskError> {
    for attempt in 1..=MAX_NAVIGATION_ATTEMPTS {
        let shot = ctx.screenshot().await?;
        let current = detect(ctx, &shot).await?;
        match current {
            Some(location) if target.accepts(location) => {
                if attempt > 1 {
                    log::debug!("[{}] 🧭 Reached {target} after {attempt} attempts", ctx.profile.name);
                }
                return Ok(());
            }
            Some(ScreenLocation::Home) => {
                ctx.tap_template(templates::WORLD_BUTTON).await?;
            }
            Some(_) => {
                ctx.tap_template(templates::HOME_BUTTON).await?;
            }
            None => {
                // unknown screen, close whatever is on top
                let close = ctx.find_in(&shot, templates::CLOSE_BUTTON).await?;
                if close.found {
                    ctx.tap(close.point).await?;
                } else {
                    ctx.back().await?;
                }
            }
        }
        ctx.pause(SETTLE_DELAY).await?;
    }
    log::warn!(
        "[{}] 🧭 Could not reach {target} after {MAX_NAVIGATION_ATTEMPTS} attempts",
        ctx.profile.name
    );
    Err(TaskError::NavigationFailed {
        target,
        attempts: MAX_NAVIGATION_ATTEMPTS,
    })
}
