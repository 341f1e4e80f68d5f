// Core ADB types and the device driver contract used by the scheduler
use super::error::AdbResult;
use crate::geometry::{Area, Point};
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ImageCapture {
    pub bytes: Vec<u8>,
    pub duration_ms: u128,
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub online: bool,
}

/// Emulator lifecycle and input primitives, addressed by adb serial.
///
/// Implementations must be safe to share between all profile queues; every
/// call names the emulator it targets.
#[async_trait]
pub trait EmulatorDriver: Send + Sync {
    async fn capture_screenshot(&self, emulator: &str) -> AdbResult<ImageCapture>;

    async fn tap(&self, emulator: &str, point: Point) -> AdbResult<()>;

    async fn swipe(&self, emulator: &str, from: Point, to: Point) -> AdbResult<()>;

    async fn press_back(&self, emulator: &str) -> AdbResult<()>;

    /// Whether the emulator instance is booted and reachable over adb.
    async fn is_running(&self, emulator: &str) -> bool;

    async fn is_package_in_foreground(&self, emulator: &str, package: &str) -> AdbResult<bool>;

    async fn launch_emulator(&self, emulator: &str) -> AdbResult<()>;

    async fn close_emulator(&self, emulator: &str) -> AdbResult<()>;

    async fn launch_app(&self, emulator: &str, package: &str) -> AdbResult<()>;

    /// Send the foreground app to the background (home key), keeping the emulator alive.
    async fn send_to_background(&self, emulator: &str) -> AdbResult<()>;

    /// Tap `count` random points inside `area`, pausing `delay` between taps.
    async fn tap_random(
        &self,
        emulator: &str,
        area: Area,
        count: u32,
        delay: Duration,
    ) -> AdbResult<()> {
        for i in 0..count {
            let point = random_point_in(area);
            self.tap(emulator, point).await?;
            if i + 1 < count {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }
}

/// Pick a point inside `area`; degenerate areas collapse to their origin.
pub fn random_point_in(area: Area) -> Point {
    let mut rng = rand::thread_rng();
    let x = if area.width > 1 {
        area.x + rng.gen_range(0..area.width)
    } else {
        area.x
    };
    let y = if area.height > 1 {
        area.y + rng.gen_range(0..area.height)
    } else {
        area.y
    };
    Point::new(x, y)
}

/// Parse `wm size` output, e.g. `Physical size: 720x1280`.
pub fn parse_screen_size(stdout: &str) -> Option<(u32, u32)> {
    // Override size wins over physical size when both are printed
    let mut physical = None;
    for line in stdout.lines() {
        let line = line.trim();
        let (is_override, size_str) = if let Some(rest) = line.strip_prefix("Override size: ") {
            (true, rest)
        } else if let Some(rest) = line.strip_prefix("Physical size: ") {
            (false, rest)
        } else {
            continue;
        };
        let parts: Vec<&str> = size_str.trim().split('x').collect();
        if parts.len() == 2
            && let (Ok(x), Ok(y)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>())
        {
            if is_override {
                return Some((x, y));
            }
            physical = Some((x, y));
        }
    }
    physical
}

/// Extract the focused package from `dumpsys window` output.
///
/// Matches lines such as
/// `mCurrentFocus=Window{5e1c u0 com.gof.global/com.unity3d.player.UnityPlayerActivity}`.
pub fn parse_focused_package(dumpsys: &str) -> Option<String> {
    dumpsys
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("mCurrentFocus=") || line.starts_with("mFocusedApp="))
        .find_map(|line| {
            line.split_whitespace()
                .find(|token| token.contains('/'))
                .and_then(|token| token.split('/').next())
                .map(|pkg| pkg.trim_start_matches('{').to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_screen_size_prefers_override() {
        let out = "Physical size: 1080x1920\nOverride size: 720x1280\n";
        assert_eq!(parse_screen_size(out), Some((720, 1280)));
        assert_eq!(parse_screen_size("Physical size: 720x1280"), Some((720, 1280)));
        assert_eq!(parse_screen_size("garbage"), None);
    }

    #[test]
    fn test_parse_focused_package() {
        let out = "  mCurrentFocus=Window{5e1c u0 com.gof.global/com.unity3d.player.UnityPlayerActivity}\n";
        assert_eq!(parse_focused_package(out).as_deref(), Some("com.gof.global"));
        assert_eq!(parse_focused_package("mCurrentFocus=null"), None);
    }

    #[test]
    fn test_random_point_stays_inside_area() {
        let area = Area::new(100, 200, 30, 40);
        for _ in 0..200 {
            assert!(area.contains(random_point_in(area)));
        }
        assert_eq!(random_point_in(Area::new(5, 6, 0, 0)), Point::new(5, 6));
    }
}
