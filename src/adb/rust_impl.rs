// https://crates.io/crates/adb_client
use super::connections::ConnectionCache;
use super::error::{AdbError, AdbResult};
use super::framebuffer::framebuffer_to_png;
use super::launcher::EmulatorLauncher;
use super::types::{Device, EmulatorDriver, ImageCapture, parse_focused_package, parse_screen_size};
use crate::geometry::Point;
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice, DeviceState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const SHELL_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const BOOT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A device opened through the local adb server.
struct ConnectedDevice {
    server_device: Arc<Mutex<ADBServerDevice>>,
    screen_x: u32,
    screen_y: u32,
}

/// `EmulatorDriver` backed by the adb server protocol (`adb_client`).
///
/// Devices are opened lazily per serial and dropped again after a protocol
/// desync or timeout so the next call reconnects.
pub struct RustAdb {
    devices: ConnectionCache<ConnectedDevice>,
    launcher: EmulatorLauncher,
}

impl RustAdb {
    pub fn new(launcher: EmulatorLauncher) -> Self {
        Self {
            devices: ConnectionCache::new(),
            launcher,
        }
    }

    pub async fn list_devices() -> AdbResult<Vec<Device>> {
        let mut server = ADBServer::default();
        let device_list = tokio::task::spawn_blocking(move || server.devices())
            .await?
            .map_err(|source| AdbError::ServerUnavailable { source })?;
        Ok(device_list
            .into_iter()
            .map(|d| Device {
                online: matches!(d.state, DeviceState::Device),
                name: d.identifier,
            })
            .collect())
    }

    async fn device(&self, serial: &str) -> AdbResult<Arc<ConnectedDevice>> {
        self.devices.get_or_connect(serial, || Self::connect(serial)).await
    }

    async fn connect(serial: &str) -> AdbResult<Arc<ConnectedDevice>> {
        let name = serial.to_string();
        let open = tokio::task::spawn_blocking(move || {
            let mut server = ADBServer::default();
            server
                .get_device_by_name(&name)
                .map_err(|source| AdbError::DeviceNotFound { serial: name, source })
        });
        let server_device = tokio::time::timeout(CONNECT_TIMEOUT, open)
            .await
            .map_err(|_| AdbError::Timeout {
                duration: CONNECT_TIMEOUT,
                description: format!("opening device {serial}"),
            })???;
        let server_device = Arc::new(Mutex::new(server_device));

        let size_out = Self::shell_on(&server_device, vec!["wm".into(), "size".into()]).await?;
        let (screen_x, screen_y) =
            parse_screen_size(&size_out).ok_or(AdbError::ScreenSizeParseFailed)?;
        log::info!("🔌 Connected to {serial} ({screen_x}x{screen_y})");

        Ok(Arc::new(ConnectedDevice {
            server_device,
            screen_x,
            screen_y,
        }))
    }

    async fn forget(&self, serial: &str) {
        if self.devices.forget(serial).await {
            log::debug!("Dropped cached adb connection for {serial}");
        }
    }

    // Wrap the blocking shell_command in spawn_blocking so timeout can work
    async fn shell_on(server_device: &Arc<Mutex<ADBServerDevice>>, args: Vec<String>) -> AdbResult<String> {
        let server_device = Arc::clone(server_device);
        let command = args.join(" ");
        let description = command.clone();
        let shell_future = tokio::task::spawn_blocking(move || -> AdbResult<Vec<u8>> {
            let mut out: Vec<u8> = Vec::new();
            let mut dev = server_device.blocking_lock();
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            dev.shell_command(&refs, &mut out)
                .map_err(|source| AdbError::from_shell_error(command, source))?;
            Ok(out)
        });

        match tokio::time::timeout(SHELL_TIMEOUT, shell_future).await {
            Ok(joined) => Ok(String::from_utf8_lossy(&joined??).into_owned()),
            Err(_) => Err(AdbError::Timeout {
                duration: SHELL_TIMEOUT,
                description,
            }),
        }
    }

    async fn shell(&self, serial: &str, args: &[&str]) -> AdbResult<String> {
        let dev = self.device(serial).await?;
        let args = args.iter().map(|s| s.to_string()).collect();
        let result = Self::shell_on(&dev.server_device, args).await;
        if let Err(e) = &result {
            if e.drops_connection() {
                self.forget(serial).await;
            }
        }
        result
    }

    async fn capture_internal(&self, serial: &str) -> AdbResult<Vec<u8>> {
        let dev = self.device(serial).await?;
        let server_device = Arc::clone(&dev.server_device);
        let framebuffer =
            tokio::task::spawn_blocking(move || server_device.blocking_lock().framebuffer_bytes())
                .await?;

        match framebuffer {
            Ok(data) => match framebuffer_to_png(data, dev.screen_x, dev.screen_y) {
                Ok(png) => return Ok(png),
                Err(e) => log::debug!("Framebuffer conversion failed: {e}, falling back to screencap"),
            },
            Err(e) => log::debug!("Framebuffer capture failed: {e}, falling back to screencap"),
        }

        // Fallback to shell screencap, binary output collected raw
        let server_device = Arc::clone(&dev.server_device);
        tokio::task::spawn_blocking(move || -> AdbResult<Vec<u8>> {
            let mut out: Vec<u8> = Vec::new();
            server_device
                .blocking_lock()
                .shell_command(&["screencap", "-p"], &mut out)
                .map_err(|source| AdbError::from_shell_error("screencap -p".into(), source))?;
            Ok(out)
        })
        .await?
    }

    async fn is_boot_completed(&self, serial: &str) -> bool {
        match self.shell(serial, &["getprop", "sys.boot_completed"]).await {
            Ok(out) => out.trim() == "1",
            Err(_) => false,
        }
    }
}

#[async_trait]
impl EmulatorDriver for RustAdb {
    async fn capture_screenshot(&self, emulator: &str) -> AdbResult<ImageCapture> {
        let start = Instant::now();
        let bytes = match tokio::time::timeout(CAPTURE_TIMEOUT, self.capture_internal(emulator)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                if e.drops_connection() {
                    self.forget(emulator).await;
                }
                return Err(e);
            }
            Err(_) => {
                self.forget(emulator).await;
                return Err(AdbError::Timeout {
                    duration: CAPTURE_TIMEOUT,
                    description: format!("screenshot of {emulator} (device may be disconnected)"),
                });
            }
        };
        Ok(ImageCapture {
            bytes,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    async fn tap(&self, emulator: &str, point: Point) -> AdbResult<()> {
        let dev = self.device(emulator).await?;
        if point.x > dev.screen_x || point.y > dev.screen_y {
            return Err(AdbError::TapOutOfBounds {
                x: point.x,
                y: point.y,
            });
        }
        let (xs, ys) = (point.x.to_string(), point.y.to_string());
        self.shell(emulator, &["input", "tap", &xs, &ys]).await?;
        Ok(())
    }

    async fn swipe(&self, emulator: &str, from: Point, to: Point) -> AdbResult<()> {
        let dev = self.device(emulator).await?;
        for p in [from, to] {
            if p.x > dev.screen_x || p.y > dev.screen_y {
                return Err(AdbError::TapOutOfBounds { x: p.x, y: p.y });
            }
        }
        let args = [from.x, from.y, to.x, to.y, 300].map(|v| v.to_string());
        self.shell(
            emulator,
            &["input", "swipe", &args[0], &args[1], &args[2], &args[3], &args[4]],
        )
        .await?;
        Ok(())
    }

    async fn press_back(&self, emulator: &str) -> AdbResult<()> {
        self.shell(emulator, &["input", "keyevent", "4"]).await?;
        Ok(())
    }

    async fn is_running(&self, emulator: &str) -> bool {
        match Self::list_devices().await {
            Ok(devices) if devices.iter().any(|d| d.name == emulator && d.online) => {
                self.is_boot_completed(emulator).await
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("Could not list adb devices: {e}");
                false
            }
        }
    }

    async fn is_package_in_foreground(&self, emulator: &str, package: &str) -> AdbResult<bool> {
        let out = self
            .shell(
                emulator,
                &["dumpsys", "window", "|", "grep", "-E", "'mCurrentFocus|mFocusedApp'"],
            )
            .await?;
        Ok(parse_focused_package(&out).as_deref() == Some(package))
    }

    async fn launch_emulator(&self, emulator: &str) -> AdbResult<()> {
        self.launcher.launch(emulator).await?;
        let timeout = self.launcher.boot_timeout();
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.is_running(emulator).await {
                log::info!("📱 Emulator {emulator} booted");
                return Ok(());
            }
            tokio::time::sleep(BOOT_POLL_INTERVAL).await;
        }
        Err(AdbError::Timeout {
            duration: timeout,
            description: format!("waiting for emulator {emulator} to boot"),
        })
    }

    async fn close_emulator(&self, emulator: &str) -> AdbResult<()> {
        self.forget(emulator).await;
        self.launcher.close(emulator).await
    }

    async fn launch_app(&self, emulator: &str, package: &str) -> AdbResult<()> {
        self.shell(
            emulator,
            &["monkey", "-p", package, "-c", "android.intent.category.LAUNCHER", "1"],
        )
        .await?;
        Ok(())
    }

    async fn send_to_background(&self, emulator: &str) -> AdbResult<()> {
        self.shell(emulator, &["input", "keyevent", "3"]).await?;
        Ok(())
    }
}
