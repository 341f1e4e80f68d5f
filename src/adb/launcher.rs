// Emulator process lifecycle through the emulator manager's command line
use super::error::{AdbError, AdbResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::process::Command;

const INSTANCE_PLACEHOLDER: &str = "{instance}";

/// Launch/close command templates, e.g.
/// `["MuMuManager.exe", "control", "-v", "{instance}", "launch"]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorCommands {
    pub launch: Vec<String>,
    pub close: Vec<String>,
    pub boot_timeout_secs: u64,
}

impl Default for EmulatorCommands {
    fn default() -> Self {
        Self {
            launch: Vec::new(),
            close: Vec::new(),
            boot_timeout_secs: 120,
        }
    }
}

/// Runs the configured emulator manager commands for an adb serial.
#[derive(Debug, Clone)]
pub struct EmulatorLauncher {
    commands: EmulatorCommands,
    // adb serial -> emulator manager instance id
    instances: HashMap<String, String>,
}

impl EmulatorLauncher {
    pub fn new(commands: EmulatorCommands, instances: HashMap<String, String>) -> Self {
        Self {
            commands,
            instances,
        }
    }

    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.commands.boot_timeout_secs.max(1))
    }

    pub async fn launch(&self, serial: &str) -> AdbResult<()> {
        let argv = self.render(&self.commands.launch, serial, "launch")?;
        Self::run(argv).await
    }

    pub async fn close(&self, serial: &str) -> AdbResult<()> {
        let argv = self.render(&self.commands.close, serial, "close")?;
        Self::run(argv).await
    }

    /// Substitute `{instance}` in the template; serials without a mapped instance use the serial itself.
    fn render(
        &self,
        template: &[String],
        serial: &str,
        action: &'static str,
    ) -> AdbResult<Vec<String>> {
        if template.is_empty() {
            return Err(AdbError::EmulatorCommandMissing { action });
        }
        let instance = self
            .instances
            .get(serial)
            .map(String::as_str)
            .unwrap_or(serial);
        Ok(template
            .iter()
            .map(|arg| arg.replace(INSTANCE_PLACEHOLDER, instance))
            .collect())
    }

    async fn run(argv: Vec<String>) -> AdbResult<()> {
        let command_line = argv.join(" ");
        log::debug!("🖥️ Running emulator command: {command_line}");
        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .await
            .map_err(|e| AdbError::EmulatorCommandFailed {
                command: command_line.clone(),
                description: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(AdbError::EmulatorCommandFailed {
                command: command_line,
                description: format!(
                    "exit {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> EmulatorLauncher {
        let commands = EmulatorCommands {
            launch: vec!["mgr".into(), "launch".into(), "-v".into(), "{instance}".into()],
            close: Vec::new(),
            boot_timeout_secs: 0,
        };
        let instances = HashMap::from([("127.0.0.1:16384".to_string(), "0".to_string())]);
        EmulatorLauncher::new(commands, instances)
    }

    #[test]
    fn test_render_substitutes_instance() {
        let argv = launcher()
            .render(&launcher().commands.launch, "127.0.0.1:16384", "launch")
            .unwrap();
        assert_eq!(argv, vec!["mgr", "launch", "-v", "0"]);
    }

    #[test]
    fn test_render_falls_back_to_serial() {
        let l = launcher();
        let argv = l.render(&l.commands.launch, "emulator-5554", "launch").unwrap();
        assert_eq!(argv[3], "emulator-5554");
    }

    #[test]
    fn test_missing_close_command_is_reported() {
        let l = launcher();
        let err = l.render(&l.commands.close, "x", "close").unwrap_err();
        assert!(matches!(err, AdbError::EmulatorCommandMissing { action: "close" }));
        assert_eq!(l.boot_timeout(), Duration::from_secs(1));
    }
}
