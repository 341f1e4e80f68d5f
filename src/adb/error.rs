use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB and emulator transport operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("Failed to talk to the ADB server: {source}")]
    ServerUnavailable {
        #[source]
        source: adb_client::RustADBError,
    },

    #[error("Device '{serial}' is not connected: {source}")]
    DeviceNotFound {
        serial: String,
        #[source]
        source: adb_client::RustADBError,
    },

    #[error("Shell command '{command}' failed: {source}")]
    ShellCommandFailed {
        command: String,
        #[source]
        source: adb_client::RustADBError,
    },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: std::time::Duration,
        description: String,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Could not parse screen size from 'wm size' output.")]
    ScreenSizeParseFailed,

    #[error("Framebuffer capture failed: {description}")]
    FramebufferCaptureFailed { description: String },

    #[error("Failed to encode screenshot as PNG: {description}")]
    PngEncodeFailed { description: String },

    #[error("Tap coordinates are out of bounds: x={x}, y={y}")]
    TapOutOfBounds { x: u32, y: u32 },

    #[error("Emulator command '{command}' failed: {description}")]
    EmulatorCommandFailed { command: String, description: String },

    #[error("No {action} command configured for emulator instances")]
    EmulatorCommandMissing { action: &'static str },

    #[error("ADB protocol desync (CLSE error) - connection needs to be re-established: {description}")]
    ProtocolDesync { description: String },
}

impl AdbError {
    /// Check if this error indicates a protocol desync that requires reconnection
    pub fn is_protocol_desync(&self) -> bool {
        match self {
            AdbError::ShellCommandFailed { source, .. } => is_desync_message(&source.to_string()),
            AdbError::ProtocolDesync { .. } => true,
            _ => false,
        }
    }

    /// The cached connection is unusable and must be reopened.
    pub fn drops_connection(&self) -> bool {
        self.is_protocol_desync() || matches!(self, AdbError::Timeout { .. } | AdbError::JoinError { .. })
    }

    /// Build a shell error, promoting CLSE/endpoint failures to `ProtocolDesync`.
    pub fn from_shell_error(command: String, source: adb_client::RustADBError) -> Self {
        let err_str = source.to_string();
        if is_desync_message(&err_str) {
            AdbError::ProtocolDesync {
                description: format!("Command '{command}' failed with protocol error: {err_str}"),
            }
        } else {
            AdbError::ShellCommandFailed { command, source }
        }
    }
}

fn is_desync_message(message: &str) -> bool {
    message.contains("CLSE") || message.contains("no write endpoint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_desync_detection() {
        let err = AdbError::ProtocolDesync {
            description: "boom".into(),
        };
        assert!(err.is_protocol_desync());
        assert!(!AdbError::ScreenSizeParseFailed.is_protocol_desync());
    }

    #[test]
    fn test_desync_and_timeout_drop_the_connection() {
        let desync = AdbError::ProtocolDesync {
            description: "CLSE".into(),
        };
        let timeout = AdbError::Timeout {
            duration: std::time::Duration::from_secs(5),
            description: "input tap".into(),
        };
        assert!(desync.drops_connection());
        assert!(timeout.drops_connection());
        assert!(!AdbError::TapOutOfBounds { x: 1, y: 2 }.drops_connection());
        assert!(!AdbError::ScreenSizeParseFailed.drops_connection());
    }

    #[test]
    fn test_timeout_message_mentions_description() {
        let err = AdbError::Timeout {
            duration: std::time::Duration::from_secs(5),
            description: "tap".into(),
        };
        assert!(err.to_string().contains("tap"));
    }
}
