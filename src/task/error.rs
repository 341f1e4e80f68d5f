use super::navigation::ScreenLocation;
use crate::adb::AdbError;
use crate::vision::VisionError;
use thiserror::Error;

/// Recovery action the queue takes for a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Screen state unrecognised, restore it with Initialize
    NavigationLost,
    /// Game shows the blocking reconnect prompt
    ReconnectRequired,
    /// Device or bridge connection failed, restore with Initialize
    TransportLost,
    /// Cooperative stop, nothing to recover
    ExplicitStop,
    Uncategorized,
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Home screen not found: {0}")]
    HomeNotFound(String),

    #[error("Could not reach {target} screen after {attempts} attempts")]
    NavigationFailed {
        target: ScreenLocation,
        attempts: u32,
    },

    #[error("Game is waiting on the reconnect prompt")]
    ReconnectRequired,

    #[error("Device transport failed: {0}")]
    Transport(#[from] AdbError),

    #[error("Stopped: {0}")]
    Stopped(String),

    #[error("Image recognition failed: {0}")]
    Vision(#[from] VisionError),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    pub fn category(&self) -> FailureCategory {
        match self {
            TaskError::HomeNotFound(_) | TaskError::NavigationFailed { .. } => {
                FailureCategory::NavigationLost
            }
            TaskError::ReconnectRequired => FailureCategory::ReconnectRequired,
            TaskError::Transport(_) => FailureCategory::TransportLost,
            TaskError::Stopped(_) => FailureCategory::ExplicitStop,
            TaskError::Vision(_) | TaskError::Panicked(_) | TaskError::Failed(_) => {
                FailureCategory::Uncategorized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_categories() {
        let transport = TaskError::from(AdbError::Timeout {
            duration: Duration::from_secs(5),
            description: "tap".into(),
        });
        assert_eq!(transport.category(), FailureCategory::TransportLost);
        assert_eq!(
            TaskError::NavigationFailed {
                target: ScreenLocation::Home,
                attempts: 10
            }
            .category(),
            FailureCategory::NavigationLost
        );
        assert_eq!(
            TaskError::HomeNotFound("game closed".into()).category(),
            FailureCategory::NavigationLost
        );
        assert_eq!(TaskError::ReconnectRequired.category(), FailureCategory::ReconnectRequired);
        assert_eq!(TaskError::Stopped("queue".into()).category(), FailureCategory::ExplicitStop);
        assert_eq!(TaskError::Failed("x".into()).category(), FailureCategory::Uncategorized);
    }
}
