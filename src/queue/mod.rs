//! Per-profile task queues and the coordinator that runs them.

pub mod background;
pub mod coordinator;
pub mod heap;
pub mod idle;
pub mod profile_queue;
pub mod state;

use crate::adb::EmulatorDriver;
use crate::config::{ProfileId, ProfileStore};
use crate::slots::EmulatorSlotController;
use crate::status::StatusSink;
use crate::task::{TaskRegistry, TaskType};
use crate::vision::Vision;
use std::sync::Arc;
use thiserror::Error;

pub use coordinator::TaskQueueCoordinator;
pub use heap::{TaskHeap, TaskSnapshot};
pub use profile_queue::ProfileTaskQueue;
pub use state::{PauseState, PowerState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("No task registered for {0}")]
    UnknownTaskType(TaskType),

    #[error("{0} has no instances configured for this profile")]
    NothingToSchedule(TaskType),

    #[error("No queue for profile {0}")]
    UnknownProfile(ProfileId),

    #[error("Queue for profile {0} is not running")]
    NotRunning(ProfileId),
}

/// Services shared by every queue, created once at start-up.
#[derive(Clone)]
pub struct QueueServices {
    pub slots: Arc<EmulatorSlotController>,
    pub registry: Arc<TaskRegistry>,
    pub driver: Arc<dyn EmulatorDriver>,
    pub vision: Arc<dyn Vision>,
    pub store: Arc<dyn ProfileStore>,
    pub status: Arc<dyn StatusSink>,
    /// Android package of the game
    pub game_package: String,
}
