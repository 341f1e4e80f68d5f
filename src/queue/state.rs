// Pause and power state of a profile queue
use crate::config::IdleBehavior;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    Active,
    /// Paused by the user until resumed
    Manual,
    /// Waiting to reconnect the game, handled on the next iteration
    AwaitingReconnect,
    Timed { since: Instant, duration: Duration },
}

impl PauseState {
    pub fn is_paused(&self) -> bool {
        !matches!(self, PauseState::Active)
    }

    pub fn expires_at(&self) -> Option<Instant> {
        match self {
            PauseState::Timed { since, duration } => Some(*since + *duration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Awake,
    /// Idling between tasks; how the emulator was put away
    PoweredDown(IdleBehavior),
}

/// Mutable loop state guarded by one lock.
#[derive(Debug)]
pub(crate) struct QueueControl {
    pub pause: PauseState,
    pub power: PowerState,
    pub needs_reconnect: bool,
    /// Scheduled time of the head task, `None` when the queue is empty
    pub delay_until: Option<Instant>,
}

impl Default for QueueControl {
    fn default() -> Self {
        Self {
            pause: PauseState::Active,
            power: PowerState::Awake,
            needs_reconnect: false,
            delay_until: None,
        }
    }
}
