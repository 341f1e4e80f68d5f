//! Task state and profile status published by the queues.
//!
//! [`StatusSink`] is what the scheduler writes to; [`StatusBoard`] keeps the
//! latest values in memory and, when given a state file, mirrors task state to
//! JSON so schedules survive a restart.

use crate::config::ProfileId;
use crate::task::TaskType;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStateRecord {
    pub scheduled: bool,
    pub executing: bool,
    pub last_execution: Option<DateTime<Local>>,
    pub next_execution: Option<DateTime<Local>>,
}

#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn record_task_state(&self, profile: ProfileId, task: TaskType, state: TaskStateRecord);

    async fn task_state(&self, profile: ProfileId, task: TaskType) -> Option<TaskStateRecord>;

    async fn publish_status(&self, profile: ProfileId, status: &str);

    async fn status(&self, profile: ProfileId) -> Option<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedTaskState {
    profile: ProfileId,
    task: TaskType,
    #[serde(flatten)]
    state: TaskStateRecord,
}

#[derive(Default)]
struct Board {
    tasks: HashMap<(ProfileId, TaskType), TaskStateRecord>,
    statuses: HashMap<ProfileId, String>,
}

#[derive(Default)]
pub struct StatusBoard {
    board: Mutex<Board>,
    state_file: Option<PathBuf>,
    // orders concurrent file writes
    write_lock: tokio::sync::Mutex<()>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Board persisted to `path`, seeded with whatever the file already holds.
    pub async fn with_state_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut board = Board::default();
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<Vec<PersistedTaskState>>(&text) {
                Ok(entries) => {
                    log::info!("📂 Loaded {} task states from {}", entries.len(), path.display());
                    for entry in entries {
                        board.tasks.insert((entry.profile, entry.task), entry.state);
                    }
                }
                Err(e) => log::warn!("⚠️ Ignoring unreadable state file {}: {e}", path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("⚠️ Could not read state file {}: {e}", path.display()),
        }
        Self {
            board: Mutex::new(board),
            state_file: Some(path),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    fn board(&self) -> std::sync::MutexGuard<'_, Board> {
        self.board.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All recorded task states of one profile.
    pub fn tasks_of(&self, profile: ProfileId) -> Vec<(TaskType, TaskStateRecord)> {
        let mut tasks: Vec<_> = self
            .board()
            .tasks
            .iter()
            .filter(|((p, _), _)| *p == profile)
            .map(|((_, t), s)| (*t, s.clone()))
            .collect();
        tasks.sort_by_key(|(t, _)| *t);
        tasks
    }

    async fn persist(&self) {
        let Some(path) = &self.state_file else {
            return;
        };
        let _guard = self.write_lock.lock().await;
        let entries: Vec<PersistedTaskState> = {
            let board = self.board();
            let mut entries: Vec<_> = board
                .tasks
                .iter()
                .map(|((profile, task), state)| PersistedTaskState {
                    profile: *profile,
                    task: *task,
                    state: state.clone(),
                })
                .collect();
            entries.sort_by_key(|e| (e.profile, e.task));
            entries
        };
        let json = match serde_json::to_string_pretty(&entries) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("⚠️ Could not serialize task state: {e}");
                return;
            }
        };
        if let Err(e) = tokio::fs::write(path, json).await {
            log::warn!("⚠️ Could not write state file {}: {e}", path.display());
        }
    }
}

// Leading non-digit part of a status, "Idling for 00:04:12" -> "Idling for "
fn status_category(status: &str) -> &str {
    let end = status.find(|c: char| c.is_ascii_digit()).unwrap_or(status.len());
    &status[..end]
}

#[async_trait]
impl StatusSink for StatusBoard {
    async fn record_task_state(&self, profile: ProfileId, task: TaskType, state: TaskStateRecord) {
        let changed = {
            let mut board = self.board();
            board.tasks.insert((profile, task), state.clone()) != Some(state)
        };
        if changed {
            self.persist().await;
        }
    }

    async fn task_state(&self, profile: ProfileId, task: TaskType) -> Option<TaskStateRecord> {
        self.board().tasks.get(&(profile, task)).cloned()
    }

    async fn publish_status(&self, profile: ProfileId, status: &str) {
        let previous = self.board().statuses.insert(profile, status.to_string());
        let same_category = previous
            .as_deref()
            .is_some_and(|p| status_category(p) == status_category(status));
        if same_category {
            log::debug!("[{profile}] {status}");
        } else {
            log::info!("📋 [{profile}] {status}");
        }
    }

    async fn status(&self, profile: ProfileId) -> Option<String> {
        self.board().statuses.get(&profile).cloned()
    }
}

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_hms(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn test_status_category() {
        assert_eq!(status_category("Idling for 00:01:00"), "Idling for ");
        assert_eq!(status_category("Paused"), "Paused");
    }

    #[tokio::test]
    async fn test_records_and_statuses_are_kept() {
        let board = StatusBoard::new();
        let record = TaskStateRecord {
            scheduled: true,
            ..Default::default()
        };
        board.record_task_state(1, TaskType::Intel, record.clone()).await;
        board.publish_status(1, "Running Intel").await;

        assert_eq!(board.task_state(1, TaskType::Intel).await, Some(record));
        assert_eq!(board.task_state(2, TaskType::Intel).await, None);
        assert_eq!(board.status(1).await.as_deref(), Some("Running Intel"));
        assert_eq!(board.tasks_of(1).len(), 1);
    }

    #[tokio::test]
    async fn test_state_file_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let next = Local::now() + chrono::Duration::minutes(30);

        let board = StatusBoard::with_state_file(&path).await;
        board
            .record_task_state(
                3,
                TaskType::MailRewards,
                TaskStateRecord {
                    scheduled: true,
                    executing: false,
                    last_execution: None,
                    next_execution: Some(next),
                },
            )
            .await;
        drop(board);

        let reloaded = StatusBoard::with_state_file(&path).await;
        let state = reloaded.task_state(3, TaskType::MailRewards).await.unwrap();
        assert_eq!(state.next_execution.map(|t| t.timestamp()), Some(next.timestamp()));
    }

    #[tokio::test]
    async fn test_corrupt_state_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        let board = StatusBoard::with_state_file(&path).await;
        assert!(board.tasks_of(1).is_empty());
    }
}
