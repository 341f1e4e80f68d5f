//! Starts, stops and addresses the per-profile queues.

use super::profile_queue::ProfileTaskQueue;
use super::{QueueError, QueueServices};
use crate::config::{ConfigResult, Profile, ProfileId};
use crate::task::TaskType;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct TaskQueueCoordinator {
    services: QueueServices,
    /// Delay between starting queues that need an emulator right away
    stagger: Duration,
    queues: Mutex<BTreeMap<ProfileId, Arc<ProfileTaskQueue>>>,
}

impl TaskQueueCoordinator {
    pub fn new(services: QueueServices, stagger: Duration) -> Self {
        Self {
            services,
            stagger,
            queues: Mutex::new(BTreeMap::new()),
        }
    }

    fn queues_map(&self) -> MutexGuard<'_, BTreeMap<ProfileId, Arc<ProfileTaskQueue>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn services(&self) -> &QueueServices {
        &self.services
    }

    /// Start a queue for every enabled profile that does not have one yet.
    ///
    /// Queues with work inside their idle window start first, by descending
    /// priority, so the most important profiles ask for a slot first. Idle
    /// queues start last and without stagger since they touch no emulator.
    pub async fn start_queues(&self, profiles: Vec<Profile>) -> usize {
        let mut planned = Vec::new();
        for profile in profiles {
            if !profile.enabled {
                log::info!("[{}] Profile disabled, not starting", profile.name);
                continue;
            }
            if self.queues_map().contains_key(&profile.id) {
                log::debug!("[{}] Queue already started", profile.name);
                continue;
            }
            let queue = ProfileTaskQueue::new(profile, self.services.clone());
            queue.seed_tasks().await;
            planned.push((queue.starts_idle(), queue));
        }
        planned.sort_by_key(|(idle, queue)| (*idle, Reverse(queue.priority())));

        let mut started = 0;
        for (idle, queue) in planned {
            if started > 0 && !idle && !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }
            if queue.start() {
                started += 1;
            }
            self.queues_map().insert(queue.profile_id(), queue);
        }
        log::info!("🚦 Started {started} profile queues");
        started
    }

    /// Load every profile from the store and start their queues.
    pub async fn start_from_store(&self) -> ConfigResult<usize> {
        let profiles = self.services.store.load_profiles().await?;
        Ok(self.start_queues(profiles).await)
    }

    /// Stop every queue, then reset the slot controller so nothing stays held.
    pub async fn stop_queues(&self) {
        let queues: Vec<_> = std::mem::take(&mut *self.queues_map()).into_values().collect();
        futures::future::join_all(queues.iter().map(|queue| queue.stop())).await;
        self.services.slots.reset();
        log::info!("🛑 Stopped {} profile queues", queues.len());
    }

    pub async fn pause_queues(&self) {
        for queue in self.queues() {
            queue.pause().await;
        }
    }

    pub async fn resume_queues(&self) {
        for queue in self.queues() {
            queue.resume().await;
        }
    }

    pub fn queue(&self, profile: ProfileId) -> Option<Arc<ProfileTaskQueue>> {
        self.queues_map().get(&profile).cloned()
    }

    pub fn queues(&self) -> Vec<Arc<ProfileTaskQueue>> {
        self.queues_map().values().cloned().collect()
    }

    /// Run a task on a profile's queue as soon as possible.
    pub async fn execute_task_now(
        &self,
        profile: ProfileId,
        task_type: TaskType,
        recurring: bool,
    ) -> Result<(), QueueError> {
        let queue = self.queue(profile).ok_or(QueueError::UnknownProfile(profile))?;
        if !queue.is_running() {
            return Err(QueueError::NotRunning(profile));
        }
        queue.execute_task_now(task_type, recurring).await
    }
}
