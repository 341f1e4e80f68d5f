//! Admission control for emulator instances.
//!
//! At most `max_slots` emulators run at once. A profile that cannot get a
//! slot waits in a set ordered by priority (higher first) then arrival, and
//! is told its 1-based position at least once per second while it waits.
//!
//! Holders are identified by profile id: every profile queue runs a single
//! loop task, so the id plays the role of the owning thread.

use crate::config::{Profile, ProfileId};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// Upper bound between re-checks while waiting
const WAIT_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("Emulator slot controller was reset while waiting")]
    Reset,
}

/// Who is asking for a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    pub holder: ProfileId,
    pub priority: i64,
    pub name: String,
}

impl SlotRequest {
    pub fn new(holder: ProfileId, priority: i64, name: impl Into<String>) -> Self {
        Self {
            holder,
            priority,
            name: name.into(),
        }
    }
}

impl From<&Profile> for SlotRequest {
    fn from(profile: &Profile) -> Self {
        Self::new(profile.id, profile.priority, profile.name.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitingEntry {
    priority: i64,
    arrival: u64,
    holder: ProfileId,
}

impl Ord for WaitingEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then(self.arrival.cmp(&other.arrival))
            .then(self.holder.cmp(&other.holder))
    }
}

impl PartialOrd for WaitingEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct SlotState {
    available: usize,
    holders: HashSet<ProfileId>,
    waiting: BTreeSet<WaitingEntry>,
    next_arrival: u64,
    // bumped by reset() so stale waiters notice
    generation: u64,
}

pub struct EmulatorSlotController {
    max_slots: usize,
    state: Mutex<SlotState>,
    changed: Notify,
}

/// Removes a waiting entry if the acquiring future is dropped before it is granted.
struct WaitGuard<'a> {
    controller: &'a EmulatorSlotController,
    entry: WaitingEntry,
    generation: u64,
    armed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.controller.lock();
        if state.generation == self.generation && state.waiting.remove(&self.entry) {
            log::debug!("🎫 Profile {} stopped waiting for an emulator slot", self.entry.holder);
            drop(state);
            // the head may have changed
            self.controller.changed.notify_waiters();
        }
    }
}

impl EmulatorSlotController {
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.max(1);
        Self {
            max_slots,
            state: Mutex::new(SlotState {
                available: max_slots,
                holders: HashSet::new(),
                waiting: BTreeSet::new(),
                next_arrival: 0,
                generation: 0,
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for a slot. `on_position` receives 0 when the slot is already held
    /// by this holder, and the current 1-based rank on every tick while waiting.
    pub async fn acquire<F>(&self, request: &SlotRequest, mut on_position: F) -> Result<(), SlotError>
    where
        F: FnMut(usize) + Send,
    {
        let (entry, generation) = {
            let mut state = self.lock();
            if state.holders.contains(&request.holder) {
                drop(state);
                log::debug!("🎫 {} already holds an emulator slot", request.name);
                on_position(0);
                return Ok(());
            }
            if state.available > 0 && state.waiting.is_empty() {
                state.available -= 1;
                state.holders.insert(request.holder);
                log::info!(
                    "🎫 {} got an emulator slot ({} free)",
                    request.name,
                    state.available
                );
                return Ok(());
            }
            let entry = WaitingEntry {
                priority: request.priority,
                arrival: state.next_arrival,
                holder: request.holder,
            };
            state.next_arrival += 1;
            state.waiting.insert(entry);
            (entry, state.generation)
        };
        log::info!(
            "⏳ {} is waiting for an emulator slot (priority {})",
            request.name,
            request.priority
        );

        let mut guard = WaitGuard {
            controller: self,
            entry,
            generation,
            armed: true,
        };

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // register before checking so a release in between is not missed
            notified.as_mut().enable();

            let position = {
                let mut state = self.lock();
                if state.generation != generation {
                    guard.armed = false;
                    return Err(SlotError::Reset);
                }
                let is_head = state.waiting.first() == Some(&entry);
                if is_head && state.available > 0 {
                    state.waiting.remove(&entry);
                    state.available -= 1;
                    state.holders.insert(request.holder);
                    guard.armed = false;
                    let more = state.available > 0 && !state.waiting.is_empty();
                    drop(state);
                    log::info!("🎫 {} got an emulator slot after waiting", request.name);
                    if more {
                        self.changed.notify_waiters();
                    }
                    return Ok(());
                }
                state
                    .waiting
                    .iter()
                    .position(|e| *e == entry)
                    .map_or(0, |p| p + 1)
            };

            on_position(position);
            let _ = tokio::time::timeout(WAIT_TICK, notified).await;
        }
    }

    /// Give a slot back. Returns false, changing nothing, when `holder` holds no slot.
    pub fn release(&self, holder: ProfileId) -> bool {
        let mut state = self.lock();
        if !state.holders.remove(&holder) {
            drop(state);
            log::warn!("⚠️ Profile {holder} released an emulator slot it does not hold");
            return false;
        }
        state.available += 1;
        let available = state.available;
        drop(state);
        log::info!("🎫 Profile {holder} released its emulator slot ({available} free)");
        self.changed.notify_waiters();
        true
    }

    /// Forget every holder and waiter; pending `acquire` calls fail with [`SlotError::Reset`].
    pub fn reset(&self) {
        let mut state = self.lock();
        state.waiting.clear();
        state.holders.clear();
        state.available = self.max_slots;
        state.generation += 1;
        drop(state);
        log::info!("🔄 Emulator slot controller reset ({} slots)", self.max_slots);
        self.changed.notify_waiters();
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    pub fn available_slots(&self) -> usize {
        self.lock().available
    }

    pub fn held_count(&self) -> usize {
        self.lock().holders.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.lock().waiting.len()
    }

    pub fn is_holder(&self, holder: ProfileId) -> bool {
        self.lock().holders.contains(&holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request(holder: ProfileId, priority: i64) -> SlotRequest {
        SlotRequest::new(holder, priority, format!("profile-{holder}"))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    /// Spawn a waiter that records its id when granted and holds the slot briefly.
    fn spawn_waiter(
        slots: &Arc<EmulatorSlotController>,
        granted: &Arc<Mutex<Vec<ProfileId>>>,
        req: SlotRequest,
    ) -> tokio::task::JoinHandle<()> {
        let slots = Arc::clone(slots);
        let granted = Arc::clone(granted);
        tokio::spawn(async move {
            slots.acquire(&req, |_| {}).await.unwrap();
            granted.lock().unwrap().push(req.holder);
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(slots.release(req.holder));
        })
    }

    #[tokio::test]
    async fn test_immediate_grant_and_release() {
        let slots = EmulatorSlotController::new(2);
        slots.acquire(&request(1, 0), |_| {}).await.unwrap();
        assert_eq!(slots.available_slots(), 1);
        assert!(slots.is_holder(1));
        assert!(slots.release(1));
        assert_eq!(slots.available_slots(), 2);
        assert_eq!(slots.held_count(), 0);
    }

    #[tokio::test]
    async fn test_reentrant_acquire_reports_position_zero() {
        let slots = EmulatorSlotController::new(1);
        slots.acquire(&request(1, 0), |_| {}).await.unwrap();

        let mut positions = Vec::new();
        slots.acquire(&request(1, 0), |p| positions.push(p)).await.unwrap();
        assert_eq!(positions, vec![0]);
        assert_eq!(slots.available_slots(), 0);
        assert_eq!(slots.held_count(), 1);
    }

    #[tokio::test]
    async fn test_release_by_non_holder_is_noop() {
        let slots = EmulatorSlotController::new(2);
        slots.acquire(&request(1, 0), |_| {}).await.unwrap();

        assert!(!slots.release(2));
        assert_eq!(slots.available_slots(), 1);
        assert!(slots.release(1));
        assert!(!slots.release(1));
        assert_eq!(slots.available_slots(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiters_served_by_priority_then_arrival() {
        let slots = Arc::new(EmulatorSlotController::new(1));
        let granted = Arc::new(Mutex::new(Vec::new()));
        slots.acquire(&request(0, 0), |_| {}).await.unwrap();

        let mut handles = Vec::new();
        for (holder, priority) in [(1, 10), (2, 20), (3, 10)] {
            handles.push(spawn_waiter(&slots, &granted, request(holder, priority)));
            settle().await;
        }
        assert_eq!(slots.waiting_count(), 3);

        assert!(slots.release(0));
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*granted.lock().unwrap(), vec![2, 1, 3]);
        assert_eq!(slots.available_slots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_higher_priority_wins_despite_arriving_later() {
        let slots = Arc::new(EmulatorSlotController::new(1));
        let granted = Arc::new(Mutex::new(Vec::new()));
        slots.acquire(&request(9, 0), |_| {}).await.unwrap();

        let low = spawn_waiter(&slots, &granted, request(50, 50));
        settle().await;
        let high = spawn_waiter(&slots, &granted, request(100, 100));
        settle().await;

        slots.release(9);
        low.await.unwrap();
        high.await.unwrap();
        assert_eq!(*granted.lock().unwrap(), vec![100, 50]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_updates_while_waiting() {
        let slots = Arc::new(EmulatorSlotController::new(1));
        slots.acquire(&request(0, 0), |_| {}).await.unwrap();
        let positions = Arc::new(Mutex::new(Vec::new()));

        let waiter = {
            let slots = Arc::clone(&slots);
            let positions = Arc::clone(&positions);
            tokio::spawn(async move {
                slots
                    .acquire(&request(1, 5), move |p| positions.lock().unwrap().push(p))
                    .await
            })
        };

        // no slot activity, only the tick drives the callback
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let seen = positions.lock().unwrap().clone();
        assert!(seen.len() >= 3, "expected periodic updates, got {seen:?}");
        assert!(seen.iter().all(|p| *p == 1));

        slots.release(0);
        waiter.await.unwrap().unwrap();
        assert!(slots.is_holder(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_count_never_exceeds_max() {
        let slots = Arc::new(EmulatorSlotController::new(2));
        let peak = Arc::new(Mutex::new(0usize));

        let mut handles = Vec::new();
        for holder in 0..8 {
            let slots = Arc::clone(&slots);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                for round in 0..3u64 {
                    slots.acquire(&request(holder, holder % 3), |_| {}).await.unwrap();
                    let held = slots.held_count();
                    assert_eq!(held + slots.available_slots(), 2);
                    {
                        let mut peak = peak.lock().unwrap();
                        *peak = (*peak).max(held);
                    }
                    tokio::time::sleep(Duration::from_millis(5 + round)).await;
                    assert!(slots.release(holder));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(*peak.lock().unwrap() <= 2);
        assert_eq!(slots.available_slots(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_fails_pending_waiters() {
        let slots = Arc::new(EmulatorSlotController::new(1));
        slots.acquire(&request(0, 0), |_| {}).await.unwrap();

        let waiter = {
            let slots = Arc::clone(&slots);
            tokio::spawn(async move { slots.acquire(&request(1, 0), |_| {}).await })
        };
        settle().await;

        slots.reset();
        assert_eq!(waiter.await.unwrap(), Err(SlotError::Reset));
        assert_eq!(slots.available_slots(), 1);
        assert_eq!(slots.held_count(), 0);
        assert_eq!(slots.waiting_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_waiter_leaves_queue() {
        let slots = Arc::new(EmulatorSlotController::new(1));
        slots.acquire(&request(0, 0), |_| {}).await.unwrap();

        let waiter = {
            let slots = Arc::clone(&slots);
            tokio::spawn(async move { slots.acquire(&request(1, 0), |_| {}).await })
        };
        settle().await;
        assert_eq!(slots.waiting_count(), 1);

        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(slots.waiting_count(), 0);

        // the slot goes straight to the next caller once released
        slots.release(0);
        slots.acquire(&request(2, 0), |_| {}).await.unwrap();
        assert!(slots.is_holder(2));
    }
}
