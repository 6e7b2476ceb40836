//! Suspension recovery.
//!
//! A process that is suspended stops receiving its one-second ticks, so a
//! countdown kept only in memory stalls. When the session goes to the
//! background we persist the absolute wall-clock deadline of the current
//! step; on return the remaining time is recomputed from that deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::engine::SessionSnapshot;
use crate::error::Result;

/// Wall-clock source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// A clock that only moves when told to. Used to simulate suspension gaps.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Persisted deadline of a running step, written when the app is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspendedCheckpoint {
    pub deadline_epoch_ms: u64,
    pub step_index: usize,
    /// Length of the timeline the checkpoint was taken against.
    #[serde(default)]
    pub step_count: usize,
}

/// Countdown state rebuilt from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveredState {
    pub step_index: usize,
    pub step_count: usize,
    pub time_left_secs: u64,
    pub running: bool,
}

/// Single process-wide checkpoint slot.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &SuspendedCheckpoint) -> Result<()>;
    fn load(&self) -> Result<Option<SuspendedCheckpoint>>;
    fn clear(&self) -> Result<()>;
}

/// In-memory checkpoint slot.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    slot: Mutex<Option<SuspendedCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SuspendedCheckpoint>> {
        // The slot holds plain data; a poisoned lock still has a usable value.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &SuspendedCheckpoint) -> Result<()> {
        *self.slot() = Some(*checkpoint);
        Ok(())
    }

    fn load(&self) -> Result<Option<SuspendedCheckpoint>> {
        Ok(*self.slot())
    }

    fn clear(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

/// Persist the current step's deadline if the countdown is live.
///
/// Returns the checkpoint written, or `None` when the session is paused,
/// finished, or already at zero.
pub fn on_backgrounding(
    snapshot: &SessionSnapshot,
    store: &dyn CheckpointStore,
    clock: &dyn Clock,
) -> Result<Option<SuspendedCheckpoint>> {
    if !snapshot.running || snapshot.time_left_secs == 0 {
        debug!(running = snapshot.running, "no checkpoint needed");
        return Ok(None);
    }
    let checkpoint = SuspendedCheckpoint {
        deadline_epoch_ms: clock
            .now_ms()
            .saturating_add(snapshot.time_left_secs.saturating_mul(1000)),
        step_index: snapshot.step_index,
        step_count: snapshot.step_count,
    };
    store.save(&checkpoint)?;
    info!(
        step_index = checkpoint.step_index,
        deadline_epoch_ms = checkpoint.deadline_epoch_ms,
        "suspension checkpoint saved"
    );
    Ok(Some(checkpoint))
}

/// Consume the checkpoint, if any, and rebuild the countdown from it.
pub fn on_foregrounding(
    store: &dyn CheckpointStore,
    clock: &dyn Clock,
) -> Result<Option<RecoveredState>> {
    let Some(checkpoint) = store.load()? else {
        return Ok(None);
    };
    // The recovered state is still valid if the slot cannot be emptied.
    if let Err(e) = store.clear() {
        warn!("failed to clear suspension checkpoint: {e}");
    }

    let time_left_secs = remaining_secs(checkpoint.deadline_epoch_ms, clock.now_ms());
    let recovered = RecoveredState {
        step_index: checkpoint.step_index,
        step_count: checkpoint.step_count,
        time_left_secs,
        running: time_left_secs > 0,
    };
    info!(
        step_index = recovered.step_index,
        time_left_secs, "countdown recovered from checkpoint"
    );
    Ok(Some(recovered))
}

/// Whole seconds until `deadline_ms`, rounded half up, never negative.
fn remaining_secs(deadline_ms: u64, now_ms: u64) -> u64 {
    let diff = deadline_ms.saturating_sub(now_ms);
    (diff + 500) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::timer::TimerState;

    fn snapshot(running: bool, time_left_secs: u64) -> SessionSnapshot {
        SessionSnapshot {
            state: if running { TimerState::Running } else { TimerState::Paused },
            routine_id: Some("r1".into()),
            step_index: 2,
            step_count: 6,
            step_type: None,
            step_label: "Rest 1".into(),
            time_left_secs,
            step_duration_secs: 60,
            step_progress: 0.0,
            running,
            session_progress_pct: 0.0,
        }
    }

    #[test]
    fn twenty_second_gap_leaves_thirty() {
        let store = MemoryCheckpointStore::new();
        let clock = ManualClock::new(1_700_000_000_000);
        on_backgrounding(&snapshot(true, 50), &store, &clock).unwrap();

        clock.advance_secs(20);
        let recovered = on_foregrounding(&store, &clock).unwrap().unwrap();
        assert_eq!(recovered.time_left_secs, 30);
        assert!(recovered.running);
        assert_eq!(recovered.step_index, 2);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn gap_longer_than_step_leaves_zero() {
        let store = MemoryCheckpointStore::new();
        let clock = ManualClock::new(1_700_000_000_000);
        on_backgrounding(&snapshot(true, 50), &store, &clock).unwrap();

        clock.advance_secs(60);
        let recovered = on_foregrounding(&store, &clock).unwrap().unwrap();
        assert_eq!(recovered.time_left_secs, 0);
        assert!(!recovered.running);
    }

    #[test]
    fn paused_session_writes_nothing() {
        let store = MemoryCheckpointStore::new();
        let clock = ManualClock::new(0);
        assert!(on_backgrounding(&snapshot(false, 50), &store, &clock)
            .unwrap()
            .is_none());
        assert!(on_foregrounding(&store, &clock).unwrap().is_none());
    }

    #[test]
    fn checkpoint_is_consumed_once() {
        let store = MemoryCheckpointStore::new();
        let clock = ManualClock::new(0);
        on_backgrounding(&snapshot(true, 10), &store, &clock).unwrap();
        assert!(on_foregrounding(&store, &clock).unwrap().is_some());
        assert!(on_foregrounding(&store, &clock).unwrap().is_none());
    }

    /// A slot that can be read but never emptied.
    struct StickyStore(MemoryCheckpointStore);

    impl CheckpointStore for StickyStore {
        fn save(&self, checkpoint: &SuspendedCheckpoint) -> Result<()> {
            self.0.save(checkpoint)
        }

        fn load(&self) -> Result<Option<SuspendedCheckpoint>> {
            self.0.load()
        }

        fn clear(&self) -> Result<()> {
            Err(DatabaseError::Locked.into())
        }
    }

    #[test]
    fn failed_clear_still_recovers() {
        let store = StickyStore(MemoryCheckpointStore::new());
        let clock = ManualClock::new(1_700_000_000_000);
        on_backgrounding(&snapshot(true, 50), &store, &clock).unwrap();

        clock.advance_secs(15);
        let recovered = on_foregrounding(&store, &clock).unwrap().unwrap();
        assert_eq!(recovered.time_left_secs, 35);
        assert!(recovered.running);
    }

    #[test]
    fn remaining_rounds_half_up() {
        assert_eq!(remaining_secs(10_500, 0), 11);
        assert_eq!(remaining_secs(10_499, 0), 10);
        assert_eq!(remaining_secs(0, 5_000), 0);
    }
}
