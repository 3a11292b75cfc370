use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Weight of the history term in the FPS moving average.
const FPS_HISTORY_WEIGHT: f32 = 0.9;
/// Weight of the newest sample in the FPS moving average.
const FPS_SAMPLE_WEIGHT: f32 = 0.1;

/// Lifecycle phases of the realtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Nothing attached yet
    Idle,
    /// Source attached, waiting for the next tick
    Armed,
    /// An inference cycle is executing
    Running,
    /// Explicitly stopped; ticks and in-flight completions are no-ops
    Stopped,
}

/// Mutable single-owner state of the realtime loop: the busy guard, the
/// throughput average and the completion timestamps. Only the loop
/// itself mutates it.
pub struct LoopState {
    busy: AtomicBool,
    last_completed: Mutex<Option<Instant>>,
    fps: Mutex<Option<f32>>,
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
            last_completed: Mutex::new(None),
            fps: Mutex::new(None),
        }
    }

    /// Claims the single inference slot.
    ///
    /// Returns `None` while a previous cycle still holds it — this is
    /// the backpressure mechanism that guarantees at most one inference
    /// in flight regardless of timer drift. The returned guard releases
    /// the slot on drop, so it clears on every exit path.
    pub fn try_begin(&self) -> Option<CycleGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(CycleGuard { state: self })
    }

    /// Whether a cycle currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Folds a completed inference into the FPS estimate and returns the
    /// updated value.
    ///
    /// The estimate is an exponential moving average of the
    /// instantaneous rate between consecutive completed inferences; the
    /// first completion only seeds the timestamp, so an unseeded value
    /// is never published.
    pub fn record_completion(&self, now: Instant) -> Option<f32> {
        let Ok(mut last) = self.last_completed.lock() else {
            return None;
        };

        let updated = match *last {
            Some(previous) => {
                let dt = now.duration_since(previous).as_secs_f32();
                if dt > 0.0 {
                    let instantaneous = 1.0 / dt;
                    let Ok(mut fps) = self.fps.lock() else {
                        return None;
                    };
                    let blended = match *fps {
                        Some(ema) => ema * FPS_HISTORY_WEIGHT + instantaneous * FPS_SAMPLE_WEIGHT,
                        None => instantaneous,
                    };
                    *fps = Some(blended);
                    Some(blended)
                } else {
                    None
                }
            }
            None => None,
        };

        *last = Some(now);
        updated
    }

    /// The current FPS estimate, if one has been seeded.
    pub fn fps(&self) -> Option<f32> {
        self.fps.lock().ok().and_then(|fps| *fps)
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII holder of the busy slot.
pub struct CycleGuard<'a> {
    state: &'a LoopState,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.state.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn busy_slot_is_exclusive() {
        let state = LoopState::new();
        let guard = state.try_begin().expect("slot should be free");
        assert!(state.is_busy());
        assert!(state.try_begin().is_none());
        drop(guard);
        assert!(!state.is_busy());
        assert!(state.try_begin().is_some());
    }

    #[test]
    fn first_completion_publishes_nothing() {
        let state = LoopState::new();
        assert_eq!(state.record_completion(Instant::now()), None);
        assert_eq!(state.fps(), None);
    }

    #[test]
    fn second_completion_seeds_the_average() {
        let state = LoopState::new();
        let start = Instant::now();
        state.record_completion(start);
        let fps = state
            .record_completion(start + Duration::from_millis(500))
            .expect("second completion should publish");
        assert!((fps - 2.0).abs() < 1e-3);
    }

    #[test]
    fn average_favors_history() {
        let state = LoopState::new();
        let start = Instant::now();
        state.record_completion(start);
        // Seed at 2 fps, then observe a 10 fps sample
        state.record_completion(start + Duration::from_millis(500));
        let fps = state
            .record_completion(start + Duration::from_millis(600))
            .expect("third completion should publish");
        let expected = 2.0 * 0.9 + 10.0 * 0.1;
        assert!((fps - expected).abs() < 0.05, "{} !≈ {}", fps, expected);
    }
}
