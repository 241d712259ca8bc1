use crate::config::ProgressConfig;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub value: f64,
    pub loading: bool,
    pub estimated_duration: Duration,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            value: 0.0,
            loading: false,
            estimated_duration: Duration::ZERO,
        }
    }
}

/// Handle to the progress state of one orchestrator instance.
#[derive(Debug)]
pub struct ProgressTracker {
    config: ProgressConfig,
    state: Arc<Mutex<ProgressSnapshot>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ProgressTracker {
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ProgressSnapshot::default())),
            timer: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock()
    }

    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading
    }

    pub fn estimated_duration(&self) -> Duration {
        self.state.lock().estimated_duration
    }

    pub fn is_ticking(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    /// Expected generation time for a report over `categories` categories
    /// and `records` records.
    pub fn estimate(&self, full_report: bool, categories: usize, records: usize) -> Duration {
        let base = if full_report {
            self.config.full_report_base_ms
        } else {
            self.config.single_category_base_ms
        };
        let ms = base
            + self.config.per_category_ms * categories as u64
            + self.config.per_record_ms * records as u64;
        Duration::from_millis(ms)
    }

    /// Resets the value, raises the loading flag and starts the timer.
    pub fn start(&self, estimated: Duration) {
        self.stop_timer();
        {
            let mut state = self.state.lock();
            state.value = 0.0;
            state.loading = true;
            state.estimated_duration = estimated;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, progress will jump to completion");
                return;
            }
        };

        let tick = Duration::from_millis(self.config.tick_ms.max(1));
        let cap = self.config.cap_percent;
        let total_ms = estimated.as_millis().max(1) as f64;
        let step = cap * tick.as_millis() as f64 / total_ms;
        let state = Arc::clone(&self.state);

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut guard = state.lock();
                guard.value = (guard.value + step).min(cap);
                if guard.value >= cap {
                    break;
                }
            }
        });
        *self.timer.lock() = Some(handle);
        debug!("Progress timer started, estimated {:?}", estimated);
    }

    pub fn complete(&self) {
        self.stop_timer();
        let mut state = self.state.lock();
        state.value = 100.0;
        state.loading = false;
    }

    /// Clears the timer and every flag.
    pub fn fail(&self) {
        self.stop_timer();
        *self.state.lock() = ProgressSnapshot::default();
    }

    /// Host teardown. Leaves the value where it is.
    pub fn shutdown(&self) {
        self.stop_timer();
        self.state.lock().loading = false;
    }

    #[cfg(test)]
    pub(crate) fn shared_state(&self) -> Arc<Mutex<ProgressSnapshot>> {
        Arc::clone(&self.state)
    }

    fn stop_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.stop_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(ProgressConfig {
            tick_ms: 100,
            ..ProgressConfig::default()
        })
    }

    #[test]
    fn test_estimate_grows_with_work() {
        let t = tracker();
        let single = t.estimate(false, 1, 10);
        let full = t.estimate(true, 7, 10);
        assert_eq!(single, Duration::from_millis(4_000 + 1_500 + 100));
        assert!(full > single);
        assert!(t.estimate(true, 7, 500) > full);
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_climbs_to_cap_then_completes() {
        let t = tracker();
        t.start(Duration::from_secs(1));
        assert!(t.is_loading());
        assert_eq!(t.estimated_duration(), Duration::from_secs(1));

        tokio::time::sleep(Duration::from_millis(450)).await;
        let midway = t.value();
        assert!(midway > 0.0 && midway < 95.0, "value was {}", midway);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(t.value(), 95.0);

        t.complete();
        assert_eq!(t.value(), 100.0);
        assert!(!t.is_loading());
        assert!(!t.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_is_monotonic() {
        let t = tracker();
        t.start(Duration::from_secs(2));
        let mut last = 0.0;
        for _ in 0..30 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let now = t.value();
            assert!(now >= last);
            last = now;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_resets_everything() {
        let t = tracker();
        t.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(300)).await;
        t.fail();

        assert_eq!(t.snapshot(), ProgressSnapshot::default());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(t.value(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timer() {
        let t = tracker();
        t.start(Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(300)).await;
        t.shutdown();
        let frozen = t.value();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(t.value(), frozen);
        assert!(!t.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_timer() {
        let t = tracker();
        t.start(Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(500)).await;
        let state = t.shared_state();
        assert_eq!(Arc::strong_count(&state), 3);

        drop(t);
        let frozen = state.lock().value;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(state.lock().value, frozen);
        assert_eq!(Arc::strong_count(&state), 1);
    }

    #[test]
    fn test_start_without_runtime_does_not_panic() {
        let t = tracker();
        t.start(Duration::from_secs(1));
        assert!(t.is_loading());
        assert!(!t.is_ticking());
        t.complete();
        assert_eq!(t.value(), 100.0);
    }
}
