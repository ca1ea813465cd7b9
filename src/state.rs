use crate::common::AnnotatedFrame;
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Liveness numbers derived from the ingestion loop, read by the
/// control channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Metrics {
    pub fps: u32,
    pub detections: usize,
}

/// Latest annotated frame plus derived metrics. The frame sits behind
/// an atomic Arc swap so readers pay one pointer load and writers one
/// store; metrics are copied in and out under a short-held mutex.
/// No history: `publish` overwrites, older frames drop immediately.
pub struct FrameStateStore {
    latest: ArcSwapOption<AnnotatedFrame>,
    metrics: Mutex<Metrics>,
}

impl FrameStateStore {
    pub fn new() -> Self {
        Self {
            latest: ArcSwapOption::const_empty(),
            metrics: Mutex::new(Metrics::default()),
        }
    }

    pub fn publish(&self, frame: Arc<AnnotatedFrame>) {
        self.metrics.lock().expect("metrics lock poisoned").detections = frame.detections;
        self.latest.store(Some(frame));
    }

    pub fn record_fps(&self, fps: u32) {
        self.metrics.lock().expect("metrics lock poisoned").fps = fps;
    }

    pub fn current_frame(&self) -> Option<Arc<AnnotatedFrame>> {
        self.latest.load_full()
    }

    pub fn current_metrics(&self) -> Metrics {
        *self.metrics.lock().expect("metrics lock poisoned")
    }

    /// Called when a camera session starts; a fresh stream begins with
    /// zeroed liveness numbers.
    pub fn reset_metrics(&self) {
        *self.metrics.lock().expect("metrics lock poisoned") = Metrics::default();
    }
}

impl Default for FrameStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// One-second bucket throughput estimator. Rollover happens lazily on
/// the first tick after the window elapses, so the caller supplies the
/// monotonic clock and tests stay deterministic.
pub struct FpsCounter {
    window_start: Instant,
    frames_in_window: u32,
    reported: u32,
}

const WINDOW: Duration = Duration::from_secs(1);

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames_in_window: 0,
            reported: 0,
        }
    }

    /// Records one processed frame and returns the currently reported
    /// FPS (the previous completed window's count).
    pub fn tick(&mut self, now: Instant) -> u32 {
        if now.duration_since(self.window_start) >= WINDOW {
            self.reported = self.frames_in_window;
            self.frames_in_window = 0;
            self.window_start = now;
        }
        self.frames_in_window += 1;
        self.reported
    }

    pub fn current(&self) -> u32 {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_overwrites_previous_frame() {
        let store = FrameStateStore::new();
        assert!(store.current_frame().is_none());

        store.publish(AnnotatedFrame::new(vec![1], 3));
        store.publish(AnnotatedFrame::new(vec![2], 7));

        let frame = store.current_frame().expect("no frame");
        assert_eq!(frame.jpeg, vec![2]);
        assert_eq!(store.current_metrics().detections, 7);
    }

    #[test]
    fn reset_clears_metrics_but_not_frame() {
        let store = FrameStateStore::new();
        store.publish(AnnotatedFrame::new(vec![1], 3));
        store.record_fps(24);
        store.reset_metrics();
        assert_eq!(store.current_metrics(), Metrics::default());
        assert!(store.current_frame().is_some());
    }

    #[test]
    fn fps_reports_window_count_after_rollover() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 0..5 {
            let reported = counter.tick(start + Duration::from_millis(i * 100));
            assert_eq!(reported, 0);
        }

        // first tick after the window closes reports the 5 frames
        let reported = counter.tick(start + Duration::from_millis(1100));
        assert_eq!(reported, 5);
        assert_eq!(counter.current(), 5);
    }

    #[test]
    fn fps_resets_to_zero_for_an_idle_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        counter.tick(start);

        let reported = counter.tick(start + Duration::from_secs(1));
        assert_eq!(reported, 1);

        // nothing arrived for a whole window, so the next rollover is 1
        // frame over the elapsed gap, then drops to that window's count
        let reported = counter.tick(start + Duration::from_secs(3));
        assert_eq!(reported, 1);
        let reported = counter.tick(start + Duration::from_secs(4));
        assert_eq!(reported, 1);
        let reported = counter.tick(start + Duration::from_secs(5));
        assert_eq!(reported, 1);
    }

    #[test]
    fn fps_counts_only_frames_in_the_closed_window() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 0..3 {
            counter.tick(start + Duration::from_millis(i * 10));
        }
        counter.tick(start + Duration::from_millis(1001));
        for i in 0..9 {
            counter.tick(start + Duration::from_millis(1002 + i));
        }
        // second window closed with 10 frames (the rollover tick plus 9)
        assert_eq!(counter.tick(start + Duration::from_millis(2200)), 10);
    }
}
