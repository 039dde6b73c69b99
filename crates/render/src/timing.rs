use std::time::{Duration, Instant};

/// Timing of one frame, handed to the scene's update callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub frame_index: u64,
    /// Time since the previous finished frame started.
    pub since_last: Duration,
    /// Time since the driver started.
    pub elapsed: Duration,
    pub fps: f64,
}

/// Frame counter, rolling FPS estimate and frame-time history.
///
/// The history is a fixed-length ring of frame durations in seconds; the
/// duration measured while `frame_count == n` is written at
/// `n % history.len()`. A frame that starts but never finishes (a skipped
/// frame) leaves its interval pending, and the next sample includes it.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    start: Instant,
    last_frame: Instant,
    /// Time since the last finished frame started.
    pending: Duration,
    fps_window: Duration,
    fps_window_start: Instant,
    fps_counter: u64,
    fps: f64,
    frame_count: u64,
    history: Vec<f32>,
}

impl FrameTimer {
    pub fn new(start: Instant, history_len: usize, fps_window: Duration) -> Self {
        Self {
            start,
            last_frame: start,
            pending: Duration::ZERO,
            fps_window,
            fps_window_start: start,
            fps_counter: 0,
            fps: 0.0,
            frame_count: 0,
            history: vec![0.0; history_len.max(1)],
        }
    }

    /// Start a frame at `now`.
    ///
    /// Recomputes the FPS estimate once at least the FPS window has passed
    /// since the last recomputation, and records the frame duration.
    pub fn tick(&mut self, now: Instant) -> FrameTiming {
        self.pending += now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        let since_last = self.pending;

        let window = now.saturating_duration_since(self.fps_window_start);
        if window >= self.fps_window {
            self.fps = self.fps_counter as f64 / window.as_secs_f64();
            self.fps_counter = 0;
            self.fps_window_start = now;
        }

        let slot = self.history_slot();
        self.history[slot] = since_last.as_secs_f32();

        FrameTiming {
            frame_index: self.frame_count,
            since_last,
            elapsed: now.saturating_duration_since(self.start),
            fps: self.fps,
        }
    }

    /// Count the completed frame.
    pub fn finish_frame(&mut self) {
        self.pending = Duration::ZERO;
        self.frame_count += 1;
        self.fps_counter += 1;
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frame durations in seconds, indexed by frame number modulo capacity.
    pub fn history(&self) -> &[f32] {
        &self.history
    }

    /// History index the current frame's duration is written to.
    pub fn history_slot(&self) -> usize {
        (self.frame_count % self.history.len() as u64) as usize
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn history_index_wraps() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::new(t0, 4, Duration::from_secs(1));
        let mut now = t0;
        for frame in 0..10u64 {
            now += ms(frame + 1);
            let timing = timer.tick(now);
            assert_eq!(timing.frame_index, frame);
            assert_eq!(timing.since_last, ms(frame + 1));
            let slot = (frame % 4) as usize;
            assert_eq!(timer.history_slot(), slot);
            assert!((timer.history()[slot] - (frame + 1) as f32 / 1000.0).abs() < 1e-6);
            timer.finish_frame();
        }
        assert_eq!(timer.history().len(), 4);
        assert_eq!(timer.frame_count(), 10);
    }

    #[test]
    fn fps_waits_for_a_full_window() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::new(t0, 1000, Duration::from_secs(1));

        // 50 frames at 10 ms: 0.5 s, no estimate yet
        for i in 1..=50 {
            timer.tick(t0 + ms(10 * i));
            timer.finish_frame();
        }
        assert_eq!(timer.fps(), 0.0);

        for i in 51..=100 {
            timer.tick(t0 + ms(10 * i));
            timer.finish_frame();
        }
        // the tick at 1.0 s saw 99 completed frames
        assert!((timer.fps() - 99.0).abs() < 1e-9);
    }

    #[test]
    fn fps_divides_by_actual_window() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::new(t0, 8, Duration::from_secs(1));
        for _ in 0..30 {
            timer.tick(t0);
            timer.finish_frame();
        }
        timer.tick(t0 + ms(1500));
        assert!((timer.fps() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn skipped_interval_counts_into_next_sample() {
        let t0 = Instant::now();
        let mut timer = FrameTimer::new(t0, 8, Duration::from_secs(1));
        timer.tick(t0 + ms(10));
        timer.finish_frame();

        // started but never finished
        timer.tick(t0 + ms(25));
        let timing = timer.tick(t0 + ms(40));
        assert_eq!(timing.frame_index, 1);
        assert_eq!(timing.since_last, ms(30));
        assert!((timer.history()[1] - 0.030).abs() < 1e-6);
        timer.finish_frame();

        let timing = timer.tick(t0 + ms(50));
        assert_eq!(timing.since_last, ms(10));
    }

    #[test]
    fn history_has_fixed_capacity() {
        let timer = FrameTimer::new(Instant::now(), 1000, Duration::from_secs(1));
        assert_eq!(timer.history().len(), 1000);
        assert!(timer.history().iter().all(|d| *d == 0.0));
    }
}
