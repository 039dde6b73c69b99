/// Fixed-capacity ring of `(t, value)` points for a scrolling plot.
///
/// Once full, each new point overwrites the oldest one and `offset` points at
/// the next slot to overwrite, which is also the oldest point.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollingBuffer {
    capacity: usize,
    offset: usize,
    points: Vec<[f32; 2]>,
}

impl ScrollingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            offset: 0,
            points: Vec::with_capacity(capacity),
        }
    }

    pub fn add_point(&mut self, t: f32, value: f32) {
        if self.points.len() < self.capacity {
            self.points.push([t, value]);
        } else {
            self.points[self.offset] = [t, value];
            self.offset = (self.offset + 1) % self.capacity;
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.offset = 0;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Raw storage order.
    pub fn points(&self) -> &[[f32; 2]] {
        &self.points
    }

    /// Oldest to newest.
    pub fn iter_ordered(&self) -> impl Iterator<Item = [f32; 2]> + '_ {
        let (newer, older) = self.points.split_at(self.offset);
        older.iter().chain(newer.iter()).copied()
    }
}

/// Frame-time plot data with 60 and 120 FPS reference lines.
#[derive(Debug, Clone)]
pub struct PerfPlot {
    pub frames: ScrollingBuffer,
    pub fps60: ScrollingBuffer,
    pub fps120: ScrollingBuffer,
    /// Width of the visible x window in seconds.
    pub history_secs: f32,
    /// Upper bound of the fixed y range in milliseconds.
    pub y_max_ms: f32,
}

impl PerfPlot {
    pub const FPS60_MS: f32 = 1000.0 / 60.0;
    pub const FPS120_MS: f32 = 1000.0 / 120.0;

    pub fn new(capacity: usize, history_secs: f32, y_max_ms: f32) -> Self {
        Self {
            frames: ScrollingBuffer::new(capacity),
            fps60: ScrollingBuffer::new(capacity),
            fps120: ScrollingBuffer::new(capacity),
            history_secs,
            y_max_ms,
        }
    }

    /// Record one frame time at `t` seconds.
    pub fn add_sample(&mut self, t: f32, frame_ms: f32) {
        self.frames.add_point(t, frame_ms);
        self.fps60.add_point(t, Self::FPS60_MS);
        self.fps120.add_point(t, Self::FPS120_MS);
    }

    /// Visible x range ending at `now`.
    pub fn x_range(&self, now: f32) -> (f32, f32) {
        (now - self.history_secs, now)
    }

    pub fn y_range(&self) -> (f32, f32) {
        (0.0, self.y_max_ms)
    }
}

/// Data the overlay needs to draw the performance panel.
#[derive(Debug, Clone, Copy)]
pub struct PerfPanel<'a> {
    pub fps: f64,
    pub plot: &'a PerfPlot,
    /// Seconds since start, the right edge of the plot.
    pub now: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_then_wraps() {
        let mut buf = ScrollingBuffer::new(3);
        for i in 0..5 {
            buf.add_point(i as f32, (i * 10) as f32);
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.offset(), 2);
        assert_eq!(buf.points(), &[[3.0, 30.0], [4.0, 40.0], [2.0, 20.0]]);
        let ordered: Vec<f32> = buf.iter_ordered().map(|p| p[0]).collect();
        assert_eq!(ordered, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn ordered_before_full() {
        let mut buf = ScrollingBuffer::new(2000);
        buf.add_point(0.5, 1.0);
        buf.add_point(0.6, 2.0);
        let ordered: Vec<[f32; 2]> = buf.iter_ordered().collect();
        assert_eq!(ordered, vec![[0.5, 1.0], [0.6, 2.0]]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.offset(), 0);
    }

    #[test]
    fn reference_lines_track_samples() {
        let mut plot = PerfPlot::new(2000, 2.0, 30.0);
        plot.add_sample(1.0, 12.0);
        assert_eq!(plot.fps60.points(), &[[1.0, 1000.0 / 60.0]]);
        assert_eq!(plot.fps120.points(), &[[1.0, 1000.0 / 120.0]]);
        assert_eq!(plot.x_range(10.0), (8.0, 10.0));
        assert_eq!(plot.y_range(), (0.0, 30.0));
    }
}
