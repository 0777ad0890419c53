//! Bounded moving-average filter for ECG samples.
//!
//! Fixed-size ring buffer with a running sum, no heap.  The window is
//! chosen at construction (1..=[`MAX_WINDOW`]); until the ring fills the
//! average is taken over the samples seen so far.

pub const MAX_WINDOW: usize = 8;

pub struct MovingAverage {
    ring: [i32; MAX_WINDOW],
    window: usize,
    head: usize,
    count: usize,
    sum: i64,
}

impl MovingAverage {
    pub fn new(window: usize) -> Self {
        Self {
            ring: [0; MAX_WINDOW],
            window: window.clamp(1, MAX_WINDOW),
            head: 0,
            count: 0,
            sum: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Push one sample and return the current average.
    pub fn push(&mut self, sample: i32) -> i32 {
        if self.count == self.window {
            self.sum -= i64::from(self.ring[self.head]);
        } else {
            self.count += 1;
        }
        self.ring[self.head] = sample;
        self.sum += i64::from(sample);
        self.head = (self.head + 1) % self.window;

        (self.sum / self.count as i64) as i32
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.ring = [0; MAX_WINDOW];
        self.head = 0;
        self.count = 0;
        self.sum = 0;
    }
}
