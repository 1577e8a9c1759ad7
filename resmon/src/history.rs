//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if dq.len() == cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Keeps a history deque per core with a fixed capacity
pub struct PerCoreHistory {
    pub deques: Vec<VecDeque<u16>>,
    cap: usize,
}

impl PerCoreHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            deques: Vec::new(),
            cap,
        }
    }

    // Ensure we have one deque per core; resize on CPU topology changes
    pub fn ensure_cores(&mut self, n: usize) {
        if self.deques.len() == n {
            return;
        }
        self.deques = (0..n).map(|_| VecDeque::with_capacity(self.cap)).collect();
    }

    // Push a new sample set for all cores (values 0..=100)
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.ensure_cores(samples.len());
        for (i, v) in samples.iter().enumerate() {
            let val = v.clamp(0.0, 100.0).round() as u16;
            push_capped(&mut self.deques[i], val, self.cap);
        }
    }
}

/// Min/avg/max over the last `cap` readings. Absent ticks are not counted.
pub struct RollingStats {
    window: VecDeque<f32>,
    cap: usize,
}

impl RollingStats {
    pub fn new(cap: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    pub fn push(&mut self, v: f32) {
        push_capped(&mut self.window, v, self.cap);
    }

    pub fn min(&self) -> Option<f32> {
        self.window.iter().copied().reduce(f32::min)
    }

    pub fn max(&self) -> Option<f32> {
        self.window.iter().copied().reduce(f32::max)
    }

    pub fn avg(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f32>() / self.window.len() as f32)
    }
}
