//! Sliding window over per-frame detection results.

use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent "person present" observations.
///
/// Once full, each push evicts the oldest observation. `any()` answers whether
/// the retained history holds at least one positive detection.
#[derive(Clone, Debug)]
pub struct DetectionWindow {
    observations: VecDeque<bool>,
    capacity: usize,
    positives: usize,
}

impl DetectionWindow {
    /// Create a window holding the last `capacity` observations.
    ///
    /// A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            observations: VecDeque::with_capacity(capacity),
            capacity,
            positives: 0,
        }
    }

    /// Window sized for `buffer_secs` of history at `effective_fps`.
    pub fn for_duration(effective_fps: f64, buffer_secs: f64) -> Self {
        Self::new(window_capacity(effective_fps, buffer_secs))
    }

    pub fn push(&mut self, observation: bool) {
        while self.observations.len() >= self.capacity {
            if let Some(true) = self.observations.pop_front() {
                self.positives -= 1;
            }
        }
        if observation {
            self.positives += 1;
        }
        self.observations.push_back(observation);
    }

    /// True iff at least one retained observation is positive.
    pub fn any(&self) -> bool {
        self.positives > 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// True once `capacity` observations have been pushed.
    pub fn is_full(&self) -> bool {
        self.observations.len() == self.capacity
    }

    /// Retained observations, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.observations.iter().copied()
    }
}

/// `round(effective_fps * buffer_secs)`, never below one.
pub fn window_capacity(effective_fps: f64, buffer_secs: f64) -> usize {
    let raw = (effective_fps * buffer_secs).round();
    if raw.is_finite() && raw >= 1.0 {
        raw as usize
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_last_n_in_order() {
        let mut window = DetectionWindow::new(3);
        for obs in [true, false, true, true, false] {
            window.push(obs);
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![true, true, false]);
    }

    #[test]
    fn any_tracks_evictions() {
        let mut window = DetectionWindow::new(2);
        window.push(true);
        assert!(window.any());
        window.push(false);
        assert!(window.any());
        window.push(false);
        assert!(!window.any());
    }

    #[test]
    fn single_true_after_all_false_flips_immediately() {
        let mut window = DetectionWindow::new(4);
        for _ in 0..4 {
            window.push(false);
        }
        assert!(!window.any());
        window.push(true);
        assert!(window.any());
    }

    #[test]
    fn warm_up_queries_are_valid() {
        let mut window = DetectionWindow::new(5);
        assert!(!window.any());
        assert!(window.is_empty());
        window.push(false);
        assert!(!window.any());
        assert!(!window.is_full());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = DetectionWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(true);
        window.push(false);
        assert!(!window.any());
    }

    #[test]
    fn capacity_from_rate_and_duration() {
        assert_eq!(window_capacity(15.0, 5.0), 75);
        assert_eq!(window_capacity(14.985, 5.0), 75);
        assert_eq!(window_capacity(0.05, 5.0), 1);
        assert_eq!(window_capacity(f64::NAN, 5.0), 1);
        assert_eq!(DetectionWindow::for_duration(2.5, 1.0).capacity(), 3);
    }
}
