//! Debounced intersection detection.
//!
//! An intersection shows up as a run of line widths inside
//! `(min_width, max_width)`. The detector counts one sample per control
//! tick; once the run is longer than `min_stop_nb` and the robot is not in
//! the middle of a turn it asks the control loop to stop.

use crate::utils::config::IntersectionConfig;

/// Result of feeding one width sample to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// Width is outside the intersection window.
    Clear,
    /// Inside the window for this many consecutive samples.
    Candidate(u16),
    /// Debounce satisfied: stop here.
    Stop,
}

/// Debounces the wide line seen at a crossing.
pub struct IntersectionDetector {
    config: IntersectionConfig,
    run: u16,
}

impl IntersectionDetector {
    /// Create a new detector with an empty run.
    pub fn new(config: IntersectionConfig) -> Self {
        Self { config, run: 0 }
    }

    /// Consecutive in-window samples seen so far.
    pub fn run_length(&self) -> u16 {
        self.run
    }

    /// Forget the current run, e.g. while the robot waits at a stop.
    pub fn reset(&mut self) {
        self.run = 0;
    }

    /// Feed the width of one frame and the steering correction of the last tick.
    ///
    /// A run only ends in `Stop` while the robot is not turning hard.
    pub fn observe(
        &mut self,
        width: u16,
        correction: i32,
    ) -> Detection {
        let IntersectionConfig {
            min_width,
            max_width,
            min_stop_nb,
            turn_guard,
            ..
        } = self.config;

        if width <= min_width || width >= max_width {
            self.run = 0;
            return Detection::Clear;
        }

        self.run = self.run.saturating_add(1);
        if self.run > min_stop_nb && correction.abs() < turn_guard {
            tracing::debug!(run = self.run, width, "intersection confirmed");
            self.run = 0;
            Detection::Stop
        } else {
            Detection::Candidate(self.run)
        }
    }
}
