//! State shared between the control, image and audio tasks.
//!
//! The intersection flag is the only value written from two tasks; it is a
//! single atomic. Line observations and distance samples each have one
//! writer and are read as "latest value", no staleness bound.

use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use serde::{Deserialize, Serialize};

use crate::utils::{
    config::{SensorConfig, IMAGE_BUFFER_SIZE},
    vision::line::LineObservation,
};

/// Whether the robot is tracking the line or waiting at an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionState {
    Following,
    Stopped,
}

/// Atomically observed intersection state.
pub struct IntersectionFlag(AtomicBool);

impl IntersectionFlag {
    pub const fn new(initial: IntersectionState) -> Self {
        Self(AtomicBool::new(matches!(initial, IntersectionState::Stopped)))
    }

    pub fn get(&self) -> IntersectionState {
        if self.0.load(Ordering::Acquire) {
            IntersectionState::Stopped
        } else {
            IntersectionState::Following
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.get() == IntersectionState::Stopped
    }

    /// Raised by the control loop once a stop has settled.
    pub fn set_stopped(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Cleared by the maneuver executor when a maneuver completes.
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Where a raw distance reading fell relative to the trusted sensor range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheck {
    Within,
    BelowRange(u16),
    AboveRange(u16),
}

/// Convert a raw time-of-flight reading to centimetres.
///
/// Readings outside `range` saturate to its nearest bound: nothing in sight
/// reads as far, a target closer than the sensor resolves reads as close.
pub fn distance_cm_from_mm(
    mm: u16,
    range: &SensorConfig,
) -> (f32, RangeCheck) {
    let (mm, check) = if mm < range.min_mm {
        (range.min_mm, RangeCheck::BelowRange(mm))
    } else if mm > range.max_mm {
        (range.max_mm, RangeCheck::AboveRange(mm))
    } else {
        (mm, RangeCheck::Within)
    };
    (mm as f32 / 10.0, check)
}

pub struct SharedState {
    pub intersection: IntersectionFlag,
    line: Mutex<CriticalSectionRawMutex, Cell<LineObservation>>,
    distance_cm: Mutex<CriticalSectionRawMutex, Cell<f32>>,
}

impl SharedState {
    /// The robot boots stopped, centred, with no distance reading yet.
    pub const fn new() -> Self {
        Self {
            intersection: IntersectionFlag::new(IntersectionState::Stopped),
            line: Mutex::new(Cell::new(LineObservation {
                width: 0,
                position: (IMAGE_BUFFER_SIZE / 2) as u16,
            })),
            distance_cm: Mutex::new(Cell::new(0.0)),
        }
    }

    pub fn line(&self) -> LineObservation {
        self.line.lock(|c| c.get())
    }

    pub fn publish_line(
        &self,
        observation: LineObservation,
    ) {
        self.line.lock(|c| c.set(observation));
    }

    pub fn distance_cm(&self) -> f32 {
        self.distance_cm.lock(|c| c.get())
    }

    /// Store a reading, saturated into `range`.
    pub fn publish_distance_mm(
        &self,
        mm: u16,
        range: &SensorConfig,
    ) -> (f32, RangeCheck) {
        let (cm, check) = distance_cm_from_mm(mm, range);
        self.distance_cm.lock(|c| c.set(cm));
        (cm, check)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// State used by the firmware tasks.
pub static SHARED: SharedState = SharedState::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_starts_stopped_and_toggles() {
        let flag = IntersectionFlag::new(IntersectionState::Stopped);
        assert!(flag.is_stopped());
        flag.clear();
        assert_eq!(flag.get(), IntersectionState::Following);
        flag.set_stopped();
        assert_eq!(flag.get(), IntersectionState::Stopped);
    }

    #[test]
    fn out_of_range_distance_saturates() {
        let state = SharedState::new();
        let range = SensorConfig::default();
        assert_eq!(state.publish_distance_mm(120, &range), (12.0, RangeCheck::Within));

        assert_eq!(
            state.publish_distance_mm(8190, &range),
            (200.0, RangeCheck::AboveRange(8190))
        );
        assert_eq!(state.distance_cm(), 200.0);

        assert_eq!(state.publish_distance_mm(0, &range), (1.0, RangeCheck::BelowRange(0)));
        assert_eq!(state.distance_cm(), 1.0);
    }

    #[test]
    fn line_is_last_value_wins() {
        let state = SharedState::new();
        assert_eq!(state.line().position, 320);
        state.publish_line(LineObservation { width: 90, position: 100 });
        state.publish_line(LineObservation { width: 95, position: 110 });
        assert_eq!(state.line(), LineObservation { width: 95, position: 110 });
    }
}
