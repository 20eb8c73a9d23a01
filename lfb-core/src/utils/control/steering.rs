//! Steering correction and differential wheel mixing.

use serde::{Deserialize, Serialize};

use crate::utils::config::SteeringConfig;

/// One-step moving-average memory of the line position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringHistory {
    pub previous_position: u16,
}

impl SteeringHistory {
    pub fn new(center: u16) -> Self {
        Self {
            previous_position: center,
        }
    }
}

/// Signed speed command for the two drive motors (steps/s).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelSpeeds {
    pub left: i16,
    pub right: i16,
}

impl WheelSpeeds {
    pub const STOP: WheelSpeeds = WheelSpeeds { left: 0, right: 0 };

    pub const fn new(
        left: i16,
        right: i16,
    ) -> Self {
        Self { left, right }
    }
}

pub struct SteeringMixer {
    config: SteeringConfig,
}

impl SteeringMixer {
    pub fn new(config: SteeringConfig) -> Self {
        Self { config }
    }

    /// Smoothed offset of the line from the scanline centre.
    ///
    /// Offsets under `rotation_threshold` snap to zero. The history is
    /// updated on every call.
    pub fn mix(
        &self,
        current_position: u16,
        history: &mut SteeringHistory,
    ) -> i32 {
        let c = &self.config;
        let smoothed = (current_position as i32 * c.now_coeff
            + history.previous_position as i32 * c.previous_coeff)
            / 100
            - c.center as i32;
        history.previous_position = current_position;

        if smoothed.abs() < c.rotation_threshold {
            0
        } else {
            smoothed
        }
    }

    /// Correction to apply at `speed`; a stationary robot does not steer.
    pub fn steer(
        &self,
        speed: i16,
        current_position: u16,
        history: &mut SteeringHistory,
    ) -> i32 {
        let correction = self.mix(current_position, history);
        if speed == 0 {
            0
        } else {
            correction
        }
    }

    /// Combine forward speed and correction, saturating at the motor limit.
    pub fn wheel_speeds(
        &self,
        speed: i16,
        correction: i32,
    ) -> WheelSpeeds {
        let limit = self.config.speed_limit as i32;
        let turn = self.config.rotation_coeff * correction;
        let sat = |v: i32| v.clamp(-limit, limit) as i16;
        WheelSpeeds {
            left: sat(speed as i32 + turn),
            right: sat(speed as i32 - turn),
        }
    }
}
