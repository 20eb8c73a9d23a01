//! Configuration records for the Line-Follower Bot.
//!
//! Every tunable of the perception and control pipeline lives here as a
//! named field. `Default` yields the values the robot was tuned with; the
//! host binary can override any subset through JSON since every record is
//! `#[serde(default)]`.

use serde::{Deserialize, Serialize};

use crate::utils::vision::line::Rgb565Channel;

/// Number of pixels in one processed camera scanline.
pub const IMAGE_BUFFER_SIZE: usize = 640;
/// Motor speed limit of the stepper drive (steps/s).
pub const MOTOR_SPEED_LIMIT: i16 = 1100;
/// Number of complex points fed to the spectral transform.
pub const FFT_SIZE: usize = 1024;

/// Errors reported by [`RobotConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `now_coeff + previous_coeff` must equal 100.
    SmoothingWeights,
    /// The integral gain must be non-zero.
    ZeroIntegralGain,
    /// The edge lookahead does not fit in the scanline.
    SlopeTooLarge,
    /// `min_width` must be below `max_width`.
    WidthWindow,
    /// `min_freq` must be below `max_freq`.
    FrequencyWindow,
    /// Two decoder bands share at least one bin.
    OverlappingBands,
    /// `min_mm` must be below `max_mm`.
    SensorRange,
}

/// Scanline geometry used by the line extractor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Edge lookahead, in pixels.
    pub slope: usize,
    /// Narrowest segment accepted as the line.
    pub min_line_width: u16,
    /// Experimental pixel-width to centimetre factor.
    pub px_to_cm: f32,
    /// Farthest distance a width may imply (cm).
    pub max_distance_cm: f32,
    /// Distance used to seed the fallback width before anything is seen (cm).
    pub initial_distance_cm: f32,
    /// Colour channel pulled out of the RGB565 frame.
    pub channel: Rgb565Channel,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            slope: 5,
            min_line_width: 40,
            px_to_cm: 1570.0,
            max_distance_cm: 25.0,
            initial_distance_cm: 12.0,
            channel: Rgb565Channel::Green,
        }
    }
}

/// Gains and limits of the PI speed regulator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfig {
    pub kp: f32,
    pub ki: f32,
    /// Dead band around the goal (cm).
    pub error_threshold: f32,
    /// Anti-windup bound on the accumulated error.
    pub max_sum_error: f32,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        let ki = 3.5;
        Self {
            kp: 500.0,
            ki,
            error_threshold: 0.1,
            max_sum_error: MOTOR_SPEED_LIMIT as f32 / ki,
        }
    }
}

/// Distance bands that pick between cruising and regulating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachConfig {
    pub goal_distance_cm: f32,
    pub min_distance_cm: f32,
    /// Hysteresis gap around both bands (cm).
    pub dist_gap_cm: f32,
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            goal_distance_cm: 12.0,
            min_distance_cm: 6.0,
            dist_gap_cm: 1.0,
        }
    }
}

/// Steering smoothing and differential mixing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringConfig {
    pub now_coeff: i32,
    pub previous_coeff: i32,
    /// Corrections smaller than this (px) are dropped.
    pub rotation_threshold: i32,
    pub rotation_coeff: i32,
    /// Scanline centre (px).
    pub center: u16,
    /// Wheel speeds saturate at +/- this value.
    pub speed_limit: i16,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            now_coeff: 70,
            previous_coeff: 30,
            rotation_threshold: 10,
            rotation_coeff: 2,
            center: (IMAGE_BUFFER_SIZE / 2) as u16,
            speed_limit: MOTOR_SPEED_LIMIT,
        }
    }
}

/// Debounce window of the intersection detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionConfig {
    /// Exclusive lower bound of an intersection width (px).
    pub min_width: u16,
    /// Exclusive upper bound of an intersection width (px).
    pub max_width: u16,
    /// The run must be longer than this many samples.
    pub min_stop_nb: u16,
    /// Corrections at or above this magnitude mean we are turning.
    pub turn_guard: i32,
    /// How long the robot sits still before the stop is published (ms).
    pub settle_ms: u64,
}

impl Default for IntersectionConfig {
    fn default() -> Self {
        Self {
            min_width: 300,
            max_width: 450,
            min_stop_nb: 10,
            turn_guard: 2 * SteeringConfig::default().rotation_threshold,
            settle_ms: 1000,
        }
    }
}

/// Spectral bands of the tone remote. Centres are bin indices.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub min_value_threshold: f32,
    pub min_freq: usize,
    pub max_freq: usize,
    pub tolerance: usize,
    /// 2 kHz
    pub freq_forward: usize,
    /// 3 kHz
    pub freq_left: usize,
    /// 4 kHz
    pub freq_right: usize,
    /// 5 kHz
    pub freq_backward: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_value_threshold: 10_000.0,
            min_freq: 100,
            max_freq: 350,
            tolerance: 10,
            freq_forward: 130,
            freq_left: 190,
            freq_right: 262,
            freq_backward: 327,
        }
    }
}

/// Open-loop maneuver calibration.
///
/// The iteration counts are the hardware-tuned busy-loop lengths; multiplied
/// by `iteration_ns` they give the duration of each primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ManeuverConfig {
    pub control_speed: i16,
    pub rotate_90_iterations: u32,
    pub skip_stop_iterations: u32,
    pub iteration_ns: u32,
    pub blink_nb: u8,
    pub blink_on_ms: u32,
    pub blink_off_ms: u32,
}

impl Default for ManeuverConfig {
    fn default() -> Self {
        Self {
            control_speed: 300,
            rotate_90_iterations: 75_000,
            skip_stop_iterations: 40_000,
            iteration_ns: 14_360,
            blink_nb: 3,
            blink_on_ms: 300,
            blink_off_ms: 300,
        }
    }
}

impl ManeuverConfig {
    /// Duration of one 90 degree rotation, in microseconds.
    pub fn rotate_90_us(&self) -> u32 {
        iterations_to_us(self.rotate_90_iterations, self.iteration_ns)
    }

    /// Duration of one creep pulse past the stop line, in microseconds.
    pub fn skip_stop_us(&self) -> u32 {
        iterations_to_us(self.skip_stop_iterations, self.iteration_ns)
    }

    /// Time spent blinking the turn signal before moving, in milliseconds.
    pub fn signal_ms(&self) -> u32 {
        self.blink_nb as u32 * (self.blink_on_ms + self.blink_off_ms)
    }
}

fn iterations_to_us(
    iterations: u32,
    iteration_ns: u32,
) -> u32 {
    let us = iterations as u64 * iteration_ns as u64 / 1_000;
    us.min(u32::MAX as u64) as u32
}

/// Cruise speeds selectable with the 16-position rotary selector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CruiseConfig {
    pub speeds: [i16; 8],
}

impl Default for CruiseConfig {
    fn default() -> Self {
        Self {
            speeds: [200, 250, 300, 350, 375, 400, 425, 450],
        }
    }
}

impl CruiseConfig {
    /// Two adjacent selector positions share one speed.
    pub fn speed_for(
        &self,
        selector: u8,
    ) -> i16 {
        match selector {
            0..=15 => self.speeds[(selector / 2) as usize],
            _ => self.speeds[0],
        }
    }
}

/// Accepted range of raw time-of-flight readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub min_mm: u16,
    pub max_mm: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min_mm: 10,
            max_mm: 2000,
        }
    }
}

/// Complete robot configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub line: LineConfig,
    pub regulator: RegulatorConfig,
    pub approach: ApproachConfig,
    pub steering: SteeringConfig,
    pub intersection: IntersectionConfig,
    pub decoder: DecoderConfig,
    pub maneuver: ManeuverConfig,
    pub cruise: CruiseConfig,
    pub sensor: SensorConfig,
}

impl RobotConfig {
    /// Check the cross-field constraints the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steering.now_coeff + self.steering.previous_coeff != 100 {
            return Err(ConfigError::SmoothingWeights);
        }
        if self.regulator.ki == 0.0 {
            return Err(ConfigError::ZeroIntegralGain);
        }
        if self.line.slope == 0 || self.line.slope >= IMAGE_BUFFER_SIZE {
            return Err(ConfigError::SlopeTooLarge);
        }
        if self.intersection.min_width >= self.intersection.max_width {
            return Err(ConfigError::WidthWindow);
        }
        if self.decoder.min_freq >= self.decoder.max_freq {
            return Err(ConfigError::FrequencyWindow);
        }
        if self.sensor.min_mm >= self.sensor.max_mm {
            return Err(ConfigError::SensorRange);
        }

        let d = &self.decoder;
        let mut centers = [d.freq_forward, d.freq_left, d.freq_right, d.freq_backward];
        centers.sort_unstable();
        if centers.windows(2).any(|w| w[1] - w[0] <= 2 * d.tolerance) {
            return Err(ConfigError::OverlappingBands);
        }
        Ok(())
    }
}
