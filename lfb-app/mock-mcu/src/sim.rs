//! Simulated track, drive, camera, distance sensor and microphones.

use core::cell::RefCell;
use std::{convert::Infallible, f32::consts::PI};

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};
use lfb_core::utils::{
    audio::spectrum::{MIC_BACK, MIC_COUNT, MIC_FRONT, MIC_LEFT, MIC_RIGHT},
    config::{FFT_SIZE, IMAGE_BUFFER_SIZE},
    control::WheelSpeeds,
    controllers::{DistanceSensor, MotorDriver},
    vision::RawFrame,
};
use serde::Serialize;
use smart_leds_trait::{SmartLedsWrite, RGB8};

/// Wheel travel per motor step (13 cm per 1000 steps).
const STEP_CM: f32 = 0.013;
/// Image drift per step of wheel speed difference.
const TURN_PX_PER_STEP: f32 = 0.25;
/// Track curvature, as image drift per travelled centimetre.
const CURVE_PX_PER_CM: f32 = 1.5;
/// Distance between crossings and the length of one.
const CROSSING_EVERY_CM: f32 = 60.0;
const CROSSING_LEN_CM: f32 = 3.0;
/// Dark span of the tape and of a crossing, in pixels.
const TAPE_PX: usize = 80;
const CROSSING_PX: usize = 375;

const FLOOR: (u8, u8) = (0x07, 0xC0);
const INK: (u8, u8) = (0x00, 0x20);

/// Out-of-range code the time-of-flight sensor reports with nothing in sight.
const OUT_OF_RANGE_MM: u16 = 8190;

pub const SAMPLE_RATE_HZ: f32 = 16_000.0;
pub const SAMPLES_PER_MIC: usize = 160;
pub const BLOCK_LEN: usize = MIC_COUNT * SAMPLES_PER_MIC;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct World {
    pub travelled_cm: f32,
    pub line_offset_px: f32,
    pub wheels: WheelSpeeds,
    pub obstacle_cm: Option<f32>,
    pub rotated_deg: f32,
}

impl World {
    pub const fn new() -> Self {
        Self {
            travelled_cm: 5.0,
            line_offset_px: 0.0,
            wheels: WheelSpeeds::STOP,
            obstacle_cm: None,
            rotated_deg: 0.0,
        }
    }

    /// Advance the robot by `dt_s` seconds at the current wheel speeds.
    pub fn step(
        &mut self,
        dt_s: f32,
    ) {
        let l = self.wheels.left as f32;
        let r = self.wheels.right as f32;
        let forward_cm = (l + r) / 2.0 * dt_s * STEP_CM;

        if forward_cm > 0.0 {
            self.travelled_cm += forward_cm;
            self.line_offset_px += CURVE_PX_PER_CM * forward_cm - (l - r) * dt_s * TURN_PX_PER_STEP;
            self.line_offset_px = self.line_offset_px.clamp(-310.0, 310.0);
        } else if l != r {
            // spinning in place at a crossing: the new branch is centred
            let wheelbase_cm = 5.35;
            let arc_cm = (r - l) / 2.0 * dt_s * STEP_CM;
            self.rotated_deg += arc_cm / (PI * wheelbase_cm) * 360.0;
            self.line_offset_px = 0.0;
        }
    }

    pub fn at_crossing(&self) -> bool {
        self.travelled_cm % CROSSING_EVERY_CM < CROSSING_LEN_CM
    }

    pub fn frame(&self) -> RawFrame {
        let dark = if self.at_crossing() { CROSSING_PX } else { TAPE_PX };
        let center = IMAGE_BUFFER_SIZE as f32 / 2.0 + self.line_offset_px;
        let from = (center - dark as f32 / 2.0).max(0.0) as usize;
        let to = ((center + dark as f32 / 2.0) as usize).min(IMAGE_BUFFER_SIZE);

        let mut raw = [0u8; 2 * IMAGE_BUFFER_SIZE];
        for (i, px) in raw.chunks_exact_mut(2).enumerate() {
            let (hi, lo) = if (from..to).contains(&i) { INK } else { FLOOR };
            px[0] = hi;
            px[1] = lo;
        }
        raw
    }

    pub fn distance_mm(&self) -> u16 {
        match self.obstacle_cm {
            Some(at) => ((at - self.travelled_cm).max(0.0) * 10.0) as u16,
            None => OUT_OF_RANGE_MM,
        }
    }
}

pub static WORLD: Mutex<CriticalSectionRawMutex, RefCell<World>> =
    Mutex::new(RefCell::new(World::new()));

pub fn with_world<R>(f: impl FnOnce(&mut World) -> R) -> R {
    WORLD.lock(|w| f(&mut w.borrow_mut()))
}

pub struct SimMotors;

impl MotorDriver for SimMotors {
    type Error = Infallible;

    fn set_speeds(
        &mut self,
        speeds: WheelSpeeds,
    ) -> Result<(), Self::Error> {
        with_world(|w| w.wheels = speeds);
        Ok(())
    }
}

pub struct SimTof;

impl DistanceSensor for SimTof {
    type Error = Infallible;

    fn distance_mm(&mut self) -> Result<u16, Self::Error> {
        Ok(with_world(|w| w.distance_mm()))
    }
}

/// Operator whistling one tone, loudest at the left microphone.
pub struct Speaker {
    frequency_hz: f32,
    amplitude: f32,
    sample: u64,
}

impl Speaker {
    pub fn for_bin(bin: usize) -> Self {
        Self {
            frequency_hz: bin as f32 * SAMPLE_RATE_HZ / FFT_SIZE as f32,
            amplitude: 1000.0,
            sample: 0,
        }
    }

    /// Next interleaved `[right, left, back, front]` block.
    pub fn block(
        &mut self,
        playing: bool,
    ) -> [i16; BLOCK_LEN] {
        let mut block = [0i16; BLOCK_LEN];
        for frame in block.chunks_exact_mut(MIC_COUNT) {
            let cycles = self.frequency_hz as f64 * self.sample as f64 / SAMPLE_RATE_HZ as f64;
            let v = if playing {
                self.amplitude * (2.0 * PI * cycles.fract() as f32).sin()
            } else {
                0.0
            };
            frame[MIC_LEFT] = v as i16;
            frame[MIC_FRONT] = (v * 0.8) as i16;
            frame[MIC_BACK] = (v * 0.5) as i16;
            frame[MIC_RIGHT] = (v * 0.6) as i16;
            self.sample += 1;
        }
        block
    }
}

/// LED ring that logs what it would show.
pub struct ConsoleLeds;

impl SmartLedsWrite for ConsoleLeds {
    type Error = Infallible;
    type Color = RGB8;

    fn write<T, I>(
        &mut self,
        iterator: T,
    ) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let lit: Vec<usize> = iterator
            .into_iter()
            .map(|c| -> RGB8 { c.into() })
            .enumerate()
            .filter(|(_, c)| c.r != 0 || c.g != 0 || c.b != 0)
            .map(|(i, _)| i)
            .collect();
        tracing::debug!(?lit, "LED ring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_drive_advances_and_curves() {
        let mut w = World::new();
        w.wheels = WheelSpeeds::new(1000, 1000);
        w.step(1.0);
        assert!((w.travelled_cm - 18.0).abs() < 1e-3, "5 cm start + 13 cm");
        assert!(w.line_offset_px > 0.0);
    }

    #[test]
    fn crossing_shows_a_wide_line() {
        let mut w = World::new();
        w.travelled_cm = 61.0;
        assert!(w.at_crossing());
        let frame = w.frame();
        let dark = frame.chunks_exact(2).filter(|p| (p[0], p[1]) == INK).count();
        assert_eq!(dark, CROSSING_PX);
    }

    #[test]
    fn no_obstacle_reads_out_of_range() {
        assert_eq!(World::new().distance_mm(), OUT_OF_RANGE_MM);
    }
}
