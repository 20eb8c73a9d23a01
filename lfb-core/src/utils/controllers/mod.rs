//! Module Exports
//!
//! Collaborator drivers of the robot.
//!
//! - `motors`: differential drive over a PCA9685 PWM controller.
//! - `leds`: turn signal LEDs.
//! - `tof`: time-of-flight distance sampling.

pub mod leds;
pub mod motors;
pub mod tof;

pub use leds::{ChannelSignal, LEDCommand, LedModule, Side, TurnSignal, LED_CHANNEL};
pub use motors::{DriveError, MotorDriver, Pca9685Drive, SharedMotors};
pub use tof::{sample_distance, DistanceSensor};
