//! Utility re-exports and helper macros for the Line-Follower Bot.
//!
//! - `audio`: microphone spectrum and tone remote decoding
//! - `config`: tunable constants of the whole pipeline
//! - `control`: speed regulation, steering, intersections and maneuvers
//! - `controllers`: motor, LED and distance sensor drivers
//! - `vision`: camera scanline processing
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod audio;
pub mod config;
pub mod control;
pub mod controllers;
pub mod vision;

pub use config::RobotConfig;
pub use control::{ControlLoop, SHARED};
pub use embassy_time::*;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
