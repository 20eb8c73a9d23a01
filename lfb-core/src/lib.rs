//! Perception and control core for the Line-Follower Bot on no-std embedded platforms.
//!
//! For a host simulation of the whole robot, see `lfb-app/mock-mcu`.
#![no_std]

pub mod utils;
