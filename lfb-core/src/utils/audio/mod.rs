//! Tone remote: microphone spectrum and command decoding.

pub mod decoder;
pub mod remote;
pub mod spectrum;

pub use decoder::{Command, CommandDecoder};
pub use remote::ToneRemote;
pub use spectrum::{AudioFrontEnd, ComplexFft};
