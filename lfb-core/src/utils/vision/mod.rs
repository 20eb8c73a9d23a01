//! Camera processing: colour channel extraction, line geometry and the
//! frame handoff between capture and processing.

pub mod line;
pub mod pipeline;

pub use line::{LineExtractor, LineObservation, Rgb565Channel};
pub use pipeline::{ImageProcessor, RawFrame, FRAME_SIGNAL};
