//! Frame handoff from the capture task to the processing task.
//!
//! `FRAME_SIGNAL` holds at most one pending frame. A frame captured before
//! the previous one was consumed replaces it, so a slow processor drops
//! frames rather than stalling capture.

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::utils::{
    config::{LineConfig, IMAGE_BUFFER_SIZE},
    control::state::SharedState,
    vision::line::{LineExtractor, LineObservation, Rgb565Channel},
};

/// One captured scanline in packed RGB565.
pub type RawFrame = [u8; 2 * IMAGE_BUFFER_SIZE];

pub type FrameSignal = Signal<CriticalSectionRawMutex, RawFrame>;

/// Single-slot handoff used by the firmware tasks.
pub static FRAME_SIGNAL: FrameSignal = Signal::new();

/// Hand a captured frame to the processing task.
pub fn publish_frame(
    frames: &FrameSignal,
    frame: &RawFrame,
) {
    if frames.signaled() {
        tracing::trace!("processing behind, frame replaced");
    }
    frames.signal(*frame);
}

pub struct ImageProcessor {
    extractor: LineExtractor,
    channel: Rgb565Channel,
    image: [u8; IMAGE_BUFFER_SIZE],
}

impl ImageProcessor {
    pub fn new(config: LineConfig) -> Self {
        Self {
            extractor: LineExtractor::new(config),
            channel: config.channel,
            image: [0; IMAGE_BUFFER_SIZE],
        }
    }

    pub fn process(
        &mut self,
        raw: &RawFrame,
    ) -> LineObservation {
        self.channel.extract_into(raw, &mut self.image);
        self.extractor.extract(&self.image)
    }

    /// Processing task body: wait for a frame, publish its line observation.
    pub async fn run(
        &mut self,
        frames: &FrameSignal,
        state: &SharedState,
    ) -> ! {
        loop {
            let raw = frames.wait().await;
            let observation = self.process(&raw);
            state.publish_line(observation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packed green-only frame with a dark band.
    fn frame(
        dark_from: usize,
        dark_to: usize,
    ) -> RawFrame {
        let mut raw = [0u8; 2 * IMAGE_BUFFER_SIZE];
        for (i, px) in raw.chunks_exact_mut(2).enumerate() {
            let (hi, lo) = if (dark_from..dark_to).contains(&i) {
                (0x00, 0x20) // green 1
            } else {
                (0x07, 0xC0) // green 62
            };
            px[0] = hi;
            px[1] = lo;
        }
        raw
    }

    #[test]
    fn green_channel_feeds_the_extractor() {
        let mut p = ImageProcessor::new(LineConfig::default());
        let obs = p.process(&frame(300, 400));
        assert_eq!(obs, LineObservation { width: 105, position: 347 });
    }

    #[test]
    fn newest_frame_replaces_pending_one() {
        let frames = FrameSignal::new();
        publish_frame(&frames, &frame(100, 200));
        publish_frame(&frames, &frame(300, 400));
        let pending = frames.try_take().expect("one frame pending");
        let mut p = ImageProcessor::new(LineConfig::default());
        assert_eq!(p.process(&pending).position, 347);
        assert!(frames.try_take().is_none());
    }
}
