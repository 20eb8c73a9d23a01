//! Line geometry extraction from a single camera scanline.
//!
//! The line is darker than the floor. Its left edge is where the intensity
//! drops below the scanline mean within `slope` pixels, its right edge is
//! where it climbs back above it. Segments narrower than `min_line_width` are
//! treated as specks and the search resumes after them.

use serde::{Deserialize, Serialize};

use crate::utils::config::LineConfig;

/// Width and centroid of the detected line, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineObservation {
    pub width: u16,
    pub position: u16,
}

/// Colour channel to pull out of a big-endian RGB565 pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rgb565Channel {
    Red,
    Green,
    Blue,
}

impl Rgb565Channel {
    /// Extract this channel from the two bytes of one pixel (`hi` first).
    pub fn extract(
        self,
        hi: u8,
        lo: u8,
    ) -> u8 {
        match self {
            Rgb565Channel::Red => hi >> 3,
            Rgb565Channel::Green => ((hi & 0x07) << 3) | ((lo & 0xE0) >> 5),
            Rgb565Channel::Blue => lo & 0x1F,
        }
    }

    /// Convert packed RGB565 bytes into one intensity per pixel.
    ///
    /// Returns the number of pixels written, bounded by both buffers.
    pub fn extract_into(
        self,
        raw: &[u8],
        out: &mut [u8],
    ) -> usize {
        let mut n = 0;
        for (px, dst) in raw.chunks_exact(2).zip(out.iter_mut()) {
            *dst = self.extract(px[0], px[1]);
            n += 1;
        }
        n
    }
}

/// Stateful line extractor. The only memory kept between frames is the last
/// valid width, reported again when the line is lost.
pub struct LineExtractor {
    config: LineConfig,
    last_width: u16,
}

impl LineExtractor {
    pub fn new(config: LineConfig) -> Self {
        let last_width = (config.px_to_cm / config.initial_distance_cm) as u16;
        Self { config, last_width }
    }

    /// Width that will be reported if the next frame has no line.
    pub fn last_width(&self) -> u16 {
        self.last_width
    }

    /// Locate the line in `buffer`.
    ///
    /// When no segment of acceptable width exists the previous width is
    /// reported with the line assumed centred.
    pub fn extract(
        &mut self,
        buffer: &[u8],
    ) -> LineObservation {
        let center = (buffer.len() / 2) as u16;

        let observation = match self.find_segment(buffer) {
            Some((begin, end)) => {
                let width = (end - begin) as u16;
                self.last_width = width;
                LineObservation {
                    width,
                    position: ((begin + end) / 2) as u16,
                }
            }
            None => {
                tracing::trace!(width = self.last_width, "line not found");
                LineObservation {
                    width: self.last_width,
                    position: center,
                }
            }
        };

        LineObservation {
            width: self.clamp_width(observation.width),
            ..observation
        }
    }

    fn find_segment(
        &self,
        buffer: &[u8],
    ) -> Option<(usize, usize)> {
        if buffer.is_empty() {
            return None;
        }
        let mean = buffer.iter().map(|&p| p as u32).sum::<u32>() / buffer.len() as u32;
        let slope = self.config.slope;
        let min_width = self.config.min_line_width as usize;

        let mut from = 0;
        loop {
            let begin = find_begin(buffer, mean, slope, from)?;
            let end = find_end(buffer, mean, slope, begin + 1)?;
            if end - begin >= min_width {
                return Some((begin, end));
            }
            tracing::trace!(begin, end, "segment too narrow, resuming");
            from = end;
        }
    }

    /// Widths implying a distance beyond `max_distance_cm` report that distance instead.
    fn clamp_width(
        &self,
        width: u16,
    ) -> u16 {
        let LineConfig {
            px_to_cm,
            max_distance_cm,
            ..
        } = self.config;
        if width == 0 || px_to_cm / width as f32 > max_distance_cm {
            (px_to_cm / max_distance_cm) as u16
        } else {
            width
        }
    }
}

fn find_begin(
    buffer: &[u8],
    mean: u32,
    slope: usize,
    from: usize,
) -> Option<usize> {
    let last = buffer.len().saturating_sub(slope);
    (from..last).find(|&i| buffer[i] as u32 > mean && (buffer[i + slope] as u32) < mean)
}

fn find_end(
    buffer: &[u8],
    mean: u32,
    slope: usize,
    from: usize,
) -> Option<usize> {
    (from.max(slope)..buffer.len())
        .find(|&i| buffer[i] as u32 > mean && (buffer[i - slope] as u32) < mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::IMAGE_BUFFER_SIZE;

    const FLOOR: u8 = 200;
    const INK: u8 = 20;

    fn scanline(dark: &[(usize, usize)]) -> [u8; IMAGE_BUFFER_SIZE] {
        let mut buf = [FLOOR; IMAGE_BUFFER_SIZE];
        for &(from, to) in dark {
            buf[from..to].fill(INK);
        }
        buf
    }

    fn extractor() -> LineExtractor {
        LineExtractor::new(LineConfig::default())
    }

    #[test]
    fn single_line_is_measured_from_slope_to_rising_edge() {
        let mut ex = extractor();
        let obs = ex.extract(&scanline(&[(300, 400)]));
        // begin sits `slope` pixels before the dark run, end on its first bright pixel
        assert_eq!(obs, LineObservation { width: 105, position: 347 });
        assert_eq!(ex.last_width(), 105);
    }

    #[test]
    fn width_and_centroid_track_the_line() {
        let slope = LineConfig::default().slope;
        for &(start, dark) in &[(50usize, 60usize), (200, 90), (420, 120), (500, 70)] {
            let mut ex = extractor();
            let obs = ex.extract(&scanline(&[(start, start + dark)]));
            let begin = start - slope;
            let end = start + dark;
            assert_eq!(obs.width as usize, end - begin, "start {}", start);
            assert_eq!(obs.position as usize, (begin + end) / 2, "start {}", start);
        }
    }

    #[test]
    fn narrow_speck_is_skipped() {
        let mut ex = extractor();
        let obs = ex.extract(&scanline(&[(100, 120), (400, 480)]));
        assert_eq!(obs, LineObservation { width: 85, position: 437 });
    }

    #[test]
    fn blank_scanline_reports_initial_width_centred() {
        let mut ex = extractor();
        let obs = ex.extract(&[128u8; IMAGE_BUFFER_SIZE]);
        assert_eq!(obs, LineObservation { width: 130, position: 320 });
    }

    #[test]
    fn lost_line_repeats_last_width() {
        let mut ex = extractor();
        ex.extract(&scanline(&[(300, 400)]));
        let blank = [FLOOR; IMAGE_BUFFER_SIZE];
        for _ in 0..3 {
            assert_eq!(ex.extract(&blank), LineObservation { width: 105, position: 320 });
        }
    }

    #[test]
    fn line_running_off_the_edge_is_not_found() {
        let mut ex = extractor();
        let obs = ex.extract(&scanline(&[(600, IMAGE_BUFFER_SIZE)]));
        assert_eq!(obs, LineObservation { width: 130, position: 320 });
    }

    #[test]
    fn only_specks_falls_back() {
        let mut ex = extractor();
        let obs = ex.extract(&scanline(&[(100, 110), (300, 320), (500, 515)]));
        assert_eq!(obs.position, 320);
        assert_eq!(obs.width, 130);
    }

    #[test]
    fn narrow_width_is_clamped_to_max_distance() {
        let mut ex = extractor();
        let obs = ex.extract(&scanline(&[(300, 340)]));
        assert_eq!(obs.width, 62);
        assert_eq!(obs.position, 317);
        // the remembered width is the measured one
        assert_eq!(ex.last_width(), 45);
        assert_eq!(ex.extract(&[FLOOR; IMAGE_BUFFER_SIZE]).width, 62);
    }

    #[test]
    fn extraction_is_deterministic() {
        let buf = scanline(&[(150, 260)]);
        let a = extractor().extract(&buf);
        let b = extractor().extract(&buf);
        assert_eq!(a, b);
    }

    #[test]
    fn rgb565_channels() {
        // pure green 0x07E0, pure red 0xF800, pure blue 0x001F
        assert_eq!(Rgb565Channel::Green.extract(0x07, 0xE0), 63);
        assert_eq!(Rgb565Channel::Green.extract(0xF8, 0x1F), 0);
        assert_eq!(Rgb565Channel::Red.extract(0xF8, 0x00), 31);
        assert_eq!(Rgb565Channel::Blue.extract(0x00, 0x1F), 31);
    }

    #[test]
    fn extract_into_stops_at_shorter_buffer() {
        let raw = [0x07, 0xE0, 0x00, 0x00, 0x07, 0xE0];
        let mut out = [0u8; 2];
        let n = Rgb565Channel::Green.extract_into(&raw, &mut out);
        assert_eq!(n, 2);
        assert_eq!(out, [63, 0]);
    }
}
