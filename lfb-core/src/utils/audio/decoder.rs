//! Tone remote decoder.
//!
//! The strongest bin in `[min_freq, max_freq)` selects a command when it
//! falls within `tolerance` bins of one of four nominal tone centres.

use serde::{Deserialize, Serialize};

use crate::utils::config::DecoderConfig;

/// Maneuver requested by the tone remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Forward,
    Left,
    Right,
    UTurn,
    None,
}

/// Maps the dominant tone of a spectrum to a `Command`.
pub struct CommandDecoder {
    config: DecoderConfig,
}

impl CommandDecoder {
    /// Create a new decoder for the configured frequency bands.
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Index and magnitude of the strongest bin above the threshold.
    ///
    /// The first of equal maxima wins.
    pub fn dominant_bin(
        &self,
        spectrum: &[f32],
    ) -> Option<(usize, f32)> {
        let end = self.config.max_freq.min(spectrum.len());
        let start = self.config.min_freq.min(end);

        let mut best: Option<(usize, f32)> = None;
        let mut max_norm = self.config.min_value_threshold;
        for (i, &m) in spectrum[start..end].iter().enumerate() {
            if m > max_norm {
                max_norm = m;
                best = Some((start + i, m));
            }
        }
        best
    }

    /// Decode one magnitude spectrum; `Command::None` when no band matches.
    pub fn decode(
        &self,
        spectrum: &[f32],
    ) -> Command {
        match self.dominant_bin(spectrum) {
            Some((bin, magnitude)) => {
                let command = self.classify(bin);
                tracing::debug!(bin, magnitude, ?command, "tone peak");
                command
            }
            None => Command::None,
        }
    }

    /// Map a bin index to the band it falls in.
    pub fn classify(
        &self,
        bin: usize,
    ) -> Command {
        let c = &self.config;
        let bands = [
            (c.freq_forward, Command::Forward),
            (c.freq_left, Command::Left),
            (c.freq_right, Command::Right),
            (c.freq_backward, Command::UTurn),
        ];
        bands
            .iter()
            .find(|(center, _)| {
                bin >= center.saturating_sub(c.tolerance) && bin <= center + c.tolerance
            })
            .map(|&(_, command)| command)
            .unwrap_or(Command::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::config::FFT_SIZE;

    fn decoder() -> CommandDecoder {
        CommandDecoder::new(DecoderConfig::default())
    }

    fn spectrum_with_peak(
        bin: usize,
        magnitude: f32,
    ) -> [f32; FFT_SIZE] {
        let mut s = [50.0f32; FFT_SIZE];
        s[bin] = magnitude;
        s
    }

    #[test]
    fn weak_spectrum_decodes_to_none() {
        let d = decoder();
        assert_eq!(d.decode(&spectrum_with_peak(190, 9_999.0)), Command::None);
        assert_eq!(d.decode(&spectrum_with_peak(190, 10_000.0)), Command::None);
        assert_eq!(d.decode(&[0.0; FFT_SIZE]), Command::None);
    }

    #[test]
    fn peaks_at_band_centres() {
        let d = decoder();
        assert_eq!(d.decode(&spectrum_with_peak(130, 20_000.0)), Command::Forward);
        assert_eq!(d.decode(&spectrum_with_peak(190, 20_000.0)), Command::Left);
        assert_eq!(d.decode(&spectrum_with_peak(262, 20_000.0)), Command::Right);
        assert_eq!(d.decode(&spectrum_with_peak(327, 20_000.0)), Command::UTurn);
    }

    #[test]
    fn band_edges_are_inclusive() {
        let d = decoder();
        assert_eq!(d.classify(120), Command::Forward);
        assert_eq!(d.classify(140), Command::Forward);
        assert_eq!(d.classify(119), Command::None);
        assert_eq!(d.classify(141), Command::None);
        assert_eq!(d.classify(337), Command::UTurn);
    }

    #[test]
    fn peaks_between_bands_decode_to_none() {
        let d = decoder();
        for &bin in &[160usize, 201, 230, 251, 273, 300, 316] {
            assert_eq!(d.decode(&spectrum_with_peak(bin, 20_000.0)), Command::None, "bin {}", bin);
        }
    }

    #[test]
    fn peaks_outside_scan_window_are_ignored() {
        let d = decoder();
        let mut s = spectrum_with_peak(50, 90_000.0);
        s[400] = 90_000.0;
        assert_eq!(d.dominant_bin(&s), None);
        s[262] = 15_000.0;
        assert_eq!(d.decode(&s), Command::Right);
    }

    #[test]
    fn strongest_peak_wins() {
        let d = decoder();
        let mut s = spectrum_with_peak(130, 15_000.0);
        s[262] = 30_000.0;
        assert_eq!(d.dominant_bin(&s), Some((262, 30_000.0)));
        assert_eq!(d.decode(&s), Command::Right);
    }

    #[test]
    fn short_spectrum_is_scanned_to_its_end() {
        let d = decoder();
        let mut s = [0.0f32; 200];
        s[190] = 20_000.0;
        assert_eq!(d.decode(&s), Command::Left);
        assert_eq!(d.decode(&s[..50]), Command::None);
    }
}
