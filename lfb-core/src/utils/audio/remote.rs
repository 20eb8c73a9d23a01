//! Audio-block handler tying the spectrum, the decoder and the maneuvers together.

use embedded_hal_async::delay::DelayNs;

use crate::utils::{
    audio::{
        decoder::CommandDecoder,
        spectrum::{AudioFrontEnd, ComplexFft, MIC_LEFT},
    },
    config::RobotConfig,
    control::{
        maneuver::{ManeuverExecutor, ManeuverOutcome},
        state::IntersectionFlag,
    },
    controllers::{leds::TurnSignal, motors::{MotorDriver, SharedMotors}},
};

pub struct ToneRemote<'a, F, D, S> {
    front_end: AudioFrontEnd<F>,
    decoder: CommandDecoder,
    executor: ManeuverExecutor<'a, D, S>,
    flag: &'a IntersectionFlag,
}

impl<'a, F, D, S> ToneRemote<'a, F, D, S>
where
    F: ComplexFft,
    D: DelayNs,
    S: TurnSignal,
{
    pub fn new(
        config: &RobotConfig,
        fft: F,
        flag: &'a IntersectionFlag,
        delay: D,
        signal: S,
    ) -> Self {
        Self {
            front_end: AudioFrontEnd::new(fft, MIC_LEFT),
            decoder: CommandDecoder::new(config.decoder),
            executor: ManeuverExecutor::new(config.maneuver, flag, delay, signal),
            flag,
        }
    }

    /// Handle one microphone block.
    ///
    /// Returns `None` until a spectrum is complete, and while the robot is
    /// following the line. At a stop the decoded command runs inline with
    /// exclusive use of the motors.
    pub async fn on_block<M: MotorDriver>(
        &mut self,
        block: &[i16],
        motors: &SharedMotors<M>,
    ) -> Option<ManeuverOutcome> {
        let spectrum = self.front_end.push_block(block)?;
        if !self.flag.is_stopped() {
            return None;
        }
        let command = self.decoder.decode(spectrum);

        let mut wheels = motors.lock().await;
        Some(self.executor.execute(command, &mut *wheels).await)
    }
}
