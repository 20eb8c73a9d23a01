//! Timed open-loop maneuvers executed at an intersection.
//!
//! Every primitive drives the wheels at `control_speed` for a calibrated
//! duration with no sensor feedback, then stops. The durations come from
//! iteration counts tuned on the hardware, so they drift with battery level
//! and floor grip. There is no abort path: a maneuver that has started runs
//! to completion even if the motor driver reports errors.

use embedded_hal_async::delay::DelayNs;

use crate::utils::{
    audio::decoder::Command,
    config::ManeuverConfig,
    control::{state::IntersectionFlag, steering::WheelSpeeds},
    controllers::{
        leds::{Side, TurnSignal},
        motors::MotorDriver,
    },
};

/// What happened to a command handed to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverOutcome {
    /// The robot was following the line; commands are only honoured at a stop.
    Ignored,
    /// No recognisable command; still waiting at the intersection.
    Holding,
    /// The maneuver ran and the intersection was cleared.
    Completed(Command),
}

/// Runs the maneuver chosen at an intersection, then releases the stop.
pub struct ManeuverExecutor<'a, D, S> {
    config: ManeuverConfig,
    flag: &'a IntersectionFlag,
    delay: D,
    signal: S,
}

impl<'a, D, S> ManeuverExecutor<'a, D, S>
where
    D: DelayNs,
    S: TurnSignal,
{
    /// Create a new executor clearing `flag` after each completed maneuver.
    pub fn new(
        config: ManeuverConfig,
        flag: &'a IntersectionFlag,
        delay: D,
        signal: S,
    ) -> Self {
        Self {
            config,
            flag,
            delay,
            signal,
        }
    }

    /// Run `command` on `motors` if the robot is stopped at an intersection.
    pub async fn execute<M: MotorDriver>(
        &mut self,
        command: Command,
        motors: &mut M,
    ) -> ManeuverOutcome {
        if !self.flag.is_stopped() {
            tracing::debug!(?command, "not at an intersection, command ignored");
            return ManeuverOutcome::Ignored;
        }

        tracing::info!(?command, "executing maneuver");
        match command {
            Command::Forward => {
                self.skip_stop(motors).await;
                self.skip_stop(motors).await;
            }
            Command::Left => {
                self.turn_signal(Side::Left).await;
                self.skip_stop(motors).await;
                self.skip_stop(motors).await;
                self.rotate_left(motors).await;
            }
            Command::Right => {
                self.turn_signal(Side::Right).await;
                self.skip_stop(motors).await;
                self.skip_stop(motors).await;
                self.rotate_right(motors).await;
            }
            Command::UTurn => {
                self.turn_signal(Side::Both).await;
                self.u_turn(motors).await;
            }
            Command::None => {
                stay_stop(motors);
                return ManeuverOutcome::Holding;
            }
        }

        self.flag.clear();
        tracing::info!(?command, "maneuver complete, following line");
        ManeuverOutcome::Completed(command)
    }

    /// Show the indicator and wait until it has finished blinking.
    async fn turn_signal(
        &mut self,
        side: Side,
    ) {
        self.signal.indicate(side);
        self.delay.delay_ms(self.config.signal_ms()).await;
    }

    /// Spin a quarter turn counter-clockwise in place.
    pub async fn rotate_left<M: MotorDriver>(
        &mut self,
        motors: &mut M,
    ) {
        let s = self.config.control_speed;
        let us = self.config.rotate_90_us();
        self.pulse(motors, WheelSpeeds::new(-s, s), us).await;
    }

    /// Spin a quarter turn clockwise in place.
    pub async fn rotate_right<M: MotorDriver>(
        &mut self,
        motors: &mut M,
    ) {
        let s = self.config.control_speed;
        let us = self.config.rotate_90_us();
        self.pulse(motors, WheelSpeeds::new(s, -s), us).await;
    }

    /// Creep forward past the stop line.
    pub async fn skip_stop<M: MotorDriver>(
        &mut self,
        motors: &mut M,
    ) {
        let s = self.config.control_speed;
        let us = self.config.skip_stop_us();
        self.pulse(motors, WheelSpeeds::new(s, s), us).await;
    }

    /// Two left quarter turns.
    pub async fn u_turn<M: MotorDriver>(
        &mut self,
        motors: &mut M,
    ) {
        self.rotate_left(motors).await;
        self.rotate_left(motors).await;
    }

    async fn pulse<M: MotorDriver>(
        &mut self,
        motors: &mut M,
        speeds: WheelSpeeds,
        us: u32,
    ) {
        apply(motors, speeds);
        self.delay.delay_us(us).await;
        stay_stop(motors);
    }
}

/// Command both wheels to zero.
pub fn stay_stop<M: MotorDriver>(motors: &mut M) {
    apply(motors, WheelSpeeds::STOP);
}

fn apply<M: MotorDriver>(
    motors: &mut M,
    speeds: WheelSpeeds,
) {
    if let Err(e) = motors.set_speeds(speeds) {
        tracing::error!("motor command failed: {:?}", e);
    }
}
