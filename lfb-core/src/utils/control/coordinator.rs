//! The 10 ms control loop.
//!
//! Each tick reads the latest line observation and distance, runs the
//! intersection detector, and either follows the line or holds still. The
//! loop never waits for a new frame or distance sample.

use embassy_time::{Duration, Ticker, Timer};

use crate::utils::{
    config::RobotConfig,
    control::{
        intersection::{Detection, IntersectionDetector},
        regulator::{ControllerState, SpeedRegulator},
        state::SharedState,
        steering::{SteeringHistory, SteeringMixer, WheelSpeeds},
    },
    controllers::motors::{MotorDriver, SharedMotors},
};

/// Control period.
pub const TICK: Duration = Duration::from_millis(10);

/// What the loop wants done after one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Drive(WheelSpeeds),
    /// An intersection was confirmed: stop and let the robot settle before
    /// the stop is published.
    Settle,
}

pub struct ControlLoop<'a> {
    config: RobotConfig,
    state: &'a SharedState,
    regulator: SpeedRegulator,
    steering: SteeringMixer,
    detector: IntersectionDetector,
    controller: ControllerState,
    history: SteeringHistory,
    cruise_speed: i16,
    speed: i16,
    correction: i32,
}

impl<'a> ControlLoop<'a> {
    /// `selector` is the rotary selector position choosing the cruise speed.
    pub fn new(
        config: RobotConfig,
        state: &'a SharedState,
        selector: u8,
    ) -> Self {
        let cruise_speed = config.cruise.speed_for(selector);
        tracing::info!(selector, cruise_speed, "control loop configured");
        Self {
            regulator: SpeedRegulator::new(config.regulator),
            steering: SteeringMixer::new(config.steering),
            detector: IntersectionDetector::new(config.intersection),
            controller: ControllerState::default(),
            history: SteeringHistory::new(config.steering.center),
            cruise_speed,
            speed: 0,
            correction: 0,
            config,
            state,
        }
    }

    pub fn controller_state(&self) -> ControllerState {
        self.controller
    }

    pub fn tick(&mut self) -> TickAction {
        let line = self.state.line();
        let distance_cm = self.state.distance_cm();

        if self.state.intersection.is_stopped() {
            self.detector.reset();
            self.speed = 0;
            self.correction = 0;
            return TickAction::Drive(WheelSpeeds::STOP);
        }

        if self.detector.observe(line.width, self.correction) == Detection::Stop {
            self.speed = 0;
            self.correction = 0;
            return TickAction::Settle;
        }

        self.speed = self.forward_speed(distance_cm);
        self.correction = self
            .steering
            .steer(self.speed, line.position, &mut self.history);

        let wheels = self.steering.wheel_speeds(self.speed, self.correction);
        tracing::trace!(
            distance_cm,
            width = line.width,
            position = line.position,
            speed = self.speed,
            correction = self.correction,
            "tick"
        );
        TickAction::Drive(wheels)
    }

    /// Publish the stop once the robot has settled.
    pub fn complete_stop(&mut self) {
        self.state.intersection.set_stopped();
        tracing::info!("stopped at intersection, waiting for a command");
    }

    /// Regulate when an obstacle is close, cruise when the way is clear,
    /// and keep the previous speed inside the hysteresis band.
    fn forward_speed(
        &mut self,
        distance_cm: f32,
    ) -> i16 {
        let a = &self.config.approach;
        if distance_cm < a.min_distance_cm - a.dist_gap_cm {
            let speed =
                self.regulator
                    .regulate(distance_cm, a.goal_distance_cm, &mut self.controller);
            speed.min(self.config.steering.speed_limit as f32) as i16
        } else if distance_cm >= a.goal_distance_cm + a.dist_gap_cm {
            self.cruise_speed
        } else {
            self.speed
        }
    }

    /// Control task body.
    ///
    /// While a maneuver holds the motors the computed command is dropped.
    pub async fn run<M: MotorDriver>(
        &mut self,
        motors: &SharedMotors<M>,
    ) -> ! {
        let mut ticker = Ticker::every(TICK);
        loop {
            match self.tick() {
                TickAction::Drive(wheels) => actuate(motors, wheels),
                TickAction::Settle => {
                    actuate(motors, WheelSpeeds::STOP);
                    Timer::after_millis(self.config.intersection.settle_ms).await;
                    self.complete_stop();
                    ticker.reset();
                }
            }
            ticker.next().await;
        }
    }
}

fn actuate<M: MotorDriver>(
    motors: &SharedMotors<M>,
    wheels: WheelSpeeds,
) {
    match motors.try_lock() {
        Ok(mut m) => {
            if let Err(e) = m.set_speeds(wheels) {
                tracing::error!("motor command failed: {:?}", e);
            }
        }
        Err(_) => tracing::trace!("motors held by maneuver"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::vision::line::LineObservation;

    const LINE: LineObservation = LineObservation {
        width: 120,
        position: 320,
    };

    fn following(state: &SharedState) -> ControlLoop<'_> {
        state.intersection.clear();
        state.publish_line(LINE);
        ControlLoop::new(RobotConfig::default(), state, 4)
    }

    #[test]
    fn stopped_robot_holds_still() {
        let state = SharedState::new();
        state.publish_line(LINE);
        state.publish_distance_mm(500, &Default::default());
        let mut cl = ControlLoop::new(RobotConfig::default(), &state, 4);
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::STOP));
    }

    #[test]
    fn clear_way_cruises_at_selected_speed() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(500, &Default::default());
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::new(300, 300)));
    }

    #[test]
    fn open_floor_beyond_sensor_range_cruises() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(3000, &Default::default());
        for _ in 0..100 {
            assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::new(300, 300)));
        }
    }

    #[test]
    fn offset_line_steers() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(500, &Default::default());
        state.publish_line(LineObservation { width: 120, position: 400 });
        // (400 * 70 + 320 * 30) / 100 - 320 = 56, times rotation_coeff 2
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::new(412, 188)));
    }

    #[test]
    fn close_obstacle_stops_the_robot() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(40, &Default::default());
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::STOP));
        assert_eq!(cl.controller_state().sum_error, -8.0);
    }

    #[test]
    fn hysteresis_band_keeps_previous_speed() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(500, &Default::default());
        cl.tick();
        state.publish_distance_mm(90, &Default::default());
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::new(300, 300)));
        state.publish_distance_mm(30, &Default::default());
        cl.tick();
        state.publish_distance_mm(90, &Default::default());
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::STOP));
    }

    #[test]
    fn wide_line_run_settles_into_stop() {
        let state = SharedState::new();
        let mut cl = following(&state);
        state.publish_distance_mm(500, &Default::default());
        state.publish_line(LineObservation { width: 350, position: 320 });

        let mut settled_at = None;
        for n in 1..=15 {
            if cl.tick() == TickAction::Settle {
                settled_at = Some(n);
                cl.complete_stop();
                break;
            }
        }
        assert_eq!(settled_at, Some(11));
        assert!(state.intersection.is_stopped());
        assert_eq!(cl.tick(), TickAction::Drive(WheelSpeeds::STOP));
    }
}
