use std::{cell::RefCell, convert::Infallible, rc::Rc};

use embassy_futures::{block_on, select::select};
use embassy_time::{Duration, Instant, Timer};
use lfb_core::utils::{
    config::RobotConfig,
    control::{ControlLoop, IntersectionState, SharedState, WheelSpeeds},
    controllers::{MotorDriver, SharedMotors},
    vision::LineObservation,
};

type Log = Rc<RefCell<Vec<(Instant, WheelSpeeds)>>>;

struct RecordingMotors(Log);

impl MotorDriver for RecordingMotors {
    type Error = Infallible;

    fn set_speeds(
        &mut self,
        speeds: WheelSpeeds,
    ) -> Result<(), Self::Error> {
        self.0.borrow_mut().push((Instant::now(), speeds));
        Ok(())
    }
}

const CRUISE: WheelSpeeds = WheelSpeeds::new(300, 300);

fn following(line: LineObservation) -> SharedState {
    let state = SharedState::new();
    state.intersection.clear();
    state.publish_line(line);
    state.publish_distance_mm(500, &Default::default());
    state
}

#[test]
fn intersection_stop_settles_before_raising_the_flag() {
    let state = following(LineObservation {
        width: 350,
        position: 320,
    });
    let mut config = RobotConfig::default();
    config.intersection.settle_ms = 300;

    let log: Log = Rc::default();
    let motors: SharedMotors<RecordingMotors> = SharedMotors::new(RecordingMotors(log.clone()));
    let mut control = ControlLoop::new(config, &state, 4);

    let mut during_settle = None;
    block_on(select(control.run(&motors), async {
        // eleven 10 ms ticks reach the stop, then the settle runs to ~400 ms
        Timer::after_millis(250).await;
        during_settle = Some(state.intersection.get());
        Timer::after_millis(400).await;
    }));

    assert_eq!(during_settle, Some(IntersectionState::Following));
    assert_eq!(state.intersection.get(), IntersectionState::Stopped);

    let log = log.borrow();
    let first_stop = log
        .iter()
        .position(|&(_, w)| w == WheelSpeeds::STOP)
        .expect("wheels stopped");
    assert_eq!(first_stop, 10);
    assert!(log[..first_stop].iter().all(|&(_, w)| w == CRUISE));

    // nothing is written while settling, and the wheels stay stopped after
    let (stopped_at, _) = log[first_stop];
    let (next_at, _) = log[first_stop + 1];
    assert!(next_at - stopped_at >= Duration::from_millis(300));
    assert!(log[first_stop..].iter().all(|&(_, w)| w == WheelSpeeds::STOP));
}

#[test]
fn held_motors_receive_no_commands() {
    let state = following(LineObservation {
        width: 120,
        position: 320,
    });
    let log: Log = Rc::default();
    let motors: SharedMotors<RecordingMotors> = SharedMotors::new(RecordingMotors(log.clone()));
    let mut control = ControlLoop::new(RobotConfig::default(), &state, 4);

    let held = motors.try_lock().expect("motors free");
    block_on(select(control.run(&motors), Timer::after_millis(60)));
    assert!(log.borrow().is_empty());
    drop(held);

    block_on(select(control.run(&motors), Timer::after_millis(60)));
    let log = log.borrow();
    assert!(!log.is_empty());
    assert!(log.iter().all(|&(_, w)| w == CRUISE));
}
