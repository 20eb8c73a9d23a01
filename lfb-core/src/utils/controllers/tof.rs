//! Time-of-flight distance sampling.

use embassy_time::{Duration, Ticker};

use crate::utils::{
    config::SensorConfig,
    control::state::{RangeCheck, SharedState},
};

/// Distance collaborator: the latest reading in millimetres.
pub trait DistanceSensor {
    type Error: core::fmt::Debug;

    fn distance_mm(&mut self) -> Result<u16, Self::Error>;
}

/// Sample `sensor` every `period` and publish each reading into `state`.
///
/// Readings outside `range` are saturated to it. Read failures are logged
/// and the previous distance stays in effect.
pub async fn sample_distance<S: DistanceSensor>(
    sensor: &mut S,
    range: SensorConfig,
    period: Duration,
    state: &SharedState,
) -> ! {
    let mut ticker = Ticker::every(period);
    loop {
        match sensor.distance_mm() {
            Ok(mm) => match state.publish_distance_mm(mm, &range) {
                (cm, RangeCheck::Within) => tracing::trace!(cm, "distance"),
                (cm, RangeCheck::AboveRange(raw)) => tracing::trace!(raw, cm, "nothing in range"),
                (cm, RangeCheck::BelowRange(raw)) => {
                    tracing::warn!(raw, cm, "distance below sensor range")
                }
            },
            Err(e) => tracing::error!("distance read failed: {:?}", e),
        }
        ticker.next().await;
    }
}
