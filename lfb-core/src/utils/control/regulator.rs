//! PI speed regulator driven by the time-of-flight distance.

use crate::utils::config::RegulatorConfig;

/// Integrator memory of the regulator, owned by the control loop.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ControllerState {
    pub sum_error: f32,
}

/// PI law turning the distance to an obstacle into a forward speed.
pub struct SpeedRegulator {
    config: RegulatorConfig,
}

impl SpeedRegulator {
    /// Create a new regulator with the given gains and limits.
    pub fn new(config: RegulatorConfig) -> Self {
        Self { config }
    }

    /// Compute a forward speed from the distance error.
    ///
    /// Inside the dead band the output is zero and the integrator is left
    /// untouched. The output never goes negative: the robot slows down for an
    /// obstacle, it does not back away from it.
    pub fn regulate(
        &self,
        distance_cm: f32,
        goal_cm: f32,
        state: &mut ControllerState,
    ) -> f32 {
        let RegulatorConfig {
            kp,
            ki,
            error_threshold,
            max_sum_error,
        } = self.config;

        let error = distance_cm - goal_cm;
        if libm::fabsf(error) < error_threshold {
            return 0.0;
        }

        state.sum_error = (state.sum_error + error).clamp(-max_sum_error, max_sum_error);

        let speed = kp * error + ki * state.sum_error;
        speed.max(0.0)
    }
}
