//! Control pipeline: speed regulation, steering, intersection handling and
//! the maneuvers triggered at a stop.

pub mod coordinator;
pub mod intersection;
pub mod maneuver;
pub mod regulator;
pub mod state;
pub mod steering;

pub use coordinator::{ControlLoop, TickAction};
pub use intersection::{Detection, IntersectionDetector};
pub use maneuver::{ManeuverExecutor, ManeuverOutcome};
pub use regulator::{ControllerState, SpeedRegulator};
pub use state::{IntersectionFlag, IntersectionState, RangeCheck, SharedState, SHARED};
pub use steering::{SteeringHistory, SteeringMixer, WheelSpeeds};
