//! Motion pipeline: queue, planner, conveyor and step ticker.
//!
//! ```text
//! Planner::append_block -> MoveQueue (head) -> Conveyor -> StepTicker (tail) -> Actuator
//! ```

mod block;
mod conveyor;
mod fixed;
mod planner;
mod queue;
mod ticker;
mod trapezoid;

pub use block::{
    ActuatorCoordinates, Block, RampInfo, ALPHA, BETA, GAMMA, MAX_ACTUATORS, N_PRIMARY_AXIS,
};
pub use conveyor::{Conveyor, POLL_INTERVAL_MS};
pub use fixed::FixedPoint;
pub use planner::{MoveRequest, Planner};
pub use queue::{Consumer, MoveQueue, Producer, QueueStatus};
pub use ticker::StepTicker;
pub use trapezoid::{calculate_trapezoid, max_allowable_speed, TickScale};
