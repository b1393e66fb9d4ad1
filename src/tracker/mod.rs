pub mod live;
pub mod positioning;
pub mod reps;

pub use live::{FrameThrottle, LiveTracker, TrackerState, TrackerUpdate};
pub use positioning::{Positioning, PositioningCheck};
pub use reps::RepCounter;
