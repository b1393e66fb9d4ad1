pub mod joints;
pub mod metrics;
pub mod motion;
pub mod savgol;
pub mod similarity;
pub mod stats;

pub use joints::{joint_angle_series, range_of_motion, JointAngle};
pub use metrics::{symmetry, MetricEngine, MetricResult, MetricSeries, SymmetryScores, NEUTRAL_SYMMETRY};
pub use motion::{compute_motion, Limb, LimbPower, MotionSeries};
pub use similarity::{accuracy, cohesion, similarity, speed, COMPARISON_JOINTS, KEY_JOINTS};
