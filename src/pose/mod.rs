pub mod classify;
pub mod detector;
pub mod landmark;
#[cfg(feature = "desktop")]
pub mod preprocess;
pub mod sequence;

pub use classify::{
    classify, BodyMeasurements, CentroidClassifier, Classification, PoseClass, PoseClassifier,
    RuleClassifier,
};
#[cfg(feature = "desktop")]
pub use detector::BlazePoseDetector;
pub use detector::PoseDetector;
pub use landmark::{Frame, Landmark, LandmarkIndex, MIRROR_PAIRS};
#[cfg(feature = "desktop")]
pub use preprocess::{downscale_to_width, preprocess_for_blazepose};
pub use sequence::{sanitize_fps, Sequence, DEFAULT_FPS};
