pub mod analysis;
pub mod compare;
pub mod config;
pub mod error;
pub mod kinematics;
pub mod pose;
pub mod protocol;
pub mod render;
pub mod report;
pub mod tracker;
pub mod triangulation;
#[cfg(feature = "desktop")]
pub mod video;
