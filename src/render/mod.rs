pub mod skeleton;

#[cfg(feature = "desktop")]
pub use skeleton::draw_skeleton;
pub use skeleton::POSE_CONNECTIONS;
