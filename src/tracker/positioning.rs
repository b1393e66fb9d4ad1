use serde::{Deserialize, Serialize};

use crate::config::LiveConfig;
use crate::pose::{Frame, LandmarkIndex};

/// 立ち位置の案内
///
/// 左右は非ミラーのカメラ座標基準。腰が画像左側 (x < 下限) なら MoveRight。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Positioning {
    /// 姿勢が検出されない
    NotDetected,
    /// 腰が見えない
    MoveCloser,
    MoveRight,
    MoveLeft,
    Centered,
}

impl Positioning {
    pub fn is_ready(self) -> bool {
        self == Positioning::Centered
    }

    pub fn message(self) -> &'static str {
        match self {
            Positioning::NotDetected => "not detected",
            Positioning::MoveCloser => "move closer",
            Positioning::MoveRight => "right",
            Positioning::MoveLeft => "left",
            Positioning::Centered => "center",
        }
    }
}

/// 腰ランドマークによる立ち位置判定
#[derive(Debug, Clone)]
pub struct PositioningCheck {
    hip: LandmarkIndex,
    min_x: f32,
    max_x: f32,
    min_visibility: f32,
}

impl PositioningCheck {
    pub fn new(min_x: f32, max_x: f32, min_visibility: f32) -> Self {
        Self { hip: LandmarkIndex::LeftHip, min_x, max_x, min_visibility }
    }

    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(config.hip_min_x, config.hip_max_x, config.hip_visibility)
    }

    /// 可視性は閾値以上で可視、X は [min_x, max_x] で中央
    pub fn check(&self, frame: &Frame) -> Positioning {
        let Some(hip) = frame.get(self.hip) else {
            return Positioning::NotDetected;
        };
        if hip.visibility < self.min_visibility {
            return Positioning::MoveCloser;
        }
        if hip.x < self.min_x {
            Positioning::MoveRight
        } else if hip.x > self.max_x {
            Positioning::MoveLeft
        } else {
            Positioning::Centered
        }
    }
}

impl Default for PositioningCheck {
    fn default() -> Self {
        Self::from_config(&LiveConfig::default())
    }
}
