//! リクエスト単位で拒否する入力のエラー
//!
//! 指標ごとのデータ不足はここに出さず、中立スコアで返す。

use thiserror::Error;

use crate::pose::LandmarkIndex;

/// 姿勢検出の境界から来たフレームが33点の形式に合わない
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("expected {expected} landmarks, got {actual}")]
    WrongLandmarkCount { expected: usize, actual: usize },

    #[error("landmark {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

/// 再構成できない多視点三角測量リクエスト
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TriangulationError {
    #[error("need at least {min} views with a detected pose, got {valid}")]
    TooFewViews { valid: usize, min: usize },

    #[error("at most {max} views are supported, got {got}")]
    TooManyViews { got: usize, max: usize },

    #[error("{views} views were supplied with {cameras} camera projections")]
    CameraCountMismatch { views: usize, cameras: usize },
}

impl FrameError {
    /// エラーの対象ランドマーク（あれば）
    pub fn landmark(&self) -> Option<LandmarkIndex> {
        match self {
            Self::NonFiniteCoordinate { index } => LandmarkIndex::from_index(*index),
            Self::WrongLandmarkCount { .. } => None,
        }
    }
}
