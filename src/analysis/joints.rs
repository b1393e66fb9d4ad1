use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kinematics::{angle, landmark_angle, midpoint};
use crate::pose::{Frame, LandmarkIndex, Sequence};

/// 体幹傾斜の鉛直基準点（腰中点からの上方向オフセット、正規化座標）
const TRUNK_REFERENCE_OFFSET: f32 = 0.1;

/// 時系列で追跡する関節角
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointAngle {
    LeftElbow,
    RightElbow,
    LeftKnee,
    RightKnee,
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    TrunkLean,
}

impl JointAngle {
    pub const ALL: [JointAngle; 9] = [
        JointAngle::LeftElbow,
        JointAngle::RightElbow,
        JointAngle::LeftKnee,
        JointAngle::RightKnee,
        JointAngle::LeftShoulder,
        JointAngle::RightShoulder,
        JointAngle::LeftHip,
        JointAngle::RightHip,
        JointAngle::TrunkLean,
    ];

    /// (端点, 頂点, 端点)。体幹傾斜は固定の3点ではないのでNone
    pub fn triple(self) -> Option<(LandmarkIndex, LandmarkIndex, LandmarkIndex)> {
        use LandmarkIndex::*;
        match self {
            JointAngle::LeftElbow => Some((LeftShoulder, LeftElbow, LeftWrist)),
            JointAngle::RightElbow => Some((RightShoulder, RightElbow, RightWrist)),
            JointAngle::LeftKnee => Some((LeftHip, LeftKnee, LeftAnkle)),
            JointAngle::RightKnee => Some((RightHip, RightKnee, RightAnkle)),
            JointAngle::LeftShoulder => Some((LeftElbow, LeftShoulder, LeftHip)),
            JointAngle::RightShoulder => Some((RightElbow, RightShoulder, RightHip)),
            JointAngle::LeftHip => Some((LeftShoulder, LeftHip, LeftKnee)),
            JointAngle::RightHip => Some((RightShoulder, RightHip, RightKnee)),
            JointAngle::TrunkLean => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JointAngle::LeftElbow => "left_elbow",
            JointAngle::RightElbow => "right_elbow",
            JointAngle::LeftKnee => "left_knee",
            JointAngle::RightKnee => "right_knee",
            JointAngle::LeftShoulder => "left_shoulder",
            JointAngle::RightShoulder => "right_shoulder",
            JointAngle::LeftHip => "left_hip",
            JointAngle::RightHip => "right_hip",
            JointAngle::TrunkLean => "trunk_lean",
        }
    }

    /// 1フレームでの角度。必要なランドマークが1つでも不可視ならNone
    pub fn measure(self, frame: &Frame, threshold: f32) -> Option<f32> {
        match self.triple() {
            Some((a, b, c)) => landmark_angle(frame, a, b, c, threshold),
            None => trunk_lean(frame, threshold),
        }
    }
}

impl std::fmt::Display for JointAngle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 腰中点から真上の基準点と鼻のなす角
fn trunk_lean(frame: &Frame, threshold: f32) -> Option<f32> {
    let nose = frame.visible(LandmarkIndex::Nose, threshold)?;
    let left_hip = frame.visible(LandmarkIndex::LeftHip, threshold)?;
    let right_hip = frame.visible(LandmarkIndex::RightHip, threshold)?;
    let mid_hip = midpoint(left_hip.xy(), right_hip.xy());
    // 画像座標はyが下向き
    let vertical = [mid_hip[0], mid_hip[1] - TRUNK_REFERENCE_OFFSET];
    Some(angle(vertical, mid_hip, nose.xy()))
}

/// 関節ごとの角度時系列
///
/// 不可視フレームは0埋めせず系列から除く。全関節のキーが必ず存在する。
pub fn joint_angle_series(sequence: &Sequence, threshold: f32) -> BTreeMap<JointAngle, Vec<f32>> {
    let mut series: BTreeMap<JointAngle, Vec<f32>> =
        JointAngle::ALL.iter().map(|&j| (j, Vec::new())).collect();
    for frame in sequence.iter() {
        for joint in JointAngle::ALL {
            if let Some(a) = joint.measure(frame, threshold) {
                series.entry(joint).or_default().push(a);
            }
        }
    }
    series
}

/// 同じフレームで左右両方が測れた角度のペア
pub fn paired_angles(
    sequence: &Sequence,
    left: JointAngle,
    right: JointAngle,
    threshold: f32,
) -> (Vec<f32>, Vec<f32>) {
    sequence
        .iter()
        .filter_map(|frame| Some((left.measure(frame, threshold)?, right.measure(frame, threshold)?)))
        .unzip()
}

/// 可動域: max - min（2サンプル未満は0）
pub fn range_of_motion(angles: &[f32]) -> f32 {
    if angles.len() < 2 {
        return 0.0;
    }
    let max = angles.iter().copied().fold(f32::MIN, f32::max);
    let min = angles.iter().copied().fold(f32::MAX, f32::min);
    max - min
}
