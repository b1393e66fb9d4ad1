//! 関節位置ベースのスコア（類似度・正確さ・速度・結束度）

use super::stats;
use crate::kinematics::{distance, visible_centroid};
use crate::pose::{Frame, LandmarkIndex, Sequence};

use super::motion::TORSO;

/// 体の主要関節（肩・肘・手首・腰・膝・足首）
pub const KEY_JOINTS: [LandmarkIndex; 12] = [
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
    LandmarkIndex::LeftElbow,
    LandmarkIndex::RightElbow,
    LandmarkIndex::LeftWrist,
    LandmarkIndex::RightWrist,
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
    LandmarkIndex::LeftKnee,
    LandmarkIndex::RightKnee,
    LandmarkIndex::LeftAnkle,
    LandmarkIndex::RightAnkle,
];

/// 姿勢比較に使う関節（主要関節 + 鼻）
pub const COMPARISON_JOINTS: [LandmarkIndex; 13] = [
    LandmarkIndex::Nose,
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
    LandmarkIndex::LeftElbow,
    LandmarkIndex::RightElbow,
    LandmarkIndex::LeftWrist,
    LandmarkIndex::RightWrist,
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
    LandmarkIndex::LeftKnee,
    LandmarkIndex::RightKnee,
    LandmarkIndex::LeftAnkle,
    LandmarkIndex::RightAnkle,
];

/// 体格正規化の下限
const MIN_BODY_SIZE: f32 = 1.0;

/// 肩-腰間距離による体格（下限1.0）
fn body_size(frame: &Frame, threshold: f32) -> f32 {
    match (
        frame.visible(LandmarkIndex::LeftShoulder, threshold),
        frame.visible(LandmarkIndex::LeftHip, threshold),
    ) {
        (Some(shoulder), Some(hip)) => distance(shoulder.xy(), hip.xy()).max(MIN_BODY_SIZE),
        _ => MIN_BODY_SIZE,
    }
}

/// 両フレームで可視な関節の平均3D距離（共通関節がなければNone）
fn mean_joint_distance(a: &Frame, b: &Frame, joints: &[LandmarkIndex], threshold: f32) -> Option<f32> {
    let distances: Vec<f32> = joints
        .iter()
        .filter_map(|&idx| {
            let p = a.visible(idx, threshold)?;
            let q = b.visible(idx, threshold)?;
            Some(distance(p.xyz(), q.xyz()))
        })
        .collect();
    stats::mean(&distances)
}

/// 2系列の類似度 [0,100]
///
/// フレーム番号で対応付け（短い方の長さまで）、共通に可視な関節の平均距離を
/// a側の体格で正規化して 1 - min(d, 1) に変換し、フレーム平均する。
/// どちらかが空、または比較できるフレームがなければ0。
pub fn similarity(a: &Sequence, b: &Sequence, threshold: f32) -> f32 {
    let scores: Vec<f32> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(fa, fb)| {
            let d = mean_joint_distance(fa, fb, &COMPARISON_JOINTS, threshold)?;
            let normalized = d / body_size(fa, threshold);
            Some(1.0 - normalized.min(1.0))
        })
        .collect();
    match stats::mean(&scores) {
        Some(m) => (m * 100.0).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// 新規系列の参照系列に対する正確さ [0,100]
///
/// 類似度と同じ計算で、体格は参照側で正規化する。
pub fn accuracy(new: &Sequence, reference: &Sequence, threshold: f32) -> f32 {
    similarity(reference, new, threshold)
}

/// 速度スコア [0,100]
///
/// 連続する検出フレーム間の主要関節の平均3D変位 x fps を平均し、
/// speed_scale で割る。
pub fn speed(sequence: &Sequence, threshold: f32, speed_scale: f32) -> f32 {
    let fps = sequence.fps();
    let per_second: Vec<f32> = sequence
        .frames
        .windows(2)
        .filter_map(|pair| mean_joint_distance(&pair[1], &pair[0], &KEY_JOINTS, threshold))
        .map(|d| d * fps)
        .collect();
    match stats::mean(&per_second) {
        Some(avg) if speed_scale > 0.0 => (avg / speed_scale).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// 結束度スコア [0,100]
///
/// フレームごとに胴体中心から各主要関節までの2D距離の分散を求め、
/// フレーム平均を variance_scale で正規化して反転する。
pub fn cohesion(sequence: &Sequence, threshold: f32, variance_scale: f32) -> f32 {
    let variances: Vec<f32> = sequence
        .iter()
        .filter_map(|frame| {
            let center = visible_centroid(frame, &TORSO, threshold)?;
            let distances: Vec<f32> = KEY_JOINTS
                .iter()
                .filter_map(|&idx| frame.visible(idx, threshold))
                .map(|lm| distance(lm.xy(), center))
                .collect();
            stats::variance(&distances)
        })
        .collect();
    let Some(avg) = stats::mean(&variances) else {
        return 0.0;
    };
    if variance_scale <= 0.0 {
        return 0.0;
    }
    ((1.0 - (avg / variance_scale).min(1.0)) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::Landmark;

    fn frame_at(x: f32, y: f32) -> Frame {
        let mut lms = [Landmark::new(x, y, 0.0, 0.9); LandmarkIndex::COUNT];
        // 肩と腰を少しずらして体格を持たせる
        lms[LandmarkIndex::LeftShoulder as usize].y = y - 0.2;
        lms[LandmarkIndex::RightShoulder as usize].y = y - 0.2;
        lms[LandmarkIndex::LeftWrist as usize].y = y + 0.2;
        lms[LandmarkIndex::RightWrist as usize].y = y + 0.2;
        Frame::new(lms)
    }

    fn sequence(points: &[(f32, f32)]) -> Sequence {
        Sequence::new(points.iter().map(|&(x, y)| frame_at(x, y)).collect(), 30.0)
    }

    #[test]
    fn test_similarity_identity() {
        let s = sequence(&[(0.4, 0.5), (0.45, 0.5), (0.5, 0.52)]);
        assert!((similarity(&s, &s, 0.5) - 100.0).abs() < 1e-3);
        assert!((accuracy(&s, &s, 0.5) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_similarity_empty() {
        let s = sequence(&[(0.4, 0.5)]);
        assert_eq!(similarity(&s, &Sequence::default(), 0.5), 0.0);
        assert_eq!(similarity(&Sequence::default(), &s, 0.5), 0.0);
        let gaps = Sequence::new(vec![Frame::empty(); 3], 30.0);
        assert_eq!(similarity(&s, &gaps, 0.5), 0.0);
    }

    #[test]
    fn test_similarity_decreases_with_offset() {
        let a = sequence(&[(0.4, 0.5), (0.4, 0.5)]);
        let near = sequence(&[(0.45, 0.5), (0.45, 0.5)]);
        let far = sequence(&[(0.9, 0.5), (0.9, 0.5)]);
        let s_near = similarity(&a, &near, 0.5);
        let s_far = similarity(&a, &far, 0.5);
        assert!((s_near - 95.0).abs() < 1e-2);
        assert!(s_far < s_near);
    }

    #[test]
    fn test_similarity_uses_shorter_length() {
        let a = sequence(&[(0.4, 0.5), (0.4, 0.5), (0.4, 0.5)]);
        let b = sequence(&[(0.4, 0.5)]);
        assert!((similarity(&a, &b, 0.5) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_speed() {
        // 1フレーム0.01移動、30fps -> 0.3/秒 -> /10 = 0.03
        let s = sequence(&[(0.1, 0.5), (0.11, 0.5), (0.12, 0.5)]);
        assert!((speed(&s, 0.5, 10.0) - 0.03).abs() < 1e-4);
        assert_eq!(speed(&sequence(&[(0.1, 0.5)]), 0.5, 10.0), 0.0);
    }

    #[test]
    fn test_cohesion() {
        // 正規化座標では分散は小さい
        let s = sequence(&[(0.4, 0.5), (0.5, 0.5)]);
        let c = cohesion(&s, 0.5, 1000.0);
        assert!(c > 99.0 && c <= 100.0);
        assert_eq!(cohesion(&Sequence::default(), 0.5, 1000.0), 0.0);
        // 小さなスケールでは分散が効く
        assert!(cohesion(&s, 0.5, 0.001) < c);
    }
}
