use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::savgol::{savgol_filter, smoothing_window};
use super::stats;
use crate::kinematics::{distance, visible_centroid};
use crate::pose::{LandmarkIndex, Sequence};

/// 重心推定に使う胴体4点
pub const TORSO: [LandmarkIndex; 4] = [
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
];

/// 速度・加速度を追跡する部位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limb {
    CenterOfMass,
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
}

impl Limb {
    pub const ALL: [Limb; 5] = [
        Limb::CenterOfMass,
        Limb::LeftHand,
        Limb::RightHand,
        Limb::LeftFoot,
        Limb::RightFoot,
    ];

    /// 単一ランドマークで代表される部位
    pub fn landmark(self) -> Option<LandmarkIndex> {
        match self {
            Limb::CenterOfMass => None,
            Limb::LeftHand => Some(LandmarkIndex::LeftWrist),
            Limb::RightHand => Some(LandmarkIndex::RightWrist),
            Limb::LeftFoot => Some(LandmarkIndex::LeftAnkle),
            Limb::RightFoot => Some(LandmarkIndex::RightAnkle),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Limb::CenterOfMass => "center_of_mass",
            Limb::LeftHand => "left_hand",
            Limb::RightHand => "right_hand",
            Limb::LeftFoot => "left_foot",
            Limb::RightFoot => "right_foot",
        }
    }
}

impl std::fmt::Display for Limb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 部位ごとのパワー指標
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LimbPower {
    pub peak_velocity: f32,
    pub mean_velocity: f32,
    pub peak_acceleration: f32,
}

/// 重心軌跡と部位ごとの速度・加速度
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSeries {
    /// フレームごとの重心 (x, y)。1度も推定できなければ空
    pub center_of_mass: Vec<[f32; 2]>,
    /// フレーム間隔ごとの速度
    pub velocities: BTreeMap<Limb, Vec<f32>>,
    /// 連続する速度の差分 / dt
    pub accelerations: BTreeMap<Limb, Vec<f32>>,
}

/// フレームごとの重心
///
/// 推定できないフレームは直前の有効値を引き継ぎ、先頭の欠損は最初の
/// 有効値で埋める。1フレームにつき必ず1要素（全く推定できなければ空）。
pub fn center_of_mass_series(sequence: &Sequence, threshold: f32) -> Vec<[f32; 2]> {
    let raw: Vec<Option<[f32; 2]>> = sequence
        .iter()
        .map(|frame| visible_centroid(frame, &TORSO, threshold))
        .collect();
    fill_gaps(&raw)
}

/// 前方埋め + 先頭は最初の有効値で後方埋め（重心用）
fn fill_gaps<T: Copy>(raw: &[Option<T>]) -> Vec<T> {
    let Some(first) = raw.iter().flatten().next().copied() else {
        return Vec::new();
    };
    let mut last = first;
    raw.iter()
        .map(|v| {
            if let Some(v) = v {
                last = *v;
            }
            last
        })
        .collect()
}

/// 単一ランドマーク部位の速度系列
///
/// i-1 と i の両方で可視なときだけ実測し、それ以外は直前の速度を使う。
/// 最初の実測より前は0。一度も実測できなければ空。
fn landmark_velocities(sequence: &Sequence, index: LandmarkIndex, threshold: f32) -> Vec<f32> {
    let dt = sequence.dt();
    let raw: Vec<Option<f32>> = sequence
        .frames
        .windows(2)
        .map(|pair| {
            let prev = pair[0].visible(index, threshold)?;
            let curr = pair[1].visible(index, threshold)?;
            Some(distance(curr.xy(), prev.xy()) / dt)
        })
        .collect();
    carry_forward(&raw, 0.0)
}

/// 前方埋め。最初の実測より前は initial
fn carry_forward(raw: &[Option<f32>], initial: f32) -> Vec<f32> {
    if raw.iter().all(Option::is_none) {
        return Vec::new();
    }
    let mut last = initial;
    raw.iter()
        .map(|v| {
            if let Some(v) = v {
                last = *v;
            }
            last
        })
        .collect()
}

fn differentiate(values: &[f32], dt: f32) -> Vec<f32> {
    values.windows(2).map(|w| (w[1] - w[0]) / dt).collect()
}

/// 重心・手足の速度と加速度
pub fn compute_motion(sequence: &Sequence, threshold: f32) -> MotionSeries {
    let dt = sequence.dt();
    let center_of_mass = center_of_mass_series(sequence, threshold);

    let mut velocities = BTreeMap::new();
    for limb in Limb::ALL {
        let v = match limb.landmark() {
            Some(index) => landmark_velocities(sequence, index, threshold),
            None => center_of_mass
                .windows(2)
                .map(|w| distance(w[1], w[0]) / dt)
                .collect(),
        };
        velocities.insert(limb, v);
    }

    let accelerations = velocities
        .iter()
        .map(|(limb, v)| (*limb, differentiate(v, dt)))
        .collect();

    MotionSeries { center_of_mass, velocities, accelerations }
}

/// 重心の総移動量（連続する重心間距離の和）
pub fn com_displacement(com: &[[f32; 2]]) -> f32 {
    com.windows(2).map(|w| distance(w[1], w[0])).sum()
}

/// 重心位置の標準偏差 (x, y)。2点未満は (0, 0)
pub fn com_stability(com: &[[f32; 2]]) -> [f32; 2] {
    if com.len() < 2 {
        return [0.0, 0.0];
    }
    let xs: Vec<f32> = com.iter().map(|p| p[0]).collect();
    let ys: Vec<f32> = com.iter().map(|p| p[1]).collect();
    [
        stats::std_dev(&xs).unwrap_or(0.0),
        stats::std_dev(&ys).unwrap_or(0.0),
    ]
}

/// バランス: 1 / (1 + σx + σy)、[0,1]。2点未満は0
pub fn balance(com: &[[f32; 2]]) -> f32 {
    if com.len() < 2 {
        return 0.0;
    }
    let [sx, sy] = com_stability(com);
    1.0 / (1.0 + sx + sy)
}

/// 1系列の滑らかさ: 平滑化速度の2階差分（ジャーク）の標準偏差から
///
/// 窓は poly_order + 2 以上の奇数に広げる（窓 = 次数+1 では入力がそのまま
/// 残る）。5点未満、または窓が系列長を超える場合はNone。
pub fn series_smoothness(velocities: &[f32], poly_order: usize, max_window: usize) -> Option<f32> {
    if velocities.len() <= 4 {
        return None;
    }
    let min_window = (poly_order + 2) | 1;
    let window = smoothing_window(velocities.len(), max_window).max(min_window);
    if window > velocities.len() {
        return None;
    }
    let smoothed = savgol_filter(velocities, window, poly_order);
    let jerk = differentiate(&differentiate(&smoothed, 1.0), 1.0);
    let sd = stats::std_dev(&jerk)?;
    let score = 1.0 / (1.0 + sd);
    score.is_finite().then_some(score)
}

/// 部位平均の滑らかさ [0,1]。評価できる部位がなければ0
pub fn smoothness(
    velocities: &BTreeMap<Limb, Vec<f32>>,
    poly_order: usize,
    max_window: usize,
) -> f32 {
    let scores: Vec<f32> = velocities
        .values()
        .filter_map(|v| series_smoothness(v, poly_order, max_window))
        .collect();
    stats::mean(&scores).unwrap_or(0.0)
}

/// 部位ごとのピーク/平均速度とピーク加速度
pub fn power(motion: &MotionSeries) -> BTreeMap<Limb, LimbPower> {
    Limb::ALL
        .iter()
        .map(|&limb| {
            let v = motion.velocities.get(&limb).map(Vec::as_slice).unwrap_or(&[]);
            let a = motion.accelerations.get(&limb).map(Vec::as_slice).unwrap_or(&[]);
            let peak_acceleration = a.iter().map(|x| x.abs()).fold(0.0f32, f32::max);
            let p = LimbPower {
                peak_velocity: stats::max(v).unwrap_or(0.0),
                mean_velocity: stats::mean(v).unwrap_or(0.0),
                peak_acceleration,
            };
            (limb, p)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Frame, Landmark};

    /// 全ランドマークを (x, y) に置いたフレーム
    fn frame_at(x: f32, y: f32) -> Frame {
        Frame::new([Landmark::new(x, y, 0.0, 0.9); LandmarkIndex::COUNT])
    }

    #[test]
    fn test_com_carry_forward_and_backfill() {
        let seq = Sequence::new(
            vec![Frame::empty(), frame_at(0.2, 0.3), Frame::empty(), frame_at(0.4, 0.3)],
            30.0,
        );
        let com = center_of_mass_series(&seq, 0.5);
        assert_eq!(com.len(), 4);
        assert_eq!(com[0], com[1]);
        assert_eq!(com[2], com[1]);
        assert!((com[3][0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_com_empty_when_never_visible() {
        let seq = Sequence::new(vec![Frame::empty(), Frame::empty()], 30.0);
        assert!(center_of_mass_series(&seq, 0.5).is_empty());
        let motion = compute_motion(&seq, 0.5);
        assert!(motion.velocities[&Limb::CenterOfMass].is_empty());
        assert_eq!(balance(&motion.center_of_mass), 0.0);
    }

    #[test]
    fn test_velocity_constant_motion() {
        // 1フレームあたり0.01移動、10fps -> 0.1/秒
        let frames = (0..6).map(|i| frame_at(0.1 + i as f32 * 0.01, 0.5)).collect();
        let seq = Sequence::new(frames, 10.0);
        let motion = compute_motion(&seq, 0.5);
        for limb in Limb::ALL {
            let v = &motion.velocities[&limb];
            assert_eq!(v.len(), 5);
            assert!(v.iter().all(|x| (x - 0.1).abs() < 1e-4), "{:?}: {:?}", limb, v);
            let a = &motion.accelerations[&limb];
            assert_eq!(a.len(), 4);
            assert!(a.iter().all(|x| x.abs() < 1e-2));
        }
    }

    #[test]
    fn test_limb_velocity_falls_back_to_previous() {
        let mut hidden = [Landmark::new(0.3, 0.5, 0.0, 0.9); LandmarkIndex::COUNT];
        hidden[LandmarkIndex::LeftWrist as usize].visibility = 0.1;
        let seq = Sequence::new(
            vec![frame_at(0.1, 0.5), frame_at(0.2, 0.5), Frame::new(hidden), frame_at(0.4, 0.5)],
            1.0,
        );
        let motion = compute_motion(&seq, 0.5);
        let v = &motion.velocities[&Limb::LeftHand];
        assert_eq!(v.len(), 3);
        assert!((v[0] - 0.1).abs() < 1e-5);
        assert_eq!(v[1], v[0]);
        assert_eq!(v[2], v[0]);
    }

    #[test]
    fn test_limb_velocity_before_first_sighting_is_zero() {
        let mut hidden = [Landmark::new(0.1, 0.5, 0.0, 0.9); LandmarkIndex::COUNT];
        hidden[LandmarkIndex::RightWrist as usize].visibility = 0.1;
        let seq = Sequence::new(
            vec![Frame::new(hidden), frame_at(0.2, 0.5), frame_at(0.4, 0.5), frame_at(0.6, 0.5)],
            1.0,
        );
        let motion = compute_motion(&seq, 0.5);
        let v = &motion.velocities[&Limb::RightHand];
        assert_eq!(v.len(), 3);
        assert_eq!(v[0], 0.0);
        assert!((v[1] - 0.2).abs() < 1e-5);
        assert!((v[2] - 0.2).abs() < 1e-5);
        // 重心は先頭も最初の有効値で埋める
        assert_eq!(motion.center_of_mass.len(), 4);
    }

    #[test]
    fn test_balance_still_is_one() {
        let com = vec![[0.5, 0.5]; 10];
        assert!((balance(&com) - 1.0).abs() < 1e-6);
        let moving: Vec<[f32; 2]> = (0..10).map(|i| [i as f32 * 0.1, 0.5]).collect();
        assert!(balance(&moving) < 1.0);
        assert_eq!(balance(&[[0.5, 0.5]]), 0.0);
    }

    #[test]
    fn test_com_displacement() {
        let com = vec![[0.0, 0.0], [3.0, 4.0], [3.0, 5.0]];
        assert!((com_displacement(&com) - 6.0).abs() < 1e-6);
        assert_eq!(com_displacement(&[]), 0.0);
    }

    #[test]
    fn test_smoothness_constant_vs_noisy() {
        let steady = vec![0.5f32; 30];
        let noisy: Vec<f32> = (0..30).map(|i| if i % 2 == 0 { 0.8 } else { 0.2 }).collect();
        let s = series_smoothness(&steady, 3, 11).unwrap();
        let n = series_smoothness(&noisy, 3, 11).unwrap();
        assert!((s - 1.0).abs() < 1e-5);
        assert!(n < s);
    }

    #[test]
    fn test_short_series_is_filtered() {
        // 6点でも窓5・3次で平滑化され、生のジャークより小さくなる
        let noisy = [0.8f32, 0.2, 0.8, 0.2, 0.8, 0.2];
        let raw_jerk = differentiate(&differentiate(&noisy, 1.0), 1.0);
        let raw_score = 1.0 / (1.0 + stats::std_dev(&raw_jerk).unwrap());
        let score = series_smoothness(&noisy, 3, 11).unwrap();
        assert!(raw_score < 0.5);
        assert!(score > 0.7, "{}", score);
    }

    #[test]
    fn test_smoothness_too_short() {
        assert!(series_smoothness(&[0.1, 0.2, 0.3, 0.4], 3, 11).is_none());
        let empty: BTreeMap<Limb, Vec<f32>> = Limb::ALL.iter().map(|&l| (l, Vec::new())).collect();
        assert_eq!(smoothness(&empty, 3, 11), 0.0);
    }

    #[test]
    fn test_power() {
        let mut motion = MotionSeries::default();
        motion.velocities.insert(Limb::LeftHand, vec![1.0, 3.0, 2.0]);
        motion.accelerations.insert(Limb::LeftHand, vec![2.0, -5.0]);
        let p = power(&motion);
        assert_eq!(p.len(), Limb::ALL.len());
        let hand = p[&Limb::LeftHand];
        assert_eq!(hand.peak_velocity, 3.0);
        assert!((hand.mean_velocity - 2.0).abs() < 1e-6);
        assert_eq!(hand.peak_acceleration, 5.0);
        assert_eq!(p[&Limb::RightFoot], LimbPower::default());
    }
}
