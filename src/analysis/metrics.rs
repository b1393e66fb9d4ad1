use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::joints::{joint_angle_series, paired_angles, range_of_motion, JointAngle};
use super::motion::{self, Limb, LimbPower};
use super::similarity;
use super::stats;
use crate::config::ScoringConfig;
use crate::pose::Sequence;

/// 左右相関が計算できないときの値（「不明/中程度」）
pub const NEUTRAL_SYMMETRY: f32 = 0.5;

/// 左右対称性 [0,100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymmetryScores {
    /// 肘角の左右相関
    pub arm: f32,
    /// 膝角の左右相関
    pub leg: f32,
}

impl SymmetryScores {
    pub fn mean(&self) -> f32 {
        (self.arm + self.leg) / 2.0
    }
}

/// 可視化用の時系列
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSeries {
    pub joint_angles: BTreeMap<JointAngle, Vec<f32>>,
    pub velocities: BTreeMap<Limb, Vec<f32>>,
    pub accelerations: BTreeMap<Limb, Vec<f32>>,
    pub center_of_mass: Vec<[f32; 2]>,
}

/// 1系列の解析結果
///
/// スコアはすべて [0,100] にクランプ済み。計算できない指標は
/// 中立値（0、対称性は50）で埋まり、欠けるフィールドはない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub fps: f32,
    pub frame_count: usize,
    pub detected_frames: usize,

    pub overall: f32,
    pub smoothness: f32,
    pub balance: f32,
    pub symmetry: SymmetryScores,
    pub speed: f32,
    pub cohesion: f32,
    /// 参照系列との類似度（参照なしなら自己類似度）
    pub similarity: f32,
    /// 参照系列に対する正確さ（参照なしなら自己正確さ）
    pub accuracy: f32,

    pub power: BTreeMap<Limb, LimbPower>,
    /// 関節ごとの可動域（度）
    pub range_of_motion: BTreeMap<JointAngle, f32>,
    /// 重心の総移動量
    pub com_displacement: f32,
    /// 重心位置の標準偏差 (x, y)
    pub com_stability: [f32; 2],

    pub series: MetricSeries,
}

/// 左右の角度系列の対称性 [0,1]
///
/// ピアソン相関の負値は0に切り上げる。ペアが2未満または分散0なら0.5。
pub fn symmetry(left: &[f32], right: &[f32]) -> f32 {
    match stats::pearson(left, right) {
        Some(r) => r.max(0.0),
        None => NEUTRAL_SYMMETRY,
    }
}

/// 総合スコア [0,1]
///
/// バランス・滑らかさ・対称性平均・パワー項を各25%で合成し、1.0で頭打ち。
/// パワー項は部位のピーク速度平均 x power_velocity_scale（上限1.0）。
pub fn overall_score(
    balance: f32,
    smoothness: f32,
    symmetry_mean: f32,
    power: &BTreeMap<Limb, LimbPower>,
    power_velocity_scale: f32,
) -> f32 {
    let peaks: Vec<f32> = power.values().map(|p| p.peak_velocity).collect();
    let power_score = (stats::mean(&peaks).unwrap_or(0.0) * power_velocity_scale).min(1.0);
    let overall = 0.25 * balance + 0.25 * smoothness + 0.25 * symmetry_mean + 0.25 * power_score;
    overall.min(1.0)
}

/// [0,1] のスコアを [0,100] に
fn percent(score: f32) -> f32 {
    if score.is_finite() {
        (score * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Sequence から MetricResult を計算するエンジン
///
/// 状態を持たない純粋計算。並列に呼び出してよい。
#[derive(Debug, Clone, Default)]
pub struct MetricEngine {
    config: ScoringConfig,
}

impl MetricEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// 単独解析（類似度・正確さは自分自身に対して）
    pub fn analyze(&self, sequence: &Sequence) -> MetricResult {
        self.analyze_with_reference(sequence, sequence)
    }

    /// 参照系列に対する類似度・正確さを含めて解析
    pub fn analyze_against(&self, sequence: &Sequence, reference: &Sequence) -> MetricResult {
        self.analyze_with_reference(sequence, reference)
    }

    fn analyze_with_reference(&self, sequence: &Sequence, reference: &Sequence) -> MetricResult {
        let cfg = &self.config;
        let threshold = cfg.visibility_threshold;

        let joint_angles = joint_angle_series(sequence, threshold);
        let motion = motion::compute_motion(sequence, threshold);

        let (left_arm, right_arm) =
            paired_angles(sequence, JointAngle::LeftElbow, JointAngle::RightElbow, threshold);
        let (left_leg, right_leg) =
            paired_angles(sequence, JointAngle::LeftKnee, JointAngle::RightKnee, threshold);
        let arm = symmetry(&left_arm, &right_arm);
        let leg = symmetry(&left_leg, &right_leg);

        let balance = motion::balance(&motion.center_of_mass);
        let smoothness =
            motion::smoothness(&motion.velocities, cfg.savgol_poly_order, cfg.savgol_max_window);
        let power = motion::power(&motion);
        let overall = overall_score(balance, smoothness, (arm + leg) / 2.0, &power, cfg.power_velocity_scale);

        let range_of_motion = joint_angles
            .iter()
            .map(|(joint, angles)| (*joint, range_of_motion(angles)))
            .collect();

        let speed = similarity::speed(sequence, threshold, cfg.speed_scale);
        let cohesion = similarity::cohesion(sequence, threshold, cfg.cohesion_variance_scale);
        let similarity_score = similarity::similarity(reference, sequence, threshold);
        let accuracy = similarity::accuracy(sequence, reference, threshold);

        debug!(
            frames = sequence.len(),
            detected = sequence.detected_frames(),
            balance,
            smoothness,
            arm_symmetry = arm,
            leg_symmetry = leg,
            "sequence analyzed"
        );

        MetricResult {
            fps: sequence.fps(),
            frame_count: sequence.len(),
            detected_frames: sequence.detected_frames(),
            overall: percent(overall),
            smoothness: percent(smoothness),
            balance: percent(balance),
            symmetry: SymmetryScores { arm: percent(arm), leg: percent(leg) },
            speed,
            cohesion,
            similarity: similarity_score,
            accuracy,
            power,
            range_of_motion,
            com_displacement: motion::com_displacement(&motion.center_of_mass),
            com_stability: motion::com_stability(&motion.center_of_mass),
            series: MetricSeries {
                joint_angles,
                velocities: motion.velocities,
                accelerations: motion.accelerations,
                center_of_mass: motion.center_of_mass,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Frame, Landmark, LandmarkIndex};

    #[test]
    fn test_symmetry_mirrored_series() {
        let left = [90.0, 120.0, 150.0, 120.0, 90.0];
        assert!((symmetry(&left, &left) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_symmetry_anticorrelated_is_zero() {
        let left = [90.0, 120.0, 150.0, 120.0, 90.0];
        let right = [150.0, 120.0, 90.0, 120.0, 150.0];
        assert_eq!(symmetry(&left, &right), 0.0);
    }

    #[test]
    fn test_symmetry_insufficient_data() {
        assert_eq!(symmetry(&[], &[]), NEUTRAL_SYMMETRY);
        assert_eq!(symmetry(&[90.0], &[90.0]), NEUTRAL_SYMMETRY);
    }

    #[test]
    fn test_symmetry_constant_series_is_neutral() {
        // 分散0では相関が定義できないので中立値
        let still = [175.0; 8];
        let moving = [90.0, 120.0, 150.0, 120.0, 90.0, 120.0, 150.0, 120.0];
        assert_eq!(symmetry(&still, &still), NEUTRAL_SYMMETRY);
        assert_eq!(symmetry(&still, &moving), NEUTRAL_SYMMETRY);
    }

    #[test]
    fn test_overall_capped() {
        let mut power = BTreeMap::new();
        power.insert(Limb::LeftHand, LimbPower { peak_velocity: 5.0, ..Default::default() });
        assert_eq!(overall_score(1.0, 1.0, 1.0, &power, 10.0), 1.0);
        let empty = BTreeMap::new();
        assert!((overall_score(1.0, 0.0, 0.0, &empty, 10.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_empty_sequence_is_neutral() {
        let engine = MetricEngine::default();
        let result = engine.analyze(&Sequence::default());
        assert_eq!(result.frame_count, 0);
        assert_eq!(result.smoothness, 0.0);
        assert_eq!(result.balance, 0.0);
        assert_eq!(result.speed, 0.0);
        assert_eq!(result.cohesion, 0.0);
        assert_eq!(result.similarity, 0.0);
        assert_eq!(result.symmetry.arm, 50.0);
        assert_eq!(result.symmetry.leg, 50.0);
        assert_eq!(result.range_of_motion.len(), JointAngle::ALL.len());
        assert_eq!(result.power.len(), Limb::ALL.len());
        assert!(result.overall.is_finite());
    }

    #[test]
    fn test_still_pose() {
        let frame = Frame::new([Landmark::new(0.5, 0.5, 0.0, 0.9); LandmarkIndex::COUNT]);
        let seq = Sequence::new(vec![frame; 20], 30.0);
        let result = MetricEngine::default().analyze(&seq);
        assert_eq!(result.detected_frames, 20);
        assert!((result.balance - 100.0).abs() < 1e-3);
        assert!((result.smoothness - 100.0).abs() < 1e-3);
        assert!((result.similarity - 100.0).abs() < 1e-3);
        assert_eq!(result.speed, 0.0);
        assert_eq!(result.com_displacement, 0.0);
    }

    #[test]
    fn test_result_serializes_with_named_keys() {
        let result = MetricEngine::default().analyze(&Sequence::default());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["range_of_motion"]["trunk_lean"].is_number());
        assert!(json["power"]["center_of_mass"]["peak_velocity"].is_number());
        assert!(json["series"]["joint_angles"]["left_elbow"].is_array());
    }
}
