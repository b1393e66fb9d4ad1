//! 単一フレームの姿勢分類
//!
//! 関節角によるルール分類と、学習済みモデルを差し込むための
//! [`PoseClassifier`] 境界。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::landmark::{Frame, LandmarkIndex};
use crate::kinematics::{distance, landmark_angle};

/// 腕・脚が伸びているとみなす角度
const STRAIGHT_ANGLE: f32 = 160.0;
/// 座位とみなす膝角の上限
const SITTING_KNEE_ANGLE: f32 = 120.0;
/// T字で手首と肩の高さが揃っているとみなす差
const HORIZONTAL_TOLERANCE: f32 = 0.1;

const ARMS: [LandmarkIndex; 6] = [
    LandmarkIndex::LeftShoulder,
    LandmarkIndex::RightShoulder,
    LandmarkIndex::LeftElbow,
    LandmarkIndex::RightElbow,
    LandmarkIndex::LeftWrist,
    LandmarkIndex::RightWrist,
];

const LEGS: [LandmarkIndex; 6] = [
    LandmarkIndex::LeftHip,
    LandmarkIndex::RightHip,
    LandmarkIndex::LeftKnee,
    LandmarkIndex::RightKnee,
    LandmarkIndex::LeftAnkle,
    LandmarkIndex::RightAnkle,
];

/// ルール分類の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseClass {
    TPose,
    ArmsRaised,
    Sitting,
    Standing,
    Unknown,
}

impl PoseClass {
    pub fn name(self) -> &'static str {
        match self {
            PoseClass::TPose => "t_pose",
            PoseClass::ArmsRaised => "arms_raised",
            PoseClass::Sitting => "sitting",
            PoseClass::Standing => "standing",
            PoseClass::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PoseClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn all_visible(frame: &Frame, indices: &[LandmarkIndex], threshold: f32) -> bool {
    indices.iter().all(|&i| frame.visible(i, threshold).is_some())
}

/// 関節角と手首の高さによるルール分類
///
/// 腕（肩・肘・手首）と脚（腰・膝・足首）のどちらも揃っていなければ None。
/// 判定順は T字 → 両手挙上 → 座位 → 立位、どれにも当たらなければ Unknown。
pub fn classify(frame: &Frame, threshold: f32) -> Option<PoseClass> {
    use LandmarkIndex::*;

    let arms = all_visible(frame, &ARMS, threshold);
    let legs = all_visible(frame, &LEGS, threshold);
    if !arms && !legs {
        return None;
    }

    if arms {
        let y = |i: LandmarkIndex| frame.get(i).map(|lm| lm.y).unwrap_or_default();
        let left_elbow = landmark_angle(frame, LeftShoulder, LeftElbow, LeftWrist, threshold);
        let right_elbow = landmark_angle(frame, RightShoulder, RightElbow, RightWrist, threshold);
        let straight = matches!(
            (left_elbow, right_elbow),
            (Some(l), Some(r)) if l > STRAIGHT_ANGLE && r > STRAIGHT_ANGLE
        );
        let level = (y(LeftShoulder) - y(LeftWrist)).abs() < HORIZONTAL_TOLERANCE
            && (y(RightShoulder) - y(RightWrist)).abs() < HORIZONTAL_TOLERANCE;
        if straight && level {
            return Some(PoseClass::TPose);
        }
        // 画像座標は下向きが正
        if y(LeftWrist) < y(LeftShoulder) && y(RightWrist) < y(RightShoulder) {
            return Some(PoseClass::ArmsRaised);
        }
    }

    if legs {
        let left = landmark_angle(frame, LeftHip, LeftKnee, LeftAnkle, threshold);
        let right = landmark_angle(frame, RightHip, RightKnee, RightAnkle, threshold);
        if let (Some(l), Some(r)) = (left, right) {
            if l < SITTING_KNEE_ANGLE && r < SITTING_KNEE_ANGLE {
                return Some(PoseClass::Sitting);
            }
            if l > STRAIGHT_ANGLE && r > STRAIGHT_ANGLE {
                return Some(PoseClass::Standing);
            }
        }
    }

    Some(PoseClass::Unknown)
}

/// 正規化座標での体格寸法。測れない項目は None
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub shoulder_width: Option<f32>,
    pub hip_width: Option<f32>,
    /// 鼻と両足首の平均の縦方向距離
    pub body_height: Option<f32>,
}

impl BodyMeasurements {
    pub fn from_frame(frame: &Frame, threshold: f32) -> Self {
        use LandmarkIndex::*;

        let width = |a: LandmarkIndex, b: LandmarkIndex| {
            let a = frame.visible(a, threshold)?;
            let b = frame.visible(b, threshold)?;
            Some(distance(a.xy(), b.xy()))
        };
        let body_height = (|| {
            let nose = frame.visible(Nose, threshold)?;
            let left = frame.visible(LeftAnkle, threshold)?;
            let right = frame.visible(RightAnkle, threshold)?;
            Some((nose.y - (left.y + right.y) / 2.0).abs())
        })();

        Self {
            shoulder_width: width(LeftShoulder, RightShoulder),
            hip_width: width(LeftHip, RightHip),
            body_height,
        }
    }
}

/// 分類器の出力
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub pose: String,
    pub confidence: f32,
    pub probabilities: BTreeMap<String, f32>,
}

/// 姿勢分類の境界
///
/// 未検出フレームには Ok(None) を返す。モデルは呼び出し側が明示的に
/// 読み込んで渡す。
pub trait PoseClassifier {
    fn classify(&self, frame: &Frame) -> Result<Option<Classification>>;
}

impl<F> PoseClassifier for F
where
    F: Fn(&Frame) -> Result<Option<Classification>>,
{
    fn classify(&self, frame: &Frame) -> Result<Option<Classification>> {
        self(frame)
    }
}

/// ルール分類をそのまま分類器として使う
pub struct RuleClassifier {
    pub threshold: f32,
}

impl PoseClassifier for RuleClassifier {
    fn classify(&self, frame: &Frame) -> Result<Option<Classification>> {
        Ok(classify(frame, self.threshold).map(|class| Classification {
            pose: class.name().to_string(),
            confidence: 1.0,
            probabilities: BTreeMap::from([(class.name().to_string(), 1.0)]),
        }))
    }
}

/// 1ランドマークあたりの特徴量 (x, y, z, visibility)
const FEATURES_PER_LANDMARK: usize = 4;
pub const FEATURE_COUNT: usize = LandmarkIndex::COUNT * FEATURES_PER_LANDMARK;

/// フレームを特徴ベクトルに展開（未検出なら None）
pub fn pose_features(frame: &Frame) -> Option<Vec<f32>> {
    let landmarks = frame.landmarks()?;
    Some(
        landmarks
            .iter()
            .flat_map(|lm| [lm.x, lm.y, lm.z, lm.visibility])
            .collect(),
    )
}

/// 特徴量の標準化 (x - mean) / scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

/// 学習済みモデルのファイル形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    pub pose_classes: Vec<String>,
    /// クラスごとの特徴量重心（pose_classes と同順）
    pub centroids: Vec<Vec<f32>>,
    #[serde(default)]
    pub scaler: Option<FeatureScaler>,
}

/// 最近傍重心による学習済み分類器
///
/// 確率は重心までの距離の負値の softmax。
#[derive(Debug, Clone)]
pub struct CentroidClassifier {
    model: CentroidModel,
}

impl CentroidClassifier {
    /// JSONモデルを読み込んで初期化
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read classifier model: {}", path.display()))?;
        let model: CentroidModel = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse classifier model: {}", path.display()))?;
        let classifier = Self::from_model(model)?;
        tracing::info!(
            model = %path.display(),
            classes = classifier.model.pose_classes.len(),
            "pose classifier loaded"
        );
        Ok(classifier)
    }

    /// 次元を検証して構築
    pub fn from_model(model: CentroidModel) -> Result<Self> {
        if model.pose_classes.is_empty() {
            anyhow::bail!("classifier model has no classes");
        }
        if model.pose_classes.len() != model.centroids.len() {
            anyhow::bail!(
                "{} classes but {} centroids",
                model.pose_classes.len(),
                model.centroids.len()
            );
        }
        if let Some(bad) = model.centroids.iter().position(|c| c.len() != FEATURE_COUNT) {
            anyhow::bail!(
                "centroid {} has {} features, expected {}",
                bad,
                model.centroids[bad].len(),
                FEATURE_COUNT
            );
        }
        if let Some(scaler) = &model.scaler {
            if scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
                anyhow::bail!("scaler must have {} features", FEATURE_COUNT);
            }
            if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                anyhow::bail!("scaler has a zero or non-finite scale");
            }
        }
        Ok(Self { model })
    }

    pub fn classes(&self) -> &[String] {
        &self.model.pose_classes
    }

    fn scaled(&self, features: Vec<f32>) -> Vec<f32> {
        match &self.model.scaler {
            Some(s) => features
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(x, (m, sc))| (x - m) / sc)
                .collect(),
            None => features,
        }
    }
}

impl PoseClassifier for CentroidClassifier {
    fn classify(&self, frame: &Frame) -> Result<Option<Classification>> {
        let Some(features) = pose_features(frame) else {
            return Ok(None);
        };
        let features = self.scaled(features);
        let distances: Vec<f32> = self
            .model
            .centroids
            .iter()
            .map(|c| {
                features
                    .iter()
                    .zip(c)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt()
            })
            .collect();

        let nearest = distances.iter().copied().fold(f32::INFINITY, f32::min);
        if !nearest.is_finite() {
            anyhow::bail!("classifier distances are not finite");
        }
        let weights: Vec<f32> = distances.iter().map(|d| (nearest - d).exp()).collect();
        let total: f32 = weights.iter().sum();

        let probabilities: BTreeMap<String, f32> = self
            .model
            .pose_classes
            .iter()
            .cloned()
            .zip(weights.iter().map(|w| w / total))
            .collect();
        let best = distances
            .iter()
            .position(|d| *d == nearest)
            .context("classifier produced no prediction")?;
        let pose = self.model.pose_classes[best].clone();
        let confidence = probabilities.get(&pose).copied().unwrap_or_default();

        Ok(Some(Classification { pose, confidence, probabilities }))
    }
}
