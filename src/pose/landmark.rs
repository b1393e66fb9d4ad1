use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// 33ランドマーク姿勢スキーマのインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum LandmarkIndex {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl LandmarkIndex {
    pub const COUNT: usize = 33;

    pub const ALL: [LandmarkIndex; Self::COUNT] = {
        use LandmarkIndex::*;
        [
            Nose, LeftEyeInner, LeftEye, LeftEyeOuter, RightEyeInner, RightEye, RightEyeOuter,
            LeftEar, RightEar, MouthLeft, MouthRight,
            LeftShoulder, RightShoulder, LeftElbow, RightElbow, LeftWrist, RightWrist,
            LeftPinky, RightPinky, LeftIndex, RightIndex, LeftThumb, RightThumb,
            LeftHip, RightHip, LeftKnee, RightKnee, LeftAnkle, RightAnkle,
            LeftHeel, RightHeel, LeftFootIndex, RightFootIndex,
        ]
    };

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// 左右対応ランドマーク (左, 右)
pub const MIRROR_PAIRS: [(LandmarkIndex, LandmarkIndex); 16] = {
    use LandmarkIndex::*;
    [
        (LeftEyeInner, RightEyeInner),
        (LeftEye, RightEye),
        (LeftEyeOuter, RightEyeOuter),
        (LeftEar, RightEar),
        (MouthLeft, MouthRight),
        (LeftShoulder, RightShoulder),
        (LeftElbow, RightElbow),
        (LeftWrist, RightWrist),
        (LeftPinky, RightPinky),
        (LeftIndex, RightIndex),
        (LeftThumb, RightThumb),
        (LeftHip, RightHip),
        (LeftKnee, RightKnee),
        (LeftAnkle, RightAnkle),
        (LeftHeel, RightHeel),
        (LeftFootIndex, RightFootIndex),
    ]
};

/// 単一ランドマーク
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    /// 正規化されたX座標 (0.0〜1.0)、3D再構成ではメートル
    pub x: f32,
    /// 正規化されたY座標 (0.0〜1.0)、3D再構成ではメートル
    pub y: f32,
    /// 相対深度
    pub z: f32,
    /// 可視性スコア (0.0〜1.0)
    pub visibility: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self { x, y, z, visibility }
    }

    /// 可視性が閾値を超えているか（閾値ちょうどは不可視）
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility > threshold
    }

    pub fn xy(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    pub fn xyz(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// ピクセル座標に変換
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        let px = (self.x * width as f32) as i32;
        let py = (self.y * height as f32) as i32;
        (px, py)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_finite()
    }
}

/// 1フレーム分の検出結果
///
/// 座標はカメラ画像そのままの向き（非ミラー）。表示用のミラー変換は
/// [`Frame::mirrored`] で境界側が一度だけ行う。
///
/// シリアライズ形式はランドマークの配列。空配列は「姿勢未検出」。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Landmark>", into = "Vec<Landmark>")]
pub struct Frame {
    landmarks: Option<[Landmark; LandmarkIndex::COUNT]>,
}

impl Frame {
    pub fn new(landmarks: [Landmark; LandmarkIndex::COUNT]) -> Self {
        Self { landmarks: Some(landmarks) }
    }

    /// 姿勢未検出フレーム
    pub fn empty() -> Self {
        Self { landmarks: None }
    }

    /// 境界からの入力を検証して構築
    ///
    /// 空のVecは未検出フレーム。33個以外や非有限値はエラー。
    pub fn from_landmarks(landmarks: Vec<Landmark>) -> Result<Self, FrameError> {
        if landmarks.is_empty() {
            return Ok(Self::empty());
        }
        let actual = landmarks.len();
        let landmarks: [Landmark; LandmarkIndex::COUNT] =
            landmarks.try_into().map_err(|_| FrameError::WrongLandmarkCount {
                expected: LandmarkIndex::COUNT,
                actual,
            })?;
        if let Some(index) = landmarks.iter().position(|lm| !lm.is_finite()) {
            return Err(FrameError::NonFiniteCoordinate { index });
        }
        Ok(Self::new(landmarks))
    }

    pub fn is_detected(&self) -> bool {
        self.landmarks.is_some()
    }

    pub fn landmarks(&self) -> Option<&[Landmark; LandmarkIndex::COUNT]> {
        self.landmarks.as_ref()
    }

    /// インデックスでランドマークを取得（未検出ならNone）
    pub fn get(&self, index: LandmarkIndex) -> Option<&Landmark> {
        self.landmarks.as_ref().map(|lms| &lms[index as usize])
    }

    /// 可視なランドマークのみ取得
    pub fn visible(&self, index: LandmarkIndex, threshold: f32) -> Option<&Landmark> {
        self.get(index).filter(|lm| lm.is_visible(threshold))
    }

    /// 全ランドマークの平均可視性（未検出なら0）
    pub fn average_visibility(&self) -> f32 {
        match &self.landmarks {
            Some(lms) => lms.iter().map(|lm| lm.visibility).sum::<f32>() / LandmarkIndex::COUNT as f32,
            None => 0.0,
        }
    }

    pub fn visible_count(&self, threshold: f32) -> usize {
        self.landmarks
            .as_ref()
            .map_or(0, |lms| lms.iter().filter(|lm| lm.is_visible(threshold)).count())
    }

    /// 左右反転したフレーム
    ///
    /// x -> 1 - x の反転と左右ペアの入れ替えを同時に行う。
    pub fn mirrored(&self) -> Self {
        let Some(lms) = &self.landmarks else {
            return Self::empty();
        };
        let mut flipped = *lms;
        for lm in flipped.iter_mut() {
            lm.x = 1.0 - lm.x;
        }
        for (left, right) in MIRROR_PAIRS {
            flipped.swap(left as usize, right as usize);
        }
        Self::new(flipped)
    }
}

impl TryFrom<Vec<Landmark>> for Frame {
    type Error = FrameError;

    fn try_from(landmarks: Vec<Landmark>) -> Result<Self, Self::Error> {
        Self::from_landmarks(landmarks)
    }
}

impl From<Frame> for Vec<Landmark> {
    fn from(frame: Frame) -> Self {
        frame.landmarks.map(|lms| lms.to_vec()).unwrap_or_default()
    }
}
