use serde::{Deserialize, Serialize};

use super::landmark::Frame;

/// フレームレートが不明・範囲外のときの既定値
pub const DEFAULT_FPS: f32 = 30.0;

const MIN_FPS: f32 = 1.0;
const MAX_FPS: f32 = 120.0;

/// 1動画/1セッション分のフレーム列
///
/// 未検出フレームも位置を保ったまま保持する。参照と新規の
/// フレーム番号対応がずれないようにするため。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default)]
    pub frames: Vec<Frame>,
    #[serde(default = "default_fps", deserialize_with = "deserialize_fps")]
    fps: f32,
}

fn default_fps() -> f32 {
    DEFAULT_FPS
}

fn deserialize_fps<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let fps = Option::<f32>::deserialize(deserializer)?;
    Ok(sanitize_fps(fps.unwrap_or(DEFAULT_FPS)))
}

/// [1, 120] の外や非有限値は既定値に置き換える
pub fn sanitize_fps(fps: f32) -> f32 {
    if fps.is_finite() && (MIN_FPS..=MAX_FPS).contains(&fps) {
        fps
    } else {
        DEFAULT_FPS
    }
}

impl Sequence {
    pub fn new(frames: Vec<Frame>, fps: f32) -> Self {
        Self { frames, fps: sanitize_fps(fps) }
    }

    pub fn with_fps(fps: f32) -> Self {
        Self::new(Vec::new(), fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// フレーム間隔（秒）
    pub fn dt(&self) -> f32 {
        1.0 / self.fps
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 姿勢が検出されたフレーム数
    pub fn detected_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_detected()).count()
    }

    pub fn duration_secs(&self) -> f32 {
        self.frames.len() as f32 / self.fps
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::with_fps(DEFAULT_FPS)
    }
}
