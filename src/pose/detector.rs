use anyhow::Result;

use super::landmark::Frame;

/// 姿勢検出の境界
///
/// 画像1枚から「未検出」または33ランドマークを返す。モデルは
/// 呼び出し側が明示的に構築して渡す。
pub trait PoseDetector<I: ?Sized> {
    fn detect(&mut self, image: &I) -> Result<Frame>;
}

impl<I: ?Sized, F> PoseDetector<I> for F
where
    F: FnMut(&I) -> Result<Frame>,
{
    fn detect(&mut self, image: &I) -> Result<Frame> {
        self(image)
    }
}

#[cfg(feature = "desktop")]
pub use blazepose::BlazePoseDetector;

#[cfg(feature = "desktop")]
mod blazepose {
    use anyhow::{Context, Result};
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::Tensor;
    use opencv::core::Mat;
    use std::path::Path;

    use super::PoseDetector;
    use crate::pose::landmark::{Frame, Landmark, LandmarkIndex};
    use crate::pose::preprocess::{preprocess_for_blazepose, BLAZEPOSE_INPUT_SIZE};

    /// 1ランドマークあたりの出力値 (x, y, z, visibility, presence)
    const VALUES_PER_LANDMARK: usize = 5;

    /// 人物存在フラグの閾値
    const POSE_FLAG_THRESHOLD: f32 = 0.5;

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    /// BlazePose landmark モデルを使用した姿勢検出器
    pub struct BlazePoseDetector {
        session: Session,
    }

    impl BlazePoseDetector {
        /// ONNXモデルを読み込んで初期化
        pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
            let path = model_path.as_ref();
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .commit_from_file(path)
                .with_context(|| format!("Failed to load ONNX model: {}", path.display()))?;
            tracing::info!(model = %path.display(), "pose model loaded");
            Ok(Self { session })
        }

        /// BGR画像から姿勢を検出
        ///
        /// 入力: 任意サイズのBGR画像（256x256に直接リサイズ）
        /// 出力: 正規化座標のFrame（人物がいなければ空Frame）
        pub fn detect_mat(&mut self, image: &Mat) -> Result<Frame> {
            let input = preprocess_for_blazepose(image)?;
            let input_tensor = Tensor::from_array(input)?;
            let outputs = self
                .session
                .run(ort::inputs!["input_1" => input_tensor])
                .context("Inference failed")?;

            // 人物存在フラグ [1, 1]
            let flag: ndarray::ArrayViewD<f32> = outputs["Identity_1"]
                .try_extract_array()
                .context("Failed to extract pose flag")?;
            let presence = flag.iter().next().copied().unwrap_or(0.0);
            if presence < POSE_FLAG_THRESHOLD {
                return Ok(Frame::empty());
            }

            // ランドマーク [1, 195] (39点 x 5)、先頭33点が身体
            let raw: ndarray::ArrayViewD<f32> = outputs["Identity"]
                .try_extract_array()
                .context("Failed to extract landmark tensor")?;
            let values: Vec<f32> = raw.iter().copied().collect();
            let needed = LandmarkIndex::COUNT * VALUES_PER_LANDMARK;
            if values.len() < needed {
                anyhow::bail!("landmark tensor too small: {} < {}", values.len(), needed);
            }

            let size = BLAZEPOSE_INPUT_SIZE as f32;
            let mut landmarks = [Landmark::default(); LandmarkIndex::COUNT];
            for (i, lm) in landmarks.iter_mut().enumerate() {
                let v = &values[i * VALUES_PER_LANDMARK..(i + 1) * VALUES_PER_LANDMARK];
                *lm = Landmark::new(v[0] / size, v[1] / size, v[2] / size, sigmoid(v[3]));
            }

            // 非有限値はここで弾く
            Ok(Frame::from_landmarks(landmarks.to_vec())?)
        }
    }

    impl PoseDetector<Mat> for BlazePoseDetector {
        fn detect(&mut self, image: &Mat) -> Result<Frame> {
            self.detect_mat(image)
        }
    }
}
