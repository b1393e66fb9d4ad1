use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Size},
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs, VideoWriter},
};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::VideoConfig;
use crate::pose::{downscale_to_width, sanitize_fps, Frame, PoseDetector, Sequence};
use crate::render::draw_skeleton;

/// OpenCVによる動画ファイルの逐次読み込み
///
/// 横幅を max_width 以下に縮小し、frame_stride 枚に1枚だけ画像を返す。
/// max_frames 枚で打ち切る。
pub struct VideoSource {
    capture: VideoCapture,
    fps: f32,
    max_width: u32,
    frame_stride: usize,
    max_frames: usize,
    position: usize,
}

/// 読み込んだ1フレーム
pub enum SourceFrame {
    /// 解析対象の画像
    Image(Mat),
    /// frame_stride で間引いたフレーム
    Skipped,
}

impl VideoSource {
    /// 動画ファイルを開く
    pub fn open<P: AsRef<Path>>(path: P, config: &VideoConfig) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().context("video path is not valid UTF-8")?;
        let capture = VideoCapture::from_file(path_str, VideoCaptureAPIs::CAP_ANY as i32)
            .with_context(|| format!("Failed to open video: {}", path.display()))?;

        if !capture.is_opened()? {
            anyhow::bail!("Video {} could not be opened", path.display());
        }

        let reported = capture.get(videoio::CAP_PROP_FPS)? as f32;
        let fps = sanitize_fps(reported);
        if fps != reported {
            warn!(reported, fps, "video frame rate out of range, using default");
        }
        info!(path = %path.display(), fps, "video opened");

        Ok(Self {
            capture,
            fps,
            max_width: config.max_width,
            frame_stride: config.frame_stride.max(1),
            max_frames: config.max_frames,
            position: 0,
        })
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// 次のフレーム。終端または max_frames 到達で None
    pub fn next_frame(&mut self) -> Result<Option<SourceFrame>> {
        if self.position >= self.max_frames {
            return Ok(None);
        }
        let mut frame = Mat::default();
        let ok = self.capture.read(&mut frame).context("Failed to read frame")?;
        if !ok || frame.empty() {
            debug!(frames = self.position, "end of stream");
            return Ok(None);
        }
        let index = self.position;
        self.position += 1;
        if index % self.frame_stride != 0 {
            return Ok(Some(SourceFrame::Skipped));
        }
        Ok(Some(SourceFrame::Image(downscale_to_width(&frame, self.max_width)?)))
    }
}

/// 動画を姿勢系列に変換
///
/// 間引いたフレームと検出失敗は未検出フレームとして残し、時間軸を保つ。
/// annotate を渡すと骨格付きの動画も書き出す。
pub fn detect_sequence<D>(
    source: &mut VideoSource,
    detector: &mut D,
    annotate: Option<&Path>,
    threshold: f32,
) -> Result<Sequence>
where
    D: PoseDetector<Mat>,
{
    let mut sequence = Sequence::with_fps(source.fps());
    let mut writer: Option<AnnotatedWriter> = None;
    while let Some(frame) = source.next_frame()? {
        let image = match frame {
            SourceFrame::Skipped => {
                sequence.push(Frame::empty());
                continue;
            }
            SourceFrame::Image(image) => image,
        };
        let detected = match detector.detect(&image) {
            Ok(f) => f,
            Err(e) => {
                warn!("pose detection failed: {:#}", e);
                Frame::empty()
            }
        };
        if let Some(path) = annotate {
            if writer.is_none() {
                writer = Some(AnnotatedWriter::create(
                    path,
                    source.fps(),
                    image.cols(),
                    image.rows(),
                    threshold,
                )?);
            }
            if let Some(w) = writer.as_mut() {
                w.write(&image, &detected)?;
            }
        }
        sequence.push(detected);
    }
    info!(
        frames = sequence.len(),
        detected = sequence.detected_frames(),
        "video processed"
    );
    Ok(sequence)
}

/// 骨格を重ねて動画を書き出す
pub struct AnnotatedWriter {
    writer: VideoWriter,
    size: Size,
    threshold: f32,
}

impl AnnotatedWriter {
    pub fn create<P: AsRef<Path>>(path: P, fps: f32, width: i32, height: i32, threshold: f32) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().context("output path is not valid UTF-8")?;
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let size = Size::new(width, height);
        let writer = VideoWriter::new(path_str, fourcc, fps as f64, size, true)
            .with_context(|| format!("Failed to create video: {}", path.display()))?;
        if !writer.is_opened()? {
            anyhow::bail!("Video writer for {} could not be opened", path.display());
        }
        Ok(Self { writer, size, threshold })
    }

    /// 画像に骨格を描画して1フレーム書き込む
    pub fn write(&mut self, image: &Mat, frame: &Frame) -> Result<()> {
        let mut canvas = if image.cols() == self.size.width && image.rows() == self.size.height {
            image.clone()
        } else {
            let mut resized = Mat::default();
            opencv::imgproc::resize(image, &mut resized, self.size, 0.0, 0.0, opencv::imgproc::INTER_LINEAR)?;
            resized
        };
        draw_skeleton(&mut canvas, frame, self.threshold)?;
        self.writer.write(&canvas)?;
        Ok(())
    }
}
