use nalgebra::{DMatrix, Matrix3, Matrix3x4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::analysis::JointAngle;
use crate::config::TriangulationConfig;
use crate::error::{FrameError, TriangulationError};
use crate::pose::{Frame, Landmark, LandmarkIndex, Sequence};

/// 2D観測を採用する可視性閾値
const VIEW_VISIBILITY_THRESHOLD: f32 = 0.5;

/// 再構成点を「有効」とみなす信頼度
const CONFIDENT_POINT: f32 = 0.5;

/// 左右対称性の評価に使うペア (左, 右)
const SYMMETRY_PAIRS: [(LandmarkIndex, LandmarkIndex); 8] = [
    (LandmarkIndex::LeftEye, LandmarkIndex::RightEye),
    (LandmarkIndex::LeftEar, LandmarkIndex::RightEar),
    (LandmarkIndex::LeftShoulder, LandmarkIndex::RightShoulder),
    (LandmarkIndex::LeftElbow, LandmarkIndex::RightElbow),
    (LandmarkIndex::LeftWrist, LandmarkIndex::RightWrist),
    (LandmarkIndex::LeftHip, LandmarkIndex::RightHip),
    (LandmarkIndex::LeftKnee, LandmarkIndex::RightKnee),
    (LandmarkIndex::LeftAnkle, LandmarkIndex::RightAnkle),
];

/// 対称ペアが1つも評価できないときのスコア
const NEUTRAL_SYMMETRY: f32 = 0.5;

/// カメラ射影（P = K[R|t]）
///
/// ワールド座標はY上向き。画像座標は左上原点でvが下向き。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraProjection {
    pub matrix: Matrix3x4<f64>,
    pub image_width: f64,
    pub image_height: f64,
}

impl CameraProjection {
    pub fn new(matrix: Matrix3x4<f64>, image_width: u32, image_height: u32) -> Self {
        Self { matrix, image_width: image_width as f64, image_height: image_height as f64 }
    }

    /// position から target を向くカメラ
    ///
    /// カメラ座標は x: 右、y: 下、z: 前方。
    pub fn look_at(
        position: Vector3<f64>,
        target: Vector3<f64>,
        up: Vector3<f64>,
        config: &TriangulationConfig,
    ) -> Self {
        let forward = (target - position).normalize();
        let mut right = forward.cross(&up);
        if right.norm() < 1e-9 {
            // up が視線と平行
            right = forward.cross(&Vector3::z());
        }
        let right = right.normalize();
        let down = forward.cross(&right);

        let r = Matrix3::from_rows(&[right.transpose(), down.transpose(), forward.transpose()]);
        let t = -(r * position);

        let f = config.focal_length;
        let [cx, cy] = config.principal_point;
        let k = Matrix3::new(f, 0.0, cx, 0.0, f, cy, 0.0, 0.0, 1.0);

        // P = K * [R | t]
        let mut rt = Matrix3x4::zeros();
        for i in 0..3 {
            for j in 0..3 {
                rt[(i, j)] = r[(i, j)];
            }
            rt[(i, 3)] = t[i];
        }

        Self::new(k * rt, config.image_width, config.image_height)
    }

    /// ピクセル座標へ投影（カメラ平面上ならNone）
    pub fn project(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        let p = self.matrix * Vector4::new(point.x, point.y, point.z, 1.0);
        if p[2].abs() < 1e-12 {
            return None;
        }
        Some((p[0] / p[2], p[1] / p[2]))
    }

    /// 正規化画像座標 (0〜1) へ投影
    pub fn project_normalized(&self, point: &Vector3<f64>) -> Option<(f64, f64)> {
        let (u, v) = self.project(point)?;
        Some((u / self.image_width, v / self.image_height))
    }

    fn to_pixel(&self, landmark: &Landmark) -> (f64, f64) {
        (landmark.x as f64 * self.image_width, landmark.y as f64 * self.image_height)
    }
}

/// 被写体を囲む円周上に等間隔で並んだ推定カメラ
///
/// i番目のカメラは角度 2πi/n、半径 rig_radius、高さ camera_height で原点を向く。
pub fn circular_rig(n: usize, config: &TriangulationConfig) -> Vec<CameraProjection> {
    (0..n)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            let position = Vector3::new(
                config.rig_radius * angle.cos(),
                config.camera_height,
                config.rig_radius * angle.sin(),
            );
            let target = Vector3::new(0.0, config.camera_height, 0.0);
            CameraProjection::look_at(position, target, Vector3::y(), config)
        })
        .collect()
}

/// 単一3D点のDLT三角測量
///
/// 各カメラについて u·P3 - P1, v·P3 - P2 の2行を積んだ 2N×4 行列の
/// 最小特異値に対応する右特異ベクトルを同次座標の解とする。
fn triangulate_point(cameras: &[&CameraProjection], points: &[(f64, f64)]) -> Option<Vector3<f64>> {
    let n = cameras.len();
    if n < 2 || n != points.len() {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(2 * n, 4);
    for (i, (camera, &(u, v))) in cameras.iter().zip(points.iter()).enumerate() {
        let p = &camera.matrix;
        for j in 0..4 {
            a[(2 * i, j)] = u * p[(2, j)] - p[(0, j)];
            a[(2 * i + 1, j)] = v * p[(2, j)] - p[(1, j)];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let mut min_idx = 0;
    let mut min_val = svd.singular_values[0];
    for i in 1..svd.singular_values.len() {
        if svd.singular_values[i] < min_val {
            min_val = svd.singular_values[i];
            min_idx = i;
        }
    }

    let x = v_t.row(min_idx);
    let w = x[3];
    if w.abs() < 1e-12 {
        return None;
    }
    let point = Vector3::new(x[0] / w, x[1] / w, x[2] / w);
    (point.x.is_finite() && point.y.is_finite() && point.z.is_finite()).then_some(point)
}

/// 三角測量された1点
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// 再投影誤差から求めた信頼度 [0,1]（入力の可視性とは別物）
    pub confidence: f32,
}

impl Point3D {
    pub fn is_confident(&self) -> bool {
        self.confidence > CONFIDENT_POINT
    }

    fn position(&self) -> Vector3<f64> {
        Vector3::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

/// 再構成品質 [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReconstructionQuality {
    /// 信頼度 > 0.5 の点の割合
    pub completeness: f32,
    /// 上記の点の平均信頼度
    pub average_confidence: f32,
    pub symmetry: f32,
    /// 0.4 completeness + 0.4 confidence + 0.2 symmetry
    pub overall: f32,
}

/// 33点の3D再構成
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction3D {
    pub landmarks: Vec<Point3D>,
    pub quality: ReconstructionQuality,
    pub view_count: usize,
}

impl Reconstruction3D {
    pub fn get(&self, index: LandmarkIndex) -> Option<&Point3D> {
        self.landmarks.get(index as usize)
    }

    /// 指標エンジンに戻すためのFrame（可視性 = 信頼度）
    ///
    /// 画像座標に合わせてYを下向きに反転する。
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        Frame::from_landmarks(
            self.landmarks
                .iter()
                .map(|p| Landmark::new(p.x, -p.y, p.z, p.confidence))
                .collect(),
        )
    }

    /// 再構成点から測った関節角（測れない関節は含まない）
    pub fn joint_angles(&self) -> BTreeMap<JointAngle, f32> {
        let Ok(frame) = self.to_frame() else {
            return BTreeMap::new();
        };
        JointAngle::ALL
            .iter()
            .filter_map(|&joint| Some((joint, joint.measure(&frame, CONFIDENT_POINT)?)))
            .collect()
    }

    /// 信頼できる点の数
    pub fn confident_count(&self) -> usize {
        self.landmarks.iter().filter(|p| p.is_confident()).count()
    }
}

/// 1視点の検証結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewReport {
    pub index: usize,
    pub valid: bool,
    /// 全ランドマークの平均可視性
    pub confidence: f32,
    pub landmarks_detected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureQuality {
    Good,
    Acceptable,
    Poor,
}

/// 3D処理前の視点チェック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewValidation {
    pub views: Vec<ViewReport>,
    pub valid_views: usize,
    pub total_views: usize,
    pub ready_for_3d: bool,
    pub quality: CaptureQuality,
}

/// 多視点三角測量器
///
/// 状態を持たない。カメラ射影は呼び出しごとに渡す。
#[derive(Debug, Clone, Default)]
pub struct Triangulator {
    config: TriangulationConfig,
}

impl Triangulator {
    pub fn new(config: TriangulationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TriangulationConfig {
        &self.config
    }

    /// 視点数に合わせた推定カメラ
    pub fn rig(&self, views: usize) -> Vec<CameraProjection> {
        circular_rig(views, &self.config)
    }

    /// 推定カメラ配置で三角測量
    pub fn triangulate_views(&self, views: &[Frame]) -> Result<Reconstruction3D, TriangulationError> {
        let cameras = self.rig(views.len());
        self.triangulate(views, &cameras)
    }

    /// 各視点のFrameと射影行列から33点を再構成
    ///
    /// 姿勢が検出された視点が2未満、または最大数超過なら要求ごと拒否。
    /// 2視点未満でしか見えない点は信頼度0の原点として出力する。
    pub fn triangulate(
        &self,
        views: &[Frame],
        cameras: &[CameraProjection],
    ) -> Result<Reconstruction3D, TriangulationError> {
        if views.len() > self.config.max_views {
            return Err(TriangulationError::TooManyViews { got: views.len(), max: self.config.max_views });
        }
        if views.len() != cameras.len() {
            return Err(TriangulationError::CameraCountMismatch {
                views: views.len(),
                cameras: cameras.len(),
            });
        }
        let valid = views.iter().filter(|f| f.is_detected()).count();
        let min = self.config.min_views.max(2);
        if valid < min {
            return Err(TriangulationError::TooFewViews { valid, min });
        }

        let mut landmarks = vec![Point3D::default(); LandmarkIndex::COUNT];
        for (idx, out) in LandmarkIndex::ALL.iter().zip(landmarks.iter_mut()) {
            let mut used_cameras = Vec::new();
            let mut observed = Vec::new();
            let mut pixels = Vec::new();
            for (frame, camera) in views.iter().zip(cameras.iter()) {
                if let Some(lm) = frame.visible(*idx, VIEW_VISIBILITY_THRESHOLD) {
                    used_cameras.push(camera);
                    observed.push((lm.x as f64, lm.y as f64));
                    pixels.push(camera.to_pixel(lm));
                }
            }
            if used_cameras.len() < 2 {
                continue;
            }
            let Some(point) = triangulate_point(&used_cameras, &pixels) else {
                debug!(landmark = ?idx, "degenerate triangulation");
                continue;
            };
            let confidence = self.reprojection_confidence(&point, &used_cameras, &observed);
            *out = Point3D {
                x: point.x as f32,
                y: point.y as f32,
                z: point.z as f32,
                confidence,
            };
        }

        let quality = self.assess_quality(&landmarks);
        debug!(
            views = views.len(),
            completeness = quality.completeness,
            overall = quality.overall,
            "reconstruction finished"
        );
        Ok(Reconstruction3D { landmarks, quality, view_count: views.len() })
    }

    /// 平均再投影誤差（正規化画像座標）から信頼度
    fn reprojection_confidence(
        &self,
        point: &Vector3<f64>,
        cameras: &[&CameraProjection],
        observed: &[(f64, f64)],
    ) -> f32 {
        let mut total = 0.0;
        for (camera, &(x, y)) in cameras.iter().zip(observed.iter()) {
            let Some((px, py)) = camera.project_normalized(point) else {
                return 0.0;
            };
            total += ((px - x).powi(2) + (py - y).powi(2)).sqrt();
        }
        let error = total / cameras.len() as f64;
        (1.0 - error * self.config.reprojection_error_scale).max(0.0) as f32
    }

    /// 再構成全体の品質
    pub fn assess_quality(&self, landmarks: &[Point3D]) -> ReconstructionQuality {
        let confident: Vec<&Point3D> = landmarks.iter().filter(|p| p.is_confident()).collect();
        if confident.is_empty() || landmarks.is_empty() {
            return ReconstructionQuality::default();
        }
        let completeness = confident.len() as f32 / landmarks.len() as f32;
        let average_confidence =
            confident.iter().map(|p| p.confidence).sum::<f32>() / confident.len() as f32;
        let symmetry = self.symmetry_score(landmarks);
        let overall = 0.4 * completeness + 0.4 * average_confidence + 0.2 * symmetry;
        ReconstructionQuality { completeness, average_confidence, symmetry, overall }
    }

    /// 右側の点を矢状面 (x=0) で鏡映し、左側との残差から [0,1]
    fn symmetry_score(&self, landmarks: &[Point3D]) -> f32 {
        let errors: Vec<f64> = SYMMETRY_PAIRS
            .iter()
            .filter_map(|&(left, right)| {
                let l = landmarks.get(left as usize).filter(|p| p.is_confident())?;
                let r = landmarks.get(right as usize).filter(|p| p.is_confident())?;
                let mut mirrored = r.position();
                mirrored.x = -mirrored.x;
                Some((l.position() - mirrored).norm())
            })
            .collect();
        if errors.is_empty() {
            return NEUTRAL_SYMMETRY;
        }
        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        (1.0 - mean * self.config.symmetry_error_scale).max(0.0) as f32
    }

    /// 視点ごとの検出状況
    pub fn validate_views(&self, views: &[Frame]) -> ViewValidation {
        let reports: Vec<ViewReport> = views
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                let confidence = frame.average_visibility();
                ViewReport {
                    index,
                    valid: frame.is_detected() && confidence > VIEW_VISIBILITY_THRESHOLD,
                    confidence,
                    landmarks_detected: frame.visible_count(VIEW_VISIBILITY_THRESHOLD),
                }
            })
            .collect();
        let valid_views = reports.iter().filter(|r| r.valid).count();
        let quality = match valid_views {
            n if n >= 3 => CaptureQuality::Good,
            2 => CaptureQuality::Acceptable,
            _ => CaptureQuality::Poor,
        };
        ViewValidation {
            total_views: views.len(),
            ready_for_3d: valid_views >= self.config.min_views.max(2),
            valid_views,
            views: reports,
            quality,
        }
    }

    /// 視点ごとの系列を同じフレーム番号で三角測量し、3D系列にする
    ///
    /// 検出視点が足りないフレームは空Frame（ギャップ）になる。
    /// fps は最初の視点に合わせる。
    pub fn triangulate_sequence(&self, views: &[Sequence]) -> Result<Sequence, TriangulationError> {
        if views.len() > self.config.max_views {
            return Err(TriangulationError::TooManyViews { got: views.len(), max: self.config.max_views });
        }
        let min = self.config.min_views.max(2);
        if views.len() < min {
            return Err(TriangulationError::TooFewViews { valid: views.len(), min });
        }

        let cameras = self.rig(views.len());
        let frame_count = views.iter().map(Sequence::len).min().unwrap_or(0);
        let mut out = Sequence::with_fps(views[0].fps());

        for i in 0..frame_count {
            let frames: Vec<Frame> = views.iter().map(|s| s.frames[i].clone()).collect();
            let frame = match self.triangulate(&frames, &cameras) {
                Ok(reconstruction) => reconstruction.to_frame().unwrap_or_else(|e| {
                    warn!(frame = i, "invalid reconstruction: {}", e);
                    Frame::empty()
                }),
                Err(TriangulationError::TooFewViews { .. }) => Frame::empty(),
                Err(e) => return Err(e),
            };
            out.push(frame);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 原点付近の立ち姿勢（メートル、Y上向き）
    fn body_points() -> Vec<Vector3<f64>> {
        (0..LandmarkIndex::COUNT)
            .map(|i| {
                let side = if i % 2 == 0 { 1.0 } else { -1.0 };
                Vector3::new(side * 0.05 * (i % 5) as f64, 0.6 - 0.04 * i as f64, 0.02 * (i % 3) as f64)
            })
            .collect()
    }

    fn project_frame(camera: &CameraProjection, points: &[Vector3<f64>]) -> Frame {
        let lms: Vec<Landmark> = points
            .iter()
            .map(|p| {
                let (x, y) = camera.project_normalized(p).unwrap();
                Landmark::new(x as f32, y as f32, 0.0, 0.9)
            })
            .collect();
        Frame::from_landmarks(lms).unwrap()
    }

    #[test]
    fn test_look_at_projects_target_to_principal_point() {
        let config = TriangulationConfig::default();
        let rig = circular_rig(4, &config);
        for camera in &rig {
            let (u, v) = camera.project(&Vector3::zeros()).unwrap();
            assert!((u - 320.0).abs() < 1e-9);
            assert!((v - 240.0).abs() < 1e-9);
            // 上方の点は画像の上側
            let (_, v_up) = camera.project(&Vector3::new(0.0, 0.5, 0.0)).unwrap();
            assert!(v_up < 240.0);
        }
    }

    #[test]
    fn test_triangulate_point_two_views() {
        let config = TriangulationConfig::default();
        let rig = circular_rig(4, &config);
        let target = Vector3::new(0.1, 0.3, -0.2);
        let cams = [&rig[0], &rig[1]];
        let points = [rig[0].project(&target).unwrap(), rig[1].project(&target).unwrap()];
        let p = triangulate_point(&cams, &points).unwrap();
        assert!((p - target).norm() < 1e-6, "got {:?}", p);
    }

    #[test]
    fn test_rejects_single_view() {
        let triangulator = Triangulator::default();
        let frame = Frame::new([Landmark::new(0.5, 0.5, 0.0, 0.9); LandmarkIndex::COUNT]);
        let err = triangulator.triangulate_views(&[frame]).unwrap_err();
        assert_eq!(err, TriangulationError::TooFewViews { valid: 1, min: 2 });
    }

    #[test]
    fn test_rejects_undetected_views() {
        let triangulator = Triangulator::default();
        let frame = Frame::new([Landmark::new(0.5, 0.5, 0.0, 0.9); LandmarkIndex::COUNT]);
        let err = triangulator.triangulate_views(&[frame, Frame::empty()]).unwrap_err();
        assert_eq!(err, TriangulationError::TooFewViews { valid: 1, min: 2 });
    }

    #[test]
    fn test_rejects_too_many_views() {
        let triangulator = Triangulator::default();
        let views = vec![Frame::empty(); 7];
        let err = triangulator.triangulate_views(&views).unwrap_err();
        assert_eq!(err, TriangulationError::TooManyViews { got: 7, max: 6 });
    }

    #[test]
    fn test_camera_count_mismatch() {
        let triangulator = Triangulator::default();
        let views = vec![Frame::empty(); 3];
        let err = triangulator.triangulate(&views, &triangulator.rig(2)).unwrap_err();
        assert_eq!(err, TriangulationError::CameraCountMismatch { views: 3, cameras: 2 });
    }

    #[test]
    fn test_two_view_reconstruction() {
        let triangulator = Triangulator::default();
        let rig = triangulator.rig(4);
        let points = body_points();
        let views = [project_frame(&rig[0], &points), project_frame(&rig[1], &points)];
        let cameras = [rig[0].clone(), rig[1].clone()];
        let recon = triangulator.triangulate(&views, &cameras).unwrap();

        assert_eq!(recon.landmarks.len(), LandmarkIndex::COUNT);
        for (p, truth) in recon.landmarks.iter().zip(points.iter()) {
            assert!((p.position() - truth).norm() < 1e-3);
            assert!(p.confidence > 0.99);
        }
        assert!((recon.quality.completeness - 1.0).abs() < 1e-6);
        // 0.4 + 0.4 + 0.2 * symmetry
        assert!(recon.quality.overall > 0.79);
    }

    #[test]
    fn test_single_view_landmark_is_absent() {
        let triangulator = Triangulator::default();
        let rig = triangulator.rig(3);
        let points = body_points();
        let mut views: Vec<Frame> = rig.iter().map(|c| project_frame(c, &points)).collect();
        // 鼻を1視点以外で隠す
        for view in views.iter_mut().skip(1) {
            let mut lms = *view.landmarks().unwrap();
            lms[LandmarkIndex::Nose as usize].visibility = 0.1;
            *view = Frame::new(lms);
        }
        let recon = triangulator.triangulate(&views, &rig).unwrap();
        let nose = recon.get(LandmarkIndex::Nose).unwrap();
        assert_eq!(*nose, Point3D::default());
        assert!(recon.get(LandmarkIndex::LeftWrist).unwrap().is_confident());
        assert_eq!(recon.confident_count(), LandmarkIndex::COUNT - 1);
    }

    #[test]
    fn test_symmetry_of_mirrored_body() {
        let triangulator = Triangulator::default();
        let mut landmarks = vec![Point3D::default(); LandmarkIndex::COUNT];
        for &(l, r) in SYMMETRY_PAIRS.iter() {
            landmarks[l as usize] = Point3D { x: 0.2, y: 1.0, z: 0.1, confidence: 1.0 };
            landmarks[r as usize] = Point3D { x: -0.2, y: 1.0, z: 0.1, confidence: 1.0 };
        }
        let q = triangulator.assess_quality(&landmarks);
        assert!((q.symmetry - 1.0).abs() < 1e-6);

        let none = triangulator.assess_quality(&vec![Point3D::default(); LandmarkIndex::COUNT]);
        assert_eq!(none, ReconstructionQuality::default());
    }

    #[test]
    fn test_validate_views() {
        let triangulator = Triangulator::default();
        let good = Frame::new([Landmark::new(0.5, 0.5, 0.0, 0.9); LandmarkIndex::COUNT]);
        let weak = Frame::new([Landmark::new(0.5, 0.5, 0.0, 0.3); LandmarkIndex::COUNT]);

        let v = triangulator.validate_views(&[good.clone(), weak, Frame::empty()]);
        assert_eq!(v.valid_views, 1);
        assert!(!v.ready_for_3d);
        assert_eq!(v.quality, CaptureQuality::Poor);
        assert_eq!(v.views[0].landmarks_detected, 33);
        assert_eq!(v.views[1].landmarks_detected, 0);

        let v = triangulator.validate_views(&[good.clone(), good.clone()]);
        assert!(v.ready_for_3d);
        assert_eq!(v.quality, CaptureQuality::Acceptable);

        let v = triangulator.validate_views(&[good.clone(), good.clone(), good]);
        assert_eq!(v.quality, CaptureQuality::Good);
    }

    #[test]
    fn test_triangulate_sequence_keeps_gaps() {
        let triangulator = Triangulator::default();
        let rig = triangulator.rig(2);
        let points = body_points();
        let a = Sequence::new(vec![project_frame(&rig[0], &points), Frame::empty()], 24.0);
        let b = Sequence::new(
            vec![project_frame(&rig[1], &points), project_frame(&rig[1], &points)],
            24.0,
        );
        let seq = triangulator.triangulate_sequence(&[a, b]).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.fps(), 24.0);
        assert!(seq.frames[0].is_detected());
        assert!(!seq.frames[1].is_detected());
    }
}
