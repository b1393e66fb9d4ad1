use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::JointAngle;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub triangulation: TriangulationConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

/// メトリクス計算の定数
///
/// 正規化定数は特定のカメラ/解像度で経験的に決めた値。
/// 実データで検証して調整する。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// これを超える可視性のランドマークのみ使用
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
    /// 結束度: 分散をこの値で割って [0,1] に収める
    #[serde(default = "default_cohesion_variance_scale")]
    pub cohesion_variance_scale: f32,
    /// 速度: 平均変位/秒をこの値で割る
    #[serde(default = "default_speed_scale")]
    pub speed_scale: f32,
    /// 総合スコアのパワー項: 平均ピーク速度に掛ける係数
    #[serde(default = "default_power_velocity_scale")]
    pub power_velocity_scale: f32,
    /// 改善/後退とみなす差分（厳密に超えた場合のみ）
    #[serde(default = "default_improvement_threshold")]
    pub improvement_threshold: f32,
    /// Savitzky-Golay 多項式次数
    #[serde(default = "default_savgol_poly_order")]
    pub savgol_poly_order: usize,
    /// Savitzky-Golay 窓幅の上限（奇数）
    #[serde(default = "default_savgol_max_window")]
    pub savgol_max_window: usize,
}

fn default_visibility_threshold() -> f32 { 0.5 }
fn default_cohesion_variance_scale() -> f32 { 1000.0 }
fn default_speed_scale() -> f32 { 10.0 }
fn default_power_velocity_scale() -> f32 { 10.0 }
fn default_improvement_threshold() -> f32 { 5.0 }
fn default_savgol_poly_order() -> usize { 3 }
fn default_savgol_max_window() -> usize { 11 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            visibility_threshold: default_visibility_threshold(),
            cohesion_variance_scale: default_cohesion_variance_scale(),
            speed_scale: default_speed_scale(),
            power_velocity_scale: default_power_velocity_scale(),
            improvement_threshold: default_improvement_threshold(),
            savgol_poly_order: default_savgol_poly_order(),
            savgol_max_window: default_savgol_max_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// 腰のX座標がこの範囲内なら中央とみなす（非ミラー座標）
    #[serde(default = "default_hip_min_x")]
    pub hip_min_x: f32,
    #[serde(default = "default_hip_max_x")]
    pub hip_max_x: f32,
    /// 腰ランドマークの可視性閾値（以上で可視）
    #[serde(default = "default_hip_visibility")]
    pub hip_visibility: f32,
    /// レップを数える関節
    #[serde(default = "default_tracked_joint")]
    pub tracked_joint: JointAngle,
    /// この角度を下回ったら「下」
    #[serde(default = "default_down_angle")]
    pub down_angle: f32,
    /// 「下」の後にこの角度を上回ったら1レップ
    #[serde(default = "default_up_angle")]
    pub up_angle: f32,
    /// これより短い間隔で届いたフレームは捨てる（ミリ秒）
    #[serde(default = "default_min_frame_interval_ms")]
    pub min_frame_interval_ms: u64,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_hip_min_x() -> f32 { 0.3 }
fn default_hip_max_x() -> f32 { 0.7 }
fn default_hip_visibility() -> f32 { 0.5 }
fn default_tracked_joint() -> JointAngle { JointAngle::LeftKnee }
fn default_down_angle() -> f32 { 110.0 }
fn default_up_angle() -> f32 { 160.0 }
fn default_min_frame_interval_ms() -> u64 { 50 }
fn default_listen_addr() -> String { "0.0.0.0:9100".to_string() }

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            hip_min_x: default_hip_min_x(),
            hip_max_x: default_hip_max_x(),
            hip_visibility: default_hip_visibility(),
            tracked_joint: default_tracked_joint(),
            down_angle: default_down_angle(),
            up_angle: default_up_angle(),
            min_frame_interval_ms: default_min_frame_interval_ms(),
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangulationConfig {
    /// 被写体中心からカメラまでの距離（メートル）
    #[serde(default = "default_rig_radius")]
    pub rig_radius: f64,
    /// カメラの高さ（メートル、全台共通）
    #[serde(default)]
    pub camera_height: f64,
    /// 焦点距離（ピクセル）
    #[serde(default = "default_focal_length")]
    pub focal_length: f64,
    /// 主点 [cx, cy]（ピクセル）
    #[serde(default = "default_principal_point")]
    pub principal_point: [f64; 2],
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    /// 再投影誤差 -> 信頼度の係数
    #[serde(default = "default_reprojection_error_scale")]
    pub reprojection_error_scale: f64,
    /// 左右対称誤差 -> スコアの係数
    #[serde(default = "default_symmetry_error_scale")]
    pub symmetry_error_scale: f64,
    #[serde(default = "default_min_views")]
    pub min_views: usize,
    #[serde(default = "default_max_views")]
    pub max_views: usize,
}

fn default_rig_radius() -> f64 { 2.0 }
fn default_focal_length() -> f64 { 800.0 }
fn default_principal_point() -> [f64; 2] { [320.0, 240.0] }
fn default_image_width() -> u32 { 640 }
fn default_image_height() -> u32 { 480 }
fn default_reprojection_error_scale() -> f64 { 10.0 }
fn default_symmetry_error_scale() -> f64 { 5.0 }
fn default_min_views() -> usize { 2 }
fn default_max_views() -> usize { 6 }

impl Default for TriangulationConfig {
    fn default() -> Self {
        Self {
            rig_radius: default_rig_radius(),
            camera_height: 0.0,
            focal_length: default_focal_length(),
            principal_point: default_principal_point(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            reprojection_error_scale: default_reprojection_error_scale(),
            symmetry_error_scale: default_symmetry_error_scale(),
            min_views: default_min_views(),
            max_views: default_max_views(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// 解析する最大フレーム数
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,
    /// これより広い画像は縮小してから推論
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Nフレームに1回だけ推論（間引いたフレームは空Frame）
    #[serde(default = "default_frame_stride")]
    pub frame_stride: usize,
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

fn default_max_frames() -> usize { 1000 }
fn default_max_width() -> u32 { 640 }
fn default_frame_stride() -> usize { 1 }
fn default_model_path() -> String { "models/pose_landmark_full.onnx".to_string() }

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            max_frames: default_max_frames(),
            max_width: default_max_width(),
            frame_stride: default_frame_stride(),
            model_path: default_model_path(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// ファイルがなければデフォルト、壊れていれば警告してデフォルト
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }
}
