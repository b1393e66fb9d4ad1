use anyhow::Result;
use ndarray::Array4;
use opencv::{
    core::{AlgorithmHint, Mat, Size, CV_32FC3},
    imgproc,
    prelude::*,
};

/// BlazePose landmark モデルの入力サイズ
pub const BLAZEPOSE_INPUT_SIZE: i32 = 256;

/// OpenCV Mat を BlazePose 用の入力テンソルに変換
///
/// - BGR -> RGB
/// - 256x256 に直接リサイズ（レターボックスなし、正規化座標がそのまま元画像に対応）
/// - [1, 256, 256, 3] の f32 テンソルに変換 (0.0-1.0)
pub fn preprocess_for_blazepose(frame: &Mat) -> Result<Array4<f32>> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0, AlgorithmHint::ALGO_HINT_DEFAULT)?;

    let mut resized = Mat::default();
    imgproc::resize(
        &rgb,
        &mut resized,
        Size::new(BLAZEPOSE_INPUT_SIZE, BLAZEPOSE_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut float_mat = Mat::default();
    resized.convert_to(&mut float_mat, CV_32FC3, 1.0 / 255.0, 0.0)?;

    let size = BLAZEPOSE_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, size, size, 3));

    for y in 0..BLAZEPOSE_INPUT_SIZE {
        for x in 0..BLAZEPOSE_INPUT_SIZE {
            let pixel = float_mat.at_2d::<opencv::core::Vec3f>(y, x)?;
            tensor[[0, y as usize, x as usize, 0]] = pixel[0];
            tensor[[0, y as usize, x as usize, 1]] = pixel[1];
            tensor[[0, y as usize, x as usize, 2]] = pixel[2];
        }
    }

    Ok(tensor)
}

/// 横幅が max_width を超える画像を縮小（アスペクト比維持）
pub fn downscale_to_width(frame: &Mat, max_width: u32) -> Result<Mat> {
    let width = frame.cols();
    let height = frame.rows();
    if max_width == 0 || width <= max_width as i32 {
        return Ok(frame.clone());
    }
    let scale = max_width as f64 / width as f64;
    let new_height = ((height as f64) * scale).round().max(1.0) as i32;
    let mut resized = Mat::default();
    imgproc::resize(
        frame,
        &mut resized,
        Size::new(max_width as i32, new_height),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;
    Ok(resized)
}
