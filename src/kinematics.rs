//! 角度・距離の基本関数

use crate::pose::{Frame, Landmark, LandmarkIndex};

/// 頂点bにおける b→a と b→c のなす角（度、0〜180）
///
/// 各ベクトルのX軸からの atan2 角の差の絶対値を取り、180度を超えたら
/// 360 - angle で折り返す（クランプではない）。zは無視する。
/// 長さ0のベクトルや非有限値では 0 を返す。
pub fn angle(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f32 {
    let ba = [a[0] - b[0], a[1] - b[1]];
    let bc = [c[0] - b[0], c[1] - b[1]];
    if is_degenerate(ba) || is_degenerate(bc) {
        return 0.0;
    }

    let radians = bc[1].atan2(bc[0]) - ba[1].atan2(ba[0]);
    let mut degrees = radians.to_degrees().abs();
    if degrees > 180.0 {
        degrees = 360.0 - degrees;
    }
    if degrees.is_finite() {
        degrees
    } else {
        0.0
    }
}

fn is_degenerate(v: [f32; 2]) -> bool {
    !(v[0].is_finite() && v[1].is_finite()) || (v[0] == 0.0 && v[1] == 0.0)
}

/// ユークリッド距離（2D/3D共通）
pub fn distance<const N: usize>(p: [f32; N], q: [f32; N]) -> f32 {
    p.iter()
        .zip(q.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

/// 可視性が閾値を超えるか
pub fn visible(landmark: &Landmark, threshold: f32) -> bool {
    landmark.is_visible(threshold)
}

/// 3点すべてが可視のときだけ角度を返す
pub fn landmark_angle(
    frame: &Frame,
    a: LandmarkIndex,
    b: LandmarkIndex,
    c: LandmarkIndex,
    threshold: f32,
) -> Option<f32> {
    let a = frame.visible(a, threshold)?;
    let b = frame.visible(b, threshold)?;
    let c = frame.visible(c, threshold)?;
    Some(angle(a.xy(), b.xy(), c.xy()))
}

/// 2点の中点 (x, y)
pub fn midpoint(p: [f32; 2], q: [f32; 2]) -> [f32; 2] {
    [(p[0] + q[0]) / 2.0, (p[1] + q[1]) / 2.0]
}

/// 可視なランドマークの2D重心（1つも可視でなければNone）
pub fn visible_centroid(frame: &Frame, indices: &[LandmarkIndex], threshold: f32) -> Option<[f32; 2]> {
    let mut sum = [0.0f32; 2];
    let mut count = 0usize;
    for &idx in indices {
        if let Some(lm) = frame.visible(idx, threshold) {
            sum[0] += lm.x;
            sum[1] += lm.y;
            count += 1;
        }
    }
    if count == 0 {
        return None;
    }
    Some([sum[0] / count as f32, sum[1] / count as f32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_basic() {
        assert!((angle([1.0, 0.0], [0.0, 0.0], [0.0, 1.0]) - 90.0).abs() < 1e-4);
        assert!((angle([1.0, 0.0], [0.0, 0.0], [-1.0, 0.0]) - 180.0).abs() < 1e-4);
        assert!(angle([1.0, 0.0], [0.0, 0.0], [1.0, 0.0]).abs() < 1e-4);
    }

    #[test]
    fn test_angle_reflection_not_clamp() {
        // a: 170度、c: -170度 -> 生の差は340度、折り返して20度
        let a = [170f32.to_radians().cos(), 170f32.to_radians().sin()];
        let c = [(-170f32).to_radians().cos(), (-170f32).to_radians().sin()];
        let raw = (c[1].atan2(c[0]) - a[1].atan2(a[0])).to_degrees().abs();
        assert!(raw > 180.0);
        let result = angle(a, [0.0, 0.0], c);
        assert!((result - (360.0 - raw)).abs() < 1e-3);
        assert!((result - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_angle_is_symmetric_in_rays() {
        let a = [0.3, 0.9];
        let b = [0.1, 0.2];
        let c = [0.8, 0.4];
        assert!((angle(a, b, c) - angle(c, b, a)).abs() < 1e-4);
    }

    #[test]
    fn test_angle_degenerate() {
        assert_eq!(angle([0.0, 0.0], [0.0, 0.0], [1.0, 0.0]), 0.0);
        assert_eq!(angle([f32::NAN, 0.0], [0.0, 0.0], [1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_distance() {
        assert!((distance([0.0, 0.0], [3.0, 4.0]) - 5.0).abs() < 1e-6);
        assert!((distance([1.0, 2.0, 3.0], [1.0, 2.0, 5.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_landmark_angle_gating() {
        let mut lms = [Landmark::new(0.0, 0.0, 0.0, 0.9); LandmarkIndex::COUNT];
        lms[LandmarkIndex::LeftShoulder as usize] = Landmark::new(1.0, 0.0, 0.0, 0.9);
        lms[LandmarkIndex::LeftWrist as usize] = Landmark::new(0.0, 1.0, 0.0, 0.9);
        let frame = Frame::new(lms);
        let a = landmark_angle(
            &frame,
            LandmarkIndex::LeftShoulder,
            LandmarkIndex::LeftElbow,
            LandmarkIndex::LeftWrist,
            0.5,
        );
        assert!((a.unwrap() - 90.0).abs() < 1e-4);

        lms[LandmarkIndex::LeftElbow as usize].visibility = 0.5;
        let frame = Frame::new(lms);
        assert!(landmark_angle(
            &frame,
            LandmarkIndex::LeftShoulder,
            LandmarkIndex::LeftElbow,
            LandmarkIndex::LeftWrist,
            0.5,
        )
        .is_none());
    }

    #[test]
    fn test_visible_centroid() {
        let mut lms = [Landmark::new(0.0, 0.0, 0.0, 0.1); LandmarkIndex::COUNT];
        lms[11] = Landmark::new(0.4, 0.2, 0.0, 0.9);
        lms[23] = Landmark::new(0.6, 0.6, 0.0, 0.9);
        let frame = Frame::new(lms);
        let c = visible_centroid(
            &frame,
            &[
                LandmarkIndex::LeftShoulder,
                LandmarkIndex::RightShoulder,
                LandmarkIndex::LeftHip,
                LandmarkIndex::RightHip,
            ],
            0.5,
        )
        .unwrap();
        assert!((c[0] - 0.5).abs() < 1e-6);
        assert!((c[1] - 0.4).abs() < 1e-6);
        assert!(visible_centroid(&Frame::empty(), &[LandmarkIndex::Nose], 0.5).is_none());
    }
}
