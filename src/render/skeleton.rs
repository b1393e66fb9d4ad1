use crate::pose::LandmarkIndex;

/// 骨格の接続定義 (開始ランドマーク, 終了ランドマーク)
pub const POSE_CONNECTIONS: [(LandmarkIndex, LandmarkIndex); 35] = {
    use LandmarkIndex::*;
    [
        // 顔
        (Nose, RightEyeInner),
        (RightEyeInner, RightEye),
        (RightEye, RightEyeOuter),
        (RightEyeOuter, RightEar),
        (Nose, LeftEyeInner),
        (LeftEyeInner, LeftEye),
        (LeftEye, LeftEyeOuter),
        (LeftEyeOuter, LeftEar),
        (MouthLeft, MouthRight),
        // 上半身
        (LeftShoulder, RightShoulder),
        (LeftShoulder, LeftElbow),
        (LeftElbow, LeftWrist),
        (LeftWrist, LeftPinky),
        (LeftWrist, LeftIndex),
        (LeftWrist, LeftThumb),
        (LeftPinky, LeftIndex),
        (RightShoulder, RightElbow),
        (RightElbow, RightWrist),
        (RightWrist, RightPinky),
        (RightWrist, RightIndex),
        (RightWrist, RightThumb),
        (RightPinky, RightIndex),
        // 胴体
        (LeftShoulder, LeftHip),
        (RightShoulder, RightHip),
        (LeftHip, RightHip),
        // 下半身
        (LeftHip, LeftKnee),
        (LeftKnee, LeftAnkle),
        (LeftAnkle, LeftHeel),
        (LeftHeel, LeftFootIndex),
        (LeftAnkle, LeftFootIndex),
        (RightHip, RightKnee),
        (RightKnee, RightAnkle),
        (RightAnkle, RightHeel),
        (RightHeel, RightFootIndex),
        (RightAnkle, RightFootIndex),
    ]
};

/// ランドマークの色 (BGR)
pub const LANDMARK_COLOR: [f64; 3] = [0.0, 255.0, 0.0];

/// 骨格線の色 (BGR)
pub const SKELETON_COLOR: [f64; 3] = [0.0, 255.0, 255.0];

/// 可視性が低いランドマークの色 (BGR)
pub const LOW_VISIBILITY_COLOR: [f64; 3] = [0.0, 0.0, 255.0];

#[cfg(feature = "desktop")]
pub use draw::draw_skeleton;

#[cfg(feature = "desktop")]
mod draw {
    use anyhow::Result;
    use opencv::core::{Mat, Point, Scalar};
    use opencv::imgproc;
    use opencv::prelude::*;

    use super::{LANDMARK_COLOR, LOW_VISIBILITY_COLOR, POSE_CONNECTIONS, SKELETON_COLOR};
    use crate::pose::Frame;

    fn scalar(c: [f64; 3]) -> Scalar {
        Scalar::new(c[0], c[1], c[2], 0.0)
    }

    /// BGR画像にフレームの骨格を描画。未検出フレームは何もしない
    pub fn draw_skeleton(image: &mut Mat, frame: &Frame, threshold: f32) -> Result<()> {
        let Some(landmarks) = frame.landmarks() else {
            return Ok(());
        };
        let w = image.cols().max(0) as u32;
        let h = image.rows().max(0) as u32;

        for (a, b) in POSE_CONNECTIONS.iter() {
            let start = &landmarks[*a as usize];
            let end = &landmarks[*b as usize];
            if start.is_visible(threshold) && end.is_visible(threshold) {
                let (x1, y1) = start.to_pixel(w, h);
                let (x2, y2) = end.to_pixel(w, h);
                imgproc::line(
                    image,
                    Point::new(x1, y1),
                    Point::new(x2, y2),
                    scalar(SKELETON_COLOR),
                    2,
                    imgproc::LINE_8,
                    0,
                )?;
            }
        }

        for lm in landmarks.iter() {
            let (px, py) = lm.to_pixel(w, h);
            let color = if lm.is_visible(threshold) { LANDMARK_COLOR } else { LOW_VISIBILITY_COLOR };
            imgproc::circle(image, Point::new(px, py), 3, scalar(color), -1, imgproc::LINE_8, 0)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_connections_unique_and_in_range() {
        let mut seen = HashSet::new();
        for (a, b) in POSE_CONNECTIONS.iter() {
            assert_ne!(a, b);
            assert!((*a as usize) < LandmarkIndex::COUNT);
            assert!((*b as usize) < LandmarkIndex::COUNT);
            let key = if a < b { (*a, *b) } else { (*b, *a) };
            assert!(seen.insert(key), "duplicate edge {:?}", key);
        }
    }

    #[test]
    fn test_every_landmark_is_connected() {
        let touched: HashSet<LandmarkIndex> =
            POSE_CONNECTIONS.iter().flat_map(|(a, b)| [*a, *b]).collect();
        assert_eq!(touched.len(), LandmarkIndex::COUNT);
    }
}
