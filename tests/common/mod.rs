//! 結合テスト共通の合成立位フィギュア

#![allow(dead_code)]

use movement_analyzer::pose::{Frame, Landmark, LandmarkIndex, Sequence};

const VISIBLE: f32 = 0.9;

/// 正規化画像座標（y下向き）の立位
///
/// 両腕を arm_deg だけ外転（0で下垂）し、全身を offset_x だけ横にずらす。
pub fn body_landmarks(arm_deg: f32, offset_x: f32) -> [Landmark; LandmarkIndex::COUNT] {
    use LandmarkIndex::*;

    let mut lms = [Landmark::new(0.5, 0.5, 0.0, VISIBLE); LandmarkIndex::COUNT];
    let mut set = |idx: LandmarkIndex, x: f32, y: f32| {
        lms[idx as usize] = Landmark::new(x + offset_x, y, 0.0, VISIBLE);
    };

    set(Nose, 0.50, 0.18);
    set(LeftEyeInner, 0.51, 0.16);
    set(LeftEye, 0.52, 0.16);
    set(LeftEyeOuter, 0.53, 0.16);
    set(RightEyeInner, 0.49, 0.16);
    set(RightEye, 0.48, 0.16);
    set(RightEyeOuter, 0.47, 0.16);
    set(LeftEar, 0.55, 0.17);
    set(RightEar, 0.45, 0.17);
    set(MouthLeft, 0.52, 0.21);
    set(MouthRight, 0.48, 0.21);

    let a = arm_deg.to_radians();
    let (dx, dy) = (a.sin(), a.cos());
    for (side, shoulder, elbow, wrist, pinky, index, thumb) in [
        (1.0f32, LeftShoulder, LeftElbow, LeftWrist, LeftPinky, LeftIndex, LeftThumb),
        (-1.0f32, RightShoulder, RightElbow, RightWrist, RightPinky, RightIndex, RightThumb),
    ] {
        let sx = 0.5 + side * 0.08;
        let sy = 0.30;
        set(shoulder, sx, sy);
        set(elbow, sx + side * 0.12 * dx, sy + 0.12 * dy);
        let wx = sx + side * 0.24 * dx;
        let wy = sy + 0.24 * dy;
        set(wrist, wx, wy);
        set(pinky, wx + side * 0.01, wy + 0.02);
        set(index, wx, wy + 0.025);
        set(thumb, wx - side * 0.01, wy + 0.015);
    }

    for (side, hip, knee, ankle, heel, foot) in [
        (1.0f32, LeftHip, LeftKnee, LeftAnkle, LeftHeel, LeftFootIndex),
        (-1.0f32, RightHip, RightKnee, RightAnkle, RightHeel, RightFootIndex),
    ] {
        let x = 0.5 + side * 0.05;
        set(hip, x, 0.55);
        set(knee, x + side * 0.005, 0.72);
        set(ankle, x, 0.90);
        set(heel, x - side * 0.005, 0.92);
        set(foot, x + side * 0.02, 0.93);
    }

    lms
}

pub fn body_frame(arm_deg: f32, offset_x: f32) -> Frame {
    Frame::new(body_landmarks(arm_deg, offset_x))
}

/// frames フレームかけて腕を上げ下げする（頂点90度）
pub fn arm_raise(frames: usize, offset_x: f32) -> Sequence {
    let period = (frames.max(2) - 1) as f32;
    let frames = (0..frames)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / period;
            body_frame(45.0 * (1.0 - phase.cos()), offset_x)
        })
        .collect();
    Sequence::new(frames, 30.0)
}
