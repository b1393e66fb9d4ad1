mod common;

use common::{arm_raise, body_landmarks};
use nalgebra::Vector3;

use movement_analyzer::analysis::{JointAngle, MetricEngine};
use movement_analyzer::pose::{Frame, Landmark, LandmarkIndex, Sequence};
use movement_analyzer::triangulation::{CameraProjection, Triangulator};

/// 画像座標の人物をリグ中心のメートル座標（Y上向き）に持ち上げる
fn lift(landmarks: &[Landmark; LandmarkIndex::COUNT]) -> Vec<Vector3<f64>> {
    landmarks
        .iter()
        .enumerate()
        .map(|(i, lm)| {
            Vector3::new(
                (lm.x as f64 - 0.5) * 1.6,
                (0.5 - lm.y as f64) * 1.6,
                0.05 * (i as f64).sin(),
            )
        })
        .collect()
}

fn project(camera: &CameraProjection, points: &[Vector3<f64>]) -> Frame {
    let landmarks = points
        .iter()
        .map(|p| {
            let (x, y) = camera.project_normalized(p).unwrap();
            Landmark::new(x as f32, y as f32, 0.0, 0.9)
        })
        .collect();
    Frame::from_landmarks(landmarks).unwrap()
}

#[test]
fn reconstruction_recovers_geometry() {
    let triangulator = Triangulator::default();
    let rig = triangulator.rig(3);
    let truth = lift(&body_landmarks(40.0, 0.0));
    let views: Vec<Frame> = rig.iter().map(|c| project(c, &truth)).collect();

    let validation = triangulator.validate_views(&views);
    assert!(validation.ready_for_3d);

    let recon = triangulator.triangulate(&views, &rig).unwrap();
    assert_eq!(recon.view_count, 3);
    assert_eq!(recon.confident_count(), LandmarkIndex::COUNT);
    for (p, t) in recon.landmarks.iter().zip(truth.iter()) {
        let err = Vector3::new(p.x as f64, p.y as f64, p.z as f64) - t;
        assert!(err.norm() < 1e-3, "error {}", err.norm());
    }

    let angles = recon.joint_angles();
    let elbow = angles[&JointAngle::LeftElbow];
    assert!((elbow - 180.0).abs() < 1.0, "{}", elbow);
}

#[test]
fn reconstructed_sequence_feeds_metric_engine() {
    let triangulator = Triangulator::default();
    let rig = triangulator.rig(3);
    let image_sequence = arm_raise(20, 0.0);

    let views: Vec<Sequence> = rig
        .iter()
        .map(|camera| {
            let frames = image_sequence
                .iter()
                .map(|f| project(camera, &lift(f.landmarks().unwrap())))
                .collect();
            Sequence::new(frames, image_sequence.fps())
        })
        .collect();

    let sequence_3d = triangulator.triangulate_sequence(&views).unwrap();
    assert_eq!(sequence_3d.len(), 20);
    assert_eq!(sequence_3d.detected_frames(), 20);

    let engine = MetricEngine::default();
    let from_3d = engine.analyze(&sequence_3d);
    let from_2d = engine.analyze(&image_sequence);

    // 拡大と平行移動だけなので角度は一致する
    for joint in [JointAngle::LeftShoulder, JointAngle::RightShoulder, JointAngle::LeftElbow] {
        let a = from_3d.range_of_motion[&joint];
        let b = from_2d.range_of_motion[&joint];
        assert!((a - b).abs() < 0.5, "{:?}: {} vs {}", joint, a, b);
    }
    assert!(from_3d.overall.is_finite());
}
