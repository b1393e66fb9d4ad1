//! MetricResult / ComparisonResult のテキスト出力

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::analysis::MetricResult;
use crate::compare::{ComparisonResult, Verdict};
use crate::triangulation::Reconstruction3D;

/// 推奨事項
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    BalanceTraining,
    CoordinationTiming,
    ArmAsymmetry,
    LegAsymmetry,
    Excellent,
}

impl Recommendation {
    pub fn message(self) -> &'static str {
        match self {
            Recommendation::BalanceTraining => "Focus on core stability and balance training",
            Recommendation::CoordinationTiming => "Work on movement coordination and timing",
            Recommendation::ArmAsymmetry => "Address arm movement asymmetries",
            Recommendation::LegAsymmetry => "Work on leg movement symmetry",
            Recommendation::Excellent => "Excellent movement quality! Focus on consistency",
        }
    }
}

/// スコアに基づく推奨事項
pub fn recommendations(metrics: &MetricResult) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if metrics.balance < 70.0 {
        out.push(Recommendation::BalanceTraining);
    }
    if metrics.smoothness < 70.0 {
        out.push(Recommendation::CoordinationTiming);
    }
    if metrics.symmetry.arm < 80.0 {
        out.push(Recommendation::ArmAsymmetry);
    }
    if metrics.symmetry.leg < 80.0 {
        out.push(Recommendation::LegAsymmetry);
    }
    if metrics.overall > 80.0 {
        out.push(Recommendation::Excellent);
    }
    out
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 解析レポート
pub fn generate_report(metrics: &MetricResult) -> String {
    let mut r = String::new();
    write_report(&mut r, metrics).ok();
    r
}

fn write_report(r: &mut String, m: &MetricResult) -> std::fmt::Result {
    writeln!(r, "MOVEMENT ANALYSIS REPORT")?;
    writeln!(r, "========================")?;
    writeln!(r)?;
    writeln!(
        r,
        "Frames: {} ({} with pose) at {:.1} fps",
        m.frame_count, m.detected_frames, m.fps
    )?;
    writeln!(r, "OVERALL SCORE: {:.1}/100", m.overall)?;
    writeln!(r)?;
    writeln!(r, "KEY METRICS:")?;
    writeln!(r, "------------")?;
    writeln!(r, "Balance: {:.1}", m.balance)?;
    writeln!(r, "Smoothness: {:.1}", m.smoothness)?;
    writeln!(r, "Speed: {:.2}", m.speed)?;
    writeln!(r, "Cohesion: {:.1}", m.cohesion)?;
    writeln!(r)?;
    writeln!(r, "SYMMETRY:")?;
    writeln!(r, "---------")?;
    writeln!(r, "Arm Symmetry: {:.1}", m.symmetry.arm)?;
    writeln!(r, "Leg Symmetry: {:.1}", m.symmetry.leg)?;
    writeln!(r)?;
    writeln!(r, "RANGE OF MOTION:")?;
    writeln!(r, "----------------")?;
    for (joint, rom) in &m.range_of_motion {
        writeln!(r, "{}: {:.1}°", title_case(joint.name()), rom)?;
    }
    writeln!(r)?;
    writeln!(r, "PEAK VELOCITIES:")?;
    writeln!(r, "----------------")?;
    for (limb, power) in &m.power {
        writeln!(r, "{}: {:.4}", title_case(limb.name()), power.peak_velocity)?;
    }
    writeln!(r)?;
    writeln!(r, "CENTER OF MASS:")?;
    writeln!(r, "---------------")?;
    writeln!(r, "Total Displacement: {:.4}", m.com_displacement)?;
    writeln!(r, "Stability X (std): {:.4}", m.com_stability[0])?;
    writeln!(r, "Stability Y (std): {:.4}", m.com_stability[1])?;
    writeln!(r)?;
    writeln!(r, "RECOMMENDATIONS:")?;
    writeln!(r, "----------------")?;
    for rec in recommendations(m) {
        writeln!(r, "- {}", rec.message())?;
    }
    Ok(())
}

/// 比較レポート
pub fn comparison_report(result: &ComparisonResult) -> String {
    let mut r = String::new();
    write_comparison(&mut r, result).ok();
    r
}

fn write_comparison(r: &mut String, c: &ComparisonResult) -> std::fmt::Result {
    writeln!(r, "MOVEMENT COMPARISON")?;
    writeln!(r, "===================")?;
    writeln!(r)?;
    writeln!(r, "{:<12} {:>10} {:>10} {:>8}", "metric", "reference", "new", "delta")?;
    for change in &c.changes {
        let mark = match change.verdict {
            Verdict::Improved => "+",
            Verdict::Regressed => "-",
            Verdict::Unchanged => " ",
        };
        writeln!(
            r,
            "{:<12} {:>10.2} {:>10.2} {:>+8.2} {}",
            change.metric.name(),
            change.reference, change.new, change.delta, mark
        )?;
    }
    writeln!(r)?;
    writeln!(r, "Improvements: {}", c.improvements)?;
    writeln!(r, "Regressions: {}", c.regressions)?;
    Ok(())
}

/// 3D再構成の概要
pub fn reconstruction_report(recon: &Reconstruction3D) -> String {
    let mut r = String::new();
    write_reconstruction(&mut r, recon).ok();
    r
}

fn write_reconstruction(r: &mut String, recon: &Reconstruction3D) -> std::fmt::Result {
    let q = &recon.quality;
    writeln!(r, "3D RECONSTRUCTION ({} views)", recon.view_count)?;
    writeln!(r, "Landmarks reconstructed: {}/{}", recon.confident_count(), recon.landmarks.len())?;
    writeln!(r, "Reconstruction accuracy: {:.1}", q.overall * 100.0)?;
    writeln!(r, "Pose completeness: {:.1}", q.completeness * 100.0)?;
    writeln!(r, "Average confidence: {:.1}", q.average_confidence * 100.0)?;
    writeln!(r, "Symmetry: {:.1}", q.symmetry * 100.0)?;
    for (joint, angle) in recon.joint_angles() {
        writeln!(r, "{}: {:.1}°", title_case(joint.name()), angle)?;
    }
    Ok(())
}
