use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{similarity, MetricEngine, MetricResult};
use crate::config::ScoringConfig;
use crate::pose::Sequence;

/// 比較対象の5指標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparedMetric {
    Similarity,
    Smoothness,
    Speed,
    Cohesion,
    Accuracy,
}

impl ComparedMetric {
    pub const ALL: [ComparedMetric; 5] = [
        ComparedMetric::Similarity,
        ComparedMetric::Smoothness,
        ComparedMetric::Speed,
        ComparedMetric::Cohesion,
        ComparedMetric::Accuracy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ComparedMetric::Similarity => "similarity",
            ComparedMetric::Smoothness => "smoothness",
            ComparedMetric::Speed => "speed",
            ComparedMetric::Cohesion => "cohesion",
            ComparedMetric::Accuracy => "accuracy",
        }
    }
}

/// 比較に使うスコア一式 [0,100]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSet {
    pub similarity: f32,
    pub smoothness: f32,
    pub speed: f32,
    pub cohesion: f32,
    pub accuracy: f32,
}

impl ScoreSet {
    pub fn get(&self, metric: ComparedMetric) -> f32 {
        match metric {
            ComparedMetric::Similarity => self.similarity,
            ComparedMetric::Smoothness => self.smoothness,
            ComparedMetric::Speed => self.speed,
            ComparedMetric::Cohesion => self.cohesion,
            ComparedMetric::Accuracy => self.accuracy,
        }
    }

    fn clamped(self) -> Self {
        let c = |v: f32| if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            similarity: c(self.similarity),
            smoothness: c(self.smoothness),
            speed: c(self.speed),
            cohesion: c(self.cohesion),
            accuracy: c(self.accuracy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Improved,
    Regressed,
    Unchanged,
}

/// 1指標の変化
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: ComparedMetric,
    pub reference: f32,
    pub new: f32,
    pub delta: f32,
    pub verdict: Verdict,
}

/// 差分の判定。閾値ちょうどは変化なし
pub fn classify(delta: f32, threshold: f32) -> Verdict {
    if delta > threshold {
        Verdict::Improved
    } else if delta < -threshold {
        Verdict::Regressed
    } else {
        Verdict::Unchanged
    }
}

/// 指標ごとの変化と (改善数, 後退数)
pub fn improvements_regressions(
    past: &ScoreSet,
    new: &ScoreSet,
    threshold: f32,
) -> (Vec<MetricChange>, usize, usize) {
    let changes: Vec<MetricChange> = ComparedMetric::ALL
        .iter()
        .map(|&metric| {
            let reference = past.get(metric);
            let value = new.get(metric);
            let delta = value - reference;
            MetricChange { metric, reference, new: value, delta, verdict: classify(delta, threshold) }
        })
        .collect();
    let improvements = changes.iter().filter(|c| c.verdict == Verdict::Improved).count();
    let regressions = changes.iter().filter(|c| c.verdict == Verdict::Regressed).count();
    (changes, improvements, regressions)
}

/// 参照と新規の比較結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// 新規系列のスコア（類似度は2系列間）
    pub scores: ScoreSet,
    /// 参照系列の基準スコア（類似度・正確さは自己比較）
    pub baseline: ScoreSet,
    pub improvements: usize,
    pub regressions: usize,
    pub changes: Vec<MetricChange>,
    pub reference: MetricResult,
    pub new: MetricResult,
}

/// 参照系列と新規系列を比較
pub fn compare(reference: &Sequence, new: &Sequence, config: &ScoringConfig) -> ComparisonResult {
    let engine = MetricEngine::new(config.clone());
    let threshold = config.visibility_threshold;

    // 参照は自己比較が基準
    let reference_result = engine.analyze(reference);
    let new_result = engine.analyze_against(new, reference);

    let baseline = ScoreSet {
        similarity: reference_result.similarity,
        smoothness: reference_result.smoothness,
        speed: reference_result.speed,
        cohesion: reference_result.cohesion,
        accuracy: reference_result.accuracy,
    }
    .clamped();

    let scores = ScoreSet {
        similarity: similarity::similarity(reference, new, threshold),
        smoothness: new_result.smoothness,
        speed: new_result.speed,
        cohesion: new_result.cohesion,
        accuracy: new_result.accuracy,
    }
    .clamped();

    let (changes, improvements, regressions) =
        improvements_regressions(&baseline, &scores, config.improvement_threshold);

    for change in &changes {
        debug!(
            metric = ?change.metric,
            reference = change.reference,
            new = change.new,
            verdict = ?change.verdict,
            "metric compared"
        );
    }
    info!(
        similarity = scores.similarity,
        improvements,
        regressions,
        "comparison finished"
    );

    ComparisonResult {
        scores,
        baseline,
        improvements,
        regressions,
        changes,
        reference: reference_result,
        new: new_result,
    }
}
