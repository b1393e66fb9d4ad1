use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::positioning::{Positioning, PositioningCheck};
use super::reps::RepCounter;
use crate::analysis::JointAngle;
use crate::config::LiveConfig;
use crate::pose::Frame;

/// 関節角を読むときの可視性閾値
const ANGLE_VISIBILITY_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    WaitingForPosition,
    Tracking,
}

/// 1フレーム処理の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackerUpdate {
    /// 立ち位置待ち
    Positioning(Positioning),
    /// トラッキング中の累計レップ数
    Counter { count: u32, completed: bool },
}

/// セッションごとのライブトラッカー
///
/// 接続ごとに1つ所有し、到着順に1フレームずつ処理する。
/// ヒステリシスは順序依存なので並べ替えてはいけない。
#[derive(Debug, Clone)]
pub struct LiveTracker {
    state: TrackerState,
    positioning: PositioningCheck,
    counter: RepCounter,
    joint: JointAngle,
}

impl LiveTracker {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            state: TrackerState::WaitingForPosition,
            positioning: PositioningCheck::from_config(config),
            counter: RepCounter::new(config.down_angle, config.up_angle),
            joint: config.tracked_joint,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn rep_count(&self) -> u32 {
        self.counter.count()
    }

    pub fn tracked_joint(&self) -> JointAngle {
        self.joint
    }

    /// 1フレーム処理
    ///
    /// 位置待ち中は立ち位置を判定し、中央に入ったフレームからそのまま
    /// カウントを始める。トラッキングはリセットまで継続する。
    pub fn process(&mut self, frame: &Frame) -> TrackerUpdate {
        if self.state == TrackerState::WaitingForPosition {
            let positioning = self.positioning.check(frame);
            if !positioning.is_ready() {
                return TrackerUpdate::Positioning(positioning);
            }
            info!(joint = %self.joint, "subject positioned, tracking started");
            self.state = TrackerState::Tracking;
        }

        let completed = match self.joint.measure(frame, ANGLE_VISIBILITY_THRESHOLD) {
            Some(angle) => self.counter.update(angle),
            None => false,
        };
        if completed {
            debug!(count = self.counter.count(), "rep completed");
        }
        TrackerUpdate::Counter { count: self.counter.count(), completed }
    }

    /// カウントを0にして位置待ちに戻る
    pub fn reset(&mut self) {
        self.counter.reset();
        self.state = TrackerState::WaitingForPosition;
    }
}

impl Default for LiveTracker {
    fn default() -> Self {
        Self::new(&LiveConfig::default())
    }
}

/// 処理レート制限
///
/// 直前に受け付けたフレームから min_interval 未満で届いたフレームは捨てる。
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_accepted: None }
    }

    pub fn from_config(config: &LiveConfig) -> Self {
        Self::new(Duration::from_millis(config.min_frame_interval_ms))
    }

    /// now に届いたフレームを処理すべきか
    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_accepted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_accepted = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}
