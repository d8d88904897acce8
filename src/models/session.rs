// Data models for practice sessions, hold timing and overlay feedback

use crate::models::pose::YogaPose;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ==============================================================================
// Hold State
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldState {
    NotHolding,
    Holding,
}

/// Hold timing as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldSnapshot {
    pub target: YogaPose,
    pub state: HoldState,
    pub current_hold: Duration,
    pub best_hold: Duration,
}

impl HoldSnapshot {
    pub fn idle(target: YogaPose) -> Self {
        Self {
            target,
            state: HoldState::NotHolding,
            current_hold: Duration::ZERO,
            best_hold: Duration::ZERO,
        }
    }

    pub fn is_holding(&self) -> bool {
        self.state == HoldState::Holding
    }

    /// e.g. "4.2s"
    pub fn format_current(&self) -> String {
        format_seconds(self.current_hold)
    }

    pub fn format_best(&self) -> String {
        format_seconds(self.best_hold)
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}

// ==============================================================================
// Overlay Feedback
// ==============================================================================

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
    pub const GREEN: Rgb = Rgb([0, 255, 0]);

    pub fn to_rgba(self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 255]
    }
}

/// Visual state for one tick, handed from the hold tracker to the renderer
///
/// Describes the frame, not the timer: a frame rejected for low confidence
/// draws neutral even while the hold timer keeps its Holding state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkeletonFeedback {
    /// The target pose was confirmed on this frame
    pub holding: bool,
    pub skeleton_color: Rgb,
}

// ==============================================================================
// Session Summary
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub target: YogaPose,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_ticks: u64,
    pub classified_ticks: u64,
    pub low_confidence_ticks: u64,
    pub degenerate_ticks: u64,
    pub failed_ticks: u64,
    pub best_hold: Duration,
}

impl SessionSummary {
    /// Share of ticks where the classifier actually ran
    pub fn classified_ratio(&self) -> f32 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.classified_ticks as f32 / self.total_ticks as f32
        }
    }
}
