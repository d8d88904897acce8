// Per-tick pose evaluation - detection, confidence gate, normalization,
// classification and hold tracking for one frame

use crate::core::config::PracticeConfig;
use crate::core::hold_tracker::HoldTracker;
use crate::core::pose_normalizer::PoseNormalizer;
use crate::models::capture::VideoFrame;
use crate::models::pose::{
    BodyLandmark, Keypoint, KeypointSet, PoseClassDistribution, PoseError, PoseResult, YogaPose,
};
use crate::models::session::{HoldSnapshot, HoldState, Rgb, SkeletonFeedback};
use crate::platform::pose::{KeypointDetector, PoseClassifier};
use std::time::Instant;

/// What happened to a frame
#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    /// Classifier ran; `probability` is the target pose's share
    Classified {
        probability: f32,
        distribution: PoseClassDistribution,
    },
    /// Too many keypoints at or below the confidence threshold
    LowConfidence { missing: usize },
    /// Keypoints collapsed to a point and could not be normalized
    Degenerate(String),
    /// Capture, detection or classification error
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub status: TickStatus,
    /// Overlay for this frame; neutral unless the pose was confirmed on it
    pub feedback: SkeletonFeedback,
    /// Keypoints to draw, `None` when the overlay should be left as is
    pub render_keypoints: Option<Vec<(BodyLandmark, Keypoint)>>,
    /// Hold timing; the source of truth for whether a hold is in progress
    pub hold: HoldSnapshot,
}

impl TickOutcome {
    pub fn is_classified(&self) -> bool {
        matches!(self.status, TickStatus::Classified { .. })
    }
}

pub struct PoseEvaluator {
    target: YogaPose,
    keypoint_threshold: f32,
    max_low_confidence: usize,
    holding_color: Rgb,
    neutral_color: Rgb,
    normalizer: PoseNormalizer,
    tracker: HoldTracker,
}

impl PoseEvaluator {
    pub fn new(config: &PracticeConfig, target: YogaPose) -> PoseResult<Self> {
        if !target.is_selectable() {
            return Err(PoseError::InvalidTarget(target));
        }

        Ok(Self {
            target,
            keypoint_threshold: config.keypoint_confidence_threshold,
            max_low_confidence: config.max_low_confidence_keypoints,
            holding_color: config.holding_color,
            neutral_color: config.neutral_color,
            normalizer: PoseNormalizer::new(config.torso_size_multiplier),
            tracker: HoldTracker::new(config.pose_confidence_threshold),
        })
    }

    pub fn target(&self) -> YogaPose {
        self.target
    }

    /// Switch target pose; hold timing starts over
    pub fn set_target(&mut self, target: YogaPose) -> PoseResult<()> {
        if !target.is_selectable() {
            return Err(PoseError::InvalidTarget(target));
        }
        self.target = target;
        self.tracker.reset();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    pub fn snapshot(&self) -> HoldSnapshot {
        self.tracker.snapshot(self.target)
    }

    fn feedback(&self, state: HoldState) -> SkeletonFeedback {
        let holding = state == HoldState::Holding;
        SkeletonFeedback {
            holding,
            skeleton_color: if holding {
                self.holding_color
            } else {
                self.neutral_color
            },
        }
    }

    fn neutral_feedback(&self) -> SkeletonFeedback {
        self.feedback(HoldState::NotHolding)
    }

    /// Outcome for a tick that produced nothing usable; hold state is untouched
    pub fn failed(&self, reason: impl Into<String>) -> TickOutcome {
        TickOutcome {
            status: TickStatus::Failed(reason.into()),
            feedback: self.feedback(self.tracker.state()),
            render_keypoints: None,
            hold: self.snapshot(),
        }
    }

    /// Run the full pipeline on one frame
    pub async fn evaluate(
        &mut self,
        frame: &VideoFrame,
        detector: &dyn KeypointDetector,
        classifier: &dyn PoseClassifier,
        now: Instant,
    ) -> TickOutcome {
        match detector.detect(frame).await {
            Ok(keypoints) => self.evaluate_keypoints(&keypoints, classifier, now).await,
            Err(e) => {
                tracing::warn!(error = %e, "Keypoint detection failed");
                self.failed(e.to_string())
            }
        }
    }

    /// Gate, normalize and classify already detected keypoints
    pub async fn evaluate_keypoints(
        &mut self,
        keypoints: &KeypointSet,
        classifier: &dyn PoseClassifier,
        now: Instant,
    ) -> TickOutcome {
        let render: Vec<(BodyLandmark, Keypoint)> = keypoints
            .confident(self.keypoint_threshold)
            .into_iter()
            .filter(|(landmark, _)| !landmark.is_eye())
            .collect();

        let missing = keypoints.count_below(self.keypoint_threshold);
        if missing > self.max_low_confidence {
            tracing::debug!(missing, "Frame rejected, too few confident keypoints");
            return TickOutcome {
                status: TickStatus::LowConfidence { missing },
                feedback: self.neutral_feedback(),
                render_keypoints: Some(render),
                hold: self.snapshot(),
            };
        }

        let embedding = match self.normalizer.normalize(keypoints) {
            Ok(embedding) => embedding,
            Err(e) => {
                tracing::debug!(error = %e, "Frame rejected, degenerate pose");
                return TickOutcome {
                    status: TickStatus::Degenerate(e.to_string()),
                    feedback: self.neutral_feedback(),
                    render_keypoints: Some(render),
                    hold: self.snapshot(),
                };
            }
        };

        let distribution = match classifier.classify(&embedding).await {
            Ok(distribution) => distribution,
            Err(e) => {
                tracing::warn!(error = %e, "Pose classification failed");
                return self.failed(e.to_string());
            }
        };

        let probability = distribution.probability(self.target);
        let state = self.tracker.update(probability, now);

        TickOutcome {
            status: TickStatus::Classified {
                probability,
                distribution,
            },
            feedback: self.feedback(state),
            render_keypoints: Some(render),
            hold: self.snapshot(),
        }
    }
}
