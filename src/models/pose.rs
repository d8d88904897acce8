// Data models for body keypoints, pose embeddings and yoga pose classes

use serde::{Deserialize, Serialize};
use std::fmt;

// ==============================================================================
// Body Landmarks (17 keypoints, MoveNet order)
// ==============================================================================

/// Number of landmarks produced by the keypoint detector
pub const LANDMARK_COUNT: usize = 17;

/// Length of a flattened pose embedding (x/y per landmark)
pub const EMBEDDING_LEN: usize = LANDMARK_COUNT * 2;

/// MoveNet body landmark indices (17 total)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl BodyLandmark {
    /// All landmarks in the order the classifier was trained against
    pub const ALL: [BodyLandmark; LANDMARK_COUNT] = [
        BodyLandmark::Nose,
        BodyLandmark::LeftEye,
        BodyLandmark::RightEye,
        BodyLandmark::LeftEar,
        BodyLandmark::RightEar,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
        BodyLandmark::LeftElbow,
        BodyLandmark::RightElbow,
        BodyLandmark::LeftWrist,
        BodyLandmark::RightWrist,
        BodyLandmark::LeftHip,
        BodyLandmark::RightHip,
        BodyLandmark::LeftKnee,
        BodyLandmark::RightKnee,
        BodyLandmark::LeftAnkle,
        BodyLandmark::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BodyLandmark::Nose => "nose",
            BodyLandmark::LeftEye => "left_eye",
            BodyLandmark::RightEye => "right_eye",
            BodyLandmark::LeftEar => "left_ear",
            BodyLandmark::RightEar => "right_ear",
            BodyLandmark::LeftShoulder => "left_shoulder",
            BodyLandmark::RightShoulder => "right_shoulder",
            BodyLandmark::LeftElbow => "left_elbow",
            BodyLandmark::RightElbow => "right_elbow",
            BodyLandmark::LeftWrist => "left_wrist",
            BodyLandmark::RightWrist => "right_wrist",
            BodyLandmark::LeftHip => "left_hip",
            BodyLandmark::RightHip => "right_hip",
            BodyLandmark::LeftKnee => "left_knee",
            BodyLandmark::RightKnee => "right_knee",
            BodyLandmark::LeftAnkle => "left_ankle",
            BodyLandmark::RightAnkle => "right_ankle",
        }
    }

    /// Resolve a detector landmark name such as `left_hip`
    pub fn from_name(name: &str) -> PoseResult<Self> {
        let normalized = name.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|landmark| landmark.as_str() == normalized)
            .ok_or_else(|| PoseError::UnknownLandmark(name.to_string()))
    }

    /// Eyes are classified on but never drawn on the overlay
    pub fn is_eye(&self) -> bool {
        matches!(self, BodyLandmark::LeftEye | BodyLandmark::RightEye)
    }
}

impl fmt::Display for BodyLandmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// Keypoints
// ==============================================================================

/// A 2D keypoint in frame pixel coordinates with a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32, // Detection confidence [0, 1]
}

impl Keypoint {
    pub fn new(x: f32, y: f32, score: f32) -> Self {
        Self { x, y, score }
    }

    /// A keypoint is trusted only when its score is strictly above the threshold
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.score > threshold
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// All keypoints detected for a single frame, one per landmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointSet {
    keypoints: [Keypoint; LANDMARK_COUNT],
}

impl KeypointSet {
    pub fn new(keypoints: [Keypoint; LANDMARK_COUNT]) -> Self {
        Self { keypoints }
    }

    /// Build from a detector output ordered by landmark index
    pub fn from_ordered(keypoints: Vec<Keypoint>) -> PoseResult<Self> {
        let found = keypoints.len();
        let keypoints: [Keypoint; LANDMARK_COUNT] = keypoints
            .try_into()
            .map_err(|_| PoseError::IncompleteKeypoints(format!(
                "expected {} keypoints, got {}",
                LANDMARK_COUNT, found
            )))?;
        Ok(Self { keypoints })
    }

    /// Build from named detector output; every landmark must be present
    pub fn from_named<'a, I>(entries: I) -> PoseResult<Self>
    where
        I: IntoIterator<Item = (&'a str, Keypoint)>,
    {
        let mut slots: [Option<Keypoint>; LANDMARK_COUNT] = [None; LANDMARK_COUNT];
        for (name, keypoint) in entries {
            let landmark = BodyLandmark::from_name(name)?;
            slots[landmark.index()] = Some(keypoint);
        }

        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); LANDMARK_COUNT];
        for landmark in BodyLandmark::ALL {
            keypoints[landmark.index()] = slots[landmark.index()].ok_or_else(|| {
                PoseError::IncompleteKeypoints(format!("missing landmark {}", landmark))
            })?;
        }

        Ok(Self { keypoints })
    }

    pub fn get(&self, landmark: BodyLandmark) -> &Keypoint {
        &self.keypoints[landmark.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyLandmark, &Keypoint)> {
        BodyLandmark::ALL.into_iter().zip(self.keypoints.iter())
    }

    /// Number of keypoints whose score is at or below the threshold
    pub fn count_below(&self, threshold: f32) -> usize {
        self.keypoints
            .iter()
            .filter(|kp| !kp.is_confident(threshold))
            .count()
    }

    /// Landmarks whose score is above the threshold
    pub fn confident(&self, threshold: f32) -> Vec<(BodyLandmark, Keypoint)> {
        self.iter()
            .filter(|(_, kp)| kp.is_confident(threshold))
            .map(|(landmark, kp)| (landmark, *kp))
            .collect()
    }

    /// Apply a coordinate transform to every keypoint, keeping scores
    pub fn map_coords<F>(&self, f: F) -> Self
    where
        F: Fn(f32, f32) -> (f32, f32),
    {
        let mut keypoints = self.keypoints;
        for kp in keypoints.iter_mut() {
            let (x, y) = f(kp.x, kp.y);
            kp.x = x;
            kp.y = y;
        }
        Self { keypoints }
    }
}

// ==============================================================================
// Pose Embedding
// ==============================================================================

/// Normalized, flattened landmark coordinates fed to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseEmbedding(Vec<f32>);

impl PoseEmbedding {
    pub(crate) fn from_values(values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), EMBEDDING_LEN);
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalized (x, y) of a single landmark
    pub fn point(&self, landmark: BodyLandmark) -> (f32, f32) {
        let i = landmark.index() * 2;
        (self.0[i], self.0[i + 1])
    }
}

// ==============================================================================
// Yoga Poses
// ==============================================================================

/// Pose classes, declared in classifier output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YogaPose {
    Chair = 0,
    Cobra = 1,
    Dog = 2,
    NoPose = 3,
    Shoulderstand = 4,
    Triangle = 5,
    Tree = 6,
    Warrior = 7,
}

/// Number of classes in a classifier output
pub const POSE_CLASS_COUNT: usize = 8;

impl YogaPose {
    pub const ALL: [YogaPose; POSE_CLASS_COUNT] = [
        YogaPose::Chair,
        YogaPose::Cobra,
        YogaPose::Dog,
        YogaPose::NoPose,
        YogaPose::Shoulderstand,
        YogaPose::Triangle,
        YogaPose::Tree,
        YogaPose::Warrior,
    ];

    /// Poses offered for practice, in menu order
    pub fn selectable() -> [YogaPose; 7] {
        [
            YogaPose::Tree,
            YogaPose::Chair,
            YogaPose::Cobra,
            YogaPose::Warrior,
            YogaPose::Dog,
            YogaPose::Shoulderstand,
            YogaPose::Triangle,
        ]
    }

    pub fn class_index(self) -> usize {
        self as usize
    }

    pub fn is_selectable(&self) -> bool {
        *self != YogaPose::NoPose
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            YogaPose::Chair => "chair",
            YogaPose::Cobra => "cobra",
            YogaPose::Dog => "dog",
            YogaPose::NoPose => "no_pose",
            YogaPose::Shoulderstand => "shoulderstand",
            YogaPose::Triangle => "triangle",
            YogaPose::Tree => "tree",
            YogaPose::Warrior => "warrior",
        }
    }

    pub fn from_name(name: &str) -> PoseResult<Self> {
        let normalized = name.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|pose| pose.as_str() == normalized)
            .ok_or_else(|| PoseError::UnknownPose(name.to_string()))
    }

    /// Step-by-step cues shown next to the camera view
    pub fn instructions(&self) -> &'static [&'static str] {
        match self {
            YogaPose::Tree => &[
                "Stand straight with feet together",
                "Bend right knee and place foot on left inner thigh",
                "Extend arms overhead",
                "Hold the pose and breathe",
            ],
            YogaPose::Chair => &[
                "Stand with feet hip-width apart",
                "Bend knees as if sitting back into a chair",
                "Raise arms parallel to ground",
                "Keep back straight and breathe",
            ],
            YogaPose::Cobra => &[
                "Lie face down on the mat",
                "Place hands under shoulders",
                "Lift chest while keeping hips down",
                "Look slightly upward and breathe",
            ],
            YogaPose::Warrior => &[
                "Step one foot back into a lunge",
                "Bend front knee at 90 degrees",
                "Raise arms overhead",
                "Look forward and hold",
            ],
            YogaPose::Dog => &[
                "Start on hands and knees",
                "Lift hips toward ceiling",
                "Straighten arms and legs",
                "Press heels toward ground",
            ],
            YogaPose::Shoulderstand => &[
                "Lie on back",
                "Lift legs overhead",
                "Support lower back with hands",
                "Keep body straight and breathe",
            ],
            YogaPose::Triangle => &[
                "Stand with feet wide apart",
                "Turn right foot out 90 degrees",
                "Extend arms and bend to right",
                "Look up at top hand",
            ],
            YogaPose::NoPose => &[],
        }
    }
}

impl fmt::Display for YogaPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: one probability per pose class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseClassDistribution {
    probabilities: [f32; POSE_CLASS_COUNT],
}

impl PoseClassDistribution {
    pub fn from_probabilities(values: &[f32]) -> PoseResult<Self> {
        if values.len() != POSE_CLASS_COUNT {
            return Err(PoseError::InvalidClassifierOutput(format!(
                "expected {} class probabilities, got {}",
                POSE_CLASS_COUNT,
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(PoseError::InvalidClassifierOutput(format!(
                "non-finite probability {}",
                bad
            )));
        }

        let mut probabilities = [0.0; POSE_CLASS_COUNT];
        probabilities.copy_from_slice(values);
        Ok(Self { probabilities })
    }

    pub fn probability(&self, pose: YogaPose) -> f32 {
        self.probabilities[pose.class_index()]
    }

    pub fn most_likely(&self) -> (YogaPose, f32) {
        YogaPose::ALL
            .iter()
            .map(|pose| (*pose, self.probability(*pose)))
            .fold((YogaPose::NoPose, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            })
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.probabilities
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Pose detection not initialized")]
    NotInitialized,

    #[error("Practice session already running")]
    AlreadyRunning,

    #[error("Practice session not running")]
    NotRunning,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Incomplete keypoint set: {0}")]
    IncompleteKeypoints(String),

    #[error("Unknown landmark: {0}")]
    UnknownLandmark(String),

    #[error("Unknown pose: {0}")]
    UnknownPose(String),

    #[error("Pose cannot be practiced: {0}")]
    InvalidTarget(YogaPose),

    #[error("Degenerate pose: {0}")]
    DegeneratePose(String),

    #[error("Invalid classifier output: {0}")]
    InvalidClassifierOutput(String),

    #[error("Capture device unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Rendering failed: {0}")]
    RenderFailed(String),

    #[error("Practice task failed: {0}")]
    TaskFailed(String),

    #[error("Not supported in this build")]
    NotSupported,
}

pub type PoseResult<T> = Result<T, PoseError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_set(score: f32) -> KeypointSet {
        KeypointSet::new([Keypoint::new(1.0, 2.0, score); LANDMARK_COUNT])
    }

    #[test]
    fn test_keypoint_confidence_is_strict() {
        let keypoint = Keypoint::new(10.0, 20.0, 0.4);
        assert!(!keypoint.is_confident(0.4));
        assert!(keypoint.is_confident(0.39));
    }

    #[test]
    fn test_landmark_name_lookup() {
        assert_eq!(BodyLandmark::from_name("left_hip").unwrap(), BodyLandmark::LeftHip);
        assert_eq!(BodyLandmark::from_name("RIGHT_SHOULDER").unwrap(), BodyLandmark::RightShoulder);
        assert!(matches!(
            BodyLandmark::from_name("left_toe"),
            Err(PoseError::UnknownLandmark(_))
        ));
    }

    #[test]
    fn test_landmark_order_matches_indices() {
        for (i, landmark) in BodyLandmark::ALL.iter().enumerate() {
            assert_eq!(landmark.index(), i);
        }
    }

    #[test]
    fn test_from_ordered_rejects_wrong_length() {
        let result = KeypointSet::from_ordered(vec![Keypoint::new(0.0, 0.0, 1.0); 16]);
        assert!(matches!(result, Err(PoseError::IncompleteKeypoints(_))));
    }

    #[test]
    fn test_from_named_requires_every_landmark() {
        let mut entries: Vec<(&str, Keypoint)> = BodyLandmark::ALL
            .iter()
            .map(|l| (l.as_str(), Keypoint::new(l.index() as f32, 0.0, 0.9)))
            .collect();

        let set = KeypointSet::from_named(entries.clone()).unwrap();
        assert_eq!(set.get(BodyLandmark::RightKnee).x, 14.0);

        entries.retain(|(name, _)| *name != "nose");
        assert!(matches!(
            KeypointSet::from_named(entries),
            Err(PoseError::IncompleteKeypoints(_))
        ));
    }

    #[test]
    fn test_count_below_threshold() {
        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.9); LANDMARK_COUNT];
        keypoints[BodyLandmark::LeftAnkle.index()].score = 0.1;
        keypoints[BodyLandmark::RightAnkle.index()].score = 0.4;
        let set = KeypointSet::new(keypoints);

        assert_eq!(set.count_below(0.4), 2);
        assert_eq!(set.confident(0.4).len(), LANDMARK_COUNT - 2);
        assert_eq!(uniform_set(0.0).count_below(0.4), LANDMARK_COUNT);
    }

    #[test]
    fn test_pose_class_order() {
        assert_eq!(YogaPose::Chair.class_index(), 0);
        assert_eq!(YogaPose::NoPose.class_index(), 3);
        assert_eq!(YogaPose::Warrior.class_index(), 7);
        assert!(!YogaPose::selectable().contains(&YogaPose::NoPose));
        assert_eq!(YogaPose::selectable()[0], YogaPose::Tree);
    }

    #[test]
    fn test_pose_name_parsing() {
        assert_eq!(YogaPose::from_name("Tree").unwrap(), YogaPose::Tree);
        assert_eq!(YogaPose::from_name("no pose").unwrap(), YogaPose::NoPose);
        assert!(YogaPose::from_name("lotus").is_err());
    }

    #[test]
    fn test_instructions_cover_selectable_poses() {
        for pose in YogaPose::selectable() {
            assert_eq!(pose.instructions().len(), 4, "{} should have four cues", pose);
        }
        assert!(YogaPose::NoPose.instructions().is_empty());
    }

    #[test]
    fn test_class_distribution() {
        let dist = PoseClassDistribution::from_probabilities(&[
            0.01, 0.01, 0.01, 0.02, 0.0, 0.0, 0.95, 0.0,
        ])
        .unwrap();
        assert_eq!(dist.probability(YogaPose::Tree), 0.95);
        assert_eq!(dist.most_likely().0, YogaPose::Tree);

        assert!(PoseClassDistribution::from_probabilities(&[0.5; 7]).is_err());
        assert!(PoseClassDistribution::from_probabilities(&[f32::NAN; 8]).is_err());
    }
}
