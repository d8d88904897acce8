// Pose normalization - turns raw keypoints into a translation and scale invariant embedding

use crate::models::pose::{
    BodyLandmark, KeypointSet, PoseEmbedding, PoseError, PoseResult, EMBEDDING_LEN,
};

/// Reference multiplier applied to the torso length
pub const DEFAULT_TORSO_SIZE_MULTIPLIER: f32 = 2.5;

/// Pose sizes at or below this are treated as a single-point detection
pub const MIN_POSE_SIZE: f32 = 1e-6;

/// Geometry measured while normalizing a keypoint set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMetrics {
    pub hip_center: (f32, f32),
    pub shoulder_center: (f32, f32),
    pub torso_size: f32,
    pub max_distance: f32,
    pub pose_size: f32,
}

/// Normalizer bound to a configured torso multiplier
#[derive(Debug, Clone, Copy)]
pub struct PoseNormalizer {
    torso_size_multiplier: f32,
}

impl PoseNormalizer {
    pub fn new(torso_size_multiplier: f32) -> Self {
        Self {
            torso_size_multiplier,
        }
    }

    pub fn normalize(&self, keypoints: &KeypointSet) -> PoseResult<PoseEmbedding> {
        normalize(keypoints, self.torso_size_multiplier)
    }
}

impl Default for PoseNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TORSO_SIZE_MULTIPLIER)
    }
}

fn midpoint(keypoints: &KeypointSet, left: BodyLandmark, right: BodyLandmark) -> (f32, f32) {
    let l = keypoints.get(left);
    let r = keypoints.get(right);
    ((l.x + r.x) * 0.5, (l.y + r.y) * 0.5)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Measure hip/shoulder centers and the pose size used for scaling
pub fn pose_metrics(keypoints: &KeypointSet, torso_size_multiplier: f32) -> PoseMetrics {
    let hip_center = midpoint(keypoints, BodyLandmark::LeftHip, BodyLandmark::RightHip);
    let shoulder_center = midpoint(
        keypoints,
        BodyLandmark::LeftShoulder,
        BodyLandmark::RightShoulder,
    );
    let torso_size = distance(shoulder_center, hip_center);

    let max_distance = keypoints
        .iter()
        .map(|(_, kp)| distance((kp.x, kp.y), hip_center))
        .fold(0.0_f32, f32::max);

    let pose_size = (torso_size * torso_size_multiplier).max(max_distance);

    PoseMetrics {
        hip_center,
        shoulder_center,
        torso_size,
        max_distance,
        pose_size,
    }
}

/// Center keypoints on the hips and scale them by the pose size
///
/// Output is `2 * LANDMARK_COUNT` values, x/y interleaved in landmark order.
/// Fails with [`PoseError::DegeneratePose`] instead of producing non-finite values.
pub fn normalize(keypoints: &KeypointSet, torso_size_multiplier: f32) -> PoseResult<PoseEmbedding> {
    if let Some((landmark, _)) = keypoints.iter().find(|(_, kp)| !kp.is_finite()) {
        return Err(PoseError::DegeneratePose(format!(
            "non-finite coordinate at {}",
            landmark
        )));
    }

    let metrics = pose_metrics(keypoints, torso_size_multiplier);
    if !metrics.pose_size.is_finite() || metrics.pose_size <= MIN_POSE_SIZE {
        return Err(PoseError::DegeneratePose(format!(
            "pose size {} too small to normalize",
            metrics.pose_size
        )));
    }

    let (cx, cy) = metrics.hip_center;
    let mut values = Vec::with_capacity(EMBEDDING_LEN);
    for (_, kp) in keypoints.iter() {
        values.push((kp.x - cx) / metrics.pose_size);
        values.push((kp.y - cy) / metrics.pose_size);
    }

    if values.iter().any(|v| !v.is_finite()) {
        return Err(PoseError::DegeneratePose(
            "normalization produced non-finite values".to_string(),
        ));
    }

    Ok(PoseEmbedding::from_values(values))
}
