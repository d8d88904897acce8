// Pose estimation platform integration
// Provides the detector/classifier bridge and backend selection

pub mod movenet_bridge;

pub use movenet_bridge::{KeypointDetector, PoseClassifier};

use crate::core::config::PracticeConfig;
use crate::core::model_manager::ModelManager;
use crate::models::pose::{PoseError, PoseResult};

/// MoveNet Thunder input resolution
pub const MOVENET_THUNDER_INPUT: u32 = 256;

/// Detector and classifier pair used by a practice session
pub struct PoseBackend {
    pub detector: Box<dyn KeypointDetector>,
    pub classifier: Box<dyn PoseClassifier>,
}

/// Resolve the configured models through the cache and build the native backend
#[cfg(feature = "ml-onnx")]
pub async fn load_backend(config: &PracticeConfig, models: &ModelManager) -> PoseResult<PoseBackend> {
    use movenet_bridge::onnx_backend::{OnnxMoveNet, OnnxPoseClassifier};

    let detector_path = models
        .ensure_model("detector", &config.detector_model)
        .await
        .map_err(|e| PoseError::ModelLoadFailed(e.to_string()))?;
    let classifier_path = models
        .ensure_model("classifier", &config.classifier_model)
        .await
        .map_err(|e| PoseError::ModelLoadFailed(e.to_string()))?;

    Ok(PoseBackend {
        detector: Box::new(OnnxMoveNet::new(&detector_path, MOVENET_THUNDER_INPUT)?),
        classifier: Box::new(OnnxPoseClassifier::new(&classifier_path)),
    })
}

#[cfg(not(feature = "ml-onnx"))]
pub async fn load_backend(_config: &PracticeConfig, _models: &ModelManager) -> PoseResult<PoseBackend> {
    tracing::warn!("No inference backend compiled in; enable the 'ml-onnx' feature");
    Err(PoseError::NotSupported)
}

#[cfg(all(test, not(feature = "ml-onnx")))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_requires_feature() {
        let dir = tempfile::tempdir().unwrap();
        let models = ModelManager::new(dir.path().to_path_buf()).unwrap();
        let result = load_backend(&PracticeConfig::default(), &models).await;
        assert!(matches!(result, Err(PoseError::NotSupported)));
    }
}
