// Keypoint detection and pose classification bridge
// Abstracts the pose estimation model and the trained pose classifier
// Implemented natively with ONNX Runtime behind the `ml-onnx` feature

use crate::models::capture::VideoFrame;
use crate::models::pose::{KeypointSet, PoseClassDistribution, PoseEmbedding, PoseResult};
use async_trait::async_trait;

/// Detects body keypoints in a frame
#[async_trait]
pub trait KeypointDetector: Send + Sync {
    /// Run inference on a frame, returning one keypoint per landmark
    async fn detect(&self, frame: &VideoFrame) -> PoseResult<KeypointSet>;

    /// Get model info
    fn model_info(&self) -> String;
}

/// Maps a pose embedding to a probability per pose class
#[async_trait]
pub trait PoseClassifier: Send + Sync {
    /// Load the trained model; called once when practice starts
    async fn load(&mut self) -> PoseResult<()>;

    /// Classify a normalized pose
    async fn classify(&self, embedding: &PoseEmbedding) -> PoseResult<PoseClassDistribution>;

    /// Check if the model is loaded
    fn is_loaded(&self) -> bool;

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// ONNX Runtime Implementation (Pure Rust)
// ==============================================================================

#[cfg(feature = "ml-onnx")]
pub mod onnx_backend {
    use super::*;
    use crate::models::pose::{Keypoint, PoseError, LANDMARK_COUNT};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use ort::value::{DynValue, Tensor};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    fn load_failed<E: std::fmt::Display>(e: E) -> PoseError {
        PoseError::ModelLoadFailed(e.to_string())
    }

    fn inference_failed<E: std::fmt::Display>(e: E) -> PoseError {
        PoseError::InferenceFailed(e.to_string())
    }

    fn open_session(model_path: &Path) -> PoseResult<Session> {
        let builder = Session::builder().map_err(load_failed)?;
        let mut builder = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_failed)?;
        builder.commit_from_file(model_path).map_err(load_failed)
    }

    /// Run a session with a single input and return the first output as f32 values
    fn run_single(session: &Mutex<Session>, input: DynValue) -> PoseResult<Vec<f32>> {
        let mut session = session
            .lock()
            .map_err(|_| PoseError::InferenceFailed("Session lock poisoned".to_string()))?;
        let outputs = session.run(ort::inputs![input]).map_err(inference_failed)?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_failed)?;
        Ok(data.to_vec())
    }

    /// MoveNet single-pose detector
    ///
    /// Expects an int32 NHWC input of `input_size`² pixels and a
    /// `[1, 1, 17, 3]` output of normalized (y, x, score) triples.
    pub struct OnnxMoveNet {
        session: Arc<Mutex<Session>>,
        input_size: u32,
        model_path: PathBuf,
    }

    impl OnnxMoveNet {
        pub fn new(model_path: &Path, input_size: u32) -> PoseResult<Self> {
            let session = open_session(model_path)?;
            tracing::info!(model = %model_path.display(), input_size, "Loaded MoveNet detector");
            Ok(Self {
                session: Arc::new(Mutex::new(session)),
                input_size,
                model_path: model_path.to_path_buf(),
            })
        }

        fn preprocess(frame: &VideoFrame, size: u32) -> PoseResult<Vec<i32>> {
            let rgb = frame
                .to_rgb_image()
                .ok_or_else(|| PoseError::InferenceFailed("Malformed frame".to_string()))?;
            let resized = image::imageops::resize(&rgb, size, size, image::imageops::FilterType::Triangle);
            Ok(resized.into_raw().into_iter().map(i32::from).collect())
        }
    }

    #[async_trait]
    impl KeypointDetector for OnnxMoveNet {
        async fn detect(&self, frame: &VideoFrame) -> PoseResult<KeypointSet> {
            let size = self.input_size;
            let pixels = Self::preprocess(frame, size)?;
            let session = self.session.clone();
            let (width, height) = (frame.width as f32, frame.height as f32);

            let output = tokio::task::spawn_blocking(move || {
                let input = Tensor::from_array((
                    [1usize, size as usize, size as usize, 3],
                    pixels.into_boxed_slice(),
                ))
                .map_err(inference_failed)?;
                run_single(&session, input.into_dyn())
            })
            .await
            .map_err(inference_failed)??;

            if output.len() < LANDMARK_COUNT * 3 {
                return Err(PoseError::InferenceFailed(format!(
                    "Unexpected MoveNet output length {}",
                    output.len()
                )));
            }

            let keypoints = output
                .chunks_exact(3)
                .take(LANDMARK_COUNT)
                .map(|yxs| Keypoint::new(yxs[1] * width, yxs[0] * height, yxs[2]))
                .collect();
            KeypointSet::from_ordered(keypoints)
        }

        fn model_info(&self) -> String {
            format!(
                "ONNX MoveNet ({}px) from {}",
                self.input_size,
                self.model_path.display()
            )
        }
    }

    /// Dense pose classifier over 34-value embeddings
    pub struct OnnxPoseClassifier {
        model_path: PathBuf,
        session: Option<Arc<Mutex<Session>>>,
    }

    impl OnnxPoseClassifier {
        pub fn new(model_path: &Path) -> Self {
            Self {
                model_path: model_path.to_path_buf(),
                session: None,
            }
        }
    }

    #[async_trait]
    impl PoseClassifier for OnnxPoseClassifier {
        async fn load(&mut self) -> PoseResult<()> {
            let path = self.model_path.clone();
            let session = tokio::task::spawn_blocking(move || open_session(&path))
                .await
                .map_err(load_failed)??;
            self.session = Some(Arc::new(Mutex::new(session)));
            tracing::info!(model = %self.model_path.display(), "Loaded pose classifier");
            Ok(())
        }

        async fn classify(&self, embedding: &PoseEmbedding) -> PoseResult<PoseClassDistribution> {
            let session = self.session.clone().ok_or(PoseError::NotInitialized)?;
            let values = embedding.as_slice().to_vec().into_boxed_slice();
            let len = values.len();

            let probabilities = tokio::task::spawn_blocking(move || {
                let input = Tensor::from_array(([1usize, len], values)).map_err(inference_failed)?;
                run_single(&session, input.into_dyn())
            })
            .await
            .map_err(inference_failed)??;

            PoseClassDistribution::from_probabilities(&probabilities)
        }

        fn is_loaded(&self) -> bool {
            self.session.is_some()
        }

        fn model_info(&self) -> String {
            format!("ONNX pose classifier from {}", self.model_path.display())
        }
    }
}
