pub mod config;
pub mod logging;
pub mod model_manager;

// Pose pipeline
pub mod pose_normalizer;
pub mod hold_tracker;
pub mod pose_evaluator;
pub mod skeleton_renderer;
pub mod practice_session;
