// Real-time yoga pose evaluation
//
// `core` holds the pipeline (normalization, hold timing, rendering and the
// session loop), `models` the shared data types and `platform` the camera
// and inference backends.

pub mod core;
pub mod models;
pub mod platform;

pub use crate::core::config::PracticeConfig;
pub use crate::core::practice_session::{PracticeSession, SessionParts};
pub use crate::models::pose::{PoseError, PoseResult, YogaPose};
