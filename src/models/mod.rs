// Data models for camera frames, body keypoints and practice sessions

pub mod capture;
pub mod pose;
pub mod session;
