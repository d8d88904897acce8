// Frame sources feeding the practice loop
// A source is opened when practice starts and released when it stops

pub mod image_sequence;

pub use image_sequence::ImageSequenceSource;

use crate::models::capture::VideoFrame;
use crate::models::pose::PoseResult;
use async_trait::async_trait;

/// Platform-agnostic camera trait
#[async_trait]
pub trait FrameSource: Send {
    /// Acquire the capture device; fails with `CaptureUnavailable` if it can't be used
    async fn open(&mut self) -> PoseResult<()>;

    /// Latest frame from the device
    async fn next_frame(&mut self) -> PoseResult<VideoFrame>;

    /// Release the capture device
    async fn release(&mut self);

    /// Check if the device is currently open
    fn is_open(&self) -> bool;
}
