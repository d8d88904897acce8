// Image sequence source - replays a directory of still images as a looping camera feed

use super::FrameSource;
use crate::models::capture::{PixelFormat, VideoFrame};
use crate::models::pose::{PoseError, PoseResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

pub struct ImageSequenceSource {
    directory: PathBuf,
    frames: Vec<PathBuf>,
    cursor: usize,
    is_open: bool,
}

impl ImageSequenceSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            frames: Vec::new(),
            cursor: 0,
            is_open: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn list_images(directory: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();
        Ok(frames)
    }

    fn decode(path: &Path) -> PoseResult<VideoFrame> {
        let rgba = image::open(path)
            .map_err(|e| PoseError::CaptureFailed(format!("{}: {}", path.display(), e)))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(VideoFrame {
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data: rgba.into_raw(),
            format: PixelFormat::Rgba8,
        })
    }
}

#[async_trait]
impl FrameSource for ImageSequenceSource {
    async fn open(&mut self) -> PoseResult<()> {
        let frames = Self::list_images(&self.directory).map_err(|e| {
            PoseError::CaptureUnavailable(format!("{}: {}", self.directory.display(), e))
        })?;

        if frames.is_empty() {
            return Err(PoseError::CaptureUnavailable(format!(
                "no images in {}",
                self.directory.display()
            )));
        }

        tracing::info!(
            directory = %self.directory.display(),
            frames = frames.len(),
            "Opened image sequence"
        );
        self.frames = frames;
        self.cursor = 0;
        self.is_open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> PoseResult<VideoFrame> {
        if !self.is_open {
            return Err(PoseError::CaptureFailed("source is not open".to_string()));
        }

        let path = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();

        tokio::task::spawn_blocking(move || Self::decode(&path))
            .await
            .map_err(|e| PoseError::CaptureFailed(e.to_string()))?
    }

    async fn release(&mut self) {
        self.frames.clear();
        self.cursor = 0;
        self.is_open = false;
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}
