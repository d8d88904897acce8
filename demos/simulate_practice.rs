// Simulated practice session: synthetic camera, detector and classifier
//
// Runs the full tick loop for a few seconds, prints hold timing as it
// changes and writes the last skeleton overlay to the temp directory.

use anyhow::Result;
use asana_lib::core::config::PracticeConfig;
use asana_lib::core::logging;
use asana_lib::core::practice_session::{PracticeSession, SessionParts};
use asana_lib::core::skeleton_renderer::{ImageCanvas, SkeletonCanvas};
use asana_lib::models::capture::{PixelFormat, VideoFrame};
use asana_lib::models::pose::{
    BodyLandmark, Keypoint, KeypointSet, PoseClassDistribution, PoseEmbedding, PoseResult,
    YogaPose, LANDMARK_COUNT, POSE_CLASS_COUNT,
};
use asana_lib::models::session::Rgb;
use asana_lib::platform::camera::FrameSource;
use asana_lib::platform::pose::{KeypointDetector, PoseClassifier};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WIDTH: u32 = 480;
const HEIGHT: u32 = 640;

struct BlankCamera {
    open: bool,
    frames: i64,
}

#[async_trait]
impl FrameSource for BlankCamera {
    async fn open(&mut self) -> PoseResult<()> {
        self.open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> PoseResult<VideoFrame> {
        self.frames += 1;
        Ok(VideoFrame {
            timestamp_ms: self.frames * 100,
            width: WIDTH,
            height: HEIGHT,
            data: vec![0; (WIDTH * HEIGHT * 4) as usize],
            format: PixelFormat::Rgba8,
        })
    }

    async fn release(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Tree pose silhouette; every 15th frame loses the lower body
struct SyntheticDetector {
    calls: AtomicU64,
}

#[async_trait]
impl KeypointDetector for SyntheticDetector {
    async fn detect(&self, _frame: &VideoFrame) -> PoseResult<KeypointSet> {
        use BodyLandmark::*;

        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let sway = ((n as f32) * 0.3).sin() * 4.0;
        let occluded = n % 15 == 14;

        let layout = [
            (Nose, 240.0, 90.0),
            (LeftEye, 250.0, 80.0),
            (RightEye, 230.0, 80.0),
            (LeftEar, 262.0, 88.0),
            (RightEar, 218.0, 88.0),
            (LeftShoulder, 290.0, 160.0),
            (RightShoulder, 190.0, 160.0),
            (LeftElbow, 280.0, 100.0),
            (RightElbow, 200.0, 100.0),
            (LeftWrist, 250.0, 40.0),
            (RightWrist, 230.0, 40.0),
            (LeftHip, 270.0, 330.0),
            (RightHip, 210.0, 330.0),
            (LeftKnee, 275.0, 450.0),
            (RightKnee, 150.0, 390.0),
            (LeftAnkle, 270.0, 580.0),
            (RightAnkle, 255.0, 360.0),
        ];

        let mut keypoints = [Keypoint::new(0.0, 0.0, 0.0); LANDMARK_COUNT];
        for (landmark, x, y) in layout {
            let lower_body = landmark.index() >= LeftHip.index();
            let score = if occluded && lower_body { 0.1 } else { 0.85 };
            keypoints[landmark.index()] = Keypoint::new(x + sway, y, score);
        }
        Ok(KeypointSet::new(keypoints))
    }

    fn model_info(&self) -> String {
        "synthetic tree silhouette".to_string()
    }
}

/// Confident about Tree except for a wobble every few seconds
struct SyntheticClassifier {
    calls: AtomicU64,
    loaded: bool,
}

#[async_trait]
impl PoseClassifier for SyntheticClassifier {
    async fn load(&mut self) -> PoseResult<()> {
        self.loaded = true;
        Ok(())
    }

    async fn classify(&self, _embedding: &PoseEmbedding) -> PoseResult<PoseClassDistribution> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let tree = if n % 25 < 20 { 0.985 } else { 0.6 };

        let mut values = [0.0; POSE_CLASS_COUNT];
        values[YogaPose::Tree.class_index()] = tree;
        values[YogaPose::NoPose.class_index()] = 1.0 - tree;
        PoseClassDistribution::from_probabilities(&values)
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn model_info(&self) -> String {
        "synthetic classifier".to_string()
    }
}

/// Lets the demo keep a handle on the overlay the session draws into
struct SharedCanvas(Arc<Mutex<ImageCanvas>>);

impl SkeletonCanvas for SharedCanvas {
    fn clear(&mut self) {
        if let Ok(mut canvas) = self.0.lock() {
            canvas.clear();
        }
    }

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb) {
        if let Ok(mut canvas) = self.0.lock() {
            canvas.draw_point(x, y, radius, color);
        }
    }

    fn draw_segment(&mut self, from: (f32, f32), to: (f32, f32), width: f32, color: Rgb) {
        if let Ok(mut canvas) = self.0.lock() {
            canvas.draw_segment(from, to, width, color);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    println!("=== Simulated Practice Session ===\n");

    let overlay = Arc::new(Mutex::new(ImageCanvas::new(WIDTH, HEIGHT)));
    let parts = SessionParts {
        detector: Box::new(SyntheticDetector {
            calls: AtomicU64::new(0),
        }),
        classifier: Box::new(SyntheticClassifier {
            calls: AtomicU64::new(0),
            loaded: false,
        }),
        source: Box::new(BlankCamera {
            open: false,
            frames: 0,
        }),
        canvas: Box::new(SharedCanvas(overlay.clone())),
    };

    let mut session = PracticeSession::new(PracticeConfig::default(), parts)?;
    let target = YogaPose::Tree;

    println!("Target: {}", target);
    for (i, step) in target.instructions().iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!();

    let mut updates = session.subscribe();
    session.start(target).await?;

    let deadline = tokio::time::sleep(Duration::from_secs(4));
    tokio::pin!(deadline);
    let mut was_holding = false;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot.is_holding() != was_holding {
                    was_holding = snapshot.is_holding();
                    println!(
                        "{} current {} / best {}",
                        if was_holding { "▶ holding " } else { "■ released" },
                        snapshot.format_current(),
                        snapshot.format_best()
                    );
                }
            }
        }
    }

    let summary = session.stop().await?;

    println!("\nSession {}", summary.session_id);
    println!("  Ticks:          {}", summary.total_ticks);
    println!("  Classified:     {}", summary.classified_ticks);
    println!("  Low confidence: {}", summary.low_confidence_ticks);
    println!("  Failed:         {}", summary.failed_ticks);
    println!("  Classified %:   {:.0}", summary.classified_ratio() * 100.0);
    println!("  Best hold:      {:.1}s", summary.best_hold.as_secs_f64());

    let path = std::env::temp_dir().join("asana_overlay.png");
    match overlay.lock() {
        Ok(canvas) => {
            canvas.save(&path)?;
            println!("\n✓ Last overlay saved to {}", path.display());
        }
        Err(_) => println!("\n✗ Overlay unavailable"),
    }

    Ok(())
}
