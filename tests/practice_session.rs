// End-to-end practice sessions with scripted detector, classifier and camera

use asana_lib::core::config::PracticeConfig;
use asana_lib::core::practice_session::{PracticeSession, SessionParts};
use asana_lib::core::skeleton_renderer::SkeletonCanvas;
use asana_lib::models::capture::{PixelFormat, VideoFrame};
use asana_lib::models::pose::{
    BodyLandmark, Keypoint, KeypointSet, PoseClassDistribution, PoseEmbedding, PoseError,
    PoseResult, YogaPose, LANDMARK_COUNT, POSE_CLASS_COUNT,
};
use asana_lib::models::session::Rgb;
use asana_lib::platform::camera::FrameSource;
use asana_lib::platform::pose::{KeypointDetector, PoseClassifier};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ==============================================================================
// Scripted Backends
// ==============================================================================

fn standing_figure(score: f32) -> KeypointSet {
    let mut keypoints = [Keypoint::new(0.0, 0.0, score); LANDMARK_COUNT];
    for landmark in BodyLandmark::ALL {
        let i = landmark.index();
        keypoints[i].x = 200.0 + if i % 2 == 0 { 30.0 } else { -30.0 };
        keypoints[i].y = 40.0 + i as f32 * 20.0;
    }
    KeypointSet::new(keypoints)
}

#[derive(Clone, Default)]
struct Tally {
    frames: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
    classify_calls: Arc<AtomicUsize>,
    segments: Arc<Mutex<Vec<Rgb>>>,
    clears: Arc<AtomicUsize>,
}

struct ScriptedCamera {
    tally: Tally,
}

#[async_trait]
impl FrameSource for ScriptedCamera {
    async fn open(&mut self) -> PoseResult<()> {
        self.tally.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn next_frame(&mut self) -> PoseResult<VideoFrame> {
        let n = self.tally.frames.fetch_add(1, Ordering::SeqCst);
        Ok(VideoFrame {
            timestamp_ms: n as i64 * 100,
            width: 400,
            height: 400,
            data: vec![0; 400 * 400 * 4],
            format: PixelFormat::Rgba8,
        })
    }

    async fn release(&mut self) {
        self.tally.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.tally.open.load(Ordering::SeqCst)
    }
}

/// Replays scripted detections, then keeps returning a confident figure
struct ScriptedDetector {
    script: Mutex<VecDeque<PoseResult<KeypointSet>>>,
}

impl ScriptedDetector {
    fn new(script: Vec<PoseResult<KeypointSet>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl KeypointDetector for ScriptedDetector {
    async fn detect(&self, _frame: &VideoFrame) -> PoseResult<KeypointSet> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(standing_figure(0.9)))
    }

    fn model_info(&self) -> String {
        "scripted detector".to_string()
    }
}

/// Reports the scripted probability for Tree, then zero
struct ScriptedClassifier {
    probabilities: Mutex<VecDeque<f32>>,
    calls: Arc<AtomicUsize>,
    loaded: bool,
}

#[async_trait]
impl PoseClassifier for ScriptedClassifier {
    async fn load(&mut self) -> PoseResult<()> {
        self.loaded = true;
        Ok(())
    }

    async fn classify(&self, _embedding: &PoseEmbedding) -> PoseResult<PoseClassDistribution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let p = self.probabilities.lock().unwrap().pop_front().unwrap_or(0.0);

        let mut values = [0.0; POSE_CLASS_COUNT];
        values[YogaPose::Tree.class_index()] = p;
        values[YogaPose::NoPose.class_index()] = 1.0 - p;
        PoseClassDistribution::from_probabilities(&values)
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn model_info(&self) -> String {
        "scripted classifier".to_string()
    }
}

struct RecordingCanvas {
    tally: Tally,
}

impl SkeletonCanvas for RecordingCanvas {
    fn clear(&mut self) {
        self.tally.clears.fetch_add(1, Ordering::SeqCst);
        self.tally.segments.lock().unwrap().clear();
    }

    fn draw_point(&mut self, _x: f32, _y: f32, _radius: f32, _color: Rgb) {}

    fn draw_segment(&mut self, _from: (f32, f32), _to: (f32, f32), _width: f32, color: Rgb) {
        self.tally.segments.lock().unwrap().push(color);
    }
}

/// Never finishes a detection
struct StalledDetector;

#[async_trait]
impl KeypointDetector for StalledDetector {
    async fn detect(&self, _frame: &VideoFrame) -> PoseResult<KeypointSet> {
        std::future::pending().await
    }

    fn model_info(&self) -> String {
        "stalled detector".to_string()
    }
}

/// Panics on its first detection, then behaves
struct PanickingDetector {
    calls: AtomicUsize,
}

#[async_trait]
impl KeypointDetector for PanickingDetector {
    async fn detect(&self, _frame: &VideoFrame) -> PoseResult<KeypointSet> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("detector blew up");
        }
        Ok(standing_figure(0.9))
    }

    fn model_info(&self) -> String {
        "panicking detector".to_string()
    }
}

/// First detection takes `first_delay`, the rest are instant
struct SlowStartDetector {
    first_delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeypointDetector for SlowStartDetector {
    async fn detect(&self, _frame: &VideoFrame) -> PoseResult<KeypointSet> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.first_delay).await;
        }
        Ok(standing_figure(0.9))
    }

    fn model_info(&self) -> String {
        "slow start detector".to_string()
    }
}

fn practice(
    detections: Vec<PoseResult<KeypointSet>>,
    probabilities: &[f32],
) -> (PracticeSession, Tally) {
    practice_with(Box::new(ScriptedDetector::new(detections)), probabilities)
}

fn practice_with(
    detector: Box<dyn KeypointDetector>,
    probabilities: &[f32],
) -> (PracticeSession, Tally) {
    let tally = Tally::default();
    let parts = SessionParts {
        detector,
        classifier: Box::new(ScriptedClassifier {
            probabilities: Mutex::new(probabilities.iter().copied().collect()),
            calls: tally.classify_calls.clone(),
            loaded: false,
        }),
        source: Box::new(ScriptedCamera {
            tally: tally.clone(),
        }),
        canvas: Box::new(RecordingCanvas {
            tally: tally.clone(),
        }),
    };

    let session = PracticeSession::new(PracticeConfig::default(), parts).unwrap();
    (session, tally)
}

fn segment_colors(tally: &Tally) -> Vec<Rgb> {
    tally.segments.lock().unwrap().clone()
}

// ==============================================================================
// Scenarios
// ==============================================================================

#[tokio::test(start_paused = true)]
async fn reference_sequence_keeps_longest_interval() {
    let (mut session, tally) = practice(vec![], &[0.98, 0.99, 0.99, 0.50, 0.98]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;

    // Fifth tick re-entered Holding from zero
    let snapshot = session.snapshot();
    assert!(snapshot.is_holding());
    assert_eq!(snapshot.current_hold, Duration::ZERO);

    let summary = session.stop().await.unwrap();
    assert_eq!(summary.total_ticks, 5);
    assert_eq!(summary.classified_ticks, 5);
    assert!(summary.best_hold >= Duration::from_millis(200));
    assert!(summary.best_hold < Duration::from_millis(300));
    assert_eq!(tally.classify_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_ticks_and_releases_camera() {
    let (mut session, tally) = practice(vec![], &[]);

    session.start(YogaPose::Tree).await.unwrap();
    assert!(tally.open.load(Ordering::SeqCst));
    tokio::time::sleep(Duration::from_millis(250)).await;

    let summary = session.stop().await.unwrap();
    assert!(!session.is_running());
    assert!(!tally.open.load(Ordering::SeqCst));

    let frames = tally.frames.load(Ordering::SeqCst);
    let clears = tally.clears.load(Ordering::SeqCst);
    assert_eq!(frames as u64, summary.total_ticks);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(tally.frames.load(Ordering::SeqCst), frames);
    assert_eq!(tally.clears.load(Ordering::SeqCst), clears);
}

#[tokio::test(start_paused = true)]
async fn failing_detector_does_not_stop_the_loop() {
    let detections = vec![
        Err(PoseError::InferenceFailed("gpu lost".to_string())),
        Err(PoseError::InferenceFailed("gpu lost".to_string())),
    ];
    let (mut session, tally) = practice(detections, &[0.99, 0.99]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.total_ticks, 4);
    assert_eq!(summary.failed_ticks, 2);
    assert_eq!(summary.classified_ticks, 2);
    assert_eq!(tally.classify_calls.load(Ordering::SeqCst), 2);
    assert_eq!(summary.best_hold, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn low_confidence_frames_never_reach_classifier() {
    let detections = vec![
        Ok(standing_figure(0.2)),
        Ok(standing_figure(0.2)),
        Ok(standing_figure(0.2)),
    ];
    let (mut session, tally) = practice(detections, &[0.99]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.low_confidence_ticks, 3);
    assert_eq!(summary.classified_ticks, 0);
    assert_eq!(tally.classify_calls.load(Ordering::SeqCst), 0);
    assert_eq!(summary.best_hold, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn skeleton_turns_green_while_holding() {
    let (mut session, tally) = practice(vec![], &[0.99, 0.10]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let holding = segment_colors(&tally);
    assert!(!holding.is_empty());
    assert!(holding.iter().all(|c| *c == Rgb::GREEN));

    tokio::time::sleep(Duration::from_millis(100)).await;
    let released = segment_colors(&tally);
    assert!(!released.is_empty());
    assert!(released.iter().all(|c| *c == Rgb::WHITE));

    session.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn target_change_resets_hold() {
    let (mut session, _tally) = practice(vec![], &[0.99, 0.99, 0.99, 0.99]);
    let mut updates = session.subscribe();

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(session.snapshot().best_hold, Duration::from_millis(300));

    session.set_target(YogaPose::Warrior).await.unwrap();
    updates.mark_unchanged();
    updates.changed().await.unwrap();

    let snapshot = updates.borrow().clone();
    assert_eq!(snapshot.target, YogaPose::Warrior);
    assert_eq!(snapshot.best_hold, Duration::ZERO);
    assert!(!snapshot.is_holding());

    assert!(matches!(
        session.set_target(YogaPose::NoPose).await,
        Err(PoseError::InvalidTarget(YogaPose::NoPose))
    ));

    let summary = session.stop().await.unwrap();
    assert_eq!(summary.target, YogaPose::Warrior);
}

#[tokio::test(start_paused = true)]
async fn restart_clears_best_hold() {
    let (mut session, _tally) = practice(vec![], &[0.99; 6]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(session.snapshot().best_hold, Duration::from_millis(200));

    session.restart().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(session.snapshot().best_hold, Duration::ZERO);

    // Next tick begins a fresh hold
    tokio::time::sleep(Duration::from_millis(100)).await;
    let snapshot = session.snapshot();
    assert!(snapshot.is_holding());
    assert_eq!(snapshot.current_hold, Duration::ZERO);

    session.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_abandons_a_stalled_detection() {
    let (mut session, tally) = practice_with(Box::new(StalledDetector), &[]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tally.frames.load(Ordering::SeqCst), 1);

    let summary = tokio::time::timeout(Duration::from_secs(2), session.stop())
        .await
        .expect("stop waited on the stalled tick")
        .unwrap();
    assert_eq!(summary.total_ticks, 0);
    assert!(!tally.open.load(Ordering::SeqCst));

    // Parts came back, so the session can start again
    session.start(YogaPose::Tree).await.unwrap();
    assert!(tally.open.load(Ordering::SeqCst));
    session.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn panicking_detector_counts_as_failed_tick() {
    let detector = PanickingDetector {
        calls: AtomicUsize::new(0),
    };
    let (mut session, tally) = practice_with(Box::new(detector), &[0.99, 0.99]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.total_ticks, 3);
    assert_eq!(summary.failed_ticks, 1);
    assert_eq!(summary.classified_ticks, 2);
    assert!(!tally.open.load(Ordering::SeqCst));

    session.start(YogaPose::Tree).await.unwrap();
    assert!(session.is_running());
    session.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn late_ticks_are_skipped_not_replayed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let detector = SlowStartDetector {
        first_delay: Duration::from_millis(450),
        calls: calls.clone(),
        in_flight: Arc::new(AtomicUsize::new(0)),
        max_in_flight: max_in_flight.clone(),
    };
    let (mut session, _tally) = practice_with(Box::new(detector), &[]);

    session.start(YogaPose::Tree).await.unwrap();
    tokio::time::sleep(Duration::from_millis(520)).await;
    let summary = session.stop().await.unwrap();

    // Ticks at 0, 450 (the one late tick) and 500; the deadlines missed
    // at 100..400 are dropped instead of fired back to back
    assert_eq!(summary.total_ticks, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}
