// Practice session - owns the periodic tick loop for one target pose

use crate::core::config::PracticeConfig;
use crate::core::pose_evaluator::{PoseEvaluator, TickOutcome, TickStatus};
use crate::core::skeleton_renderer::{render_skeleton, RenderStyle, SkeletonCanvas};
use crate::models::pose::{PoseError, PoseResult, YogaPose};
use crate::models::session::{HoldSnapshot, SessionSummary};
use crate::platform::camera::FrameSource;
use crate::platform::pose::{KeypointDetector, PoseClassifier};
use chrono::{DateTime, Utc};
use futures_lite::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Everything the tick loop needs exclusive access to while running
pub struct SessionParts {
    pub detector: Box<dyn KeypointDetector>,
    pub classifier: Box<dyn PoseClassifier>,
    pub source: Box<dyn FrameSource>,
    pub canvas: Box<dyn SkeletonCanvas>,
}

#[derive(Debug)]
enum SessionCommand {
    SetTarget(YogaPose),
    Reset,
}

#[derive(Debug, Clone, Copy, Default)]
struct TickCounters {
    total: u64,
    classified: u64,
    low_confidence: u64,
    degenerate: u64,
    failed: u64,
}

impl TickCounters {
    fn record(&mut self, status: &TickStatus) {
        self.total += 1;
        match status {
            TickStatus::Classified { .. } => self.classified += 1,
            TickStatus::LowConfidence { .. } => self.low_confidence += 1,
            TickStatus::Degenerate(_) => self.degenerate += 1,
            TickStatus::Failed(_) => self.failed += 1,
        }
    }
}

/// Returned by the tick task when it exits
struct LoopExit {
    parts: SessionParts,
    counters: TickCounters,
    final_snapshot: HoldSnapshot,
}

struct RunningSession {
    session_id: String,
    started_at: DateTime<Utc>,
    shutdown_tx: watch::Sender<bool>,
    command_tx: mpsc::Sender<SessionCommand>,
    handle: JoinHandle<LoopExit>,
}

pub struct PracticeSession {
    config: PracticeConfig,
    parts: Option<SessionParts>,
    running: Option<RunningSession>,
    snapshot_tx: Arc<watch::Sender<HoldSnapshot>>,
}

impl PracticeSession {
    pub fn new(config: PracticeConfig, parts: SessionParts) -> PoseResult<Self> {
        config
            .validate()
            .map_err(|e| PoseError::InvalidConfig(e.to_string()))?;

        let (snapshot_tx, _) = watch::channel(HoldSnapshot::idle(config.default_target));

        Ok(Self {
            config,
            parts: Some(parts),
            running: None,
            snapshot_tx: Arc::new(snapshot_tx),
        })
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Latest hold timing
    pub fn snapshot(&self) -> HoldSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver updated after every tick and control command
    pub fn subscribe(&self) -> watch::Receiver<HoldSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Open the frame source, load the classifier and start ticking
    pub async fn start(&mut self, target: YogaPose) -> PoseResult<()> {
        if self.running.is_some() {
            return Err(PoseError::AlreadyRunning);
        }
        let evaluator = PoseEvaluator::new(&self.config, target)?;
        let parts = self.parts.as_mut().ok_or(PoseError::NotInitialized)?;

        parts.source.open().await.map_err(|e| match e {
            PoseError::CaptureUnavailable(_) => e,
            other => PoseError::CaptureUnavailable(other.to_string()),
        })?;

        if !parts.classifier.is_loaded() {
            if let Err(e) = parts.classifier.load().await {
                parts.source.release().await;
                return Err(match e {
                    PoseError::ModelLoadFailed(_) => e,
                    other => PoseError::ModelLoadFailed(other.to_string()),
                });
            }
        }

        let parts = self.parts.take().ok_or(PoseError::NotInitialized)?;
        let session_id = Uuid::new_v4().to_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(16);

        self.snapshot_tx.send_replace(evaluator.snapshot());

        tracing::info!(
            session_id = %session_id,
            target = %target,
            detector = %parts.detector.model_info(),
            classifier = %parts.classifier.model_info(),
            "Practice session started"
        );

        let handle = tokio::spawn(run_ticks(
            parts,
            evaluator,
            RenderStyle::from_config(&self.config),
            self.config.tick_interval(),
            shutdown_rx,
            command_rx,
            self.snapshot_tx.clone(),
        ));

        self.running = Some(RunningSession {
            session_id,
            started_at: Utc::now(),
            shutdown_tx,
            command_tx,
            handle,
        });

        Ok(())
    }

    /// Change the target pose; applied between ticks and resets hold timing
    pub async fn set_target(&self, target: YogaPose) -> PoseResult<()> {
        if !target.is_selectable() {
            return Err(PoseError::InvalidTarget(target));
        }
        self.send(SessionCommand::SetTarget(target)).await
    }

    /// Clear hold timing without stopping
    pub async fn restart(&self) -> PoseResult<()> {
        self.send(SessionCommand::Reset).await
    }

    async fn send(&self, command: SessionCommand) -> PoseResult<()> {
        let running = self.running.as_ref().ok_or(PoseError::NotRunning)?;
        running
            .command_tx
            .send(command)
            .await
            .map_err(|_| PoseError::NotRunning)
    }

    /// Stop ticking and release the frame source
    ///
    /// The tick task has exited by the time this returns, so no further
    /// tick can touch the canvas or hold state.
    pub async fn stop(&mut self) -> PoseResult<SessionSummary> {
        let running = self.running.take().ok_or(PoseError::NotRunning)?;

        // Receiver may already be gone if the task panicked
        let _ = running.shutdown_tx.send(true);
        let exit = running
            .handle
            .await
            .map_err(|e| PoseError::TaskFailed(e.to_string()))?;

        let LoopExit {
            parts,
            counters,
            final_snapshot,
        } = exit;
        self.parts = Some(parts);
        self.snapshot_tx
            .send_replace(HoldSnapshot::idle(final_snapshot.target));

        let summary = SessionSummary {
            session_id: running.session_id,
            target: final_snapshot.target,
            started_at: running.started_at,
            ended_at: Utc::now(),
            total_ticks: counters.total,
            classified_ticks: counters.classified,
            low_confidence_ticks: counters.low_confidence,
            degenerate_ticks: counters.degenerate,
            failed_ticks: counters.failed,
            best_hold: final_snapshot.best_hold,
        };

        tracing::info!(
            session_id = %summary.session_id,
            ticks = summary.total_ticks,
            best_hold = %final_snapshot.format_best(),
            "Practice session stopped"
        );

        Ok(summary)
    }
}

/// Capture one frame and run it through the evaluator
async fn next_outcome(parts: &mut SessionParts, evaluator: &mut PoseEvaluator) -> TickOutcome {
    let now = tokio::time::Instant::now().into_std();
    match parts.source.next_frame().await {
        Ok(frame) => {
            evaluator
                .evaluate(
                    &frame,
                    parts.detector.as_ref(),
                    parts.classifier.as_ref(),
                    now,
                )
                .await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Frame capture failed");
            evaluator.failed(e.to_string())
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn run_ticks(
    mut parts: SessionParts,
    mut evaluator: PoseEvaluator,
    style: RenderStyle,
    tick_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut command_rx: mpsc::Receiver<SessionCommand>,
    snapshot_tx: Arc<watch::Sender<HoldSnapshot>>,
) -> LoopExit {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut counters = TickCounters::default();

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }

            Some(command) = command_rx.recv() => {
                match command {
                    SessionCommand::SetTarget(target) => {
                        if let Err(e) = evaluator.set_target(target) {
                            tracing::warn!(error = %e, "Ignoring target change");
                        } else {
                            tracing::info!(target = %target, "Target pose changed");
                        }
                    }
                    SessionCommand::Reset => {
                        evaluator.reset();
                        tracing::info!("Hold timing restarted");
                    }
                }
                snapshot_tx.send_replace(evaluator.snapshot());
            }

            _ = interval.tick() => {
                // A stalled backend must not hold up shutdown
                let tick = AssertUnwindSafe(next_outcome(&mut parts, &mut evaluator)).catch_unwind();
                let caught = tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => break,
                    caught = tick => caught,
                };

                let outcome = match caught {
                    Ok(outcome) => outcome,
                    Err(panic) => {
                        let reason = panic_reason(panic.as_ref());
                        tracing::warn!(reason = %reason, "Tick panicked");
                        evaluator.failed(format!("tick panicked: {}", reason))
                    }
                };

                counters.record(&outcome.status);
                if let Some(keypoints) = &outcome.render_keypoints {
                    render_skeleton(parts.canvas.as_mut(), keypoints, &outcome.feedback, &style);
                }
                snapshot_tx.send_replace(outcome.hold);
            }
        }
    }

    let final_snapshot = evaluator.snapshot();
    evaluator.reset();
    parts.source.release().await;

    LoopExit {
        parts,
        counters,
        final_snapshot,
    }
}
