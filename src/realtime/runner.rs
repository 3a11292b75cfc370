use std::error::Error;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::capture::{Frame, FrameSource};
use crate::classify::{softmax, top_k, Preprocessor};
use crate::config::RealtimeConfig;
use crate::labels::LabelStore;
use crate::model::{InferenceSession, SessionManager, TensorLayout};
use crate::speech::{Announcer, SpeechGate};
use crate::ui::{AiStatus, RankedLabel, ResultSink};

use super::state::{LoopPhase, LoopState};

/// Outcome of a single timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The firing was refused: busy, stopped, or no source attached
    Skipped,
    /// The cycle ran to completion and published a ranking
    Completed,
    /// A step failed; status was set to error and the loop waits for the
    /// next tick
    Failed,
}

/// The realtime classification loop.
///
/// Drives a fixed-cadence state machine over {idle, armed, running,
/// stopped}. Each firing captures a frame, preprocesses it, runs the
/// session, derives the top-K ranking and publishes it; every step is
/// fault-isolated so a single bad cycle can never kill the timer. The
/// loop also exposes the one-shot still-frame path, which shares the
/// identical preprocessing and postprocessing code.
pub struct RealtimeClassifier {
    sessions: Arc<SessionManager>,
    labels: Arc<LabelStore>,
    sink: Arc<dyn ResultSink>,
    announcer: Arc<dyn Announcer>,
    speech: SpeechGate,
    config: RealtimeConfig,
    state: LoopState,
    phase: RwLock<LoopPhase>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    preprocessor: Mutex<Preprocessor>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RealtimeClassifier {
    pub fn new(
        sessions: Arc<SessionManager>,
        labels: Arc<LabelStore>,
        sink: Arc<dyn ResultSink>,
        announcer: Arc<dyn Announcer>,
        config: RealtimeConfig,
        speech_enabled: bool,
    ) -> Self {
        let preprocessor = Preprocessor::new(config.input_size);
        Self {
            sessions,
            labels,
            sink,
            announcer,
            speech: SpeechGate::new(speech_enabled),
            config,
            state: LoopState::new(),
            phase: RwLock::new(LoopPhase::Idle),
            source: Mutex::new(None),
            preprocessor: Mutex::new(preprocessor),
            task: Mutex::new(None),
        }
    }

    /// The loop's current lifecycle phase.
    pub fn phase(&self) -> LoopPhase {
        self.phase.read().map(|phase| *phase).unwrap_or(LoopPhase::Stopped)
    }

    fn set_phase(&self, next: LoopPhase) {
        if let Ok(mut phase) = self.phase.write() {
            *phase = next;
        }
    }

    /// The speech debounce gate (for runtime toggling).
    pub fn speech(&self) -> &SpeechGate {
        &self.speech
    }

    /// idle → armed: attaches the frame source and warms the session.
    ///
    /// Session warmup failure is logged, not fatal — the loop retries on
    /// every tick, so a device that starts offline begins classifying as
    /// soon as initialization succeeds.
    pub async fn attach(
        &self,
        source: Box<dyn FrameSource>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self.phase() {
            LoopPhase::Armed | LoopPhase::Running => {
                return Err("realtime loop is already armed".into());
            }
            LoopPhase::Idle | LoopPhase::Stopped => {}
        }

        *self.source.lock().await = Some(source);
        if let Err(e) = self.sessions.ensure_session().await {
            warn!("Session warmup failed, will retry per tick: {}", e);
        }
        self.set_phase(LoopPhase::Armed);
        info!("Realtime loop armed");
        Ok(())
    }

    /// Starts the fixed-interval driver over an armed loop.
    pub async fn start(self: Arc<Self>) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.phase() != LoopPhase::Armed {
            return Err("realtime loop is not armed".into());
        }
        let driver = Arc::clone(&self);
        *self.task.lock().await = Some(tokio::spawn(async move { driver.drive().await }));
        info!("Realtime loop running at {} ms cadence", self.config.interval_ms);
        Ok(())
    }

    /// Fixed-interval driver; exits once the loop is stopped.
    async fn drive(&self) {
        let mut ticker = interval(Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if self.phase() == LoopPhase::Stopped {
                break;
            }
            self.run_cycle().await;
        }
        debug!("Realtime driver exited");
    }

    /// A single timer firing.
    ///
    /// Entry is refused while a previous cycle still holds the busy slot
    /// or once the source has been torn down; a refused firing is a
    /// no-op, not an error. A failure inside the cycle sets status to
    /// error and leaves the loop armed for the next tick.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(_busy) = self.state.try_begin() else {
            return CycleOutcome::Skipped;
        };
        if self.phase() == LoopPhase::Stopped {
            return CycleOutcome::Skipped;
        }
        if self.source.lock().await.is_none() {
            return CycleOutcome::Skipped;
        }

        self.set_phase(LoopPhase::Running);
        self.sink.set_status(AiStatus::Running);

        let outcome = match self.classify_cycle().await {
            Ok(()) => {
                self.sink.set_status(AiStatus::Done);
                CycleOutcome::Completed
            }
            Err(e) => {
                warn!("Inference cycle failed: {}", e);
                self.sink.set_status(AiStatus::Error);
                CycleOutcome::Failed
            }
        };

        if self.phase() != LoopPhase::Stopped {
            self.set_phase(LoopPhase::Armed);
        }
        outcome
    }

    /// capture → preprocess → run → softmax → top-K → publish → speech.
    async fn classify_cycle(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let session = self.sessions.ensure_session().await?;

        let frame = {
            let mut slot = self.source.lock().await;
            let source = slot.as_mut().ok_or("frame source detached")?;
            source.capture()?
        };

        let ranked = self.classify(session.as_ref(), &frame).await?;
        self.sink.publish_ranking(&ranked);

        // Speak only the top-1 label, only when it changed, and only
        // when no utterance is in progress.
        if let Some(top) = ranked.first() {
            self.speech.maybe_announce(&top.label, self.announcer.as_ref());
        }

        if let Some(fps) = self.state.record_completion(Instant::now()) {
            self.sink.publish_fps(fps);
        }
        Ok(())
    }

    /// Shared inference path for live and still frames.
    async fn classify(
        &self,
        session: &dyn InferenceSession,
        frame: &Frame,
    ) -> Result<Vec<RankedLabel>, Box<dyn Error + Send + Sync>> {
        let input_name = session
            .input_names()
            .first()
            .ok_or("model declares no input tensors")?
            .clone();
        let layout = TensorLayout::from_dims(session.input_shape(&input_name));

        let scores = {
            let mut preprocessor = self.preprocessor.lock().await;
            let tensor = preprocessor.tensor(frame, layout)?;
            session.run(&input_name, tensor).await?
        };

        let probs = softmax(&scores);
        let ranked = top_k(&probs, self.config.top_k);
        Ok(ranked
            .into_iter()
            .map(|p| RankedLabel {
                label: self.labels.label_for(p.index),
                percent: (p.probability * 100.0).clamp(0.0, 100.0),
            })
            .collect())
    }

    /// One-shot classification of a still frame.
    ///
    /// Uses the exact same preprocessing and postprocessing as the live
    /// loop; unlike the loop it propagates errors to the caller (so a
    /// missing model surfaces as `NetworkRequired` instead of a silent
    /// error status).
    pub async fn classify_frame(
        &self,
        frame: &Frame,
    ) -> Result<Vec<RankedLabel>, Box<dyn Error + Send + Sync>> {
        self.sink.set_status(AiStatus::Running);
        let session = match self.sessions.ensure_session().await {
            Ok(session) => session,
            Err(e) => {
                self.sink.set_status(AiStatus::Error);
                return Err(e.into());
            }
        };
        match self.classify(session.as_ref(), frame).await {
            Ok(ranked) => {
                self.sink.publish_ranking(&ranked);
                self.sink.set_status(AiStatus::Done);
                if let Some(top) = ranked.first() {
                    self.speech.announce_now(&top.label, self.announcer.as_ref());
                }
                Ok(ranked)
            }
            Err(e) => {
                self.sink.set_status(AiStatus::Error);
                Err(e)
            }
        }
    }

    /// armed/running → stopped: cancels the cadence and tears down the
    /// source. An in-flight cycle is not interrupted; it completes
    /// against the detached source and becomes a no-op.
    pub async fn stop(&self) {
        self.set_phase(LoopPhase::Stopped);
        if let Some(mut source) = self.source.lock().await.take() {
            source.stop();
        }
        // The driver observes the stopped phase on its next tick and
        // exits on its own.
        let _ = self.task.lock().await.take();
        info!("Realtime loop stopped");
    }
}
