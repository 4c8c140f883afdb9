//! Sentrix Runtime - wires ingestion and animation onto an environment context.
//!
//! Two timing domains share one controller:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SentrixRuntime                         │
//! │                                                             │
//! │  polling (500 ms)                 frames (60 Hz)            │
//! │  ┌──────────────┐   Arc<Mutex<>>  ┌──────────────────────┐  │
//! │  │  FeedPoller  │───────────────► │ snapshot() per frame │  │
//! │  │ feed.poll()  │  controller     │ SceneComposer        │  │
//! │  │ ingest()     │                 │ sync / advance       │  │
//! │  └──────┬───────┘                 └──────────┬───────────┘  │
//! │         │ auto-select                        │              │
//! │         └──────────► Interaction channel ────┘              │
//! │                           ▲                                 │
//! │                           │ Select / Clear / TestAlert      │
//! │                      renderer / operator                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sentrix_core::{SentrixConfig, SentrixRuntime};
//! use sentrix_env::TokioContext;
//!
//! let ctx = TokioContext::shared();
//! let mut runtime = SentrixRuntime::new(ctx, feed, SentrixConfig::default());
//!
//! runtime.run(|packet| {
//!     render(packet);
//!     ControlFlow::Continue(())
//! }).await;
//! ```

use crate::attack::{EventId, ThreatLevel};
use crate::config::SentrixConfig;
use crate::feed_controller::{AttackFeedController, FeedStats, IngestOutcome};
use crate::scene::{ArcFrame, EventSummary, SceneComposer, SyncReport, SCENE_RNG_STREAM};
use sentrix_env::{EnvError, FeedSource, SentrixContext};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Feed polling period in milliseconds (default: 500)
    pub poll_interval_ms: u64,

    /// Frame loop rate in Hz (default: 60)
    pub frame_rate_hz: u32,

    /// Select newly accepted events automatically (default: true)
    pub auto_select: bool,

    /// Lowest threat level that triggers auto-select (default: Low)
    pub min_auto_select_level: ThreatLevel,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            frame_rate_hz: 60,
            auto_select: true,
            min_auto_select_level: ThreatLevel::Low,
        }
    }
}

impl RuntimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz.max(1) as f64)
    }
}

/// Operator input, delivered to the frame domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interaction {
    Select(EventId),
    ClearSelection,
    InjectTestAlert,
    SetAutoSelect(bool),
}

/// Everything a renderer receives for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePacket {
    /// Context clock at frame time
    pub time_secs: f64,
    pub arcs: Vec<ArcFrame>,
    /// Active events, oldest first
    pub events: Vec<EventSummary>,
    pub selected: Option<EventSummary>,
    pub stats: FeedStats,
    pub auto_select: bool,
}

type SharedController<Ctx> = Arc<Mutex<AttackFeedController<Ctx>>>;

fn lock<Ctx: SentrixContext>(
    controller: &SharedController<Ctx>,
) -> MutexGuard<'_, AttackFeedController<Ctx>> {
    // A panicking holder cannot leave the set half-updated
    controller.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// POLLING DOMAIN
// ============================================================================

/// The ingestion half of the runtime. Cheap to clone, `Send + 'static`.
pub struct FeedPoller<Ctx: SentrixContext, Feed: FeedSource> {
    feed: Arc<Feed>,
    controller: SharedController<Ctx>,
    interactions: Sender<Interaction>,
    auto_select: Arc<AtomicBool>,
    min_auto_select_level: ThreatLevel,
}

impl<Ctx: SentrixContext, Feed: FeedSource> Clone for FeedPoller<Ctx, Feed> {
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
            controller: Arc::clone(&self.controller),
            interactions: self.interactions.clone(),
            auto_select: Arc::clone(&self.auto_select),
            min_auto_select_level: self.min_auto_select_level,
        }
    }
}

impl<Ctx: SentrixContext, Feed: FeedSource> FeedPoller<Ctx, Feed> {
    /// Polls the feed once and ingests whatever came back.
    ///
    /// Transport errors are logged and returned; the controller is not
    /// touched in that case.
    pub async fn poll_once(&self) -> Result<Option<IngestOutcome>, EnvError> {
        let raw = match self.feed.poll().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(feed = %self.feed.describe(), error = %e, "Feed poll failed");
                return Err(e);
            }
        };

        let outcome = lock(&self.controller).ingest(&raw);

        if let IngestOutcome::Accepted { event, .. } = &outcome {
            if self.auto_select.load(Ordering::Relaxed)
                && event.threat_level >= self.min_auto_select_level
            {
                // Receiver gone means the runtime is shutting down
                let _ = self.interactions.send(Interaction::Select(event.id.clone()));
            }
        }

        Ok(Some(outcome))
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

/// Drives the attack globe pipeline.
///
/// Generic over the context and feed implementations, so the same code runs
/// in production (tokio + HTTP) and in the simulation harness.
pub struct SentrixRuntime<Ctx, Feed>
where
    Ctx: SentrixContext,
    Feed: FeedSource,
{
    pub context: Arc<Ctx>,
    pub config: SentrixConfig,

    poller: FeedPoller<Ctx, Feed>,
    controller: SharedController<Ctx>,
    scene: SceneComposer,

    interactions_tx: Sender<Interaction>,
    interactions_rx: Receiver<Interaction>,
    auto_select: Arc<AtomicBool>,

    frame_count: u64,
}

impl<Ctx, Feed> SentrixRuntime<Ctx, Feed>
where
    Ctx: SentrixContext,
    Feed: FeedSource,
{
    pub fn new(context: Arc<Ctx>, feed: Arc<Feed>, config: SentrixConfig) -> Self {
        let controller = Arc::new(Mutex::new(AttackFeedController::new(
            Arc::clone(&context),
            config.feed.clone(),
        )));

        let scene = SceneComposer::new(
            &config.globe,
            config.animation,
            config.scene,
            context.derive_rng(SCENE_RNG_STREAM),
        );

        let (interactions_tx, interactions_rx) = mpsc::channel();
        let auto_select = Arc::new(AtomicBool::new(config.runtime.auto_select));

        let poller = FeedPoller {
            feed,
            controller: Arc::clone(&controller),
            interactions: interactions_tx.clone(),
            auto_select: Arc::clone(&auto_select),
            min_auto_select_level: config.runtime.min_auto_select_level,
        };

        info!(seed = context.seed(), capacity = config.feed.capacity, "Runtime created");

        Self {
            context,
            config,
            poller,
            controller,
            scene,
            interactions_tx,
            interactions_rx,
            auto_select,
            frame_count: 0,
        }
    }

    /// Ingestion step: polls the feed once.
    pub async fn poll_once(&self) -> Result<Option<IngestOutcome>, EnvError> {
        self.poller.poll_once().await
    }

    /// A handle for the polling domain, e.g. to run it on another task.
    pub fn poller(&self) -> FeedPoller<Ctx, Feed> {
        self.poller.clone()
    }

    /// Sender for operator input. Interactions apply on the next frame.
    pub fn interactions(&self) -> Sender<Interaction> {
        self.interactions_tx.clone()
    }

    /// Animation step: applies pending interactions, syncs the scene with
    /// one snapshot and advances it by `dt` seconds.
    pub fn frame(&mut self, dt: f64) -> FramePacket {
        let pending: Vec<Interaction> = self.interactions_rx.try_iter().collect();

        let mut injected = Vec::new();
        for interaction in &pending {
            match interaction {
                Interaction::InjectTestAlert => {
                    let raw = AttackFeedController::<Ctx>::test_alert(self.context.unix_millis());
                    if let IngestOutcome::Accepted { event, .. } = lock(&self.controller).inject(&raw) {
                        info!(id = %event.id, "Injected test alert");
                        injected.push(event);
                    }
                }
                Interaction::SetAutoSelect(enabled) => {
                    self.auto_select.store(*enabled, Ordering::Relaxed);
                }
                _ => {}
            }
        }

        let (snapshot, stats) = {
            let controller = lock(&self.controller);
            (controller.snapshot(), controller.stats())
        };

        let report = self.scene.sync(&snapshot);
        log_sync(&report);

        let auto_select = self.auto_select.load(Ordering::Relaxed);
        for event in &injected {
            if auto_select && event.threat_level >= self.config.runtime.min_auto_select_level {
                self.scene.select(&event.id);
            }
        }
        for interaction in pending {
            match interaction {
                Interaction::Select(id) => {
                    self.scene.select(&id);
                }
                Interaction::ClearSelection => self.scene.clear_selection(),
                Interaction::InjectTestAlert | Interaction::SetAutoSelect(_) => {}
            }
        }

        let finished = self.scene.advance(dt);
        self.frame_count += 1;
        if !finished.is_empty() {
            debug!(frame = self.frame_count, count = finished.len(), "Arcs finished");
        }

        FramePacket {
            time_secs: self.context.now().as_secs_f64(),
            arcs: self.scene.frames(),
            events: snapshot
                .events
                .iter()
                .filter_map(|e| self.scene.summary(&e.id))
                .collect(),
            selected: self.scene.selected().and_then(|id| self.scene.summary(id)),
            stats,
            auto_select,
        }
    }

    /// Runs both domains until `on_frame` breaks.
    ///
    /// The polling loop is spawned on the context; the frame loop runs on
    /// the caller's task and computes `dt` from the context clock.
    pub async fn run<F>(&mut self, mut on_frame: F)
    where
        F: FnMut(&FramePacket) -> ControlFlow<()>,
    {
        let stop = Arc::new(AtomicBool::new(false));

        let poller = self.poller.clone();
        let ctx = Arc::clone(&self.context);
        let poll_interval = self.config.runtime.poll_interval();
        let poll_stop = Arc::clone(&stop);
        self.context.spawn("feed-poller", async move {
            while !poll_stop.load(Ordering::Relaxed) {
                // Failures are logged inside
                let _ = poller.poll_once().await;
                ctx.sleep(poll_interval).await;
            }
        });

        let frame_period = self.config.runtime.frame_period();
        let mut last = self.context.now();
        info!(
            poll_ms = self.config.runtime.poll_interval_ms,
            frame_hz = self.config.runtime.frame_rate_hz,
            "Runtime loop started"
        );

        loop {
            self.context.sleep(frame_period).await;
            let now = self.context.now();
            let dt = now.saturating_sub(last).as_secs_f64();
            last = now;

            let packet = self.frame(dt);
            if on_frame(&packet).is_break() {
                break;
            }
        }

        stop.store(true, Ordering::Relaxed);
        info!(frames = self.frame_count, "Runtime loop stopped");
    }

    pub fn scene(&self) -> &SceneComposer {
        &self.scene
    }

    /// Current feed counters.
    pub fn stats(&self) -> FeedStats {
        lock(&self.controller).stats()
    }

    pub fn active_len(&self) -> usize {
        lock(&self.controller).len()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn now_secs(&self) -> f64 {
        self.context.now().as_secs_f64()
    }
}

fn log_sync(report: &SyncReport) {
    if report.is_empty() {
        return;
    }
    debug!(
        spawned = report.spawned.len(),
        retired = report.retired.len(),
        "Scene synced"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualContext;
    use async_trait::async_trait;
    use sentrix_env::RawAlert;
    use std::collections::VecDeque;

    /// Replays a fixed script of poll results.
    struct ScriptedFeed {
        script: Mutex<VecDeque<Result<Option<RawAlert>, EnvError>>>,
    }

    impl ScriptedFeed {
        fn new(script: Vec<Result<Option<RawAlert>, EnvError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl FeedSource for ScriptedFeed {
        async fn poll(&self) -> Result<Option<RawAlert>, EnvError> {
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn runtime(
        script: Vec<Result<Option<RawAlert>, EnvError>>,
        config: SentrixConfig,
    ) -> SentrixRuntime<ManualContext, ScriptedFeed> {
        SentrixRuntime::new(ManualContext::shared(7), ScriptedFeed::new(script), config)
    }

    #[test]
    fn test_runtime_config_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert!((config.frame_period().as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
        assert!(config.auto_select);
    }

    #[tokio::test]
    async fn test_poll_then_frame_spawns_arc_and_auto_selects() {
        let alert = RawAlert::attack("SYN FLOOD", 1.0).with_confidence_text("95%");
        let mut rt = runtime(vec![Ok(Some(alert))], SentrixConfig::default());

        let outcome = rt.poll_once().await.unwrap().unwrap();
        let id = outcome.event().unwrap().id.clone();

        let packet = rt.frame(1.0 / 60.0);
        assert_eq!(packet.arcs.len(), 1);
        assert_eq!(packet.events.len(), 1);
        assert_eq!(packet.selected.as_ref().map(|s| &s.id), Some(&id));
        assert_eq!(packet.stats.accepted, 1);
    }

    #[tokio::test]
    async fn test_auto_select_respects_threshold_and_toggle() {
        let mut config = SentrixConfig::default();
        config.runtime.min_auto_select_level = ThreatLevel::High;
        let low = RawAlert::attack("SCAN", 1.0).with_confidence(10.0);
        let high = RawAlert::attack("SCAN", 2.0).with_confidence(95.0);
        let mut rt = runtime(vec![Ok(Some(low)), Ok(Some(high))], config);

        rt.poll_once().await.unwrap();
        assert!(rt.frame(0.0).selected.is_none());

        rt.interactions().send(Interaction::SetAutoSelect(false)).unwrap();
        rt.frame(0.0);
        rt.poll_once().await.unwrap();
        let packet = rt.frame(0.0);
        assert!(packet.selected.is_none());
        assert!(!packet.auto_select);
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_state_untouched() {
        let mut rt = runtime(
            vec![Err(EnvError::unavailable("connection refused"))],
            SentrixConfig::default(),
        );

        assert!(rt.poll_once().await.is_err());
        let packet = rt.frame(0.1);
        assert!(packet.arcs.is_empty());
        assert_eq!(packet.stats, FeedStats::default());
    }

    #[tokio::test]
    async fn test_duplicate_polls_yield_one_arc() {
        let alert = RawAlert::attack("SYN FLOOD", 5.0);
        let mut rt = runtime(
            vec![Ok(Some(alert.clone())), Ok(Some(alert.clone())), Ok(Some(alert))],
            SentrixConfig::default(),
        );

        for _ in 0..3 {
            rt.poll_once().await.unwrap();
        }
        let packet = rt.frame(0.1);
        assert_eq!(packet.arcs.len(), 1);
        assert_eq!(packet.stats.duplicates, 2);
    }

    #[test]
    fn test_interactions_select_and_clear() {
        let mut rt = runtime(vec![], SentrixConfig::default());
        let tx = rt.interactions();

        tx.send(Interaction::SetAutoSelect(false)).unwrap();
        tx.send(Interaction::InjectTestAlert).unwrap();
        let packet = rt.frame(0.0);
        assert_eq!(packet.arcs.len(), 1);
        assert!(packet.selected.is_none());
        assert_eq!(packet.stats.injected, 1);

        let id = packet.arcs[0].id.clone();
        tx.send(Interaction::Select(id.clone())).unwrap();
        let packet = rt.frame(0.0);
        assert_eq!(packet.selected.map(|s| s.id), Some(id));

        tx.send(Interaction::ClearSelection).unwrap();
        assert!(rt.frame(0.0).selected.is_none());
    }

    #[test]
    fn test_injected_alert_auto_selects() {
        let mut rt = runtime(vec![], SentrixConfig::default());
        rt.interactions().send(Interaction::InjectTestAlert).unwrap();
        let packet = rt.frame(0.0);
        let selected = packet.selected.unwrap();
        assert_eq!(selected.source, "1.2.3.4");
        assert!(selected.severe);
    }

    #[tokio::test]
    async fn test_run_stops_on_break() {
        let alert = RawAlert::attack("BRUTE FORCE", 1.0);
        let mut rt = runtime(vec![Ok(Some(alert))], SentrixConfig::default());

        let mut frames = 0;
        rt.run(|_packet| {
            frames += 1;
            if frames >= 30 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await;

        assert_eq!(frames, 30);
        assert_eq!(rt.frame_count(), 30);
        assert!(rt.now_secs() > 0.0);
    }
}
