//! SENTRIX Core - Live Attack Globe Pipeline
//!
//! Turns a stream of attack notifications into animated arcs on a sphere:
//! 1. **Projection**: latitude/longitude to globe-space points
//! 2. **Paths**: quadratic Bézier arcs lifted by chord distance
//! 3. **Animation**: per-arc `Traveling -> Fading -> Done` state machine
//! 4. **Ingestion**: timestamp dedup and a bounded FIFO of active events
//!
//! All time and randomness come from a [`sentrix_env::SentrixContext`], so a
//! whole session replays from a single seed.

pub mod attack;
pub mod projection;
pub mod arc_path;
pub mod arc_animator;
pub mod feed_controller;
pub mod scene;
pub mod config;
pub mod runtime;

#[cfg(feature = "dashboard")]
pub mod dashboard;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use attack::{AttackEvent, AttackStatus, AttackType, EventId, GeoCoord, ThreatLevel};
pub use projection::{project, project_coord, unproject};
pub use arc_path::{build_path, ArcPath, PathParams};
pub use arc_animator::{AnimationConfig, ArcAnimator, ArcPhase, ArcSignal, OpacityProfile};
pub use feed_controller::{
    ActiveSnapshot, AttackFeedController, FeedConfig, FeedStats, IngestOutcome, RejectReason,
};
pub use scene::{ArcFrame, EventSummary, EvictionPolicy, SceneComposer, SceneConfig, SyncReport};
pub use config::{ConfigError, GlobeConfig, SentrixConfig};
pub use runtime::{FeedPoller, FramePacket, Interaction, RuntimeConfig, SentrixRuntime};

#[cfg(feature = "dashboard")]
pub use dashboard::ThreatDashboard;
