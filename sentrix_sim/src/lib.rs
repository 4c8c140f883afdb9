//! SENTRIX Deterministic Simulation Testing (DST) Harness
//!
//! Runs the full attack globe runtime against a synthetic alert bridge on a
//! virtual clock, so every session replays bit-for-bit from one seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: a virtual clock advanced one frame at a time
//! - **Feed**: a seeded bridge with outage, replay and garbling faults
//! - **Randomness**: every stream derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────┐  poll every 500ms  ┌──────────────────┐   │
//! │  │   SimFeed    │──────────────────► │  SentrixRuntime  │   │
//! │  │ (faults)     │                    │  frame @ 60 Hz   │   │
//! │  └──────────────┘                    └────────┬─────────┘   │
//! │         ▲                                     │ FramePacket │
//! │         │ SimContext (virtual clock)          ▼             │
//! │         └───────────────────────── InvariantChecker         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sentrix_sim::ScenarioRunner;
//! use sentrix_sim::scenarios::ScenarioId;
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Overflow);
//! assert!(result.passed);
//! ```

mod context;
mod feed;
mod runner;
mod exporter;
pub mod scenarios;

pub use context::SimContext;
pub use feed::{FeedProfile, SimFeed, SimFeedStats, SIM_FEED_STREAM};
pub use runner::{InvariantChecker, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use exporter::{SimEvent, SimExport, SimFrame};
