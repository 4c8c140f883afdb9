//! SENTRIX Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the SENTRIX
//! attack-globe pipeline to run in both **Production** (tokio + HTTP feed)
//! and **Simulation** (virtual clock + synthetic feed) environments.
//!
//! # Core Concept: The Reactor Pattern
//!
//! For Deterministic Simulation Testing (DST), we intercept all I/O:
//! - Time (`now()`, `system_time()`, `sleep()`)
//! - The attack feed (`FeedSource::poll()`)
//! - Randomness (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any animation or
//! ingestion bug becomes reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use sentrix_env::{SentrixContext, FeedSource};
//!
//! async fn poll_loop<Ctx: SentrixContext, Feed: FeedSource>(ctx: &Ctx, feed: &Feed) {
//!     loop {
//!         if let Ok(Some(alert)) = feed.poll().await {
//!             handle_alert(alert);
//!         }
//!         ctx.sleep(Duration::from_millis(500)).await;
//!     }
//! }
//! ```

mod context;
mod feed;
mod types;
mod error;
mod tokio_impl;

pub use context::SentrixContext;
pub use feed::{FeedSource, FaultInjector};
pub use types::{RawAlert, RawConfidence, FeedTimestamp, ATTACK_STATUS};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
