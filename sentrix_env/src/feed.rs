//! Attack feed transport abstraction.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::RawAlert;

/// Abstraction for the upstream alert source polled by the runtime.
///
/// # Implementations
///
/// - **Production**: HTTP status endpoint (`sentrix-agent`)
/// - **Simulation**: Seeded synthetic alerts with configurable faults
///
/// # Poll Flow
///
/// ```text
/// Runtime                     Feed                     Upstream
///   |                           |                          |
///   |-- poll() ---------------->|                          |
///   |                           |-- GET /api/status ------>|
///   |                           |<-- latest alert ---------|
///   |<-- Ok(Some(alert)) -------|                          |
/// ```
///
/// The upstream only ever exposes its *latest* alert, so consecutive polls
/// routinely return the same record. Deduplication is the ingestion
/// layer's job, not the transport's.
#[async_trait]
pub trait FeedSource: Send + Sync + 'static {
    /// Fetches the current upstream record.
    ///
    /// # Returns
    /// * `Ok(Some(alert))` - A record was available
    /// * `Ok(None)` - Nothing to report this round
    /// * `Err(EnvError)` - Transport failure; callers must leave state untouched
    async fn poll(&self) -> Result<Option<RawAlert>, EnvError>;

    /// Human readable name of the source (for logging).
    fn describe(&self) -> String;
}

/// Marker trait for feed controllers in simulation.
///
/// Allows injecting faults like outages, replays and malformed records.
pub trait FaultInjector: Send + Sync {
    /// Makes every subsequent poll fail until cleared.
    fn set_outage(&self, down: bool);

    /// Probability (0.0 - 1.0) that a poll re-delivers the previous record.
    fn set_replay_rate(&self, rate: f64);

    /// Probability (0.0 - 1.0) that a fresh record has garbled fields.
    fn set_malformed_rate(&self, rate: f64);
}
