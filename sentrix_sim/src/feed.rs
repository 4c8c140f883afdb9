//! Synthetic alert bridge with fault injection.
//!
//! Mimics the upstream status endpoint: every poll returns the *latest*
//! record, so the same alert comes back until a newer one replaces it.
//! New records appear at random according to a [`FeedProfile`], all drawn
//! from a seeded stream so a run replays bit-for-bit.

use crate::context::SimContext;
use async_trait::async_trait;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use sentrix_env::{
    EnvError, FaultInjector, FeedSource, FeedTimestamp, RawAlert, RawConfidence, SentrixContext,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// RNG stream of the synthetic feed.
pub const SIM_FEED_STREAM: u64 = 0xB41D6E;

const ATTACK_LABELS: [&str; 6] = [
    "SYN FLOOD",
    "UDP FLOOD",
    "BRUTE FORCE SSH",
    "PORT SCAN",
    "HTTP ANOMALY",
    "ICMP FLOOD",
];

/// Shape of the synthetic traffic.
#[derive(Debug, Clone, Copy)]
pub struct FeedProfile {
    /// Probability that a poll finds a new attack (default: 0.3)
    pub attack_rate: f64,
    /// Probability that a poll finds a new SAFE record (default: 0.05)
    pub safe_rate: f64,
    /// Mean detector confidence (default: 75)
    pub confidence_mean: f64,
    /// Confidence spread (default: 15)
    pub confidence_std: f64,
    /// Fraction of attacks without attribution (default: 0.1)
    pub unknown_source_rate: f64,
}

impl Default for FeedProfile {
    fn default() -> Self {
        Self {
            attack_rate: 0.3,
            safe_rate: 0.05,
            confidence_mean: 75.0,
            confidence_std: 15.0,
            unknown_source_rate: 0.1,
        }
    }
}

impl FeedProfile {
    /// Only scripted records, nothing random.
    pub fn scripted() -> Self {
        Self {
            attack_rate: 0.0,
            safe_rate: 0.0,
            ..Self::default()
        }
    }
}

/// What the feed has handed out so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimFeedStats {
    pub polls: u64,
    pub failures: u64,
    /// Distinct ATTACK records delivered (scripted included)
    pub fresh_attacks: u64,
    pub fresh_safe: u64,
    /// Polls that re-delivered the previous record
    pub repeats: u64,
    pub malformed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    outage: bool,
    replay_rate: f64,
    malformed_rate: f64,
}

struct FeedState {
    rng: ChaCha8Rng,
    last: Option<RawAlert>,
    last_timestamp: f64,
    scripted: VecDeque<RawAlert>,
    stats: SimFeedStats,
}

/// Seeded stand-in for the HTTP alert bridge.
pub struct SimFeed {
    context: Arc<SimContext>,
    profile: FeedProfile,
    state: Mutex<FeedState>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimFeed {
    pub fn new(context: Arc<SimContext>, profile: FeedProfile) -> Self {
        let rng = context.derive_rng(SIM_FEED_STREAM);
        Self {
            context,
            profile,
            state: Mutex::new(FeedState {
                rng,
                last: None,
                last_timestamp: 0.0,
                scripted: VecDeque::new(),
                stats: SimFeedStats::default(),
            }),
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn shared(context: Arc<SimContext>, profile: FeedProfile) -> Arc<Self> {
        Arc::new(Self::new(context, profile))
    }

    /// Queues a record that the next poll returns verbatim.
    pub fn push(&self, raw: RawAlert) {
        lock(&self.state).scripted.push_back(raw);
    }

    /// Queues a well-formed attack stamped with the current virtual time.
    pub fn push_attack(&self, label: &str, confidence: f64) -> RawAlert {
        let mut state = lock(&self.state);
        let timestamp = next_timestamp(&mut state, self.context.unix_secs_f64());
        let raw = RawAlert::attack(label, timestamp)
            .with_source("198.51.100.7")
            .with_confidence(confidence);
        state.scripted.push_back(raw.clone());
        raw
    }

    pub fn stats(&self) -> SimFeedStats {
        lock(&self.state).stats
    }

    fn fresh_attack(&self, state: &mut FeedState, malformed: bool) -> RawAlert {
        let now = self.context.unix_secs_f64();
        let timestamp = next_timestamp(state, now);

        if malformed {
            state.stats.malformed += 1;
            return RawAlert {
                status: "ATTACK".to_string(),
                attack_type: if state.rng.gen_bool(0.5) { None } else { Some("???".to_string()) },
                source: Some(if state.rng.gen_bool(0.5) { String::new() } else { "Unknown".to_string() }),
                target: None,
                confidence: Some(RawConfidence::Text("n/a".to_string())),
                timestamp: FeedTimestamp::Number(timestamp),
            };
        }

        let label = ATTACK_LABELS[state.rng.gen_range(0..ATTACK_LABELS.len())];
        let source = if state.rng.gen_bool(self.profile.unknown_source_rate.clamp(0.0, 1.0)) {
            "Unknown".to_string()
        } else {
            format!(
                "{}.{}.{}.{}",
                state.rng.gen_range(1..=223u8),
                state.rng.gen::<u8>(),
                state.rng.gen::<u8>(),
                state.rng.gen_range(1..=254u8)
            )
        };
        let z: f64 = StandardNormal.sample(&mut state.rng);
        let confidence = (self.profile.confidence_mean + z * self.profile.confidence_std.abs())
            .clamp(0.0, 100.0)
            .round();

        let raw = RawAlert::attack(label, timestamp).with_source(&source);
        // The bridge sends text, hand-written tools send numbers
        if state.rng.gen_bool(0.5) {
            raw.with_confidence_text(&format!("{}%", confidence))
        } else {
            raw.with_confidence(confidence)
        }
    }

    fn fresh_safe(&self, state: &mut FeedState) -> RawAlert {
        let timestamp = next_timestamp(state, self.context.unix_secs_f64());
        RawAlert {
            status: "SAFE".to_string(),
            attack_type: None,
            source: None,
            target: None,
            confidence: None,
            timestamp: FeedTimestamp::Number(timestamp),
        }
    }
}

/// Strictly increasing bridge timestamps, even within one virtual instant.
fn next_timestamp(state: &mut FeedState, now: f64) -> f64 {
    let ts = if now > state.last_timestamp {
        now
    } else {
        state.last_timestamp + 0.001
    };
    state.last_timestamp = ts;
    ts
}

#[async_trait]
impl FeedSource for SimFeed {
    async fn poll(&self) -> Result<Option<RawAlert>, EnvError> {
        let faults = *lock(&self.faults);
        let mut state = lock(&self.state);
        state.stats.polls += 1;

        if faults.outage {
            state.stats.failures += 1;
            return Err(EnvError::unavailable("simulated outage"));
        }

        if let Some(raw) = state.scripted.pop_front() {
            if raw.is_attack() {
                state.stats.fresh_attacks += 1;
            }
            state.last = Some(raw.clone());
            return Ok(Some(raw));
        }

        let replay = state.last.is_some() && state.rng.gen_bool(faults.replay_rate);
        let roll: f64 = state.rng.gen();

        let fresh = if replay {
            None
        } else if roll < self.profile.attack_rate {
            let malformed = state.rng.gen_bool(faults.malformed_rate);
            state.stats.fresh_attacks += 1;
            Some(self.fresh_attack(&mut state, malformed))
        } else if roll < self.profile.attack_rate + self.profile.safe_rate {
            state.stats.fresh_safe += 1;
            Some(self.fresh_safe(&mut state))
        } else {
            None
        };

        match fresh {
            Some(raw) => {
                state.last = Some(raw.clone());
                Ok(Some(raw))
            }
            None => {
                let last = state.last.clone();
                if last.is_some() {
                    state.stats.repeats += 1;
                }
                Ok(last)
            }
        }
    }

    fn describe(&self) -> String {
        format!("sim-feed(seed={})", self.context.seed())
    }
}

impl FaultInjector for SimFeed {
    fn set_outage(&self, down: bool) {
        lock(&self.faults).outage = down;
    }

    fn set_replay_rate(&self, rate: f64) {
        lock(&self.faults).replay_rate = rate.clamp(0.0, 1.0);
    }

    fn set_malformed_rate(&self, rate: f64) {
        lock(&self.faults).malformed_rate = rate.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn feed(seed: u64, profile: FeedProfile) -> (Arc<SimContext>, SimFeed) {
        let ctx = SimContext::shared(seed);
        let feed = SimFeed::new(ctx.clone(), profile);
        (ctx, feed)
    }

    async fn collect(ctx: &SimContext, feed: &SimFeed, polls: usize) -> Vec<Option<RawAlert>> {
        let mut out = Vec::new();
        for _ in 0..polls {
            ctx.advance_time(Duration::from_millis(500));
            out.push(feed.poll().await.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_same_seed_same_records() {
        let (ctx1, feed1) = feed(42, FeedProfile::default());
        let (ctx2, feed2) = feed(42, FeedProfile::default());

        let a = collect(&ctx1, &feed1, 50).await;
        let b = collect(&ctx2, &feed2, 50).await;
        assert_eq!(a, b);
        assert!(feed1.stats().fresh_attacks > 0);
    }

    #[tokio::test]
    async fn test_latest_record_is_redelivered() {
        let (ctx, feed) = feed(1, FeedProfile::scripted());
        feed.push_attack("SYN FLOOD", 90.0);

        let records = collect(&ctx, &feed, 4).await;
        assert!(records.iter().all(|r| r == &records[0]));
        assert!(records[0].is_some());
        assert_eq!(feed.stats().repeats, 3);
    }

    #[tokio::test]
    async fn test_empty_feed_returns_none() {
        let (ctx, feed) = feed(1, FeedProfile::scripted());
        let records = collect(&ctx, &feed, 3).await;
        assert!(records.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_outage_fails_polls() {
        let (_ctx, feed) = feed(1, FeedProfile::default());
        feed.set_outage(true);
        assert!(feed.poll().await.is_err());
        feed.set_outage(false);
        assert!(feed.poll().await.is_ok());
        assert_eq!(feed.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_malformed_records_keep_timestamp_and_status() {
        let profile = FeedProfile {
            attack_rate: 1.0,
            ..FeedProfile::default()
        };
        let (ctx, feed) = feed(3, profile);
        feed.set_malformed_rate(1.0);

        for record in collect(&ctx, &feed, 10).await.into_iter().flatten() {
            assert!(record.is_attack());
            assert_eq!(record.confidence, Some(RawConfidence::Text("n/a".to_string())));
        }
        assert_eq!(feed.stats().malformed, 10);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase_within_one_instant() {
        let (_ctx, feed) = feed(1, FeedProfile::scripted());
        let a = feed.push_attack("A", 50.0);
        let b = feed.push_attack("B", 50.0);
        assert_ne!(a.timestamp, b.timestamp);
    }
}
