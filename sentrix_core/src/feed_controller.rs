//! Attack feed ingestion: deduplication, payload mapping and the bounded
//! FIFO of active events.
//!
//! The upstream bridge only ever exposes its latest alert, so the same
//! record arrives again on every poll until a newer one replaces it. The
//! controller keeps a one-slot cursor (the last accepted timestamp) and
//! drops anything equal to it.
//!
//! # Ownership
//!
//! The controller exclusively owns the active set, the cursor and its
//! counters. Readers get an [`ActiveSnapshot`], an immutable copy stamped
//! with a generation number that moves on every mutation.

use crate::attack::{
    parse_confidence, AttackEvent, AttackStatus, AttackType, EventId, GeoCoord, ThreatLevel,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use sentrix_env::{FeedTimestamp, RawAlert, SentrixContext};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// RNG stream used for source coordinates.
pub const FEED_RNG_STREAM: u64 = 0xFEED;

/// Label the upstream uses when it could not attribute an attack.
const UPSTREAM_UNKNOWN: &str = "Unknown";

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Maximum number of active events (default: 20)
    pub capacity: usize,

    /// Label of the defended asset (default: "SENTRIX SYSTEM")
    pub target_label: String,

    /// Coordinate every arc lands on (default: Bangalore)
    pub target_coord: GeoCoord,

    /// Source label used when upstream gives none (default: "External Threat")
    pub unknown_source_label: String,

    /// Source latitudes are drawn from [-limit, limit] (default: 80)
    pub source_lat_limit: f64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            target_label: "SENTRIX SYSTEM".to_string(),
            target_coord: GeoCoord::new(12.9716, 77.5946),
            unknown_source_label: "External Threat".to_string(),
            source_lat_limit: 80.0,
        }
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Same timestamp as the last accepted record
    Duplicate,
    /// Status other than `ATTACK`
    NotAnAttack,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Accepted {
        event: AttackEvent,
        /// Events pushed out of the front to honour capacity
        evicted: Vec<AttackEvent>,
    },
    Rejected(RejectReason),
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IngestOutcome::Accepted { .. })
    }

    pub fn event(&self) -> Option<&AttackEvent> {
        match self {
            IngestOutcome::Accepted { event, .. } => Some(event),
            IngestOutcome::Rejected(_) => None,
        }
    }
}

/// Immutable copy of the active set, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveSnapshot {
    pub events: Vec<AttackEvent>,
    pub generation: u64,
}

impl ActiveSnapshot {
    pub fn contains(&self, id: &EventId) -> bool {
        self.events.iter().any(|e| &e.id == id)
    }

    pub fn get(&self, id: &EventId) -> Option<&AttackEvent> {
        self.events.iter().find(|e| &e.id == id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub evicted: u64,
    pub injected: u64,
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Turns raw feed records into [`AttackEvent`]s and keeps the bounded set.
pub struct AttackFeedController<Ctx: SentrixContext> {
    context: Arc<Ctx>,
    config: FeedConfig,
    rng: ChaCha8Rng,

    active: VecDeque<AttackEvent>,

    /// Dedup cursor
    last_seen: Option<FeedTimestamp>,

    /// Per-session id sequence
    sequence: u64,
    generation: u64,
    stats: FeedStats,
}

impl<Ctx: SentrixContext> AttackFeedController<Ctx> {
    pub fn new(context: Arc<Ctx>, config: FeedConfig) -> Self {
        let rng = context.derive_rng(FEED_RNG_STREAM);
        Self {
            context,
            rng,
            active: VecDeque::with_capacity(config.capacity + 1),
            config,
            last_seen: None,
            sequence: 0,
            generation: 0,
            stats: FeedStats::default(),
        }
    }

    /// Processes one polled record.
    pub fn ingest(&mut self, raw: &RawAlert) -> IngestOutcome {
        if !raw.is_attack() {
            self.stats.ignored += 1;
            debug!(status = %raw.status, "Ignoring non-attack record");
            return IngestOutcome::Rejected(RejectReason::NotAnAttack);
        }

        if self.last_seen.as_ref() == Some(&raw.timestamp) {
            self.stats.duplicates += 1;
            debug!(timestamp = %raw.timestamp, "Dropping duplicate record");
            return IngestOutcome::Rejected(RejectReason::Duplicate);
        }

        self.last_seen = Some(raw.timestamp.clone());
        self.accept(raw)
    }

    /// Manual injection path: bypasses the dedup cursor and leaves it where
    /// it was. Capacity still applies. Non-attack records are still ignored.
    pub fn inject(&mut self, raw: &RawAlert) -> IngestOutcome {
        if !raw.is_attack() {
            self.stats.ignored += 1;
            return IngestOutcome::Rejected(RejectReason::NotAnAttack);
        }

        self.stats.injected += 1;
        self.accept(raw)
    }

    /// The canonical operator test alert.
    pub fn test_alert(now_ms: u64) -> RawAlert {
        RawAlert::attack("TEST FLOOD", FeedTimestamp::Number(now_ms as f64))
            .with_source("1.2.3.4")
            .with_confidence_text("99")
    }

    fn accept(&mut self, raw: &RawAlert) -> IngestOutcome {
        let event = self.build_event(raw);

        info!(
            id = %event.id,
            source = %event.source,
            attack_type = %event.attack_type,
            threat_level = %event.threat_level,
            "Accepted attack event"
        );

        self.active.push_back(event.clone());
        self.stats.accepted += 1;

        let mut evicted = Vec::new();
        while self.active.len() > self.config.capacity {
            if let Some(old) = self.active.pop_front() {
                debug!(id = %old.id, "Evicted oldest event");
                evicted.push(old);
            }
        }
        self.stats.evicted += evicted.len() as u64;
        self.generation += 1;

        IngestOutcome::Accepted { event, evicted }
    }

    fn build_event(&mut self, raw: &RawAlert) -> AttackEvent {
        let confidence = parse_confidence(raw.confidence.as_ref());

        let source = match raw.source.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() && label != UPSTREAM_UNKNOWN => label.to_string(),
            _ => self.config.unknown_source_label.clone(),
        };

        let lat_limit = self.config.source_lat_limit.abs();
        let source_coord = GeoCoord::new(
            self.rng.gen_range(-lat_limit..=lat_limit),
            self.rng.gen_range(-180.0..=180.0),
        );

        let created_at_ms = self.context.unix_millis();
        self.sequence += 1;

        AttackEvent {
            id: EventId::live(created_at_ms, self.sequence),
            source,
            source_coord,
            target: self.config.target_label.clone(),
            target_coord: self.config.target_coord,
            attack_type: AttackType::classify(raw.attack_type.as_deref()),
            threat_level: ThreatLevel::from_confidence(confidence),
            status: AttackStatus::Active,
            timestamp: raw.timestamp.clone(),
            created_at_ms,
            confidence,
        }
    }

    pub fn snapshot(&self) -> ActiveSnapshot {
        ActiveSnapshot {
            events: self.active.iter().cloned().collect(),
            generation: self.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn last_seen(&self) -> Option<&FeedTimestamp> {
        self.last_seen.as_ref()
    }

    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ManualContext;
    use std::time::Duration;

    fn controller() -> AttackFeedController<ManualContext> {
        AttackFeedController::new(ManualContext::shared(42), FeedConfig::default())
    }

    #[test]
    fn test_non_attack_is_rejected_without_state_change() {
        let mut feed = controller();
        let mut safe = RawAlert::attack("SYN FLOOD", 1.0);
        safe.status = "SAFE".to_string();

        assert_eq!(feed.ingest(&safe), IngestOutcome::Rejected(RejectReason::NotAnAttack));
        assert!(feed.is_empty());
        assert!(feed.last_seen().is_none());
        assert_eq!(feed.generation(), 0);
    }

    #[test]
    fn test_status_is_case_sensitive() {
        let mut feed = controller();
        let mut lower = RawAlert::attack("SYN FLOOD", 1.0);
        lower.status = "attack".to_string();
        assert!(!feed.ingest(&lower).is_accepted());
    }

    #[test]
    fn test_same_payload_twice_yields_one_event() {
        let mut feed = controller();
        let alert = RawAlert::attack("SYN FLOOD", 1718000000.5).with_confidence_text("97%");

        assert!(feed.ingest(&alert).is_accepted());
        assert_eq!(feed.ingest(&alert), IngestOutcome::Rejected(RejectReason::Duplicate));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.stats().duplicates, 1);
        assert_eq!(feed.generation(), 1);
    }

    #[test]
    fn test_one_slot_cursor_allows_older_repeat() {
        // Only the immediately previous timestamp is remembered
        let mut feed = controller();
        let a = RawAlert::attack("SCAN", 1.0);
        let b = RawAlert::attack("SCAN", 2.0);

        assert!(feed.ingest(&a).is_accepted());
        assert!(feed.ingest(&b).is_accepted());
        assert!(feed.ingest(&a).is_accepted());
        assert_eq!(feed.len(), 3);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let mut feed = controller();
        let mut ids = Vec::new();

        for i in 0..25 {
            let outcome = feed.ingest(&RawAlert::attack("SYN FLOOD", i as f64));
            let IngestOutcome::Accepted { event, evicted } = outcome else {
                panic!("distinct record rejected");
            };
            if i < 20 {
                assert!(evicted.is_empty());
            } else {
                assert_eq!(evicted.len(), 1);
                assert_eq!(evicted[0].id, ids[i - 20]);
            }
            ids.push(event.id);
        }

        let snapshot = feed.snapshot();
        assert_eq!(snapshot.len(), 20);
        let kept: Vec<_> = snapshot.events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(kept, ids[5..].to_vec());
        assert_eq!(feed.stats().evicted, 5);
    }

    #[test]
    fn test_payload_mapping_defaults() {
        let mut feed = controller();
        let raw = RawAlert {
            status: "ATTACK".to_string(),
            attack_type: None,
            source: Some("Unknown".to_string()),
            target: None,
            confidence: None,
            timestamp: FeedTimestamp::from("t1"),
        };

        let outcome = feed.ingest(&raw);
        let event = outcome.event().unwrap();
        assert_eq!(event.attack_type, AttackType::DDoS);
        assert_eq!(event.confidence, 0);
        assert_eq!(event.threat_level, ThreatLevel::Low);
        assert_eq!(event.source, "External Threat");
        assert_eq!(event.target, "SENTRIX SYSTEM");
        assert_eq!(event.target_coord, GeoCoord::new(12.9716, 77.5946));
        assert_eq!(event.status, AttackStatus::Active);
    }

    #[test]
    fn test_badly_typed_wire_fields_still_produce_event() {
        let mut feed = controller();
        let raw: RawAlert = serde_json::from_str(
            r#"{"status": "ATTACK", "type": 7, "source": 42, "confidence": true, "timestamp": 5}"#,
        )
        .unwrap();

        let outcome = feed.ingest(&raw);
        let event = outcome.event().unwrap();
        assert_eq!(event.attack_type, AttackType::DDoS);
        assert_eq!(event.confidence, 0);
        assert_eq!(event.threat_level, ThreatLevel::Low);
        assert_eq!(event.source, "External Threat");
    }

    #[test]
    fn test_missing_timestamp_accepted_once_then_deduplicated() {
        let mut feed = controller();
        let raw: RawAlert =
            serde_json::from_str(r#"{"status": "ATTACK", "type": "SYN FLOOD"}"#).unwrap();

        assert!(feed.ingest(&raw).is_accepted());
        assert_eq!(feed.ingest(&raw), IngestOutcome::Rejected(RejectReason::Duplicate));
        assert_eq!(feed.last_seen(), Some(&FeedTimestamp::Missing));

        // A timestamped record moves the cursor on
        assert!(feed.ingest(&RawAlert::attack("SYN FLOOD", 9.0)).is_accepted());
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_payload_mapping_full_record() {
        let mut feed = controller();
        let raw = RawAlert::attack("BRUTE FORCE SSH", 7.0)
            .with_source("10.0.0.7")
            .with_confidence_text("95%");

        let outcome = feed.ingest(&raw);
        let event = outcome.event().unwrap();
        assert_eq!(event.attack_type, AttackType::BruteForce);
        assert_eq!(event.confidence, 95);
        assert_eq!(event.threat_level, ThreatLevel::Critical);
        assert_eq!(event.source, "10.0.0.7");
        assert!(event.source_coord.lat.abs() <= 80.0);
        assert!(event.source_coord.lon.abs() <= 180.0);
        assert!(event.id.as_str().starts_with("LIVE-"));
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let mut feed = controller();
        let a = feed.ingest(&RawAlert::attack("A", 1.0));
        let b = feed.ingest(&RawAlert::attack("B", 2.0));
        assert_ne!(a.event().unwrap().id, b.event().unwrap().id);
        assert_eq!(a.event().unwrap().created_at_ms, b.event().unwrap().created_at_ms);
    }

    #[test]
    fn test_created_at_follows_context_clock() {
        let ctx = ManualContext::shared(1);
        let mut feed = AttackFeedController::new(ctx.clone(), FeedConfig::default());

        let first = feed.ingest(&RawAlert::attack("A", 1.0));
        ctx.advance(Duration::from_millis(1500));
        let second = feed.ingest(&RawAlert::attack("A", 2.0));

        let delta = second.event().unwrap().created_at_ms - first.event().unwrap().created_at_ms;
        assert_eq!(delta, 1500);
    }

    #[test]
    fn test_inject_does_not_move_cursor() {
        let mut feed = controller();
        let polled = RawAlert::attack("SYN FLOOD", 10.0);
        feed.ingest(&polled);

        let test = AttackFeedController::<ManualContext>::test_alert(99);
        assert!(feed.inject(&test).is_accepted());
        assert_eq!(feed.last_seen(), Some(&FeedTimestamp::Number(10.0)));

        // Still a duplicate of the polled record
        assert!(!feed.ingest(&polled).is_accepted());
        assert_eq!(feed.stats().injected, 1);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn test_alert_payload() {
        let alert = AttackFeedController::<ManualContext>::test_alert(1_000);
        assert!(alert.is_attack());
        let mut feed = controller();
        let outcome = feed.inject(&alert);
        let event = outcome.event().unwrap();
        assert_eq!(event.attack_type, AttackType::VolumetricFlood);
        assert_eq!(event.threat_level, ThreatLevel::Critical);
        assert_eq!(event.source, "1.2.3.4");
    }

    #[test]
    fn test_same_seed_same_coordinates() {
        let mut a = controller();
        let mut b = controller();
        for i in 0..10 {
            let raw = RawAlert::attack("X", i as f64);
            let ea = a.ingest(&raw).event().unwrap().source_coord;
            let eb = b.ingest(&raw).event().unwrap().source_coord;
            assert_eq!(ea, eb);
        }
    }
}
