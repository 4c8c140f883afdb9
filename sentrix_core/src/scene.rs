//! Scene lifecycle: one animator per active event, removal on completion,
//! and the single selected event that dims everything else.
//!
//! The composer never mutates events. It reads [`ActiveSnapshot`]s handed
//! over from the ingestion side and reacts to [`ArcSignal`]s from its own
//! animators.

use crate::arc_animator::{AnimationConfig, ArcAnimator, ArcPhase, ArcSignal};
use crate::arc_path::{ArcPath, PathParams};
use crate::attack::{AttackEvent, AttackStatus, AttackType, EventId, GeoCoord, ThreatLevel};
use crate::config::GlobeConfig;
use crate::feed_controller::ActiveSnapshot;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// RNG stream used for per-arc speed jitter.
pub const SCENE_RNG_STREAM: u64 = 0xA4C;

/// What happens to an arc whose event left the active set mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Stop traveling and fade out where the packet is
    #[default]
    FadeOut,
    /// Keep flying to the target, then fade as usual
    FinishFlight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub eviction: EvictionPolicy,
}

/// Result of one [`SceneComposer::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub spawned: Vec<EventId>,
    /// Arcs whose event was evicted during this sync
    pub retired: Vec<EventId>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty() && self.retired.is_empty()
    }
}

// ============================================================================
// RENDER BOUNDARY
// ============================================================================

/// Everything a renderer needs to draw one arc for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcFrame {
    pub id: EventId,
    pub source_coord: GeoCoord,
    pub target_coord: GeoCoord,

    /// Packet position in globe space
    pub position: [f64; 3],

    pub opacity: f64,
    pub packet_opacity: f64,
    pub threat_level: ThreatLevel,

    /// 0xRRGGBB
    pub color: u32,
    pub phase: ArcPhase,
    pub travel_progress: f64,
    pub dimmed: bool,
}

/// Displayable fields of one event (info panel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: EventId,
    pub source: String,
    pub target: String,
    pub attack_type: AttackType,
    pub threat_level: ThreatLevel,
    pub status: AttackStatus,
    pub confidence: u8,
    pub timestamp: String,
    pub created_at_ms: u64,
    pub severe: bool,

    /// `None` once the arc has finished
    pub phase: Option<ArcPhase>,
}

impl EventSummary {
    fn new(event: &AttackEvent, phase: Option<ArcPhase>) -> Self {
        Self {
            id: event.id.clone(),
            source: event.source.clone(),
            target: event.target.clone(),
            attack_type: event.attack_type,
            threat_level: event.threat_level,
            status: event.status,
            confidence: event.confidence,
            timestamp: event.timestamp.to_string(),
            created_at_ms: event.created_at_ms,
            severe: event.is_severe(),
            phase,
        }
    }
}

// ============================================================================
// COMPOSER
// ============================================================================

struct LiveArc {
    event: AttackEvent,
    animator: ArcAnimator,
    spawn_seq: u64,
    /// Event already left the active set
    evicted: bool,
}

/// Owns every live animator and the current selection.
pub struct SceneComposer {
    radius: f64,
    path_params: PathParams,
    animation: AnimationConfig,
    eviction: EvictionPolicy,
    rng: ChaCha8Rng,

    arcs: HashMap<EventId, LiveArc>,
    next_seq: u64,

    /// Finished arcs whose event is still active
    completed: HashSet<EventId>,

    last_snapshot: ActiveSnapshot,
    last_generation: Option<u64>,

    selected: Option<EventId>,
}

impl SceneComposer {
    pub fn new(
        globe: &GlobeConfig,
        animation: AnimationConfig,
        scene: SceneConfig,
        rng: ChaCha8Rng,
    ) -> Self {
        Self {
            radius: globe.radius,
            path_params: globe.path_params(),
            animation,
            eviction: scene.eviction,
            rng,
            arcs: HashMap::new(),
            next_seq: 0,
            completed: HashSet::new(),
            last_snapshot: ActiveSnapshot::default(),
            last_generation: None,
            selected: None,
        }
    }

    /// Reconciles live arcs with the active set.
    ///
    /// Unchanged generations are skipped.
    pub fn sync(&mut self, snapshot: &ActiveSnapshot) -> SyncReport {
        let mut report = SyncReport::default();
        if self.last_generation == Some(snapshot.generation) {
            return report;
        }

        let present: HashSet<&EventId> = snapshot.events.iter().map(|e| &e.id).collect();

        for event in &snapshot.events {
            if self.arcs.contains_key(&event.id) || self.completed.contains(&event.id) {
                continue;
            }
            self.spawn(event);
            report.spawned.push(event.id.clone());
        }

        let mut retired: Vec<(u64, EventId)> = Vec::new();
        for (id, arc) in self.arcs.iter_mut() {
            if arc.evicted || present.contains(id) {
                continue;
            }
            arc.evicted = true;
            if self.eviction == EvictionPolicy::FadeOut {
                arc.animator.retire();
            }
            debug!(id = %id, policy = ?self.eviction, "Arc event evicted");
            retired.push((arc.spawn_seq, id.clone()));
        }
        retired.sort();
        report.retired = retired.into_iter().map(|(_, id)| id).collect();

        self.completed.retain(|id| present.contains(id));

        self.last_snapshot = snapshot.clone();
        self.last_generation = Some(snapshot.generation);
        self.refresh_selection();

        report
    }

    fn spawn(&mut self, event: &AttackEvent) {
        let path = ArcPath::between(
            event.source_coord,
            event.target_coord,
            self.radius,
            &self.path_params,
        );
        let animator = ArcAnimator::with_rng(path, &self.animation, &mut self.rng);

        info!(
            id = %event.id,
            speed = animator.speed(),
            chord = path.chord(),
            "Spawned arc"
        );

        self.arcs.insert(
            event.id.clone(),
            LiveArc {
                event: event.clone(),
                animator,
                spawn_seq: self.next_seq,
                evicted: false,
            },
        );
        self.next_seq += 1;
    }

    /// Advances every live arc by `dt` seconds and drops the ones that
    /// finished. Returns the finished ids in spawn order.
    pub fn advance(&mut self, dt: f64) -> Vec<EventId> {
        let mut finished: Vec<(u64, EventId)> = Vec::new();
        for (id, arc) in self.arcs.iter_mut() {
            if arc.animator.advance(dt) == ArcSignal::Completed {
                finished.push((arc.spawn_seq, id.clone()));
            }
        }
        finished.sort();

        let finished: Vec<EventId> = finished.into_iter().map(|(_, id)| id).collect();
        for id in &finished {
            self.arcs.remove(id);
            if self.last_snapshot.contains(id) {
                self.completed.insert(id.clone());
            }
            debug!(id = %id, "Arc completed");
        }

        if !finished.is_empty() {
            self.refresh_selection();
        }
        finished
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Selects an event that has a live arc or is still active.
    /// Unknown ids leave the selection unchanged.
    pub fn select(&mut self, id: &EventId) -> bool {
        if !self.is_known(id) {
            debug!(id = %id, "Ignoring selection of unknown event");
            return false;
        }
        self.selected = Some(id.clone());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&EventId> {
        self.selected.as_ref()
    }

    /// True when some other event is selected.
    pub fn is_dimmed(&self, id: &EventId) -> bool {
        matches!(&self.selected, Some(selected) if selected != id)
    }

    fn is_known(&self, id: &EventId) -> bool {
        self.arcs.contains_key(id) || self.last_snapshot.contains(id)
    }

    fn refresh_selection(&mut self) {
        let stale = matches!(&self.selected, Some(id) if !self.is_known(id));
        if stale {
            debug!(id = ?self.selected, "Selected event is gone, clearing selection");
            self.selected = None;
        }
    }

    // ------------------------------------------------------------------------
    // Render boundary
    // ------------------------------------------------------------------------

    /// Frame data for every live arc, oldest spawn first.
    pub fn frames(&self) -> Vec<ArcFrame> {
        let mut arcs: Vec<(&EventId, &LiveArc)> = self.arcs.iter().collect();
        arcs.sort_by_key(|(_, arc)| arc.spawn_seq);

        arcs.into_iter()
            .map(|(id, arc)| {
                let dimmed = self.is_dimmed(id);
                let position = arc.animator.position();
                ArcFrame {
                    id: id.clone(),
                    source_coord: arc.event.source_coord,
                    target_coord: arc.event.target_coord,
                    position: [position.x, position.y, position.z],
                    opacity: arc.animator.opacity(dimmed),
                    packet_opacity: arc.animator.packet_opacity(dimmed),
                    threat_level: arc.event.threat_level,
                    color: arc.event.threat_level.color_key(),
                    phase: arc.animator.phase(),
                    travel_progress: arc.animator.state().travel_progress,
                    dimmed,
                }
            })
            .collect()
    }

    pub fn summary(&self, id: &EventId) -> Option<EventSummary> {
        if let Some(arc) = self.arcs.get(id) {
            return Some(EventSummary::new(&arc.event, Some(arc.animator.phase())));
        }
        self.last_snapshot
            .get(id)
            .map(|event| EventSummary::new(event, None))
    }

    pub fn animator(&self, id: &EventId) -> Option<&ArcAnimator> {
        self.arcs.get(id).map(|arc| &arc.animator)
    }

    pub fn is_completed(&self, id: &EventId) -> bool {
        self.completed.contains(id)
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use sentrix_env::FeedTimestamp;

    fn event(n: u64) -> AttackEvent {
        AttackEvent {
            id: EventId::live(1_718_000_000_000, n),
            source: format!("10.0.0.{}", n),
            source_coord: GeoCoord::new(40.0 - n as f64, -70.0 + n as f64),
            target: "SENTRIX SYSTEM".to_string(),
            target_coord: GeoCoord::new(12.9716, 77.5946),
            attack_type: AttackType::DDoS,
            threat_level: ThreatLevel::from_confidence((n * 10).min(100) as u8),
            status: AttackStatus::Active,
            timestamp: FeedTimestamp::Number(n as f64),
            created_at_ms: 1_718_000_000_000,
            confidence: (n * 10).min(100) as u8,
        }
    }

    fn snapshot(events: &[AttackEvent], generation: u64) -> ActiveSnapshot {
        ActiveSnapshot {
            events: events.to_vec(),
            generation,
        }
    }

    fn composer_with(policy: EvictionPolicy) -> SceneComposer {
        // Fixed speed keeps timings exact
        let animation = AnimationConfig {
            speed_min: 0.25,
            speed_max: 0.25,
            ..AnimationConfig::default()
        };
        SceneComposer::new(
            &GlobeConfig::default(),
            animation,
            SceneConfig { eviction: policy },
            ChaCha8Rng::seed_from_u64(9),
        )
    }

    fn composer() -> SceneComposer {
        composer_with(EvictionPolicy::FadeOut)
    }

    #[test]
    fn test_sync_spawns_once_per_event() {
        let mut scene = composer();
        let events = vec![event(1), event(2)];

        let report = scene.sync(&snapshot(&events, 1));
        assert_eq!(report.spawned, vec![events[0].id.clone(), events[1].id.clone()]);
        assert_eq!(scene.len(), 2);

        // Same generation: skipped entirely
        assert!(scene.sync(&snapshot(&events, 1)).is_empty());

        // New generation, same events: nothing new
        assert!(scene.sync(&snapshot(&events, 2)).spawned.is_empty());
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn test_completed_arc_is_removed_and_not_respawned() {
        let mut scene = composer();
        let events = vec![event(1)];
        scene.sync(&snapshot(&events, 1));

        // 4s travel at 0.25/s, then 2.5s fade at 0.4/s
        assert!(scene.advance(4.0).is_empty());
        let finished = scene.advance(3.0);
        assert_eq!(finished, vec![events[0].id.clone()]);
        assert!(scene.is_empty());
        assert!(scene.is_completed(&events[0].id));

        let report = scene.sync(&snapshot(&events, 2));
        assert!(report.spawned.is_empty());
        assert!(scene.is_empty());

        // Once evicted, the completed memory is pruned
        scene.sync(&snapshot(&[], 3));
        assert!(!scene.is_completed(&events[0].id));
    }

    #[test]
    fn test_fade_out_policy_retires_evicted_arc() {
        let mut scene = composer();
        let e = event(1);
        scene.sync(&snapshot(&[e.clone()], 1));
        scene.advance(1.0);

        let report = scene.sync(&snapshot(&[], 2));
        assert_eq!(report.retired, vec![e.id.clone()]);
        assert_eq!(scene.animator(&e.id).unwrap().phase(), ArcPhase::Fading);

        // Not retired twice
        assert!(scene.sync(&snapshot(&[], 3)).retired.is_empty());

        // Fades out on its own (1 / 0.4 = 2.5s)
        assert_eq!(scene.advance(3.0), vec![e.id.clone()]);
        assert!(!scene.is_completed(&e.id));
    }

    #[test]
    fn test_finish_flight_policy_keeps_traveling() {
        let mut scene = composer_with(EvictionPolicy::FinishFlight);
        let e = event(1);
        scene.sync(&snapshot(&[e.clone()], 1));
        scene.advance(1.0);

        let report = scene.sync(&snapshot(&[], 2));
        assert_eq!(report.retired, vec![e.id.clone()]);
        assert_eq!(scene.animator(&e.id).unwrap().phase(), ArcPhase::Traveling);

        scene.advance(3.0);
        assert_eq!(scene.animator(&e.id).unwrap().phase(), ArcPhase::Fading);
    }

    #[test]
    fn test_selection_dims_others_without_touching_timers() {
        let mut plain = composer();
        let mut focused = composer();
        let events = vec![event(1), event(2), event(3)];
        plain.sync(&snapshot(&events, 1));
        focused.sync(&snapshot(&events, 1));

        assert!(focused.select(&events[1].id));
        for _ in 0..30 {
            plain.advance(0.1);
            focused.advance(0.1);
        }

        for (a, b) in plain.frames().iter().zip(focused.frames().iter()) {
            assert_eq!(a.travel_progress, b.travel_progress);
            assert_eq!(a.position, b.position);
        }

        let frames = focused.frames();
        assert!(frames[0].dimmed);
        assert!(!frames[1].dimmed);
        assert!(frames[2].dimmed);
        assert!(frames[0].opacity < frames[1].opacity);
        assert!(plain.frames().iter().all(|f| !f.dimmed));
    }

    #[test]
    fn test_select_unknown_is_ignored() {
        let mut scene = composer();
        let e = event(1);
        scene.sync(&snapshot(&[e.clone()], 1));
        scene.select(&e.id);

        assert!(!scene.select(&EventId::from("LIVE-0-9999")));
        assert_eq!(scene.selected(), Some(&e.id));

        scene.clear_selection();
        assert_eq!(scene.selected(), None);
        assert!(!scene.is_dimmed(&e.id));
    }

    #[test]
    fn test_selection_cleared_when_event_disappears() {
        let mut scene = composer();
        let e = event(1);
        scene.sync(&snapshot(&[e.clone()], 1));
        scene.select(&e.id);

        // Evicted but still fading: selection survives
        scene.sync(&snapshot(&[], 2));
        assert_eq!(scene.selected(), Some(&e.id));

        // Arc finished and event gone
        scene.advance(10.0);
        assert_eq!(scene.selected(), None);
    }

    #[test]
    fn test_completed_but_active_event_stays_selectable() {
        let mut scene = composer();
        let e = event(1);
        scene.sync(&snapshot(&[e.clone()], 1));
        scene.advance(4.0);
        scene.advance(3.0);
        assert!(scene.is_empty());

        assert!(scene.select(&e.id));
        let summary = scene.summary(&e.id).unwrap();
        assert_eq!(summary.phase, None);
        assert_eq!(summary.source, "10.0.0.1");
    }

    #[test]
    fn test_frames_are_in_spawn_order() {
        let mut scene = composer();
        let events: Vec<_> = (1..=6).map(event).collect();
        scene.sync(&snapshot(&events[..3], 1));
        scene.sync(&snapshot(&events, 2));

        let ids: Vec<_> = scene.frames().into_iter().map(|f| f.id).collect();
        let expected: Vec<_> = events.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_frame_fields() {
        let mut scene = composer();
        let e = event(9);
        scene.sync(&snapshot(&[e.clone()], 1));

        let frame = &scene.frames()[0];
        assert_eq!(frame.color, ThreatLevel::High.color_key());
        assert_eq!(frame.phase, ArcPhase::Traveling);
        assert_eq!(frame.packet_opacity, 1.0);
        assert!((frame.opacity - 0.55).abs() < 1e-12);

        let summary = scene.summary(&e.id).unwrap();
        assert!(summary.severe);
        assert_eq!(summary.phase, Some(ArcPhase::Traveling));
    }
}
