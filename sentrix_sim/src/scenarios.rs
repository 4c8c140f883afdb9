//! Deterministic scenarios for the attack globe pipeline.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// SIM-001: Default synthetic traffic, invariants only
    SteadyStream,

    /// SIM-002: Bridge re-delivers the same record most of the time
    DuplicateStorm,

    /// SIM-003: 21 distinct records 500ms apart against capacity 20
    Overflow,

    /// SIM-004: Every record has garbled fields
    MalformedFeed,

    /// SIM-005: Feed unreachable for a window, then recovers
    FeedOutage,

    /// SIM-006: One event selected, twin run without selection
    SelectionFocus,

    /// SIM-007: Tiny capacity, arcs evicted while still traveling
    EvictionMidFlight,

    /// SIM-008: Operator test alerts mixed with live traffic
    TestAlerts,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::SteadyStream,
            ScenarioId::DuplicateStorm,
            ScenarioId::Overflow,
            ScenarioId::MalformedFeed,
            ScenarioId::FeedOutage,
            ScenarioId::SelectionFocus,
            ScenarioId::EvictionMidFlight,
            ScenarioId::TestAlerts,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::SteadyStream => "steady_stream",
            ScenarioId::DuplicateStorm => "duplicate_storm",
            ScenarioId::Overflow => "overflow",
            ScenarioId::MalformedFeed => "malformed_feed",
            ScenarioId::FeedOutage => "feed_outage",
            ScenarioId::SelectionFocus => "selection_focus",
            ScenarioId::EvictionMidFlight => "eviction_mid_flight",
            ScenarioId::TestAlerts => "test_alerts",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::SteadyStream => "Seeded synthetic traffic, per-frame invariant checks",
            ScenarioId::DuplicateStorm => "80% replays, every distinct record accepted exactly once",
            ScenarioId::Overflow => "21 records 500ms apart, set capped at 20, first one evicted",
            ScenarioId::MalformedFeed => "Garbled payloads map to defaults, never rejected",
            ScenarioId::FeedOutage => "3s outage leaves state untouched, ingestion resumes",
            ScenarioId::SelectionFocus => "Selection dims other arcs without changing their timers",
            ScenarioId::EvictionMidFlight => "Capacity 3, evicted arcs fade out instead of vanishing",
            ScenarioId::TestAlerts => "Injected alerts bypass dedup and still respect capacity",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady_stream" | "steadystream" | "sim-001" => Ok(ScenarioId::SteadyStream),
            "duplicate_storm" | "duplicatestorm" | "sim-002" => Ok(ScenarioId::DuplicateStorm),
            "overflow" | "sim-003" => Ok(ScenarioId::Overflow),
            "malformed_feed" | "malformedfeed" | "sim-004" => Ok(ScenarioId::MalformedFeed),
            "feed_outage" | "feedoutage" | "sim-005" => Ok(ScenarioId::FeedOutage),
            "selection_focus" | "selectionfocus" | "sim-006" => Ok(ScenarioId::SelectionFocus),
            "eviction_mid_flight" | "evictionmidflight" | "sim-007" => Ok(ScenarioId::EvictionMidFlight),
            "test_alerts" | "testalerts" | "sim-008" => Ok(ScenarioId::TestAlerts),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
