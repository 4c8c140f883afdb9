//! JSON exporter for offline inspection of a simulated session.
//!
//! Exports render frames exactly as a renderer would have received them.

use sentrix_core::{ArcFrame, EventId, FeedStats, FramePacket};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single exported frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFrame {
    /// Virtual time in seconds
    pub time_sec: f64,

    /// Live arcs in spawn order
    pub arcs: Vec<ArcFrame>,

    /// Size of the active set
    pub active_events: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<EventId>,

    /// Scenario milestones (outage start, selection, ...)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SimEvent>,
}

impl SimFrame {
    pub fn from_packet(packet: &FramePacket, events: Vec<SimEvent>) -> Self {
        Self {
            time_sec: packet.time_secs,
            arcs: packet.arcs.clone(),
            active_events: packet.events.len(),
            selected: packet.selected.as_ref().map(|s| s.id.clone()),
            events,
        }
    }
}

/// Simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl SimEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// All frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    /// Feed counters at the end of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_stats: Option<FeedStats>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            final_stats: None,
        }
    }

    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, stats: FeedStats) {
        self.passed = passed;
        self.final_stats = Some(stats);
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
