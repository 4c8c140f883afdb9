//! Attack event model and the pure classification rules applied at ingestion.

use sentrix_env::{FeedTimestamp, RawConfidence};
use serde::{Deserialize, Serialize};

// ============================================================================
// COORDINATES & IDS
// ============================================================================

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    /// Latitude, nominally [-90, 90]
    pub lat: f64,
    /// Longitude, nominally [-180, 180]
    pub lon: f64,
}

impl GeoCoord {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Unique identifier of an attack event within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Builds the live-event id: `LIVE-<unix millis>-<sequence>`.
    pub fn live(unix_millis: u64, sequence: u64) -> Self {
        Self(format!("LIVE-{}-{:04}", unix_millis, sequence))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// THREAT LEVEL
// ============================================================================

/// Ordinal threat level. Drives visual weight only, never lifecycle logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Step function over confidence:
    /// `<=50` Low, `(50,80]` Medium, `(80,90]` High, `>90` Critical.
    pub fn from_confidence(confidence: u8) -> Self {
        match confidence {
            0..=50 => ThreatLevel::Low,
            51..=80 => ThreatLevel::Medium,
            81..=90 => ThreatLevel::High,
            _ => ThreatLevel::Critical,
        }
    }

    /// Color key handed across the render boundary (0xRRGGBB).
    pub fn color_key(&self) -> u32 {
        match self {
            ThreatLevel::Low => 0xffaa00,
            ThreatLevel::Medium => 0xff4444,
            ThreatLevel::High => 0xff0044,
            ThreatLevel::Critical => 0xff0022,
        }
    }

    /// Severity classification exposed to collaborators that own
    /// escalation policy (navigation, paging, ...).
    pub fn is_severe(&self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "Low",
            ThreatLevel::Medium => "Medium",
            ThreatLevel::High => "High",
            ThreatLevel::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// ATTACK TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackType {
    #[serde(rename = "DDoS")]
    DDoS,
    Malware,
    Phishing,
    Ransomware,
    #[serde(rename = "Data Breach")]
    DataBreach,
    #[serde(rename = "Volumetric Flood")]
    VolumetricFlood,
    #[serde(rename = "Brute Force")]
    BruteForce,
}

/// Ordered substring rules; first match wins.
const TYPE_RULES: [(&str, AttackType); 3] = [
    ("FLOOD", AttackType::VolumetricFlood),
    ("BRUTE", AttackType::BruteForce),
    ("SCAN", AttackType::DataBreach), // scans are reported as breach attempts
];

impl AttackType {
    /// Classifies a free-text detector label (case-insensitive).
    ///
    /// Missing or unrecognised labels fall back to `DDoS`.
    pub fn classify(raw: Option<&str>) -> Self {
        let upper = raw.unwrap_or("").to_uppercase();
        TYPE_RULES
            .iter()
            .find(|(needle, _)| upper.contains(needle))
            .map(|(_, kind)| *kind)
            .unwrap_or(AttackType::DDoS)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttackType::DDoS => "DDoS",
            AttackType::Malware => "Malware",
            AttackType::Phishing => "Phishing",
            AttackType::Ransomware => "Ransomware",
            AttackType::DataBreach => "Data Breach",
            AttackType::VolumetricFlood => "Volumetric Flood",
            AttackType::BruteForce => "Brute Force",
        }
    }
}

impl std::fmt::Display for AttackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackStatus {
    Active,
    Detected,
    Mitigated,
}

impl std::fmt::Display for AttackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttackStatus::Active => "Active",
            AttackStatus::Detected => "Detected",
            AttackStatus::Mitigated => "Mitigated",
        };
        f.write_str(name)
    }
}

// ============================================================================
// ATTACK EVENT
// ============================================================================

/// An ingested attack. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEvent {
    pub id: EventId,

    /// Attacker label (sentinel when the feed did not know)
    pub source: String,
    pub source_coord: GeoCoord,

    /// Defended asset label
    pub target: String,
    pub target_coord: GeoCoord,

    pub attack_type: AttackType,
    pub threat_level: ThreatLevel,
    pub status: AttackStatus,

    /// Upstream notification timestamp (dedup key)
    pub timestamp: FeedTimestamp,

    /// Wall-clock creation time (Unix milliseconds)
    pub created_at_ms: u64,

    /// Detector confidence [0, 100]
    pub confidence: u8,
}

impl AttackEvent {
    pub fn is_severe(&self) -> bool {
        self.threat_level.is_severe()
    }
}

// ============================================================================
// CONFIDENCE PARSING
// ============================================================================

/// Normalises an upstream confidence to [0, 100].
///
/// Numbers are truncated, text is read up to the first non-digit
/// (`"95%"` -> 95). Missing or unparsable values become 0.
pub fn parse_confidence(raw: Option<&RawConfidence>) -> u8 {
    let value = match raw {
        Some(RawConfidence::Number(n)) if n.is_finite() => n.trunc() as i64,
        Some(RawConfidence::Text(text)) => leading_integer(text).unwrap_or(0),
        _ => 0,
    };
    value.clamp(0, 100) as u8
}

fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }

    // Only overflow can fail here
    Some(sign * digits.parse::<i64>().unwrap_or(i64::MAX))
}
