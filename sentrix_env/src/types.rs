//! Wire types for the upstream alert feed.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Status value the upstream uses for an active attack.
pub const ATTACK_STATUS: &str = "ATTACK";

/// Timestamp attached to an upstream record.
///
/// The bridge emits float seconds, hand-written test payloads often use
/// integer milliseconds or ISO strings. Only equality matters: it is the
/// dedup key, never arithmetic.
///
/// A record without a usable timestamp carries `Missing`. Two such records
/// compare equal, so the first is accepted and repeats are duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedTimestamp {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl std::fmt::Display for FeedTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedTimestamp::Number(n) => write!(f, "{}", n),
            FeedTimestamp::Text(s) => write!(f, "{}", s),
            FeedTimestamp::Missing => f.write_str("missing"),
        }
    }
}

impl From<f64> for FeedTimestamp {
    fn from(value: f64) -> Self {
        FeedTimestamp::Number(value)
    }
}

impl From<&str> for FeedTimestamp {
    fn from(value: &str) -> Self {
        FeedTimestamp::Text(value.to_string())
    }
}

/// Confidence as sent upstream: either a number or text such as `"95%"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawConfidence {
    Number(f64),
    Text(String),
}

/// A field value that either has the expected shape or is discarded.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

/// Decodes an optional field, turning a wrongly typed value into `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<Lenient<T>>::deserialize(deserializer)? {
        Some(Lenient::Valid(value)) => Some(value),
        Some(Lenient::Invalid(_)) | None => None,
    })
}

/// Like [`lenient`], falling back to the type's default.
fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    lenient(deserializer).map(Option::unwrap_or_default)
}

/// A single notification from the upstream alert bridge.
///
/// Every field is optional on the wire. A missing or wrongly typed field
/// never fails the record: it decodes to `None` (or an empty status, or
/// [`FeedTimestamp::Missing`]) and ingestion applies the documented
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAlert {
    /// `"ATTACK"` for an active alert, anything else (e.g. `"SAFE"`) otherwise
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub status: String,

    /// Free-text attack classification (e.g. `"SYN FLOOD"`)
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub attack_type: Option<String>,

    /// Attacker label, usually an IP address
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Target label (`ip:port`), informational only
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Detector confidence
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<RawConfidence>,

    /// Upstream creation instant; the dedup key
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub timestamp: FeedTimestamp,
}

impl RawAlert {
    /// Creates an `ATTACK` record with the given type and timestamp.
    pub fn attack(attack_type: &str, timestamp: impl Into<FeedTimestamp>) -> Self {
        Self {
            status: ATTACK_STATUS.to_string(),
            attack_type: Some(attack_type.to_string()),
            source: None,
            target: None,
            confidence: None,
            timestamp: timestamp.into(),
        }
    }

    /// Sets the source label.
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Sets a textual confidence (e.g. `"95%"`).
    pub fn with_confidence_text(mut self, confidence: &str) -> Self {
        self.confidence = Some(RawConfidence::Text(confidence.to_string()));
        self
    }

    /// Sets a numeric confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(RawConfidence::Number(confidence));
        self
    }

    /// Returns true if this record announces an attack.
    pub fn is_attack(&self) -> bool {
        self.status == ATTACK_STATUS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_bridge_record() {
        let json = r#"{
            "status": "ATTACK",
            "type": "SYN FLOOD",
            "confidence": "97%",
            "source": "10.0.0.7",
            "target": "192.168.1.10:80",
            "timestamp": 1718000000.25
        }"#;

        let alert: RawAlert = serde_json::from_str(json).unwrap();
        assert!(alert.is_attack());
        assert_eq!(alert.attack_type.as_deref(), Some("SYN FLOOD"));
        assert_eq!(alert.confidence, Some(RawConfidence::Text("97%".to_string())));
        assert_eq!(alert.timestamp, FeedTimestamp::Number(1718000000.25));
    }

    #[test]
    fn test_decode_safe_record_without_optionals() {
        let json = r#"{"status": "SAFE", "timestamp": "2024-06-10T06:13:20Z"}"#;

        let alert: RawAlert = serde_json::from_str(json).unwrap();
        assert!(!alert.is_attack());
        assert!(alert.source.is_none());
        assert!(alert.confidence.is_none());
        assert_eq!(alert.timestamp, FeedTimestamp::from("2024-06-10T06:13:20Z"));
    }

    #[test]
    fn test_wrong_typed_fields_decode_to_none() {
        let json = r#"{
            "status": "ATTACK",
            "type": 7,
            "confidence": true,
            "source": 42,
            "target": ["10.0.0.5", 80],
            "timestamp": 1718000000.5
        }"#;

        let alert: RawAlert = serde_json::from_str(json).unwrap();
        assert!(alert.is_attack());
        assert!(alert.attack_type.is_none());
        assert!(alert.confidence.is_none());
        assert!(alert.source.is_none());
        assert!(alert.target.is_none());
        assert_eq!(alert.timestamp, FeedTimestamp::Number(1718000000.5));
    }

    #[test]
    fn test_missing_or_garbled_timestamp_is_missing() {
        let missing: RawAlert = serde_json::from_str(r#"{"status": "ATTACK"}"#).unwrap();
        let garbled: RawAlert =
            serde_json::from_str(r#"{"status": "ATTACK", "timestamp": {"at": 1}}"#).unwrap();
        let null: RawAlert =
            serde_json::from_str(r#"{"status": "ATTACK", "timestamp": null}"#).unwrap();

        assert_eq!(missing.timestamp, FeedTimestamp::Missing);
        assert_eq!(garbled.timestamp, FeedTimestamp::Missing);
        assert_eq!(null.timestamp, FeedTimestamp::Missing);
        assert_eq!(missing.timestamp, garbled.timestamp);
        assert_eq!(missing.timestamp.to_string(), "missing");
    }

    #[test]
    fn test_garbled_status_is_not_an_attack() {
        let alert: RawAlert = serde_json::from_str(r#"{"status": 1, "timestamp": 3}"#).unwrap();
        assert!(!alert.is_attack());
        assert_eq!(alert.status, "");
    }

    #[test]
    fn test_builder_helpers() {
        let alert = RawAlert::attack("PORT SCAN", 42.0)
            .with_source("1.2.3.4")
            .with_confidence(88.0);

        assert!(alert.is_attack());
        assert_eq!(alert.source.as_deref(), Some("1.2.3.4"));
        assert_eq!(alert.confidence, Some(RawConfidence::Number(88.0)));
        assert_eq!(alert.timestamp.to_string(), "42");
    }
}
