use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fingerprint of an object's tessellated geometry.
///
/// Rendered as 16 lowercase hex digits on the wire and in ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub u64);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(ContentHash)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One registry mutation as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowEvent {
    /// Registry-wide monotonic counter.
    pub sequence: u64,
    /// Name of the affected object.
    pub name: String,
    /// Per-name revision at the time of the event.
    pub revision: u64,
    /// Hash of the geometry shown (or last shown, for removals).
    #[serde(rename = "hash")]
    pub content_hash: ContentHash,
    /// True when the object left the registry.
    pub removed: bool,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_fixed_width_hex() {
        assert_eq!(ContentHash(0xab).to_string(), "00000000000000ab");
        assert_eq!(
            "00000000000000ab".parse::<ContentHash>().unwrap(),
            ContentHash(0xab)
        );
    }

    #[test]
    fn show_event_uses_hash_field_name() {
        let event = ShowEvent {
            sequence: 3,
            name: "cadmodel".to_string(),
            revision: 2,
            content_hash: ContentHash(0x1234),
            removed: false,
            timestamp: 1.5,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"hash\":\"0000000000001234\""));
        let back: ShowEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
