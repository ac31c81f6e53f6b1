//! Snapshot and subject records as returned by the DigitalOcean v2 API.
//!
//! Only the fields the tool needs are deserialized; unknown fields are ignored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SnapshotId = u64;
pub type SubjectId = u64;

/// Timestamp format used in synthesized snapshot names (e.g. 20240101T040000Z).
pub const NAME_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
/// ISO-8601 UTC, second precision.
pub const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A droplet (or any other snapshotted entity).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

impl Subject {
    pub fn new(id: SubjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Immutable once created; identity is the name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Snapshot {
    pub fn new(id: SnapshotId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at,
            regions: Vec::new(),
        }
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    /// Regions from `wanted` this snapshot is not present in, in `wanted` order.
    pub fn missing_regions<'a>(&self, wanted: &'a [String]) -> Vec<&'a str> {
        wanted
            .iter()
            .filter(|r| !self.regions.iter().any(|have| have == *r))
            .map(String::as_str)
            .collect()
    }

    pub fn created_at_iso(&self) -> String {
        self.created_at.format(ISO_TIME_FORMAT).to_string()
    }
}

/// `<prefix><YYYYMMDDTHHMMSSZ>`
pub fn snapshot_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}{}", prefix, at.format(NAME_TIME_FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_api_shape() {
        let raw = r#"{
            "id": 6372321,
            "name": "web-01-autosnapshot-20240105T120000Z",
            "regions": ["nyc3", "ams3"],
            "created_at": "2024-01-05T12:00:03Z",
            "min_disk_size": 20,
            "size_gigabytes": 2.36,
            "type": "snapshot"
        }"#;
        let s: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(s.id, 6372321);
        assert_eq!(s.regions, vec!["nyc3", "ams3"]);
        assert_eq!(
            s.created_at,
            Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 3).unwrap()
        );
        assert_eq!(s.created_at_iso(), "2024-01-05T12:00:03Z");
    }

    #[test]
    fn missing_regions_keeps_wanted_order() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let s = Snapshot::new(1, "a", t).with_regions(["nyc3"]);
        let wanted = vec!["sfo3".to_string(), "nyc3".to_string(), "ams3".to_string()];
        assert_eq!(s.missing_regions(&wanted), vec!["sfo3", "ams3"]);
    }

    #[test]
    fn name_encodes_timestamp() {
        let t = Utc.with_ymd_and_hms(2024, 3, 9, 4, 5, 6).unwrap();
        assert_eq!(
            snapshot_name("simulated-autosnapshot-", t),
            "simulated-autosnapshot-20240309T040506Z"
        );
    }
}
