//! In-memory infrastructure state snapshot.
//!
//! A snapshot is the complete state document at a point in time. Storage
//! handles own how it is encoded; this module only defines the shape and the
//! serial-number rules every handle applies on write.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest snapshot format version this crate can read.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 3;

/// Complete infrastructure state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Snapshot {
    /// Format version of the serialized document.
    pub version: u32,
    /// Monotonic counter bumped whenever content changes.
    pub serial: u64,
    /// Stable identifier shared by every snapshot derived from the same origin.
    pub lineage: String,
    /// Root module outputs.
    pub outputs: BTreeMap<String, Value>,
    /// Managed resources keyed by address.
    pub resources: BTreeMap<String, Value>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            serial: 0,
            lineage: String::new(),
            outputs: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    /// Compare everything except the serial.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.version == other.version
            && self.lineage == other.lineage
            && self.outputs == other.outputs
            && self.resources == other.resources
    }

    /// Bump the serial past `prior` when content changed.
    ///
    /// Snapshots with unchanged content keep whatever serial they carry, and a
    /// serial already ahead of `prior` is left alone. Fails when `prior`
    /// already sits at the largest representable serial.
    pub fn increment_serial_maybe(&mut self, prior: Option<&Snapshot>) -> Result<()> {
        let Some(prior) = prior else {
            return Ok(());
        };
        if self.same_content(prior) || self.serial > prior.serial {
            return Ok(());
        }
        self.serial = prior
            .serial
            .checked_add(1)
            .ok_or_else(|| anyhow!("state serial overflow at {}", prior.serial))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(serial: u64, resources: &[(&str, Value)]) -> Snapshot {
        Snapshot {
            serial,
            lineage: "lineage-1".to_string(),
            resources: resources
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            ..Snapshot::default()
        }
    }

    #[test]
    fn serial_bumps_when_content_changes() {
        let prior = snapshot(4, &[("aws_instance.web", json!({"id": "i-1"}))]);
        let mut next = snapshot(4, &[("aws_instance.web", json!({"id": "i-2"}))]);

        next.increment_serial_maybe(Some(&prior)).expect("increment");
        assert_eq!(next.serial, 5);
    }

    #[test]
    fn serial_unchanged_for_identical_content() {
        let prior = snapshot(4, &[("aws_instance.web", json!({"id": "i-1"}))]);
        let mut next = prior.clone();

        next.increment_serial_maybe(Some(&prior)).expect("increment");
        assert_eq!(next.serial, 4);
    }

    #[test]
    fn serial_ahead_of_prior_is_kept() {
        let prior = snapshot(2, &[]);
        let mut next = snapshot(9, &[("null_resource.a", json!({}))]);

        next.increment_serial_maybe(Some(&prior)).expect("increment");
        assert_eq!(next.serial, 9);
    }

    #[test]
    fn serial_at_max_fails_instead_of_wrapping() {
        let prior = snapshot(u64::MAX, &[("null_resource.a", json!({"id": "0"}))]);
        let mut next = snapshot(0, &[("null_resource.a", json!({"id": "1"}))]);

        let err = next.increment_serial_maybe(Some(&prior)).unwrap_err();
        assert!(err.to_string().contains("state serial overflow"));
        assert_eq!(next.serial, 0);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let parsed: Snapshot = serde_json::from_str(r#"{"serial": 7}"#).expect("parse");
        assert_eq!(parsed.serial, 7);
        assert_eq!(parsed.version, SNAPSHOT_FORMAT_VERSION);
        assert!(parsed.resources.is_empty());
    }
}
