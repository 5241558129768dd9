//! Fingerprint rule documents.
//!
//! A document is a JSON object (or an array of them):
//!
//! ```json
//! {
//!   "name": "Modbus",
//!   "filters": [ { "for": "request", "conditions": [ { "DstPort": 502 }, { "TransportProtocol": 6 } ] } ],
//!   "payloads": [ { "name": "request", "operations": [], "return": { "confidence": 3 } } ]
//! }
//! ```
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use super::filter::Condition;
use super::payload::{Operation, Payload};
use crate::error::RuleError;

/// One group of conditions feeding a named payload. Groups of a fingerprint are alternatives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(rename = "for")]
    pub target: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub filters: Vec<FilterGroup>,
    #[serde(default)]
    pub payloads: Vec<Payload>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Many(Vec<Fingerprint>),
    One(Box<Fingerprint>),
}

impl Fingerprint {
    /// Parses one fingerprint or an array of them, checking each one.
    pub fn from_json(text: &str) -> Result<Vec<Fingerprint>, RuleError> {
        let fingerprints = match serde_json::from_str::<Document>(text) {
            Ok(Document::Many(many)) => many,
            Ok(Document::One(one)) => vec![*one],
            // untagged errors say nothing useful, retry as a single document for the message
            Err(_) => vec![serde_json::from_str::<Fingerprint>(text)?],
        };
        for fingerprint in &fingerprints {
            fingerprint.validate()?;
        }
        Ok(fingerprints)
    }

    /// Every filter group must name a payload of the same fingerprint, and every match must
    /// search for something.
    pub fn validate(&self) -> Result<(), RuleError> {
        for payload in &self.payloads {
            let empty_match = payload
                .operations
                .iter()
                .any(|operation| matches!(operation, Operation::Match(op) if op.is_empty()));
            if empty_match {
                return Err(RuleError::EmptyMatch {
                    fingerprint: self.name.clone(),
                    payload: payload.name.clone(),
                });
            }
        }
        for group in &self.filters {
            if self.payload_index(&group.target).is_none() {
                return Err(RuleError::UnknownPayload {
                    fingerprint: self.name.clone(),
                    payload: group.target.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn payload_index(&self, name: &str) -> Option<usize> {
        self.payloads.iter().position(|payload| payload.name == name)
    }

    pub fn payload(&self, name: &str) -> Option<&Payload> {
        self.payload_index(name).map(|index| &self.payloads[index])
    }
}

/// Reads a rule file.
pub fn load_fingerprints(path: impl AsRef<Path>) -> Result<Vec<Fingerprint>, RuleError> {
    let path = path.as_ref();
    log::info!("Loading fingerprints from {}", path.display());
    let fingerprints = Fingerprint::from_json(&fs::read_to_string(path)?)?;
    log::info!("Loaded {} fingerprint(s)", fingerprints.len());
    Ok(fingerprints)
}
