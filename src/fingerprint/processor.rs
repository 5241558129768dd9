//! Runs compiled fingerprints against packet records.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::buffer::PayloadView;
use super::cursor::Cursor;
use super::details::HostDetails;
use super::filter::{FilterEngine, FunctionalOperation};
use super::packet::FilterData;
use super::payload::PayloadProgram;
use super::rules::Fingerprint;
use crate::error::RuleError;

/// One captured packet as read from a records file.
///
/// With `fields` present, `payload` holds only the transport payload. Without them it holds the
/// whole Ethernet frame and the fields are decoded from it.
#[derive(Clone, Debug, Deserialize)]
pub struct PacketRecord {
    #[serde(default)]
    pub frame: u64,
    /// Hex, whitespace allowed.
    pub payload: String,
    #[serde(default)]
    pub fields: Option<FilterData>,
}

/// Outcome of classifying one [PacketRecord].
#[derive(Clone, Debug, Serialize)]
pub struct PacketReport {
    pub frame: u64,
    pub src: u16,
    pub dst: u16,
    pub proto: u8,
    pub fingerprints: Vec<String>,
    pub details: HostDetails,
}

/// Reads a JSON array of packet records.
pub fn load_packet_records(path: impl AsRef<Path>) -> Result<Vec<PacketRecord>, RuleError> {
    let path = path.as_ref();
    log::info!("Loading packet records from {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Payload a filter group feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target {
    pub fingerprint: usize,
    pub payload: usize,
}

/// Every loaded fingerprint, one filter rule per filter group.
#[derive(Debug)]
pub struct FingerprintProcessor {
    programs: Vec<Vec<PayloadProgram>>,
    engine: FilterEngine<Target>,
}

impl FingerprintProcessor {
    pub fn new(fingerprints: &[Fingerprint]) -> Result<Self, RuleError> {
        let mut programs = Vec::with_capacity(fingerprints.len());
        let mut engine = FilterEngine::new();

        for (fingerprint_index, fingerprint) in fingerprints.iter().enumerate() {
            fingerprint.validate()?;
            programs.push(
                fingerprint
                    .payloads
                    .iter()
                    .map(|payload| PayloadProgram::compile(&fingerprint.name, payload))
                    .collect::<Result<Vec<_>, _>>()?,
            );

            for group in &fingerprint.filters {
                let Some(payload) = fingerprint.payload_index(&group.target) else {
                    continue;
                };
                engine.add_rule(
                    format!("{}/{}", fingerprint.name, group.target),
                    group.conditions.clone(),
                    Target {
                        fingerprint: fingerprint_index,
                        payload,
                    },
                )?;
            }
        }

        log::info!(
            "Compiled {} filter group(s) from {} fingerprint(s)",
            engine.len(),
            fingerprints.len()
        );
        Ok(Self { programs, engine })
    }

    pub fn engine(&self) -> &FilterEngine<Target> {
        &self.engine
    }

    /// Runs each payload whose filters accept `data` once, even when several of its groups
    /// match. Returns the fingerprints that produced a result.
    pub fn process(&self, data: &FilterData, payload: &PayloadView<'_>, details: &mut HostDetails) -> Vec<String> {
        let targets: BTreeSet<Target> = self
            .engine
            .matching(data)
            .into_iter()
            .filter_map(|index| self.engine.rule(index).map(|rule| rule.action))
            .collect();

        let mut cursor = Cursor::new();
        let mut matched: Vec<String> = Vec::new();
        for target in targets {
            let Some(program) = self
                .programs
                .get(target.fingerprint)
                .and_then(|payloads| payloads.get(target.payload))
            else {
                continue;
            };
            cursor.reset();
            if program.apply(data, payload, &mut cursor, details) {
                log::debug!("Frame {}: matched {}/{}", data.frame, program.fingerprint(), program.name());
                if !matched.iter().any(|name| name == program.fingerprint()) {
                    matched.push(program.fingerprint().to_string());
                }
            }
        }
        matched
    }

    /// Decodes a raw Ethernet frame and processes its transport payload.
    pub fn process_frame(&self, frame: u64, bytes: &[u8], details: &mut HostDetails) -> (FilterData, Vec<String>) {
        let (data, offset) = FilterData::from_ethernet(frame, &PayloadView::new(bytes));
        let end = (offset + data.dsize as usize).min(bytes.len());
        let payload = PayloadView::new(bytes.get(offset..end).unwrap_or_default());
        let matched = self.process(&data, &payload, details);
        (data, matched)
    }

    /// Classifies one record into fresh, fully bound host details.
    pub fn process_record(&self, record: &PacketRecord) -> Result<PacketReport, RuleError> {
        let hex: String = record.payload.split_whitespace().collect();
        let bytes = hex::decode(hex)?;
        let mut details = HostDetails::new();

        let (data, fingerprints) = match &record.fields {
            Some(fields) => {
                let mut data = fields.clone();
                data.frame = record.frame;
                if data.dsize == 0 {
                    data.dsize = bytes.len() as u32;
                }
                let matched = self.process(&data, &PayloadView::new(&bytes), &mut details);
                (data, matched)
            }
            None => self.process_frame(record.frame, &bytes, &mut details),
        };
        details.bind_all();

        Ok(PacketReport {
            frame: data.frame,
            src: data.src,
            dst: data.dst,
            proto: data.proto,
            fingerprints,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::details::Category;
    use crate::fingerprint::packet::tests::modbus_syn_ack_frame;

    const MODBUS: &str = r#"{
        "name": "Modbus Client",
        "filters": [
            { "for": "client", "conditions": [ { "DstPort": 502 }, { "TransportProtocol": 6 } ] },
            { "for": "client", "conditions": [ { "DstPortRange": { "min": 500, "max": 510 } } ] }
        ],
        "payloads": [ {
            "name": "client",
            "operations": [ { "IsDataAt": { "offset": 3 } } ],
            "return": { "confidence": 2, "category": "HMI", "role": "MASTER" }
        } ]
    }"#;

    fn processor() -> FingerprintProcessor {
        FingerprintProcessor::new(&Fingerprint::from_json(MODBUS).unwrap()).unwrap()
    }

    #[test]
    fn payload_runs_once_when_groups_overlap() {
        let processor = processor();
        assert_eq!(processor.engine().len(), 2);

        let frame = modbus_syn_ack_frame();
        let mut details = HostDetails::new();
        let (data, matched) = processor.process_frame(9, &frame, &mut details);
        assert_eq!(data.dst, 502);
        assert_eq!(processor.engine().matching(&data), vec![0, 1]);
        assert_eq!(matched, vec!["Modbus Client".to_string()]);
        assert_eq!(details.category(), Category::Hmi);
        assert_eq!(details.confidence(), 2);
    }

    #[test]
    fn records_with_and_without_fields() {
        let processor = processor();
        let records: Vec<PacketRecord> = serde_json::from_str(&format!(
            r#"[
                {{ "frame": 1, "payload": "{}" }},
                {{ "frame": 2, "payload": "00 01 00 00", "fields": {{ "dst": 502, "proto": 6 }} }},
                {{ "frame": 3, "payload": "00 01", "fields": {{ "dst": 502, "proto": 6 }} }}
            ]"#,
            hex::encode(modbus_syn_ack_frame())
        ))
        .unwrap();

        let reports: Vec<PacketReport> = records
            .iter()
            .map(|record| processor.process_record(record).unwrap())
            .collect();
        assert_eq!(reports[0].fingerprints, vec!["Modbus Client".to_string()]);
        assert_eq!(reports[0].src, 49152);
        assert_eq!(reports[1].frame, 2);
        assert_eq!(reports[1].fingerprints, vec!["Modbus Client".to_string()]);
        assert_eq!(reports[1].details.get("Category").as_deref(), Some("HMI"));
        assert!(reports[2].fingerprints.is_empty());

        let bad = PacketRecord {
            frame: 4,
            payload: "zz".into(),
            fields: None,
        };
        assert!(matches!(processor.process_record(&bad), Err(RuleError::Hex(_))));
    }

    #[test]
    fn short_payload_fails_operations() {
        let processor = processor();
        let data = FilterData {
            dst: 502,
            proto: 6,
            ..Default::default()
        };
        let mut details = HostDetails::new();
        assert!(processor.process(&data, &PayloadView::new(&[0, 1]), &mut details).is_empty());
        assert!(details.names().is_empty());
    }
}
