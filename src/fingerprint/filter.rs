//! Rule matching over [FilterData] records.
//!
//! Each rule is a list of [Condition]s. Conditions on the same header field are alternatives
//! (any may hold); conditions on different fields must all hold. A field the rule never mentions
//! does not take part. Per-field indexes answer "which rules accept this value" so one record is
//! checked against every rule with ten lookups.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::buffer::PayloadView;
use super::cursor::Cursor;
use super::details::HostDetails;
use super::packet::{parse_flags, FilterData};
use crate::error::RuleError;

/// Indices of the rules accepting a value, in evaluation order.
pub type RuleSet = BTreeSet<usize>;

/// A single header constraint as written in rule documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Ack(String),
    Seq(String),
    Flags(String),
    Dsize(u32),
    DsizeWithin { min: u32, max: u32 },
    DstPort(u16),
    DstPortRange { min: u16, max: u16 },
    SrcPort(u16),
    SrcPortRange { min: u16, max: u16 },
    Ethertype(u16),
    TransportProtocol(u8),
    Ttl(u8),
    TtlWithin { min: u8, max: u8 },
    Window(u16),
}

/// Header field a [Condition] constrains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Ack,
    Seq,
    Flags,
    Dsize,
    DstPort,
    SrcPort,
    Ethertype,
    TransportProtocol,
    Ttl,
    Window,
}

impl Field {
    /// Fields that only exist on TCP records.
    pub fn tcp_only(self) -> bool {
        matches!(self, Field::Ack | Field::Seq | Field::Flags | Field::Window)
    }
}

impl Condition {
    pub fn field(&self) -> Field {
        match self {
            Condition::Ack(_) => Field::Ack,
            Condition::Seq(_) => Field::Seq,
            Condition::Flags(_) => Field::Flags,
            Condition::Dsize(_) | Condition::DsizeWithin { .. } => Field::Dsize,
            Condition::DstPort(_) | Condition::DstPortRange { .. } => Field::DstPort,
            Condition::SrcPort(_) | Condition::SrcPortRange { .. } => Field::SrcPort,
            Condition::Ethertype(_) => Field::Ethertype,
            Condition::TransportProtocol(_) => Field::TransportProtocol,
            Condition::Ttl(_) | Condition::TtlWithin { .. } => Field::Ttl,
            Condition::Window(_) => Field::Window,
        }
    }

    fn validate(&self) -> Result<(), RuleError> {
        let (field, min, max) = match self {
            Condition::DsizeWithin { min, max } => ("DsizeWithin", u64::from(*min), u64::from(*max)),
            Condition::DstPortRange { min, max } => ("DstPortRange", u64::from(*min), u64::from(*max)),
            Condition::SrcPortRange { min, max } => ("SrcPortRange", u64::from(*min), u64::from(*max)),
            Condition::TtlWithin { min, max } => ("TTLWithin", u64::from(*min), u64::from(*max)),
            Condition::Flags(flags) => return parse_flags(flags).map(|_| ()),
            _ => return Ok(()),
        };
        if min > max {
            return Err(RuleError::InvalidRange { field, min, max });
        }
        Ok(())
    }

    /// Checks this one condition directly against a record.
    pub fn accepts(&self, data: &FilterData) -> bool {
        if self.field().tcp_only() && !data.is_tcp() {
            return false;
        }
        match self {
            Condition::Ack(ack) => ack.trim() == data.ack.trim(),
            Condition::Seq(seq) => seq.trim() == data.seq.trim(),
            Condition::Flags(flags) => match (parse_flags(flags), parse_flags(&data.flags)) {
                (Ok(wanted), Ok(seen)) => wanted == seen,
                _ => false,
            },
            Condition::Dsize(dsize) => data.dsize == *dsize,
            Condition::DsizeWithin { min, max } => (*min..=*max).contains(&data.dsize),
            Condition::DstPort(port) => data.dst == *port,
            Condition::DstPortRange { min, max } => (*min..=*max).contains(&data.dst),
            Condition::SrcPort(port) => data.src == *port,
            Condition::SrcPortRange { min, max } => (*min..=*max).contains(&data.src),
            Condition::Ethertype(eth) => data.eth == *eth,
            Condition::TransportProtocol(proto) => data.proto == *proto,
            Condition::Ttl(ttl) => data.ttl == *ttl,
            Condition::TtlWithin { min, max } => (*min..=*max).contains(&data.ttl),
            Condition::Window(window) => data.window == *window,
        }
    }
}

/// Work run for a rule that fires.
pub trait FunctionalOperation {
    /// Returns true when the operation produced a result for this record.
    fn apply(
        &self,
        data: &FilterData,
        payload: &PayloadView<'_>,
        cursor: &mut Cursor,
        details: &mut HostDetails,
    ) -> bool;
}

impl<F> FunctionalOperation for F
where
    F: Fn(&FilterData, &PayloadView<'_>, &mut Cursor, &mut HostDetails) -> bool,
{
    fn apply(
        &self,
        data: &FilterData,
        payload: &PayloadView<'_>,
        cursor: &mut Cursor,
        details: &mut HostDetails,
    ) -> bool {
        self(data, payload, cursor, details)
    }
}

/// Value to rule-index lookup for one header field.
#[derive(Debug)]
struct FieldIndex<K: Ord> {
    exact: BTreeMap<K, Vec<usize>>,
    ranges: Vec<(K, K, usize)>,
}

impl<K: Ord> Default for FieldIndex<K> {
    fn default() -> Self {
        Self {
            exact: BTreeMap::new(),
            ranges: Vec::new(),
        }
    }
}

impl<K: Ord> FieldIndex<K> {
    fn insert(&mut self, key: K, rule: usize) {
        self.exact.entry(key).or_default().push(rule);
    }

    fn insert_range(&mut self, min: K, max: K, rule: usize) {
        self.ranges.push((min, max, rule));
    }

    fn lookup(&self, key: &K) -> RuleSet {
        let mut rules: RuleSet = self.exact.get(key).into_iter().flatten().copied().collect();
        rules.extend(
            self.ranges
                .iter()
                .filter(|(min, max, _)| min <= key && key <= max)
                .map(|(_, _, rule)| *rule),
        );
        rules
    }
}

/// A rule together with the operation it fires.
#[derive(Debug)]
pub struct FilterRule<Op> {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub action: Op,
    fields: BTreeSet<Field>,
}

impl<Op> FilterRule<Op> {
    /// Fields this rule constrains.
    pub fn fields(&self) -> &BTreeSet<Field> {
        &self.fields
    }

    /// Linear evaluation: every constrained field has at least one accepting condition.
    pub fn accepts(&self, data: &FilterData) -> bool {
        !self.fields.is_empty()
            && self.fields.iter().all(|field| {
                self.conditions
                    .iter()
                    .filter(|condition| condition.field() == *field)
                    .any(|condition| condition.accepts(data))
            })
    }
}

/// Ordered rule set with per-field indexes. Rule order is firing order.
#[derive(Debug)]
pub struct FilterEngine<Op> {
    rules: Vec<FilterRule<Op>>,
    ack: FieldIndex<String>,
    seq: FieldIndex<String>,
    flags: FieldIndex<u16>,
    dsize: FieldIndex<u32>,
    dst: FieldIndex<u16>,
    src: FieldIndex<u16>,
    eth: FieldIndex<u16>,
    proto: FieldIndex<u8>,
    ttl: FieldIndex<u8>,
    window: FieldIndex<u16>,
    used: BTreeSet<Field>,
}

impl<Op> Default for FilterEngine<Op> {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            ack: FieldIndex::default(),
            seq: FieldIndex::default(),
            flags: FieldIndex::default(),
            dsize: FieldIndex::default(),
            dst: FieldIndex::default(),
            src: FieldIndex::default(),
            eth: FieldIndex::default(),
            proto: FieldIndex::default(),
            ttl: FieldIndex::default(),
            window: FieldIndex::default(),
            used: BTreeSet::new(),
        }
    }
}

impl<Op> FilterEngine<Op> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule and indexes its conditions. Returns the rule's index.
    pub fn add_rule(
        &mut self,
        name: impl Into<String>,
        conditions: Vec<Condition>,
        action: Op,
    ) -> Result<usize, RuleError> {
        for condition in &conditions {
            condition.validate()?;
        }

        let rule = self.rules.len();
        for condition in &conditions {
            match condition {
                Condition::Ack(ack) => self.ack.insert(ack.trim().to_string(), rule),
                Condition::Seq(seq) => self.seq.insert(seq.trim().to_string(), rule),
                Condition::Flags(flags) => self.flags.insert(parse_flags(flags)?, rule),
                Condition::Dsize(dsize) => self.dsize.insert(*dsize, rule),
                Condition::DsizeWithin { min, max } => self.dsize.insert_range(*min, *max, rule),
                Condition::DstPort(port) => self.dst.insert(*port, rule),
                Condition::DstPortRange { min, max } => self.dst.insert_range(*min, *max, rule),
                Condition::SrcPort(port) => self.src.insert(*port, rule),
                Condition::SrcPortRange { min, max } => self.src.insert_range(*min, *max, rule),
                Condition::Ethertype(eth) => self.eth.insert(*eth, rule),
                Condition::TransportProtocol(proto) => self.proto.insert(*proto, rule),
                Condition::Ttl(ttl) => self.ttl.insert(*ttl, rule),
                Condition::TtlWithin { min, max } => self.ttl.insert_range(*min, *max, rule),
                Condition::Window(window) => self.window.insert(*window, rule),
            }
        }

        let fields: BTreeSet<Field> = conditions.iter().map(Condition::field).collect();
        if fields.is_empty() {
            log::warn!("Rule #{rule} has no conditions and will never fire.");
        }
        self.used.extend(fields.iter().copied());
        self.rules.push(FilterRule {
            name: name.into(),
            conditions,
            action,
            fields,
        });
        Ok(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, index: usize) -> Option<&FilterRule<Op>> {
        self.rules.get(index)
    }

    pub fn rules(&self) -> &[FilterRule<Op>] {
        &self.rules
    }

    pub fn transport_protocol(&self, proto: u8) -> RuleSet {
        self.proto.lookup(&proto)
    }

    pub fn src_port(&self, port: u16) -> RuleSet {
        self.src.lookup(&port)
    }

    pub fn dst_port(&self, port: u16) -> RuleSet {
        self.dst.lookup(&port)
    }

    pub fn ethertype(&self, eth: u16) -> RuleSet {
        self.eth.lookup(&eth)
    }

    pub fn ack(&self, ack: &str) -> RuleSet {
        self.ack.lookup(&ack.trim().to_string())
    }

    /// Rules whose flag set equals the observed one. Unparsable flag text matches nothing.
    pub fn flags(&self, flags: &str) -> RuleSet {
        parse_flags(flags)
            .map(|bits| self.flags.lookup(&bits))
            .unwrap_or_default()
    }

    pub fn seq(&self, seq: &str) -> RuleSet {
        self.seq.lookup(&seq.trim().to_string())
    }

    pub fn window(&self, window: u16) -> RuleSet {
        self.window.lookup(&window)
    }

    pub fn ttl(&self, ttl: u8) -> RuleSet {
        self.ttl.lookup(&ttl)
    }

    pub fn dsize(&self, dsize: u32) -> RuleSet {
        self.dsize.lookup(&dsize)
    }

    /// Range check of one rule's TTL constraints, bypassing the index.
    #[deprecated(note = "use the indexed FilterEngine::ttl lookup")]
    pub fn ttl_in_range(&self, rule: usize, ttl: u8) -> bool {
        self.field_in_range(rule, Field::Ttl, |condition| match condition {
            Condition::Ttl(value) => *value == ttl,
            Condition::TtlWithin { min, max } => (*min..=*max).contains(&ttl),
            _ => false,
        })
    }

    /// Range check of one rule's Dsize constraints, bypassing the index.
    #[deprecated(note = "use the indexed FilterEngine::dsize lookup")]
    pub fn dsize_in_range(&self, rule: usize, dsize: u32) -> bool {
        self.field_in_range(rule, Field::Dsize, |condition| match condition {
            Condition::Dsize(value) => *value == dsize,
            Condition::DsizeWithin { min, max } => (*min..=*max).contains(&dsize),
            _ => false,
        })
    }

    fn field_in_range(&self, rule: usize, field: Field, test: impl Fn(&Condition) -> bool) -> bool {
        self.rules.get(rule).is_some_and(|rule| {
            !rule.fields.contains(&field)
                || rule.conditions.iter().filter(|c| c.field() == field).any(test)
        })
    }

    fn candidates(&self, field: Field, data: &FilterData) -> RuleSet {
        if field.tcp_only() && !data.is_tcp() {
            return RuleSet::new();
        }
        match field {
            Field::Ack => self.ack(&data.ack),
            Field::Seq => self.seq(&data.seq),
            Field::Flags => self.flags(&data.flags),
            Field::Dsize => self.dsize(data.dsize),
            Field::DstPort => self.dst_port(data.dst),
            Field::SrcPort => self.src_port(data.src),
            Field::Ethertype => self.ethertype(data.eth),
            Field::TransportProtocol => self.transport_protocol(data.proto),
            Field::Ttl => self.ttl(data.ttl),
            Field::Window => self.window(data.window),
        }
    }

    /// Indices of every rule that fires for `data`, in rule order.
    pub fn matching(&self, data: &FilterData) -> Vec<usize> {
        let candidates: BTreeMap<Field, RuleSet> = self
            .used
            .iter()
            .map(|field| (*field, self.candidates(*field, data)))
            .collect();

        self.rules
            .iter()
            .enumerate()
            .filter(|(index, rule)| {
                !rule.fields.is_empty()
                    && rule
                        .fields
                        .iter()
                        .all(|field| candidates.get(field).is_some_and(|set| set.contains(index)))
            })
            .map(|(index, _)| index)
            .collect()
    }
}

impl<Op: FunctionalOperation> FilterEngine<Op> {
    /// Runs the operation of every matching rule once, each with a fresh cursor.
    ///
    /// Returns the indices whose operation reported a result.
    pub fn fire(&self, data: &FilterData, payload: &PayloadView<'_>, details: &mut HostDetails) -> Vec<usize> {
        let mut cursor = Cursor::new();
        self.matching(data)
            .into_iter()
            .filter(|index| {
                cursor.reset();
                let rule = &self.rules[*index];
                log::debug!("Frame {}: rule #{index} '{}' fired", data.frame, rule.name);
                rule.action.apply(data, payload, &mut cursor, details)
            })
            .collect()
    }
}
