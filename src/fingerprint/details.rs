//! Attribute sink filled in by fingerprint payloads.
//!
//! Values produced while matching are often never looked at, so they can be stored raw together
//! with a decoder and turned into text the first time somebody reads them.
use dashmap::DashMap;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Turns raw captured bytes into the text stored for a key.
pub type Decoder = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Highest confidence a fingerprint can assign.
pub const MAX_CONFIDENCE: u8 = 5;

#[derive(Clone)]
struct RawValue {
    bytes: Vec<u8>,
    decoder: Decoder,
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawValue").field("bytes", &hex::encode(&self.bytes)).finish()
    }
}

/// One key: a resolved value, a pending raw value, or both until the raw one is bound.
#[derive(Clone, Debug, Default)]
struct Slot {
    value: Option<String>,
    raw: Option<RawValue>,
}

impl Slot {
    fn resolve(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.value = Some((raw.decoder)(&raw.bytes));
        }
    }
}

/// String map whose values may be registered undecoded and resolved on first read.
///
/// Backed by a [DashMap] so records of one session can be read from several workers. A single
/// key's bind step is not meant to race with writers of the same key.
#[derive(Clone, Debug, Default)]
pub struct LateBindingMap {
    slots: DashMap<String, Slot>,
}

impl LateBindingMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resolved value, dropping any pending raw value for the key.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.slots.insert(
            key.into(),
            Slot {
                value: Some(value.into()),
                raw: None,
            },
        );
    }

    /// Stores raw bytes to be decoded later. A resolved value already held for the key stays
    /// visible until the key is bound.
    pub fn put_raw<F>(&self, key: impl Into<String>, bytes: Vec<u8>, decoder: F)
    where
        F: Fn(&[u8]) -> String + Send + Sync + 'static,
    {
        self.put_raw_with(key, bytes, Arc::new(decoder));
    }

    pub fn put_raw_with(&self, key: impl Into<String>, bytes: Vec<u8>, decoder: Decoder) {
        self.slots.entry(key.into()).or_default().raw = Some(RawValue { bytes, decoder });
    }

    /// Reads one key, resolving only that key if it is still raw.
    pub fn get(&self, key: &str) -> Option<String> {
        self.slots.get_mut(key).and_then(|mut slot| {
            slot.resolve();
            slot.value.clone()
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Resolves every pending raw value. Calling it again is a no-op.
    pub fn bind_all(&self) {
        for mut slot in self.slots.iter_mut() {
            slot.resolve();
        }
    }

    pub fn is_bound(&self) -> bool {
        !self.slots.iter().any(|slot| slot.raw.is_some())
    }

    pub fn is_unbound(&self) -> bool {
        !self.is_bound()
    }

    /// Every entry, sorted by key. Binds first.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.bind_all();
        let mut entries: Vec<(String, String)> = self
            .slots
            .iter()
            .filter_map(|slot| slot.value.clone().map(|value| (slot.key().clone(), value)))
            .collect();
        entries.sort();
        entries
    }

    /// Visits every entry in key order. Binds first.
    pub fn for_each(&self, mut visit: impl FnMut(&str, &str)) {
        for (key, value) in self.entries() {
            visit(&key, &value);
        }
    }

    /// Copies every entry of `other` into this map, keeping pending values pending.
    pub fn put_all(&self, other: &LateBindingMap) {
        // `other` may be `self`, copy out before inserting
        let copied: Vec<(String, Slot)> = other
            .slots
            .iter()
            .map(|slot| (slot.key().clone(), slot.value().clone()))
            .collect();
        for (key, slot) in copied {
            self.slots.insert(key, slot);
        }
    }

    /// Removes resolved and pending values together.
    pub fn clear(&self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Serialize for LateBindingMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in &entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Generic kind of device a host appears to be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    #[default]
    Unknown,
    Plc,
    Rtu,
    Mtu,
    Ied,
    Hmi,
    Workstation,
    NetworkDevice,
    Firewall,
    ProtocolConverter,
    FlowComputer,
    Other,
}

impl Category {
    pub fn pretty_print(self) -> &'static str {
        match self {
            Category::Unknown => "Unknown",
            Category::Plc => "PLC",
            Category::Rtu => "RTU",
            Category::Mtu => "MTU",
            Category::Ied => "IED",
            Category::Hmi => "HMI",
            Category::Workstation => "Workstation",
            Category::NetworkDevice => "Network Device",
            Category::Firewall => "Firewall",
            Category::ProtocolConverter => "Protocol Converter",
            Category::FlowComputer => "Flow Computer",
            Category::Other => "Other",
        }
    }
}

/// What a host does in the conversation, finer grained than [Category].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Unknown,
    Client,
    Server,
    Master,
    Slave,
    Operator,
    Engineer,
    Other,
}

impl Role {
    pub fn pretty_print(self) -> &'static str {
        match self {
            Role::Unknown => "Unknown",
            Role::Client => "Client",
            Role::Server => "Server",
            Role::Master => "Master",
            Role::Slave => "Slave",
            Role::Operator => "Operator",
            Role::Engineer => "Engineer",
            Role::Other => "Other",
        }
    }
}

/// Whether the details describe the sender or the receiver of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    Source,
    Destination,
}

impl Direction {
    pub fn name(self) -> &'static str {
        match self {
            Direction::Source => "SOURCE",
            Direction::Destination => "DESTINATION",
        }
    }
}

/// Classification of one host: free-form details plus the fields every fingerprint may set.
#[derive(Clone, Debug, Default, Serialize)]
pub struct HostDetails {
    details: LateBindingMap,
    confidence: u8,
    category: Category,
    role: Role,
    direction: Direction,
    names: BTreeSet<String>,
}

impl HostDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn details(&self) -> &LateBindingMap {
        &self.details
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        self.details.put(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.details.get(key)
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// Raises the confidence, capped at [MAX_CONFIDENCE]. Lower values are ignored.
    pub fn set_confidence(&mut self, confidence: u8) {
        self.confidence = self.confidence.max(confidence.min(MAX_CONFIDENCE));
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    /// Sets the category unless the new one is [Category::Unknown].
    pub fn merge_category(&mut self, category: Category) {
        if category != Category::Unknown {
            self.category = category;
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Fingerprints that contributed to these details.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn add_name(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    /// Resolves pending values and records the classification fields as entries.
    pub fn bind_all(&self) {
        self.details.bind_all();
        self.details.put("Category", self.category.pretty_print());
        self.details.put("Role", self.role.pretty_print());
        self.details.put("Confidence", self.confidence.to_string());
        self.details.put("Direction", self.direction.name());
    }

    /// Bound entries including the classification fields, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.bind_all();
        self.details.entries()
    }

    /// Folds another host's details into this one.
    pub fn merge(&mut self, other: &HostDetails) {
        self.details.put_all(&other.details);
        self.names.extend(other.names.iter().cloned());
        self.merge_category(other.category);
        self.set_confidence(other.confidence);
        self.direction = other.direction;
        self.role = other.role;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
