//! Typed nested container keyed by [Trait].
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

use super::traits::{Trait, TraitValue, ValueKind};
use crate::error::TraitError;

/// A node of an imported tree. Its identity says what the node describes; its entries are
/// checked against each key's declared kind on insert.
#[derive(Clone, Debug, PartialEq)]
pub struct TraitMap {
    identity: Trait,
    entries: BTreeMap<Trait, TraitValue>,
}

impl TraitMap {
    pub fn new(identity: Trait) -> Self {
        Self {
            identity,
            entries: BTreeMap::new(),
        }
    }

    pub fn root() -> Self {
        Self::new(Trait::Root)
    }

    pub fn identity(&self) -> Trait {
        self.identity
    }

    pub fn is(&self, identity: Trait) -> bool {
        self.identity == identity
    }

    /// Re-tags this node in place, keeping its entries.
    pub fn convert_to(&mut self, identity: Trait) {
        self.identity = identity;
    }

    pub fn get(&self, key: Trait) -> Option<&TraitValue> {
        self.entries.get(&key)
    }

    pub fn contains_key(&self, key: Trait) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Trait, &TraitValue)> {
        self.entries.iter()
    }

    /// Stores `value` under `key`, returning what was there.
    pub fn put(&mut self, key: Trait, value: impl Into<TraitValue>) -> Result<Option<TraitValue>, TraitError> {
        let value = value.into();
        ValueKind::check(key, &value)?;
        Ok(self.entries.insert(key, value))
    }

    /// Stores trimmed text.
    pub fn put_string(&mut self, key: Trait, value: &str) -> Result<Option<TraitValue>, TraitError> {
        self.put(key, value.trim())
    }

    /// Runs the key's parse method on `raw` and stores the result.
    pub fn parse_then_put(&mut self, key: Trait, raw: &str) -> Result<Option<TraitValue>, TraitError> {
        if !key.has_parse_method() {
            return Err(TraitError::NoParseMethod(key));
        }
        let value = key.parse(raw)?;
        self.put(key, value)
    }

    /// Adds a nested map under `key`. Fails if the key is already present.
    pub fn new_branch(&mut self, key: Trait) -> Result<&mut TraitMap, TraitError> {
        if self.entries.contains_key(&key) {
            return Err(TraitError::BranchExists(key));
        }
        self.get_or_create_branch(key)
    }

    pub fn get_branch(&self, key: Trait) -> Option<&TraitMap> {
        match self.entries.get(&key) {
            Some(TraitValue::Branch(map)) => Some(map),
            _ => None,
        }
    }

    pub fn get_or_create_branch(&mut self, key: Trait) -> Result<&mut TraitMap, TraitError> {
        let empty = TraitValue::Branch(TraitMap::new(key));
        ValueKind::check(key, &empty)?;
        match self.entries.entry(key).or_insert(empty) {
            TraitValue::Branch(map) => Ok(map),
            other => Err(TraitError::TypeMismatch {
                key,
                expected: ValueKind::Branch.name(),
                found: other.type_name(),
            }),
        }
    }

    /// Starts an empty list under `key`, replacing any previous one.
    pub fn new_list(&mut self, key: Trait) -> Result<&mut Vec<TraitMap>, TraitError> {
        self.put(key, Vec::<TraitMap>::new())?;
        self.get_or_create_list(key)
    }

    pub fn get_list(&self, key: Trait) -> Option<&Vec<TraitMap>> {
        match self.entries.get(&key) {
            Some(TraitValue::List(list)) => Some(list),
            _ => None,
        }
    }

    pub fn get_or_create_list(&mut self, key: Trait) -> Result<&mut Vec<TraitMap>, TraitError> {
        let empty = TraitValue::List(Vec::new());
        ValueKind::check(key, &empty)?;
        match self.entries.entry(key).or_insert(empty) {
            TraitValue::List(list) => Ok(list),
            other => Err(TraitError::TypeMismatch {
                key,
                expected: "List<TraitMap>",
                found: other.type_name(),
            }),
        }
    }

    pub fn get_string(&self, key: Trait) -> Option<&str> {
        match self.entries.get(&key) {
            Some(TraitValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer under `key`, or `default` when absent or not an integer.
    pub fn get_integer(&self, key: Trait, default: i32) -> i32 {
        match self.entries.get(&key) {
            Some(TraitValue::Int(value)) => *value,
            _ => default,
        }
    }

    pub fn get_long(&self, key: Trait) -> Option<i64> {
        match self.entries.get(&key) {
            Some(TraitValue::Long(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_strings(&self, key: Trait) -> Option<&[String]> {
        match self.entries.get(&key) {
            Some(TraitValue::Strings(values)) => Some(values),
            _ => None,
        }
    }

    /// Walks the tree and reports empty maps, empty lists and missing required traits.
    ///
    /// Problems are logged and returned; the tree is left as it is.
    pub fn check(&self) -> Vec<String> {
        let mut problems = Vec::new();
        self.check_into(&mut problems);
        for problem in &problems {
            log::warn!("{problem}");
        }
        problems
    }

    fn check_into(&self, problems: &mut Vec<String>) {
        if self.entries.is_empty() {
            problems.push(format!("Encountered empty map \"{}\"", self.identity));
            return;
        }
        for required in self.identity.required() {
            if !self.entries.contains_key(required) {
                problems.push(format!("\"{}\" missing \"{}\"", self.identity, required));
            }
        }
        for (key, value) in &self.entries {
            match value {
                TraitValue::Branch(map) => map.check_into(problems),
                TraitValue::List(list) if list.is_empty() => {
                    problems.push(format!("Encountered empty list \"{key}\""))
                }
                TraitValue::List(list) => list.iter().for_each(|map| map.check_into(problems)),
                TraitValue::Strings(values) if values.is_empty() => {
                    problems.push(format!("Encountered empty list \"{key}\""))
                }
                _ => {}
            }
        }
    }

    /// Indented rendering, one key per line with its value below it.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        self.pretty_print_into(&mut out, 0);
        out
    }

    fn pretty_print_into(&self, out: &mut String, depth: usize) {
        let indent = " ".repeat(depth + 1);
        let inner = " ".repeat(depth + 2);
        for (key, value) in &self.entries {
            out.push_str(&format!("{indent}{key}\n"));
            match value {
                TraitValue::Branch(map) => map.pretty_print_into(out, depth + 1),
                TraitValue::List(list) => {
                    for map in list {
                        out.push_str(&format!("{inner}{}\n", map.identity));
                        map.pretty_print_into(out, depth + 2);
                    }
                }
                TraitValue::Strings(values) => {
                    for value in values {
                        out.push_str(&format!("{inner}{value}\n"));
                    }
                }
                other => out.push_str(&format!("{inner}{other}\n")),
            }
        }
    }
}

impl Serialize for TraitMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key.name(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_enforces_declared_kind() {
        let mut map = TraitMap::new(Trait::InterfaceListEntry);
        assert!(map.put(Trait::MacAddr, "not-a-long").is_err());
        assert!(map.put(Trait::MacAddr, 123i64).is_ok());
        assert_eq!(map.get_long(Trait::MacAddr), Some(123));
        assert!(matches!(
            map.put(Trait::InterfaceName, 7i32),
            Err(TraitError::TypeMismatch { key: Trait::InterfaceName, .. })
        ));
        map.put_string(Trait::Description, "  uplink to core ").unwrap();
        assert_eq!(map.get_string(Trait::Description), Some("uplink to core"));
    }

    #[test]
    fn parse_then_put_needs_a_parse_method() {
        let mut map = TraitMap::new(Trait::Vlan);
        map.parse_then_put(Trait::VlanId, "30").unwrap();
        assert_eq!(map.get_integer(Trait::VlanId, -1), 30);
        assert_eq!(map.get_integer(Trait::Cidr, -1), -1);
        assert!(matches!(
            map.parse_then_put(Trait::Description, "x"),
            Err(TraitError::NoParseMethod(Trait::Description))
        ));
    }

    #[test]
    fn branches_and_lists() {
        let mut root = TraitMap::root();
        root.new_branch(Trait::VersionConfig)
            .unwrap()
            .put_string(Trait::VersionNo, "15.0(2)SE")
            .unwrap();
        assert!(matches!(root.new_branch(Trait::VersionConfig), Err(TraitError::BranchExists(_))));
        assert_eq!(
            root.get_or_create_branch(Trait::VersionConfig)
                .unwrap()
                .get_string(Trait::VersionNo),
            Some("15.0(2)SE")
        );
        assert!(root.new_branch(Trait::DeviceName).is_err());

        root.get_or_create_list(Trait::VlanList).unwrap().push(TraitMap::new(Trait::Vlan));
        root.get_or_create_list(Trait::VlanList).unwrap().push(TraitMap::new(Trait::Vlan));
        assert_eq!(root.get_list(Trait::VlanList).map(Vec::len), Some(2));
        root.new_list(Trait::VlanList).unwrap();
        assert_eq!(root.get_list(Trait::VlanList).map(Vec::len), Some(0));
        assert!(root.get_or_create_list(Trait::Description).is_err());
    }

    #[test]
    fn convert_to_keeps_entries() {
        let mut port = TraitMap::new(Trait::InterfaceListEntry);
        port.put_string(Trait::InterfaceName, "Vlan1").unwrap();
        port.convert_to(Trait::ManagementInterfaceEntry);
        assert!(port.is(Trait::ManagementInterfaceEntry));
        assert_eq!(port.get_string(Trait::InterfaceName), Some("Vlan1"));
    }

    #[test]
    fn check_reports_without_failing() {
        let mut root = TraitMap::root();
        let ports = root.get_or_create_list(Trait::InterfaceList).unwrap();
        let mut port = TraitMap::new(Trait::InterfaceListEntry);
        port.put_string(Trait::InterfaceName, "FastEthernet").unwrap();
        ports.push(port);
        root.new_list(Trait::ArpTable).unwrap();

        let problems = root.check();
        assert!(problems.iter().any(|p| p.contains("missing \"INTERFACE_ID\"")));
        assert!(problems.iter().any(|p| p.contains("missing \"MAC_ADDR\"")));
        assert!(problems.iter().any(|p| p.contains("empty list \"ARP_TABLE\"")));
        assert!(TraitMap::new(Trait::Vlan).check()[0].contains("empty map"));
    }

    #[test]
    fn pretty_print_nests() {
        let mut root = TraitMap::root();
        root.put_string(Trait::DeviceName, "sw1").unwrap();
        root.put(Trait::ProcessedCommands, vec!["arp".to_string()]).unwrap();
        let text = root.pretty_print();
        assert_eq!(text, " PROCESSED_COMMANDS\n  arp\n DEVICE_NAME\n  sw1\n");
    }
}
