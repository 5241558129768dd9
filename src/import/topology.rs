//! Devices, ports and VLANs built up by the vendor parsers.
//!
//! Lookups are get-or-create: asking a node for a port or VLAN it has not seen yet adds it, and
//! asking again returns the same one.
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use super::cisco::text::parse_module_config;
use super::trait_map::TraitMap;
use super::traits::Trait;
use crate::error::ImportError;

lazy_static! {
    static ref INTERFACE_NAME: Regex = Regex::new(r"^(\D+?)\s*(\d+(?:/\d+)*)$").unwrap();
}

/// 48 bit hardware address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mac(u64);

impl Mac {
    pub fn new(value: u64) -> Self {
        Mac(value & 0xffff_ffff_ffff)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl FromStr for Mac {
    type Err = ImportError;

    /// Accepts `1ce6.c783.e58a`, `1c:e6:c7:83:e5:8a` and `1c-e6-c7-83-e5-8a`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let digits: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, '.' | ':' | '-'))
            .collect();
        if digits.len() != 12 {
            return Err(ImportError::UnsupportedAddress(text.to_string()));
        }
        u64::from_str_radix(&digits, 16)
            .map(Mac::new)
            .map_err(|_| ImportError::UnsupportedAddress(text.to_string()))
    }
}

impl fmt::Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0.to_be_bytes();
        let octets: Vec<String> = bytes[2..].iter().map(|byte| format!("{byte:02x}")).collect();
        f.write_str(&octets.join(":"))
    }
}

impl Serialize for Mac {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Splits `GigabitEthernet0/2` into its type and numbering.
pub fn split_interface_name(name: &str) -> Option<(&str, &str)> {
    INTERFACE_NAME.captures(name.trim()).and_then(|caps| {
        let kind = caps.get(1)?.as_str();
        let numbers = caps.get(2)?.as_str();
        Some((kind, numbers))
    })
}

/// True if both names denote the same interface, e.g. `Gi0/1` and `GigabitEthernet0/1`.
pub fn same_interface(a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    match (split_interface_name(a), split_interface_name(b)) {
        (Some((kind_a, numbers_a)), Some((kind_b, numbers_b))) => {
            let (kind_a, kind_b) = (kind_a.to_ascii_lowercase(), kind_b.to_ascii_lowercase());
            numbers_a == numbers_b && (kind_a.starts_with(&kind_b) || kind_b.starts_with(&kind_a))
        }
        _ => false,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Port {
    pub name: String,
    pub description: Option<String>,
    pub hardware: Option<String>,
    pub mac: Option<Mac>,
    pub ip: Option<Ipv4Addr>,
    pub cidr: Option<u8>,
    pub status: Option<String>,
    pub line_status: Option<String>,
    /// Parenthesised note after the line protocol, e.g. `connected`.
    pub line_detail: Option<String>,
    pub trunk: bool,
    pub vlans: BTreeSet<u16>,
    pub sub_interfaces: BTreeSet<u32>,
    /// Hardware addresses learned behind this port.
    pub connections: BTreeSet<Mac>,
}

impl Port {
    pub fn new(name: &str) -> Self {
        Port {
            name: name.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn add_sub_interface(&mut self, id: u32) {
        self.sub_interfaces.insert(id);
    }

    pub fn add_connection(&mut self, mac: Mac) {
        self.connections.insert(mac);
    }

    /// Interface entry for this port. Ports without slot numbering come out as management
    /// interfaces.
    pub fn to_trait_map(&self) -> Result<TraitMap, ImportError> {
        let mut map = TraitMap::new(Trait::InterfaceListEntry);
        match split_interface_name(&self.name) {
            Some((kind, numbers)) => match parse_module_config(numbers, &mut map) {
                Ok(()) => {
                    map.put_string(Trait::InterfaceName, kind)?;
                }
                Err(ImportError::ModuleConfig(_)) => {
                    map = TraitMap::new(Trait::InterfaceListEntry);
                    map.put_string(Trait::InterfaceName, &self.name)?;
                    map.convert_to(Trait::ManagementInterfaceEntry);
                }
                Err(err) => return Err(err),
            },
            None => {
                map.put_string(Trait::InterfaceName, &self.name)?;
                map.convert_to(Trait::ManagementInterfaceEntry);
            }
        }

        if let Some(mac) = self.mac {
            map.put(Trait::MacAddr, mac.value() as i64)?;
        }
        if let Some(description) = &self.description {
            map.put_string(Trait::Description, description)?;
        }
        if let Some(hardware) = &self.hardware {
            map.put_string(Trait::Hardware, hardware)?;
        }
        if let Some(ip) = self.ip {
            map.put(Trait::Ipv4, u32::from(ip) as i32)?;
        }
        if let Some(cidr) = self.cidr {
            map.put(Trait::Cidr, i32::from(cidr))?;
        }
        if let Some(status) = &self.status {
            map.put_string(Trait::InterfaceStatus, status)?;
        }
        if let Some(line_status) = &self.line_status {
            map.put_string(Trait::LineStatus, line_status)?;
        }
        if self.trunk {
            map.put_string(Trait::SwitchportMode, "trunk")?;
        }
        if !self.vlans.is_empty() {
            map.put(Trait::IfSpVlanList, self.vlans.iter().map(|id| i32::from(*id)).collect::<Vec<i32>>())?;
        }
        if !self.sub_interfaces.is_empty() {
            let subs = map.get_or_create_list(Trait::SubInterfaceList)?;
            for id in &self.sub_interfaces {
                let mut sub = TraitMap::new(Trait::SubInterfaceEntry);
                sub.put(Trait::SubInterfaceId, *id as i32)?;
                subs.push(sub);
            }
        }
        Ok(map)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Vlan {
    pub id: u16,
    pub name: Option<String>,
    pub ip: Option<Ipv4Addr>,
    pub cidr: Option<u8>,
    /// Names of member ports.
    pub ports: BTreeSet<String>,
    pub macs: BTreeSet<Mac>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArpEntry {
    pub protocol: String,
    pub ip: Ipv4Addr,
    pub age: Option<u32>,
    pub mac: Mac,
    pub kind: String,
    pub interface: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MacTableEntry {
    pub vlan: Option<u16>,
    pub mac: Mac,
    pub port: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub version: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub image: Option<String>,
}

impl VersionInfo {
    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.model.is_none() && self.serial.is_none() && self.image.is_none()
    }
}

/// One imported device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PhysicalNode {
    pub name: String,
    pub host_name: Option<String>,
    pub source: Option<PathBuf>,
    pub version: VersionInfo,
    ports: BTreeMap<String, Port>,
    vlans: BTreeMap<u16, Vlan>,
    users: BTreeMap<String, Option<String>>,
    arp: Vec<ArpEntry>,
    mac_table: Vec<MacTableEntry>,
    commands: Vec<String>,
}

impl PhysicalNode {
    pub fn new(name: &str) -> Self {
        PhysicalNode {
            name: name.trim().to_string(),
            ..Default::default()
        }
    }

    fn port_key(&self, name: &str) -> Option<String> {
        if self.ports.contains_key(name) {
            return Some(name.to_string());
        }
        self.ports.keys().find(|existing| same_interface(existing, name)).cloned()
    }

    /// Port called `name`, or an abbreviation of it, created if missing. The longest spelling
    /// seen becomes the port's name.
    pub fn get_port(&mut self, name: &str) -> &mut Port {
        let name = name.trim();
        let key = match self.port_key(name) {
            Some(existing) if name.len() > existing.len() => {
                if let Some(mut port) = self.ports.remove(&existing) {
                    port.name = name.to_string();
                    self.ports.insert(name.to_string(), port);
                }
                for vlan in self.vlans.values_mut() {
                    if vlan.ports.remove(&existing) {
                        vlan.ports.insert(name.to_string());
                    }
                }
                for entry in self.mac_table.iter_mut().filter(|entry| entry.port == existing) {
                    entry.port = name.to_string();
                }
                name.to_string()
            }
            Some(existing) => existing,
            None => name.to_string(),
        };
        self.ports.entry(key).or_insert_with_key(|key| Port::new(key))
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.port_key(name).and_then(|key| self.ports.get(&key))
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn get_vlan(&mut self, id: u16) -> &mut Vlan {
        self.vlans.entry(id).or_insert_with(|| Vlan {
            id,
            ..Default::default()
        })
    }

    pub fn vlan(&self, id: u16) -> Option<&Vlan> {
        self.vlans.get(&id)
    }

    pub fn vlans(&self) -> impl Iterator<Item = &Vlan> {
        self.vlans.values()
    }

    /// Records `port` as a member of VLAN `id` on both sides.
    pub fn add_vlan_membership(&mut self, port: &str, id: u16) {
        let port = self.get_port(port);
        port.vlans.insert(id);
        let name = port.name.clone();
        self.get_vlan(id).ports.insert(name);
    }

    /// Records a learned address: the port sees `mac`, and in a VLAN, the VLAN holds both.
    pub fn add_mac_entry(&mut self, vlan: Option<u16>, mac: Mac, port: &str) {
        let port = self.get_port(port);
        port.add_connection(mac);
        let name = port.name.clone();
        if let Some(id) = vlan {
            self.add_vlan_membership(&name, id);
            self.get_vlan(id).macs.insert(mac);
        }
        self.mac_table.push(MacTableEntry { vlan, mac, port: name });
    }

    pub fn mac_table(&self) -> &[MacTableEntry] {
        &self.mac_table
    }

    pub fn add_arp(&mut self, entry: ArpEntry) {
        if let Some(id) = vlan_interface_id(&entry.interface) {
            self.get_vlan(id).macs.insert(entry.mac);
        }
        self.arp.push(entry);
    }

    pub fn arp_table(&self) -> &[ArpEntry] {
        &self.arp
    }

    pub fn add_user(&mut self, name: &str) {
        self.users.entry(name.to_string()).or_default();
    }

    pub fn add_password(&mut self, name: &str, password: &str) {
        self.users.insert(name.to_string(), Some(password.to_string()));
    }

    pub fn users(&self) -> &BTreeMap<String, Option<String>> {
        &self.users
    }

    pub fn add_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Canonical tree for this device.
    pub fn to_trait_map(&self) -> Result<TraitMap, ImportError> {
        let mut root = TraitMap::root();
        root.put_string(Trait::DeviceName, &self.name)?;
        if let Some(host_name) = &self.host_name {
            root.put_string(Trait::HostName, host_name)?;
        }

        if !self.ports.is_empty() {
            let entries = self.ports.values().map(Port::to_trait_map).collect::<Result<Vec<_>, _>>()?;
            root.put(Trait::InterfaceList, entries)?;
        }

        if !self.vlans.is_empty() {
            let list = root.get_or_create_list(Trait::VlanList)?;
            for vlan in self.vlans.values() {
                let mut map = TraitMap::new(Trait::Vlan);
                map.put(Trait::VlanId, i32::from(vlan.id))?;
                if let Some(name) = &vlan.name {
                    map.put_string(Trait::Description, name)?;
                }
                if let Some(ip) = vlan.ip {
                    map.put(Trait::Ipv4, u32::from(ip) as i32)?;
                }
                if let Some(cidr) = vlan.cidr {
                    map.put(Trait::Cidr, i32::from(cidr))?;
                }
                list.push(map);
            }
        }

        if !self.mac_table.is_empty() {
            let list = root.get_or_create_list(Trait::MacTable)?;
            for entry in &self.mac_table {
                let mut map = TraitMap::new(Trait::SwitchInterfaces);
                map.put(Trait::MacAddr, entry.mac.value() as i64)?;
                map.put_string(Trait::InterfaceName, &entry.port)?;
                if let Some(vlan) = entry.vlan {
                    map.put(Trait::VlanId, i32::from(vlan))?;
                }
                list.push(map);
            }
        }

        if !self.arp.is_empty() {
            let list = root.get_or_create_list(Trait::ArpTable)?;
            for entry in &self.arp {
                let mut map = TraitMap::new(Trait::ArpEntry);
                map.put_string(Trait::Proto, &entry.protocol)?;
                map.parse_then_put(Trait::Ipv4, &entry.ip.to_string())?;
                map.put(Trait::MacAddr, entry.mac.value() as i64)?;
                map.put_string(Trait::InterfaceName, &entry.interface)?;
                list.push(map);
            }
        }

        if !self.version.is_empty() {
            let version = root.new_branch(Trait::VersionConfig)?;
            let fields = [
                (Trait::VersionNo, &self.version.version),
                (Trait::VersionModel, &self.version.model),
                (Trait::VersionSerialNo, &self.version.serial),
                (Trait::VersionSoftwareImage, &self.version.image),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    version.put_string(key, value)?;
                }
            }
        }

        if !self.users.is_empty() {
            let list = root.get_or_create_list(Trait::UsernameList)?;
            for (name, password) in &self.users {
                let mut map = TraitMap::new(Trait::UsernameEntry);
                map.put_string(Trait::Username, name)?;
                if let Some(password) = password {
                    map.put_string(Trait::Password, password)?;
                }
                list.push(map);
            }
        }

        if !self.commands.is_empty() {
            root.put(Trait::ProcessedCommands, self.commands.clone())?;
        }
        Ok(root)
    }
}

/// VLAN number of an SVI name such as `Vlan10`.
pub fn vlan_interface_id(name: &str) -> Option<u16> {
    let name = name.trim();
    let prefix = name.get(..4)?;
    if !prefix.eq_ignore_ascii_case("vlan") {
        return None;
    }
    name[4..].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_accepts_common_notations() {
        let dotted: Mac = "1ce6.c783.e58a".parse().unwrap();
        let colons: Mac = "1C:E6:C7:83:E5:8A".parse().unwrap();
        let dashes: Mac = "1c-e6-c7-83-e5-8a".parse().unwrap();
        assert_eq!(dotted, colons);
        assert_eq!(dotted, dashes);
        assert_eq!(dotted.to_string(), "1c:e6:c7:83:e5:8a");
        assert!("1ce6.c783".parse::<Mac>().is_err());
        assert!("zzzz.c783.e58a".parse::<Mac>().is_err());
    }

    #[test]
    fn ports_are_get_or_create_across_abbreviations() {
        let mut node = PhysicalNode::new("sw1");
        node.get_port("Gi0/1").description = Some("uplink".into());
        node.get_port("GigabitEthernet0/1").trunk = true;
        assert_eq!(node.ports().count(), 1);

        let port = node.port("gi0/1").unwrap();
        assert_eq!(port.name, "GigabitEthernet0/1");
        assert_eq!(port.description.as_deref(), Some("uplink"));
        assert!(port.trunk);

        node.get_port("GigabitEthernet0/10");
        node.get_port("FastEthernet0/1");
        assert_eq!(node.ports().count(), 3);
    }

    #[test]
    fn vlan_membership_is_two_sided() {
        let mut node = PhysicalNode::new("sw1");
        node.add_vlan_membership("Fa0/3", 20);
        node.get_port("FastEthernet0/3");
        assert!(node.port("Fa0/3").unwrap().vlans.contains(&20));
        assert!(node.vlan(20).unwrap().ports.contains("FastEthernet0/3"));
    }

    #[test]
    fn management_ports_are_retagged() {
        let mut node = PhysicalNode::new("sw1");
        node.get_port("GigabitEthernet1/0/2").mac = Some(Mac::new(0x0011_2233_4455));
        node.get_port("Vlan1").ip = Some(Ipv4Addr::new(10, 0, 0, 2));
        node.add_command("interfaces");

        let tree = node.to_trait_map().unwrap();
        let ports = tree.get_list(Trait::InterfaceList).unwrap();
        let physical = ports.iter().find(|p| p.is(Trait::InterfaceListEntry)).unwrap();
        assert_eq!(physical.get_integer(Trait::InterfaceModule, -1), 1);
        assert_eq!(physical.get_integer(Trait::InterfaceSlot, -1), 0);
        assert_eq!(physical.get_integer(Trait::InterfaceId, -1), 2);
        assert_eq!(physical.get_string(Trait::InterfaceName), Some("GigabitEthernet"));

        let management = ports.iter().find(|p| p.is(Trait::ManagementInterfaceEntry)).unwrap();
        assert_eq!(management.get_string(Trait::InterfaceName), Some("Vlan1"));
        assert_eq!(management.get_integer(Trait::Ipv4, 0), 0x0a00_0002);
        assert_eq!(tree.get_strings(Trait::ProcessedCommands), Some(&["interfaces".to_string()][..]));
    }

    #[test]
    fn svi_names_give_vlan_ids() {
        assert_eq!(vlan_interface_id("Vlan10"), Some(10));
        assert_eq!(vlan_interface_id("vlan 7"), Some(7));
        assert_eq!(vlan_interface_id("GigabitEthernet0/1"), None);
        assert_eq!(vlan_interface_id("Vl"), None);
    }
}
