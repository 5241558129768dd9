//! Closed set of concepts a device import can produce, and the values they hold.
//!
//! Each [Trait] declares the [ValueKind] it stores. [ValueKind::check] is the one place values
//! are checked against that declaration.
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;

use super::topology::Mac;
use super::trait_map::TraitMap;
use crate::error::TraitError;

/// What a [Trait] may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// Anything, used by the tree root.
    Any,
    Str,
    Int,
    Long,
    Bytes,
    /// One nested [TraitMap].
    Branch,
    /// A sequence: nested maps, strings or integers.
    List,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Any => "Object",
            ValueKind::Str => "String",
            ValueKind::Int => "Integer",
            ValueKind::Long => "Long",
            ValueKind::Bytes => "Bytes",
            ValueKind::Branch => "TraitMap",
            ValueKind::List => "List",
        }
    }

    pub fn accepts(self, value: &TraitValue) -> bool {
        matches!(
            (self, value),
            (ValueKind::Any, _)
                | (ValueKind::Str, TraitValue::Str(_))
                | (ValueKind::Int, TraitValue::Int(_))
                | (ValueKind::Long, TraitValue::Long(_))
                | (ValueKind::Bytes, TraitValue::Bytes(_))
                | (ValueKind::Branch, TraitValue::Branch(_))
                | (ValueKind::List, TraitValue::List(_) | TraitValue::Strings(_) | TraitValue::Ints(_))
        )
    }

    /// Fails with [TraitError::TypeMismatch] unless `value` fits `key`.
    pub fn check(key: Trait, value: &TraitValue) -> Result<(), TraitError> {
        let kind = key.kind();
        if kind.accepts(value) {
            Ok(())
        } else {
            Err(TraitError::TypeMismatch {
                key,
                expected: kind.name(),
                found: value.type_name(),
            })
        }
    }
}

/// A value stored under a [Trait].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraitValue {
    Str(String),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    Branch(TraitMap),
    List(Vec<TraitMap>),
    Strings(Vec<String>),
    Ints(Vec<i32>),
}

impl TraitValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TraitValue::Str(_) => "String",
            TraitValue::Int(_) => "Integer",
            TraitValue::Long(_) => "Long",
            TraitValue::Bytes(_) => "Bytes",
            TraitValue::Branch(_) => "TraitMap",
            TraitValue::List(_) => "List<TraitMap>",
            TraitValue::Strings(_) => "List<String>",
            TraitValue::Ints(_) => "List<Integer>",
        }
    }
}

impl fmt::Display for TraitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraitValue::Str(value) => write!(f, "{value}"),
            TraitValue::Int(value) => write!(f, "{value}"),
            TraitValue::Long(value) => write!(f, "{value}"),
            TraitValue::Bytes(bytes) => write!(f, "{}", hex::encode(bytes)),
            TraitValue::Branch(map) => write!(f, "{}", map.identity()),
            TraitValue::List(maps) => write!(f, "[{} entries]", maps.len()),
            TraitValue::Strings(values) => write!(f, "[{}]", values.join(", ")),
            TraitValue::Ints(values) => {
                let values: Vec<String> = values.iter().map(i32::to_string).collect();
                write!(f, "[{}]", values.join(", "))
            }
        }
    }
}

impl From<&str> for TraitValue {
    fn from(value: &str) -> Self {
        TraitValue::Str(value.to_string())
    }
}

impl From<String> for TraitValue {
    fn from(value: String) -> Self {
        TraitValue::Str(value)
    }
}

impl From<i32> for TraitValue {
    fn from(value: i32) -> Self {
        TraitValue::Int(value)
    }
}

impl From<i64> for TraitValue {
    fn from(value: i64) -> Self {
        TraitValue::Long(value)
    }
}

impl From<Vec<u8>> for TraitValue {
    fn from(value: Vec<u8>) -> Self {
        TraitValue::Bytes(value)
    }
}

impl From<TraitMap> for TraitValue {
    fn from(value: TraitMap) -> Self {
        TraitValue::Branch(value)
    }
}

impl From<Vec<TraitMap>> for TraitValue {
    fn from(value: Vec<TraitMap>) -> Self {
        TraitValue::List(value)
    }
}

impl From<Vec<String>> for TraitValue {
    fn from(value: Vec<String>) -> Self {
        TraitValue::Strings(value)
    }
}

impl From<Vec<i32>> for TraitValue {
    fn from(value: Vec<i32>) -> Self {
        TraitValue::Ints(value)
    }
}

/// Domain concepts produced by importers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trait {
    /// Top of every imported tree.
    Root,
    SwitchInterfaces,
    SubInterfaceList,
    /// An [Trait::InterfaceListEntry] for a sub-interface, keyed by [Trait::SubInterfaceId].
    SubInterfaceEntry,
    SubInterfaceId,
    InterfaceList,
    /// A physical port, numbered `module/slot/id` with the module optional.
    InterfaceListEntry,
    InterfaceModule,
    InterfaceSlot,
    InterfaceId,
    /// Port type, e.g. `GigabitEthernet` in `GigabitEthernet0/1`.
    InterfaceName,
    /// A virtual management port. Same contents as an interface entry but no numbering.
    ManagementInterfaceEntry,
    InterfaceStatus,
    LineStatus,
    SwitchportMode,
    Ipv4,
    Ipv4Src,
    Ipv4Dst,
    Ipv4Netmask,
    Cidr,
    Hardware,
    Description,
    PortDeprecated,
    MacTable,
    CiscoRunningConfig,
    VlanList,
    Vlan,
    VlanId,
    VersionConfig,
    VersionNo,
    VersionModel,
    VersionSerialNo,
    VersionSoftwareImage,
    ProcessedCommands,
    /// Stored as the 48 bit value; text forms are converted on parse.
    MacAddr,
    Timestamp,
    Offset,
    Payload,
    PortDst,
    PortSrc,
    Ethertype,
    Proto,
    FrameNo,
    UsernameList,
    UsernameEntry,
    Username,
    Password,
    Manufacturer,
    SerialNumber,
    PacketSize,
    DeviceName,
    HostName,
    IfSpVlanList,
    IfTunnel,
    Comment,
    Commands,
    ArpTable,
    ArpEntry,
}

impl Trait {
    pub fn name(self) -> &'static str {
        match self {
            Trait::Root => "ROOT",
            Trait::SwitchInterfaces => "SWITCH_INTERFACES",
            Trait::SubInterfaceList => "SUB_INTERFACE_LIST",
            Trait::SubInterfaceEntry => "SUB_INTERFACE_ENTRY",
            Trait::SubInterfaceId => "SUB_INTERFACE_ID",
            Trait::InterfaceList => "INTERFACE_LIST",
            Trait::InterfaceListEntry => "INTERFACE_LIST_ENTRY",
            Trait::InterfaceModule => "INTERFACE_MODULE",
            Trait::InterfaceSlot => "INTERFACE_SLOT",
            Trait::InterfaceId => "INTERFACE_ID",
            Trait::InterfaceName => "INTERFACE_NAME",
            Trait::ManagementInterfaceEntry => "MANAGEMENT_INTERFACE_ENTRY",
            Trait::InterfaceStatus => "INTERFACE_STATUS",
            Trait::LineStatus => "LINE_STATUS",
            Trait::SwitchportMode => "SWITCHPORT_MODE",
            Trait::Ipv4 => "IPv4",
            Trait::Ipv4Src => "IPv4_SRC",
            Trait::Ipv4Dst => "IPv4_DST",
            Trait::Ipv4Netmask => "IPv4_NETMASK",
            Trait::Cidr => "CIDR",
            Trait::Hardware => "HARDWARE",
            Trait::Description => "DESCRIPTION",
            Trait::PortDeprecated => "PORT_DEPRECATED",
            Trait::MacTable => "MAC_TABLE",
            Trait::CiscoRunningConfig => "CISCO_RUNNING_CONFIG",
            Trait::VlanList => "VLAN_LIST",
            Trait::Vlan => "VLAN",
            Trait::VlanId => "VLAN_ID",
            Trait::VersionConfig => "VERSION_CONFIG",
            Trait::VersionNo => "VERSION_NO",
            Trait::VersionModel => "VERSION_MODEL",
            Trait::VersionSerialNo => "VERSION_SERIAL_NO",
            Trait::VersionSoftwareImage => "VERSION_SOFTWARE_IMAGE",
            Trait::ProcessedCommands => "PROCESSED_COMMANDS",
            Trait::MacAddr => "MAC_ADDR",
            Trait::Timestamp => "TIMESTAMP",
            Trait::Offset => "OFFSET",
            Trait::Payload => "PAYLOAD",
            Trait::PortDst => "PORT_DST",
            Trait::PortSrc => "PORT_SRC",
            Trait::Ethertype => "ETHERTYPE",
            Trait::Proto => "PROTO",
            Trait::FrameNo => "FRAME_NO",
            Trait::UsernameList => "USERNAME_LIST",
            Trait::UsernameEntry => "USERNAME_ENTRY",
            Trait::Username => "USERNAME",
            Trait::Password => "PASSWORD",
            Trait::Manufacturer => "MANUFACTURER",
            Trait::SerialNumber => "SERIALNUMBER",
            Trait::PacketSize => "PACKET_SIZE",
            Trait::DeviceName => "DEVICE_NAME",
            Trait::HostName => "HOST_NAME",
            Trait::IfSpVlanList => "IF_SP_VLAN_LIST",
            Trait::IfTunnel => "IF_TUNNEL",
            Trait::Comment => "COMMENT",
            Trait::Commands => "COMMANDS",
            Trait::ArpTable => "ARP_TABLE",
            Trait::ArpEntry => "ARP_ENTRY",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Trait::Root => ValueKind::Any,

            Trait::SwitchInterfaces
            | Trait::SubInterfaceList
            | Trait::InterfaceList
            | Trait::MacTable
            | Trait::CiscoRunningConfig
            | Trait::VlanList
            | Trait::ProcessedCommands
            | Trait::UsernameList
            | Trait::IfSpVlanList
            | Trait::Comment
            | Trait::Commands
            | Trait::ArpTable => ValueKind::List,

            Trait::SubInterfaceEntry
            | Trait::InterfaceListEntry
            | Trait::ManagementInterfaceEntry
            | Trait::Vlan
            | Trait::VersionConfig
            | Trait::UsernameEntry
            | Trait::ArpEntry => ValueKind::Branch,

            Trait::SubInterfaceId
            | Trait::InterfaceModule
            | Trait::InterfaceSlot
            | Trait::InterfaceId
            | Trait::Ipv4
            | Trait::Ipv4Src
            | Trait::Ipv4Dst
            | Trait::Ipv4Netmask
            | Trait::Cidr
            | Trait::PortDeprecated
            | Trait::VlanId
            | Trait::Offset
            | Trait::FrameNo
            | Trait::PacketSize => ValueKind::Int,

            Trait::MacAddr | Trait::Timestamp => ValueKind::Long,

            Trait::Payload => ValueKind::Bytes,

            Trait::InterfaceName
            | Trait::InterfaceStatus
            | Trait::LineStatus
            | Trait::SwitchportMode
            | Trait::Hardware
            | Trait::Description
            | Trait::VersionNo
            | Trait::VersionModel
            | Trait::VersionSerialNo
            | Trait::VersionSoftwareImage
            | Trait::PortDst
            | Trait::PortSrc
            | Trait::Ethertype
            | Trait::Proto
            | Trait::Username
            | Trait::Password
            | Trait::Manufacturer
            | Trait::SerialNumber
            | Trait::DeviceName
            | Trait::HostName
            | Trait::IfTunnel => ValueKind::Str,
        }
    }

    /// Traits a map with this identity must contain to be complete.
    pub fn required(self) -> &'static [Trait] {
        match self {
            Trait::InterfaceListEntry => &[Trait::InterfaceId, Trait::InterfaceName, Trait::MacAddr],
            Trait::SubInterfaceEntry => &[Trait::SubInterfaceId],
            Trait::ManagementInterfaceEntry => &[Trait::InterfaceName],
            Trait::Vlan => &[Trait::VlanId],
            Trait::UsernameEntry => &[Trait::Username],
            Trait::ArpEntry => &[Trait::Ipv4, Trait::MacAddr],
            _ => &[],
        }
    }

    pub fn has_parse_method(self) -> bool {
        matches!(
            self,
            Trait::SubInterfaceId
                | Trait::InterfaceModule
                | Trait::InterfaceSlot
                | Trait::InterfaceId
                | Trait::Cidr
                | Trait::VlanId
                | Trait::Ipv4
                | Trait::Ipv4Src
                | Trait::Ipv4Dst
                | Trait::Ipv4Netmask
                | Trait::MacAddr
        )
    }

    /// Converts text into the value this trait stores.
    pub fn parse(self, input: &str) -> Result<TraitValue, TraitError> {
        let text = input.trim();
        let fail = |reason: String| TraitError::Parse {
            key: self,
            input: input.to_string(),
            reason,
        };
        match self {
            Trait::SubInterfaceId
            | Trait::InterfaceModule
            | Trait::InterfaceSlot
            | Trait::InterfaceId
            | Trait::Cidr
            | Trait::VlanId => text
                .parse::<i32>()
                .map(TraitValue::Int)
                .map_err(|err| fail(err.to_string())),
            Trait::Ipv4 | Trait::Ipv4Src | Trait::Ipv4Dst | Trait::Ipv4Netmask => text
                .parse::<Ipv4Addr>()
                .map(|ip| TraitValue::Int(u32::from(ip) as i32))
                .map_err(|err| fail(err.to_string())),
            Trait::MacAddr => text
                .parse::<Mac>()
                .map(|mac| TraitValue::Long(mac.value() as i64))
                .map_err(|err| fail(err.to_string())),
            _ => Err(TraitError::NoParseMethod(self)),
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_accept_only_their_values() {
        assert!(ValueKind::check(Trait::MacAddr, &TraitValue::Long(123)).is_ok());
        assert!(matches!(
            ValueKind::check(Trait::MacAddr, &"not-a-long".into()),
            Err(TraitError::TypeMismatch { expected: "Long", found: "String", .. })
        ));
        assert!(ValueKind::check(Trait::ProcessedCommands, &vec!["arp".to_string()].into()).is_ok());
        assert!(ValueKind::check(Trait::IfSpVlanList, &vec![10i32, 20].into()).is_ok());
        assert!(ValueKind::check(Trait::Root, &TraitValue::Int(1)).is_ok());
        assert!(ValueKind::check(Trait::VlanId, &TraitValue::Long(1)).is_err());
    }

    #[test]
    fn parses_numbers_addresses_and_macs() {
        assert_eq!(Trait::VlanId.parse(" 30 ").unwrap(), TraitValue::Int(30));
        assert_eq!(
            Trait::Ipv4.parse("10.1.2.3").unwrap(),
            TraitValue::Int(0x0a01_0203)
        );
        assert_eq!(
            Trait::MacAddr.parse("1ce6.c783.e58a").unwrap(),
            TraitValue::Long(0x1ce6_c783_e58a)
        );
        assert!(matches!(Trait::VlanId.parse("thirty"), Err(TraitError::Parse { .. })));
        assert!(matches!(
            Trait::Description.parse("uplink"),
            Err(TraitError::NoParseMethod(Trait::Description))
        ));
        assert!(!Trait::Description.has_parse_method());
    }

    #[test]
    fn names_render_like_the_tree() {
        assert_eq!(Trait::InterfaceListEntry.to_string(), "INTERFACE_LIST_ENTRY");
        assert_eq!(Trait::Ipv4Netmask.name(), "IPv4_NETMASK");
        assert_eq!(
            Trait::InterfaceListEntry.required(),
            &[Trait::InterfaceId, Trait::InterfaceName, Trait::MacAddr]
        );
    }
}
