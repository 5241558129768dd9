use hostprint::error::ImportError;
use hostprint::import::cisco::{CiscoReader, CommandRegistry, SplitterOptions};
use hostprint::import::{Mac, Trait};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

const SESSION: &str = r#"core-sw1#terminal length 0
core-sw1#show version
Cisco IOS Software, C3750E Software (C3750E-UNIVERSALK9-M), Version 15.0(2)SE4, RELEASE SOFTWARE (fc1)
Technical Support: http://www.cisco.com/techsupport
ROM: Bootstrap program is C3750E boot loader
System image file is "flash:/c3750e-universalk9-mz.150-2.SE4.bin"
cisco WS-C3750X-48P (PowerPC405) processor (revision A0) with 262144K bytes of memory.
Processor board ID FDO1234X0AB
core-sw1#show running-config
Building configuration...
!
hostname core-sw1
!
username admin privilege 15 secret 5 $1$abc$xyz
!
interface GigabitEthernet1/0/1
 description uplink
 switchport trunk allowed vlan 10,20
 switchport mode trunk
!
interface GigabitEthernet1/0/2
 switchport access vlan 10
!
interface Vlan10
 ip address 10.10.0.1 255.255.255.0
!
end
core-sw1#show interfaces
GigabitEthernet1/0/1 is up, line protocol is up (connected)
  Hardware is Gigabit Ethernet, address is 1ce6.c783.e581 (bia 1ce6.c783.e581)
  Description: uplink
  MTU 1500 bytes, BW 1000000 Kbit/sec, DLY 10 usec,
GigabitEthernet1/0/2 is up, line protocol is up (connected)
  Hardware is Gigabit Ethernet, address is 1ce6.c783.e582 (bia 1ce6.c783.e582)
core-sw1#show mac address-table
          Mac Address Table
-------------------------------------------
Vlan    Mac Address       Type        Ports
----    -----------       --------    -----
  10    0011.2233.4455    DYNAMIC     Gi1/0/2
  20    0011.2233.4466    DYNAMIC     Gi1/0/1
Total Mac Addresses for this criterion: 2
core-sw1#show ip arp
Protocol  Address          Age (min)  Hardware Addr   Type   Interface
Internet  10.10.0.1               -   1ce6.c783.e5c0  ARPA   Vlan10
Internet  10.10.0.20             12   0011.2233.4455  ARPA   Vlan10
Internet  10.10.0.21             12   0011.2233.4477  ARPA   Vlan10
Internet  10.10.0.22              3   0011.2233.4488  ARPA   Vlan10
Internet  10.10.0.23              3   0011.2233.4499  ARPA   Vlan10
core-sw1#show clock
*10:15:01.123 UTC Mon Mar 1 1993
second line
third line
fourth line
fifth line
core-sw1#show mac address-table dynamic
  10    0011.2233.4455    DYNAMIC     Gi1/0/2
  20    0011.2233.4466    DYNAMIC     Gi1/0/1
Total Mac Addresses for this criterion: 2
fourth line
fifth line
core-sw1#show versionn
                     ^
% Invalid input detected at '^' marker.

core-sw1#exit
"#;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn imports_a_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "core-sw1.txt", SESSION);
    let registry = CommandRegistry::cisco();
    let node = CiscoReader::new(&registry).import(&path).unwrap();

    assert_eq!(node.name, "core-sw1");
    assert_eq!(node.source.as_deref(), Some(path.as_path()));
    assert_eq!(
        node.commands(),
        ["interfaces", "ip arp", "mac address-table", "running-config", "version"]
    );

    assert_eq!(node.ports().count(), 2);
    let uplink = node.port("GigabitEthernet1/0/1").unwrap();
    assert!(uplink.trunk);
    assert_eq!(uplink.vlans.iter().copied().collect::<Vec<_>>(), vec![10, 20]);
    assert_eq!(uplink.mac, Some("1ce6.c783.e581".parse::<Mac>().unwrap()));
    assert!(uplink
        .connections
        .contains(&"0011.2233.4466".parse::<Mac>().unwrap()));

    let vlan = node.vlan(10).unwrap();
    assert_eq!(vlan.ip, Some(Ipv4Addr::new(10, 10, 0, 1)));
    assert_eq!(vlan.cidr, Some(24));
    assert_eq!(vlan.ports.len(), 2);
    assert_eq!(vlan.macs.len(), 5);
    assert_eq!(node.arp_table().len(), 5);

    assert_eq!(node.version.version.as_deref(), Some("15.0(2)SE4"));
    assert_eq!(node.version.model.as_deref(), Some("WS-C3750X-48P"));
    assert!(node.users()["admin"].is_some());
}

#[test]
fn exports_a_complete_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "core-sw1.txt", SESSION);
    let registry = CommandRegistry::cisco();
    let tree = CiscoReader::new(&registry)
        .import(&path)
        .unwrap()
        .to_trait_map()
        .unwrap();

    assert!(tree.check().is_empty());
    assert_eq!(tree.get_string(Trait::DeviceName), Some("core-sw1"));
    assert_eq!(tree.get_list(Trait::InterfaceList).map(Vec::len), Some(2));
    assert_eq!(tree.get_list(Trait::VlanList).map(Vec::len), Some(2));
    assert_eq!(tree.get_list(Trait::ArpTable).map(Vec::len), Some(5));
    assert_eq!(
        tree.get_branch(Trait::VersionConfig)
            .and_then(|version| version.get_string(Trait::VersionNo)),
        Some("15.0(2)SE4")
    );

    let json = serde_json::to_value(&tree).unwrap();
    assert_eq!(json["DEVICE_NAME"], "core-sw1");
    assert_eq!(json["INTERFACE_LIST"][0]["INTERFACE_NAME"], "GigabitEthernet");
    assert!(tree.pretty_print().contains(" INTERFACE_LIST\n"));
}

#[test]
fn section_files_can_be_kept() {
    let dir = tempfile::tempdir().unwrap();
    let sections = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "core-sw1.txt", SESSION);
    let registry = CommandRegistry::cisco();
    let reader = CiscoReader::with_options(
        &registry,
        SplitterOptions {
            output_dir: Some(sections.path().to_path_buf()),
            keep_files: true,
            ..Default::default()
        },
    );
    reader.import(&path).unwrap();

    let kept: Vec<String> = std::fs::read_dir(sections.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(kept.len(), 7);
    assert!(kept.iter().any(|name| name.starts_with("cisco-running_config-")));
}

#[test]
fn unusable_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let registry = CommandRegistry::cisco();
    let reader = CiscoReader::new(&registry);

    let no_prompt = write(dir.path(), "notes.txt", "just some notes\nwithout any prompt\n");
    assert!(matches!(reader.import(&no_prompt), Err(ImportError::NoDeviceName(_))));

    let short = write(dir.path(), "short.txt", "sw2#show arp\nno entries\n");
    assert!(matches!(reader.import(&short), Err(ImportError::NoCommands(_))));

    let missing = dir.path().join("missing.txt");
    assert!(matches!(reader.import(&missing), Err(ImportError::Io(_))));

    let good = write(dir.path(), "core-sw1.txt", SESSION);
    let nodes = reader.import_all(&[no_prompt, short, missing, good]);
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "core-sw1");
}
