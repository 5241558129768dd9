//! `show running-config`.
//!
//! Top level lines are matched against a small set of triggers. A trigger may consume the
//! indented block that follows it.
use super::text;
use crate::import::topology::{vlan_interface_id, PhysicalNode};

const SECTION_SEPARATOR: &str = "!";
const INTERFACE_KEY: &str = "interface";
const RANGE_KEY: &str = "range ";
const HOSTNAME_KEY: &str = "hostname";
const USERNAME_KEY: &str = "username";
const VERSION_KEY: &str = "version";
const SKIP_KEY: &str = "---------";

const ADDRESS_KEY: &str = "ip address";
const NO_ADDRESS_KEY: &str = "no ip address";
const DESCRIPTION_KEY: &str = "description";
const SHUTDOWN_KEY: &str = "shutdown";
const SWITCHPORT_KEY: &str = "switchport";

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Interface,
    Hostname,
    Username,
    Version,
    Skip,
}

impl Trigger {
    const ALL: [Trigger; 5] = [
        Trigger::Interface,
        Trigger::Hostname,
        Trigger::Username,
        Trigger::Version,
        Trigger::Skip,
    ];

    fn key(self) -> &'static str {
        match self {
            Trigger::Interface => INTERFACE_KEY,
            Trigger::Hostname => HOSTNAME_KEY,
            Trigger::Username => USERNAME_KEY,
            Trigger::Version => VERSION_KEY,
            Trigger::Skip => SKIP_KEY,
        }
    }
}

pub fn parse(lines: &[String], node: &mut PhysicalNode) -> bool {
    let mut lines = lines.iter().map(String::as_str);
    let mut found = false;
    while let Some(line) = lines.next() {
        let Some(trigger) = Trigger::ALL.into_iter().find(|trigger| line.starts_with(trigger.key())) else {
            continue;
        };
        log::debug!("{trigger:?}: {line}");
        match trigger {
            Trigger::Interface => parse_interface(line, &mut lines, node),
            Trigger::Hostname => parse_hostname(line, node),
            Trigger::Username => parse_username(line, node),
            Trigger::Version => {
                node.version.version = Some(text::after(line, VERSION_KEY).to_string());
            }
            Trigger::Skip => {
                for skipped in lines.by_ref() {
                    if skipped.starts_with(SKIP_KEY) {
                        break;
                    }
                }
                continue;
            }
        }
        found = true;
    }
    found
}

fn parse_hostname(line: &str, node: &mut PhysicalNode) {
    let hostname = text::first_word(text::after(line, HOSTNAME_KEY));
    if hostname.is_empty() {
        return;
    }
    node.host_name = Some(hostname.to_string());
    node.name = hostname.to_string();
}

/// `username NAME [privilege N] (password|secret) [TYPE] VALUE`
fn parse_username(line: &str, node: &mut PhysicalNode) {
    let rest = text::after(line, USERNAME_KEY);
    let username = text::first_word(rest);
    if username.is_empty() {
        return;
    }
    node.add_user(username);
    let has_password = rest
        .split_whitespace()
        .skip(1)
        .any(|word| word == "password" || word == "secret");
    if has_password {
        node.add_password(username, text::last_word(rest));
    }
}

fn parse_interface<'a>(line: &str, lines: &mut impl Iterator<Item = &'a str>, node: &mut PhysicalNode) {
    let rest = text::after(line, INTERFACE_KEY);
    let names: Vec<String> = match rest.strip_prefix(RANGE_KEY) {
        Some(spec) => text::expand_interface_range(spec)
            .iter()
            .filter(|member| text::is_physical_port(member))
            .map(|member| node.get_port(member).name.clone())
            .collect(),
        None if rest.starts_with("Null") => return,
        None if !text::is_physical_port(rest) => {
            parse_virtual_interface(rest, lines, node);
            return;
        }
        None => vec![physical_port(text::first_word(rest), node)],
    };
    if names.is_empty() {
        log::warn!("No physical ports in \"{line}\"");
    }

    for line in lines.by_ref() {
        if line.starts_with(SECTION_SEPARATOR) {
            break;
        }
        for name in &names {
            apply_interface_setting(line.trim(), name, node);
        }
    }
}

/// Port behind `word`, recording a dotted sub-interface on its parent.
fn physical_port(word: &str, node: &mut PhysicalNode) -> String {
    let Some((base, sub)) = word.rsplit_once('.').filter(|_| text::is_sub_interface(word)) else {
        return node.get_port(word).name.clone();
    };
    let port = node.get_port(base);
    match sub.parse() {
        Ok(id) => port.add_sub_interface(id),
        Err(_) => log::warn!("Bad sub-interface in \"{word}\""),
    }
    port.name.clone()
}

fn apply_interface_setting(line: &str, name: &str, node: &mut PhysicalNode) {
    if line.starts_with(ADDRESS_KEY) {
        match text::parse_ip_address(text::after(line, ADDRESS_KEY)) {
            Ok((ip, cidr)) => {
                let port = node.get_port(name);
                port.ip = Some(ip);
                port.cidr = cidr;
            }
            Err(err) => log::debug!("{name}: {err}"),
        }
    } else if line.starts_with(DESCRIPTION_KEY) {
        node.get_port(name).description = Some(text::after(line, DESCRIPTION_KEY).to_string());
    } else if line.starts_with(SHUTDOWN_KEY) {
        node.get_port(name)
            .status
            .get_or_insert_with(|| "administratively down".to_string());
    } else if line.starts_with(SWITCHPORT_KEY) {
        if line.contains("mode trunk") {
            node.get_port(name).trunk = true;
        } else if line.contains("vlan") {
            for id in text::parse_numeric_list(text::last_word(line)) {
                match u16::try_from(id) {
                    Ok(id) => node.add_vlan_membership(name, id),
                    Err(_) => log::warn!("{name}: VLAN {id} out of range"),
                }
            }
        }
    }
}

/// VLAN interfaces carry an address for their VLAN; other virtual interfaces become
/// management ports.
fn parse_virtual_interface<'a>(rest: &str, lines: &mut impl Iterator<Item = &'a str>, node: &mut PhysicalNode) {
    let name = text::first_word(rest).to_string();
    let vlan = vlan_interface_id(&name);
    if vlan.is_none() {
        node.get_port(&name);
    }

    for line in lines.by_ref() {
        let line = line.trim();
        if line.starts_with(SHUTDOWN_KEY) || line.starts_with(NO_ADDRESS_KEY) || line.starts_with(SECTION_SEPARATOR) {
            break;
        }
        if line.starts_with(ADDRESS_KEY) {
            let (ip, cidr) = match text::parse_ip_address(text::after(line, ADDRESS_KEY)) {
                Ok(address) => address,
                Err(err) => {
                    log::debug!("{name}: {err}");
                    continue;
                }
            };
            match vlan {
                Some(id) => {
                    let vlan = node.get_vlan(id);
                    vlan.ip = Some(ip);
                    vlan.cidr = cidr;
                }
                None => {
                    let port = node.get_port(&name);
                    port.ip = Some(ip);
                    port.cidr = cidr;
                }
            }
        } else if line.starts_with(DESCRIPTION_KEY) {
            let description = text::after(line, DESCRIPTION_KEY).to_string();
            match vlan {
                Some(id) => node.get_vlan(id).name = Some(description),
                None => node.get_port(&name).description = Some(description),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const RUNNING_CONFIG: &str = "\
Building configuration...

Current configuration : 4120 bytes
!
version 15.0
hostname core-sw1
!
username admin privilege 15 secret 5 $1$mERr$hx5rVt7rPNoS4wqbXKX7m0
username guest privilege 1
!
interface GigabitEthernet1/0/1
 description uplink to core
 switchport trunk allowed vlan 10,20-22
 switchport mode trunk
!
interface GigabitEthernet1/0/2
 switchport access vlan 10
 shutdown
!
interface GigabitEthernet1/0/3.100
 ip address 10.100.0.1 255.255.255.0
!
interface Null0
 no ip unreachables
!
interface Vlan10
 description users
 ip address 10.10.0.1 255.255.255.0
!
interface Loopback0
 ip address 172.16.255.1 255.255.255.255
!
interface range GigabitEthernet1/0/5 - 7, Gi1/0/9
 description printers
 switchport access vlan 30
!
---------
hostname not-a-hostname
---------
end
";

    fn node() -> PhysicalNode {
        let lines: Vec<String> = RUNNING_CONFIG.lines().map(str::to_string).collect();
        let mut node = PhysicalNode::new("prompt-name");
        assert!(parse(&lines, &mut node));
        node
    }

    #[test]
    fn device_settings() {
        let node = node();
        assert_eq!(node.name, "core-sw1");
        assert_eq!(node.host_name.as_deref(), Some("core-sw1"));
        assert_eq!(node.version.version.as_deref(), Some("15.0"));
        assert_eq!(
            node.users().get("admin"),
            Some(&Some("$1$mERr$hx5rVt7rPNoS4wqbXKX7m0".to_string()))
        );
        assert_eq!(node.users().get("guest"), Some(&None));
    }

    #[test]
    fn physical_interfaces() {
        let node = node();
        let uplink = node.port("GigabitEthernet1/0/1").unwrap();
        assert_eq!(uplink.description.as_deref(), Some("uplink to core"));
        assert!(uplink.trunk);
        assert_eq!(uplink.vlans.iter().copied().collect::<Vec<_>>(), vec![10, 20, 21, 22]);

        let access = node.port("GigabitEthernet1/0/2").unwrap();
        assert_eq!(access.status.as_deref(), Some("administratively down"));
        assert!(!access.trunk);

        let routed = node.port("GigabitEthernet1/0/3").unwrap();
        assert!(routed.sub_interfaces.contains(&100));
        assert_eq!(routed.ip, Some(Ipv4Addr::new(10, 100, 0, 1)));
        assert_eq!(routed.cidr, Some(24));

        assert!(node.port("Null0").is_none());
        assert!(node.port("range").is_none());
        let members = &node.vlan(10).unwrap().ports;
        assert!(members.contains("GigabitEthernet1/0/1"));
        assert!(members.contains("GigabitEthernet1/0/2"));
    }

    #[test]
    fn interface_ranges_configure_every_member() {
        let node = node();
        for name in ["GigabitEthernet1/0/5", "GigabitEthernet1/0/6", "GigabitEthernet1/0/7", "Gi1/0/9"] {
            let port = node.port(name).unwrap();
            assert_eq!(port.description.as_deref(), Some("printers"));
            assert!(port.vlans.contains(&30));
        }
        assert!(node.port("GigabitEthernet1/0/8").is_none());
        assert_eq!(node.vlan(30).unwrap().ports.len(), 4);
    }

    #[test]
    fn virtual_interfaces() {
        let node = node();
        let vlan = node.vlan(10).unwrap();
        assert_eq!(vlan.name.as_deref(), Some("users"));
        assert_eq!(vlan.ip, Some(Ipv4Addr::new(10, 10, 0, 1)));
        assert_eq!(vlan.cidr, Some(24));
        assert!(node.port("Vlan10").is_none());

        let loopback = node.port("Loopback0").unwrap();
        assert_eq!(loopback.ip, Some(Ipv4Addr::new(172, 16, 255, 1)));
        assert_eq!(loopback.cidr, Some(32));
    }
}
