//! `show interfaces` and `show interfaces static`.
use lazy_static::lazy_static;
use regex::Regex;

use super::text;
use crate::import::topology::{vlan_interface_id, PhysicalNode};

lazy_static! {
    static ref INTERFACE_STATUS: Regex = Regex::new(
        r"^(?P<name>\S+) is (?P<status>up|down|administratively down), line protocol is (?P<line>up|down)(?: \((?P<detail>[^)]+)\))?\s*$"
    )
    .unwrap();
    static ref HARDWARE: Regex = Regex::new(
        r"^\s+Hardware is (?P<hardware>[^,]+), address is (?P<mac>[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4})"
    )
    .unwrap();
    static ref DESCRIPTION: Regex = Regex::new(r"^\s+Description: (?P<description>.+)$").unwrap();
    static ref ADDRESS: Regex = Regex::new(r"^\s+Internet address is (?P<address>\S+)").unwrap();
}

pub fn parse(lines: &[String], node: &mut PhysicalNode) -> bool {
    let mut current: Option<String> = None;
    let mut found = false;

    for line in lines {
        if let Some(caps) = INTERFACE_STATUS.captures(line) {
            let port = node.get_port(&caps["name"]);
            port.status = Some(caps["status"].to_string());
            port.line_status = Some(caps["line"].to_string());
            port.line_detail = caps.name("detail").map(|detail| detail.as_str().to_string());
            current = Some(port.name.clone());
            found = true;
            continue;
        }

        let Some(name) = current.as_deref() else {
            continue;
        };
        if let Some(caps) = HARDWARE.captures(line) {
            let port = node.get_port(name);
            port.hardware = Some(caps["hardware"].trim().to_string());
            match caps["mac"].parse() {
                Ok(mac) => port.mac = Some(mac),
                Err(err) => log::warn!("{name}: {err}"),
            }
        } else if let Some(caps) = DESCRIPTION.captures(line) {
            let description = text::tidy_string(caps["description"].trim()).to_string();
            if let Some(id) = vlan_interface_id(name) {
                node.get_vlan(id).name = Some(description.clone());
            }
            node.get_port(name).description = Some(description);
        } else if let Some(caps) = ADDRESS.captures(line) {
            match text::parse_ip_address(&caps["address"]) {
                Ok((ip, cidr)) => {
                    let port = node.get_port(name);
                    port.ip = Some(ip);
                    port.cidr = cidr;
                    if let Some(id) = vlan_interface_id(name) {
                        let vlan = node.get_vlan(id);
                        vlan.ip = Some(ip);
                        vlan.cidr = cidr;
                    }
                }
                Err(err) => log::warn!("{name}: {err}"),
            }
        }
    }
    found
}
