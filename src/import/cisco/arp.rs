//! `show arp` and `show ip arp`.
use std::net::Ipv4Addr;

use crate::import::topology::{ArpEntry, Mac, PhysicalNode};

const COLUMNS: usize = 6;

/// Reads rows of `Protocol Address Age Hardware-Addr Type Interface`. Headers and malformed
/// rows are skipped.
pub fn parse(lines: &[String], node: &mut PhysicalNode) -> bool {
    let mut found = false;
    for line in lines {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() != COLUMNS {
            continue;
        }
        let (Ok(ip), Ok(mac)) = (columns[1].parse::<Ipv4Addr>(), columns[3].parse::<Mac>()) else {
            log::debug!("Skipping ARP row: {line}");
            continue;
        };
        node.add_arp(ArpEntry {
            protocol: columns[0].to_string(),
            ip,
            age: columns[2].parse().ok(),
            mac,
            kind: columns[4].to_string(),
            interface: columns[5].to_string(),
        });
        found = true;
    }
    found
}
