use ansi_term::Colour;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

use crate::fingerprint::PacketReport;
use crate::import::{PhysicalNode, TraitMap};

pub fn print_devices(nodes: &[PhysicalNode]) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Devices");
    for node in nodes {
        print_device(node);
    }
}

pub fn print_device(node: &PhysicalNode) {
    println!("\u{2503}");
    println!("\u{2503} Device {}", Colour::Red.paint(&node.name));
    if let Some(source) = &node.source {
        println!("\u{2503} Source           : {}", source.display());
    }
    let version = &node.version;
    for (label, value) in [
        ("Version         ", &version.version),
        ("Model           ", &version.model),
        ("Serial          ", &version.serial),
        ("Image           ", &version.image),
    ] {
        if let Some(value) = value {
            println!("\u{2503} {label} : {}", Colour::Fixed(226).paint(value));
        }
    }
    println!("\u{2503} Commands         : {}", node.commands().join(", "));

    let ports: Vec<_> = node.ports().collect();
    if !ports.is_empty() {
        println!("\u{2503}");
        println!("\u{2503} {}", Colour::Blue.paint("Ports"));
    }
    for port in ports {
        let mac = port.mac.map(|mac| mac.to_string()).unwrap_or_default();
        let address = match (port.ip, port.cidr) {
            (Some(ip), Some(cidr)) => format!("{ip}/{cidr}"),
            (Some(ip), None) => ip.to_string(),
            _ => String::new(),
        };
        let status = port.status.as_deref().unwrap_or("-");
        let vlans: Vec<String> = port.vlans.iter().map(u16::to_string).collect();
        println!(
            "\u{2503}   {:<24} {:<22} {:<17} {:<18} {}{}",
            port.name,
            status,
            mac,
            address,
            vlans.join(","),
            if port.trunk { " (trunk)" } else { "" }
        );
        if !port.connections.is_empty() {
            println!("\u{2503}     sees {} address(es)", port.connections.len());
        }
    }

    let vlans: Vec<_> = node.vlans().collect();
    if !vlans.is_empty() {
        println!("\u{2503}");
        println!("\u{2503} {}", Colour::Blue.paint("VLANs"));
    }
    for vlan in vlans {
        let address = vlan.ip.map(|ip| ip.to_string()).unwrap_or_default();
        println!(
            "\u{2503}   {:<6} {:<20} {:<16} {} port(s), {} address(es)",
            vlan.id,
            vlan.name.as_deref().unwrap_or(""),
            address,
            vlan.ports.len(),
            vlan.macs.len()
        );
    }

    if !node.arp_table().is_empty() {
        println!("\u{2503}");
        println!("\u{2503} ARP entries      : {}", node.arp_table().len());
    }
    for (user, password) in node.users() {
        let secret = if password.is_some() { "set" } else { "none" };
        println!("\u{2503} User             : {} (password {secret})", Colour::Fixed(226).paint(user));
    }
    println!("\u{2503} ");
}

pub fn print_tree(name: &str, tree: &TraitMap) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} {name}");
    for line in tree.pretty_print().lines() {
        println!("\u{2503}{line}");
    }
}

pub fn print_reports(reports: &[PacketReport]) {
    println!("\n\u{250F}\u{2501}\u{2501}\u{2501}\u{2501} Fingerprints");
    for report in reports.iter().filter(|report| !report.fingerprints.is_empty()) {
        println!("\u{2503}");
        println!(
            "\u{2503} Frame {} ({} -> {}, proto {})",
            Colour::Red.paint(report.frame.to_string()),
            report.src,
            report.dst,
            report.proto
        );
        println!(
            "\u{2503} Matched          : {}",
            Colour::Fixed(226).paint(report.fingerprints.join(", "))
        );
        for (key, value) in report.details.entries() {
            println!("\u{2503}   {key:<15}: {value}");
        }
    }
    let unmatched = reports.iter().filter(|report| report.fingerprints.is_empty()).count();
    println!("\u{2503} ");
    println!("\u{2503} {} record(s), {unmatched} unmatched", reports.len());
}

/// Pretty-printed JSON for anything the CLI reports.
pub fn data_as_json<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(data)
}

pub fn data_to_file(data: String, path: &Path) -> io::Result<()> {
    log::info!("Writing {}", path.display());
    fs::write(path, data)
}
