//! Which parser handles which `show` command.
use super::{arp, interfaces, mac_table, running_config, version};
use crate::import::topology::PhysicalNode;

/// Column positions of a MAC address table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MacTableLayout {
    pub vlan: usize,
    pub mac: usize,
    pub interface: usize,
    pub columns: usize,
    /// Rows holding any of these tokens are not learned addresses.
    pub skip_tokens: &'static [&'static str],
}

impl MacTableLayout {
    /// `show mac-address-table` on IOS 12: address, type, vlan, port.
    pub const V12: MacTableLayout = MacTableLayout {
        vlan: 2,
        mac: 0,
        interface: 3,
        columns: 4,
        skip_tokens: &["All", "CPU"],
    };

    /// `show mac address-table` on IOS 15: vlan, address, type, port.
    pub const V15: MacTableLayout = MacTableLayout {
        vlan: 0,
        mac: 1,
        interface: 3,
        columns: 4,
        skip_tokens: &["All", "CPU"],
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParserKind {
    RunningConfig,
    Interfaces,
    Arp,
    MacTable(MacTableLayout),
    Version,
}

impl ParserKind {
    /// Feeds a section's lines into `node`. Returns false when nothing usable was found.
    pub fn parse(&self, lines: &[String], node: &mut PhysicalNode) -> bool {
        match self {
            ParserKind::RunningConfig => running_config::parse(lines, node),
            ParserKind::Interfaces => interfaces::parse(lines, node),
            ParserKind::Arp => arp::parse(lines, node),
            ParserKind::MacTable(layout) => mac_table::parse(lines, layout, node),
            ParserKind::Version => version::parse(lines, node),
        }
    }
}

/// Outcome of looking a command up.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'r> {
    Parser { key: &'r str, parser: &'r ParserKind },
    /// Closest key is shorter than the command, e.g. `mac address-table dynamic`.
    SubCommand { key: &'r str },
    Unsupported,
}

/// Ordered command table. Earlier keys win ties.
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    entries: Vec<(String, ParserKind)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands understood for Cisco IOS 12 and 15 devices.
    pub fn cisco() -> Self {
        let mut registry = Self::new();
        registry.register("interfaces", ParserKind::Interfaces);
        registry.register("interfaces static", ParserKind::Interfaces);
        registry.register("arp", ParserKind::Arp);
        registry.register("ip arp", ParserKind::Arp);
        registry.register("running-config", ParserKind::RunningConfig);
        registry.register("mac address-table", ParserKind::MacTable(MacTableLayout::V15));
        registry.register("mac-address-table", ParserKind::MacTable(MacTableLayout::V12));
        registry.register("version", ParserKind::Version);
        registry
    }

    pub fn register(&mut self, key: &str, parser: ParserKind) {
        self.entries.push((key.to_string(), parser));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Picks the key sharing the longest common substring with `command`. At least three
    /// characters must be shared, or the whole command when it is shorter.
    pub fn lookup(&self, command: &str) -> Lookup<'_> {
        let command = command.trim();
        let mut best: Option<(usize, &(String, ParserKind))> = None;
        for entry in &self.entries {
            let length = longest_common_substring(command, &entry.0);
            if best.map_or(true, |(best_length, _)| length > best_length) {
                best = Some((length, entry));
            }
        }

        let Some((length, (key, parser))) = best else {
            return Lookup::Unsupported;
        };
        if length == 0 || length < command.len().min(3) {
            return Lookup::Unsupported;
        }
        if command.len() > key.len() {
            return Lookup::SubCommand { key };
        }
        Lookup::Parser { key, parser }
    }
}

pub fn longest_common_substring(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let mut previous = vec![0usize; b.len() + 1];
    let mut longest = 0;
    for &x in a {
        let mut current = vec![0usize; b.len() + 1];
        for (j, &y) in b.iter().enumerate() {
            if x == y {
                current[j + 1] = previous[j] + 1;
                longest = longest.max(current[j + 1]);
            }
        }
        previous = current;
    }
    longest
}
