//! Line helpers shared by the show-command parsers.
use lazy_static::lazy_static;
use regex::Regex;
use std::net::Ipv4Addr;

use crate::error::ImportError;
use crate::import::trait_map::TraitMap;
use crate::import::traits::Trait;

/// Largest range `parse_numeric_list` will expand.
const MAX_RANGE: u32 = 4096;

lazy_static! {
    static ref NUMERIC_RANGE: Regex = Regex::new(r"\d+\s*-\s*\d+").unwrap();
    static ref NON_DIGITS: Regex = Regex::new(r"\D+").unwrap();
    static ref PHYSICAL_PORT: Regex = Regex::new(r"^\D+([\d/]{3,})").unwrap();
    static ref SUB_INTERFACE: Regex = Regex::new(r"^\D+([\d/]{3,})\.\d+$").unwrap();
    static ref INTERFACE_RANGE: Regex = Regex::new(r"^(?P<base>\S*?)(?P<first>\d+)\s*-\s*(?P<last>\d+)$").unwrap();
}

/// Drops terminal backspaces (and the characters they erase) and trailing whitespace.
pub fn clean_line(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '\u{8}' => {
                out.pop();
            }
            '\r' => {}
            c => out.push(c),
        }
    }
    out.truncate(out.trim_end().len());
    out
}

pub fn first_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or_default()
}

pub fn last_word(line: &str) -> &str {
    line.split_whitespace().last().unwrap_or_default()
}

/// Text after the first `sequence` in `line`, or the whole line when it is absent. Trimmed.
pub fn after<'a>(line: &'a str, sequence: &str) -> &'a str {
    match line.find(sequence) {
        Some(pos) => line[pos + sequence.len()..].trim(),
        None => line.trim(),
    }
}

/// Strips leading and trailing punctuation unless the text reads like a sentence.
pub fn tidy_string(text: &str) -> &str {
    if text.ends_with('.') {
        text
    } else {
        text.trim_matches(|c: char| c.is_ascii_punctuation())
    }
}

/// Parses `a.b.c.d`, `a.b.c.d/len` or `a.b.c.d mask`. IPv6 is refused.
pub fn parse_ip_address(text: &str) -> Result<(Ipv4Addr, Option<u8>), ImportError> {
    let text = text.trim();
    if text.contains(':') {
        return Err(ImportError::UnsupportedAddress(text.to_string()));
    }
    let unsupported = || ImportError::UnsupportedAddress(text.to_string());
    let mut words = text.split(|c: char| c == '/' || c.is_whitespace()).filter(|w| !w.is_empty());
    let ip: Ipv4Addr = words.next().ok_or_else(unsupported)?.parse().map_err(|_| unsupported())?;
    let cidr = match words.next() {
        None => None,
        Some(suffix) if suffix.contains('.') => {
            let mask: Ipv4Addr = suffix.parse().map_err(|_| unsupported())?;
            Some(netmask_to_cidr(mask))
        }
        Some(suffix) => match suffix.parse::<u8>() {
            Ok(len) if len <= 32 => Some(len),
            _ => return Err(unsupported()),
        },
    };
    Ok((ip, cidr))
}

pub fn netmask_to_cidr(mask: Ipv4Addr) -> u8 {
    u32::from(mask).count_ones() as u8
}

/// Puts `INTERFACE_SLOT`, `INTERFACE_ID` and, when present, `INTERFACE_MODULE` and
/// `SUB_INTERFACE_ID` parsed from numbering such as `0/1` or `1/0/2`.
pub fn parse_module_config(numbering: &str, map: &mut TraitMap) -> Result<(), ImportError> {
    let parts: Vec<&str> = NON_DIGITS.split(numbering).filter(|part| !part.is_empty()).collect();
    if parts.len() < 2 {
        return Err(ImportError::ModuleConfig(numbering.to_string()));
    }
    let mut parts = parts.into_iter();
    if parts.len() >= 3 {
        if let Some(module) = parts.next() {
            map.parse_then_put(Trait::InterfaceModule, module)?;
        }
    }
    if let (Some(slot), Some(id)) = (parts.next(), parts.next()) {
        map.parse_then_put(Trait::InterfaceSlot, slot)?;
        map.parse_then_put(Trait::InterfaceId, id)?;
    }
    if let Some(sub) = parts.next() {
        map.parse_then_put(Trait::SubInterfaceId, sub)?;
    }
    Ok(())
}

/// Every integer mentioned in `text`, with `a-b` ranges expanded. Sorted, duplicates kept.
pub fn parse_numeric_list(text: &str) -> Vec<u32> {
    let mut list = Vec::new();
    for range in NUMERIC_RANGE.find_iter(text) {
        list.extend(parse_numeric_range(range.as_str()));
    }
    let rest = NUMERIC_RANGE.replace_all(text, " ");
    list.extend(
        NON_DIGITS
            .split(&rest)
            .filter(|number| !number.is_empty())
            .filter_map(|number| number.parse::<u32>().ok()),
    );
    list.sort_unstable();
    list
}

/// Expands `a-b` (either order) into every integer between the two, inclusive.
pub fn parse_numeric_range(range: &str) -> Vec<u32> {
    let bounds: Vec<u32> = NON_DIGITS
        .split(range.trim())
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.parse().ok())
        .collect();
    let &[a, b] = bounds.as_slice() else {
        log::warn!("Cannot parse range expression '{range}'.");
        return Vec::new();
    };
    let (min, max) = (a.min(b), a.max(b));
    if max - min >= MAX_RANGE {
        log::warn!("Ignoring oversized range '{range}'.");
        return Vec::new();
    }
    (min..=max).collect()
}

/// Member names of an `interface range` list, e.g. `Gi1/0/1 - 3, Gi1/0/8`.
pub fn expand_interface_range(spec: &str) -> Vec<String> {
    let mut names = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match INTERFACE_RANGE.captures(part) {
            Some(caps) => {
                let range = format!("{}-{}", &caps["first"], &caps["last"]);
                names.extend(
                    parse_numeric_range(&range)
                        .into_iter()
                        .map(|id| format!("{}{id}", &caps["base"])),
                );
            }
            None => names.push(part.to_string()),
        }
    }
    names
}

/// True if the first word looks like a numbered port (`GigabitEthernet0/2/1`), not a VLAN
/// interface or other virtual interface.
pub fn is_physical_port(line: &str) -> bool {
    let word = first_word(line);
    PHYSICAL_PORT
        .captures(word)
        .and_then(|caps| caps.get(1))
        .is_some_and(|numbering| numbering.as_str().contains('/'))
}

/// True for dotted sub-interface names such as `GigabitEthernet0/1.100`.
pub fn is_sub_interface(line: &str) -> bool {
    let word = first_word(line);
    SUB_INTERFACE
        .captures(word)
        .and_then(|caps| caps.get(1))
        .is_some_and(|numbering| numbering.as_str().contains('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_lists_expand_ranges_and_keep_duplicates() {
        assert_eq!(
            parse_numeric_list("10, 20,20,303,50,1012-1014. 1 - 2, 5 ---5"),
            vec![1, 2, 5, 5, 10, 20, 20, 50, 303, 1012, 1013, 1014]
        );
        assert_eq!(parse_numeric_list("1,3-5"), vec![1, 3, 4, 5]);
        assert_eq!(parse_numeric_list("none"), Vec::<u32>::new());
        assert_eq!(parse_numeric_range("7-4"), vec![4, 5, 6, 7]);
        assert!(parse_numeric_range("1-99999").is_empty());
    }

    #[test]
    fn physical_port_heuristic() {
        assert!(is_physical_port("GigabitEthernet0/2/1"));
        assert!(is_physical_port("FastEthernet0/1 description uplink"));
        assert!(is_physical_port("Gi0/1"));
        assert!(!is_physical_port("Vlan30"));
        assert!(!is_physical_port("Loopback0"));
        assert!(!is_physical_port("Port-channel12"));

        assert!(is_sub_interface("GigabitEthernet0/1.100"));
        assert!(!is_sub_interface("GigabitEthernet0/1"));
        assert!(!is_sub_interface("Vlan1.5"));
    }

    #[test]
    fn interface_ranges_expand() {
        assert_eq!(
            expand_interface_range(" Gi1/0/1 - 3 , Gi1/0/10"),
            vec!["Gi1/0/1", "Gi1/0/2", "Gi1/0/3", "Gi1/0/10"]
        );
        assert_eq!(expand_interface_range("Fa0/10-11"), vec!["Fa0/10", "Fa0/11"]);
        assert_eq!(expand_interface_range("Port-channel1 - 2"), vec!["Port-channel1", "Port-channel2"]);
        assert!(expand_interface_range("").is_empty());
    }

    #[test]
    fn module_config_fills_slots() {
        let mut map = TraitMap::new(Trait::InterfaceListEntry);
        parse_module_config("0/1", &mut map).unwrap();
        assert!(!map.contains_key(Trait::InterfaceModule));
        assert_eq!(map.get_integer(Trait::InterfaceSlot, -1), 0);
        assert_eq!(map.get_integer(Trait::InterfaceId, -1), 1);

        let mut map = TraitMap::new(Trait::InterfaceListEntry);
        parse_module_config("2/0/3.40", &mut map).unwrap();
        assert_eq!(map.get_integer(Trait::InterfaceModule, -1), 2);
        assert_eq!(map.get_integer(Trait::InterfaceSlot, -1), 0);
        assert_eq!(map.get_integer(Trait::InterfaceId, -1), 3);
        assert_eq!(map.get_integer(Trait::SubInterfaceId, -1), 40);

        assert!(matches!(
            parse_module_config("30", &mut TraitMap::new(Trait::InterfaceListEntry)),
            Err(ImportError::ModuleConfig(_))
        ));
    }

    #[test]
    fn addresses() {
        assert_eq!(
            parse_ip_address("10.1.1.1/24").unwrap(),
            (Ipv4Addr::new(10, 1, 1, 1), Some(24))
        );
        assert_eq!(
            parse_ip_address("192.168.5.1 255.255.255.0").unwrap(),
            (Ipv4Addr::new(192, 168, 5, 1), Some(24))
        );
        assert_eq!(parse_ip_address("172.16.0.9").unwrap(), (Ipv4Addr::new(172, 16, 0, 9), None));
        assert!(matches!(
            parse_ip_address("fe80::1/64"),
            Err(ImportError::UnsupportedAddress(_))
        ));
        assert!(parse_ip_address("dhcp").is_err());
        assert!(parse_ip_address("10.0.0.1/40").is_err());
    }

    #[test]
    fn words_and_cleanup() {
        assert_eq!(first_word("  interface Gi0/1 "), "interface");
        assert_eq!(last_word(" switchport trunk allowed vlan 10,20-22"), "10,20-22");
        assert_eq!(after("hostname  core-sw1 ", "hostname"), "core-sw1");
        assert_eq!(after("no match", "hostname"), "no match");
        assert_eq!(tidy_string("\"uplink\","), "uplink");
        assert_eq!(tidy_string("Core uplink."), "Core uplink.");
        assert_eq!(clean_line("shw\u{8}ow arp  \r"), "show arp");
    }
}
