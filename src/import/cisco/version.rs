//! `show version`.
use lazy_static::lazy_static;
use regex::Regex;

use crate::import::topology::PhysicalNode;

lazy_static! {
    static ref SOFTWARE: Regex =
        Regex::new(r"^Cisco IOS Software, (?P<platform>\S+) Software.*Version (?P<version>[^,\s]+)").unwrap();
    static ref MODEL: Regex = Regex::new(r"^Model [Nn]umber\s*:\s*(?P<model>\S+)").unwrap();
    static ref PROCESSOR: Regex = Regex::new(r"^[Cc]isco (?P<model>\S+) \(.*\) processor").unwrap();
    static ref SERIAL: Regex =
        Regex::new(r"^(?:System [Ss]erial [Nn]umber\s*:|Processor board ID)\s*(?P<serial>\S+)").unwrap();
    static ref IMAGE: Regex = Regex::new(r#"^System image file is "(?P<image>[^"]+)""#).unwrap();
}

/// Fills in version, model, serial number and image. The first value seen wins, except that a
/// model or processor line replaces the platform name.
pub fn parse(lines: &[String], node: &mut PhysicalNode) -> bool {
    let info = &mut node.version;
    let mut found = false;
    for line in lines {
        if let Some(caps) = SOFTWARE.captures(line) {
            info.version.get_or_insert_with(|| caps["version"].to_string());
            info.model.get_or_insert_with(|| caps["platform"].to_string());
        } else if let Some(caps) = MODEL.captures(line).or_else(|| PROCESSOR.captures(line)) {
            info.model = Some(caps["model"].to_string());
        } else if let Some(caps) = SERIAL.captures(line) {
            info.serial.get_or_insert_with(|| caps["serial"].to_string());
        } else if let Some(caps) = IMAGE.captures(line) {
            info.image.get_or_insert_with(|| caps["image"].to_string());
        } else {
            continue;
        }
        found = true;
    }
    found
}
