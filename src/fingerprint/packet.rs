//! Per-frame header fields handed to the filter engine.
use serde::{Deserialize, Serialize};

use super::buffer::PayloadView;
use crate::error::RuleError;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_TAG_LEN: usize = 4;
const IPV4_MIN_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// TCP flag names in the order they are rendered, with their header bits.
pub const TCP_FLAGS: [(&str, u16); 9] = [
    ("NS", 0x100),
    ("CWR", 0x080),
    ("ECE", 0x040),
    ("URG", 0x020),
    ("ACK", 0x010),
    ("PSH", 0x008),
    ("RST", 0x004),
    ("SYN", 0x002),
    ("FIN", 0x001),
];

/// Header fields extracted once per frame.
///
/// `ack` and `seq` stay textual: rules compare them as text, never arithmetically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterData {
    pub src: u16,
    pub dst: u16,
    pub eth: u16,
    pub ttl: u8,
    pub proto: u8,
    pub dsize: u32,
    pub window: u16,
    pub size: u32,
    pub frame: u64,
    pub flags: String,
    pub ack: String,
    pub seq: String,
}

impl FilterData {
    pub fn is_tcp(&self) -> bool {
        self.proto == PROTO_TCP
    }

    /// Decodes an Ethernet II frame (one optional 802.1Q tag) carrying IPv4/TCP or IPv4/UDP.
    ///
    /// Returns the record and the offset where the transport payload starts. Frames that are
    /// not IPv4, or are cut short, leave the remaining fields zeroed.
    pub fn from_ethernet(frame: u64, view: &PayloadView) -> (Self, usize) {
        let size = view.size();
        let mut data = FilterData {
            frame,
            size: size as u32,
            ..Default::default()
        };

        let mut offset = ETHERNET_HEADER_LEN;
        data.eth = view.get_int(12, 2, false) as u16;
        if data.eth == ETHERTYPE_VLAN {
            data.eth = view.get_int(16, 2, false) as u16;
            offset += VLAN_TAG_LEN;
        }

        if data.eth != ETHERTYPE_IPV4 || size < offset + IPV4_MIN_HEADER_LEN {
            return (data, offset.min(size));
        }

        let ip = offset as i64;
        let version_ihl = view.get_byte(ip).unwrap_or(0);
        if version_ihl >> 4 != 4 {
            log::debug!("Frame {frame}: ethertype IPv4 but version {}", version_ihl >> 4);
            return (data, offset);
        }
        let header_len = usize::from(version_ihl & 0x0f) * 4;
        let total_len = view.get_int(ip + 2, 2, false) as usize;
        let ip_end = if total_len == 0 { size } else { (offset + total_len).min(size) };

        data.ttl = view.get_byte(ip + 8).unwrap_or(0);
        data.proto = view.get_byte(ip + 9).unwrap_or(0);

        let l4 = offset + header_len.max(IPV4_MIN_HEADER_LEN);
        let l4i = l4 as i64;
        let payload = match data.proto {
            PROTO_TCP => {
                data.src = view.get_int(l4i, 2, false) as u16;
                data.dst = view.get_int(l4i + 2, 2, false) as u16;
                data.seq = view.get_int(l4i + 4, 4, false).to_string();
                data.ack = view.get_int(l4i + 8, 4, false).to_string();
                let offset_flags = view.get_int(l4i + 12, 2, false) as u16;
                data.flags = flag_names(offset_flags & 0x01ff);
                data.window = view.get_int(l4i + 14, 2, false) as u16;
                l4 + usize::from(offset_flags >> 12) * 4
            }
            PROTO_UDP => {
                data.src = view.get_int(l4i, 2, false) as u16;
                data.dst = view.get_int(l4i + 2, 2, false) as u16;
                l4 + UDP_HEADER_LEN
            }
            _ => l4,
        };

        let payload = payload.min(size);
        data.dsize = ip_end.saturating_sub(payload) as u32;
        (data, payload)
    }
}

/// Renders header flag bits as space separated names, e.g. `"ACK SYN"`.
pub fn flag_names(bits: u16) -> String {
    TCP_FLAGS
        .iter()
        .filter(|(_, bit)| bits & bit != 0)
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses a flag list (space or comma separated, any case) back into header bits.
pub fn parse_flags(text: &str) -> Result<u16, RuleError> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '|')
        .filter(|token| !token.is_empty())
        .try_fold(0u16, |bits, token| {
            TCP_FLAGS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(token))
                .map(|(_, bit)| bits | bit)
                .ok_or_else(|| RuleError::UnknownFlag(token.to_string()))
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Ethernet + IPv4 + TCP frame from 10.0.0.2:49152 to 10.0.0.1:502 with a 4 byte payload.
    pub(crate) fn modbus_syn_ack_frame() -> Vec<u8> {
        let mut frame = vec![
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, // dst
            0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, // src
            0x08, 0x00, // IPv4
            0x45, 0x00, 0x00, 0x2c, // v4, ihl 5, total length 44
            0x00, 0x01, 0x40, 0x00, // id, DF
            0x40, 0x06, 0x00, 0x00, // ttl 64, TCP
            10, 0, 0, 2, // src ip
            10, 0, 0, 1, // dst ip
            0xc0, 0x00, 0x01, 0xf6, // 49152 -> 502
            0x00, 0x00, 0x00, 0x2a, // seq 42
            0x00, 0x00, 0x00, 0x07, // ack 7
            0x50, 0x12, 0x20, 0x00, // data offset 5, SYN ACK, window 8192
            0x00, 0x00, 0x00, 0x00, // checksum, urgent
        ];
        frame.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
        frame
    }

    #[test]
    fn decodes_tcp_header_fields() {
        let bytes = modbus_syn_ack_frame();
        let (data, payload) = FilterData::from_ethernet(3, &PayloadView::new(&bytes));

        assert_eq!(data.eth, ETHERTYPE_IPV4);
        assert_eq!(data.ttl, 64);
        assert!(data.is_tcp());
        assert_eq!((data.src, data.dst), (49152, 502));
        assert_eq!(data.seq, "42");
        assert_eq!(data.ack, "7");
        assert_eq!(data.flags, "ACK SYN");
        assert_eq!(data.window, 8192);
        assert_eq!(data.dsize, 4);
        assert_eq!(data.size, bytes.len() as u32);
        assert_eq!(data.frame, 3);
        assert_eq!(payload, 54);
    }

    #[test]
    fn truncated_frame_degrades_to_defaults() {
        let bytes = modbus_syn_ack_frame();
        let (data, payload) = FilterData::from_ethernet(0, &PayloadView::new(&bytes[..20]));
        assert_eq!(data.eth, ETHERTYPE_IPV4);
        assert_eq!(data.proto, 0);
        assert_eq!(payload, 14);

        let (empty, payload) = FilterData::from_ethernet(0, &PayloadView::new(&[]));
        assert_eq!(empty.eth, 0);
        assert_eq!(payload, 0);
    }

    #[test]
    fn flags_round_trip_through_names() {
        assert_eq!(parse_flags("syn, ack").unwrap(), 0x012);
        assert_eq!(flag_names(0x012), "ACK SYN");
        assert!(matches!(parse_flags("SYN BOGUS"), Err(RuleError::UnknownFlag(flag)) if flag == "BOGUS"));
    }
}
