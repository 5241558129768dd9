//! Best-effort random access over a captured frame.
//!
//! Every read clamps to the backing bytes. Truncated captures are common, so an out-of-range
//! read yields a shorter (possibly empty) result instead of an error.
use regex::bytes::Regex;

/// Read-only view over an externally owned byte region.
#[derive(Clone, Copy, Debug)]
pub struct PayloadView<'a> {
    data: &'a [u8],
}

impl<'a> PayloadView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Last addressable index, `size() - 1`; -1 for an empty view.
    pub fn end(&self) -> i64 {
        self.data.len() as i64 - 1
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The part of `[offset, offset + length)` that lies inside the buffer.
    fn window(&self, offset: i64, length: usize) -> &'a [u8] {
        if offset < 0 {
            return &[];
        }
        let start = offset as usize;
        if start >= self.data.len() {
            return &[];
        }
        let end = start.saturating_add(length).min(self.data.len());
        &self.data[start..end]
    }

    pub fn get_byte(&self, index: i64) -> Option<u8> {
        self.window(index, 1).first().copied()
    }

    /// Copies up to `length` bytes from `offset`. `flip` reverses the copy.
    pub fn get_byte_array(&self, offset: i64, length: usize, flip: bool) -> Vec<u8> {
        let mut bytes = self.window(offset, length).to_vec();
        if flip {
            bytes.reverse();
        }
        bytes
    }

    /// Composes up to four bytes at `offset` into an integer.
    ///
    /// Bytes are read in network order; `flip` reads them little-endian instead.
    pub fn get_int(&self, offset: i64, length: usize, flip: bool) -> u32 {
        self.get_byte_array(offset, length.min(4), flip)
            .iter()
            .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
    }

    /// UTF-8 decode of a slice, replacing invalid sequences.
    pub fn get_string(&self, offset: i64, length: usize) -> String {
        String::from_utf8_lossy(self.window(offset, length)).into_owned()
    }

    /// First regex hit anywhere in the buffer.
    pub fn find(&self, pattern: &Regex) -> Option<String> {
        self.find_in(pattern, 0, self.data.len())
    }

    /// First regex hit within `[offset, offset + length)`.
    pub fn find_in(&self, pattern: &Regex, offset: i64, length: usize) -> Option<String> {
        pattern
            .find(self.window(offset, length))
            .map(|hit| String::from_utf8_lossy(hit.as_bytes()).into_owned())
    }

    /// Literal byte search within `[offset, offset + length)`.
    ///
    /// Returns the absolute index where `search` starts, or None (the "-1" of the capture
    /// tooling) when it does not occur.
    pub fn find_bytes(&self, search: &[u8], offset: i64, length: usize) -> Option<usize> {
        if search.is_empty() {
            return None;
        }
        let haystack = self.window(offset, length);
        haystack
            .windows(search.len())
            .position(|candidate| candidate == search)
            .map(|pos| pos + offset as usize)
    }

    /// True if the four network-order bytes at `offset` equal `compare_to`.
    pub fn int_at(&self, offset: i64, compare_to: u32) -> bool {
        self.window(offset, 4).len() == 4 && self.get_int(offset, 4, false) == compare_to
    }

    /// Copies the bytes between `from` and `to`, at most `length` of them.
    ///
    /// `from` must be inside the buffer. `to` may also be one past the last byte. The copy
    /// covers the lower bound up to, not including, the higher one.
    pub fn extract(&self, from: i64, to: i64, length: usize) -> Vec<u8> {
        let size = self.data.len() as i64;
        if !(0..size).contains(&from) || !(0..=size).contains(&to) {
            return Vec::new();
        }
        let start = from.min(to);
        let length = i64::try_from(length).unwrap_or(i64::MAX);
        let end = start.saturating_add(length).min(from.max(to));
        self.data[start as usize..end as usize].to_vec()
    }

    /// [PayloadView::extract] with the byte order reversed.
    pub fn extract_little(&self, from: i64, to: i64, length: usize) -> Vec<u8> {
        let mut bytes = self.extract(from, to, length);
        bytes.reverse();
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The low `length` bytes of `value` in the order `get_int` reads them.
    fn encode_int(value: u32, length: usize, flip: bool) -> Vec<u8> {
        let mut bytes = value.to_be_bytes()[4 - length..].to_vec();
        if flip {
            bytes.reverse();
        }
        bytes
    }

    const FRAME: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0x02, 0x03];

    #[test]
    fn reads_never_exceed_remaining_bytes() {
        let view = PayloadView::new(&FRAME);
        for offset in [-5i64, -1, 0, 3, 7, 8, 100, i64::MAX] {
            for length in [0usize, 1, 4, 9, usize::MAX] {
                let remaining = (view.size() as i64 - offset).max(0) as usize;
                assert!(view.get_byte_array(offset, length, false).len() <= remaining);
                assert!(view.get_byte_array(offset, length, true).len() <= remaining);
                assert!(view.extract(offset, offset.saturating_add(length as i64), length).len() <= remaining);
                assert!(view.extract_little(offset, 7, length).len() <= remaining);
                let _ = view.get_int(offset, length, true);
                let _ = view.get_string(offset, length);
            }
        }
    }

    #[test]
    fn get_int_honours_byte_order() {
        let view = PayloadView::new(&FRAME);
        assert_eq!(view.get_int(0, 4, false), 0xdeadbeef);
        assert_eq!(view.get_int(0, 4, true), 0xefbeadde);
        assert_eq!(view.get_int(4, 2, false), 0x0001);
        assert_eq!(view.get_int(4, 2, true), 0x0100);
        // truncated read composes only what is there
        assert_eq!(view.get_int(6, 4, false), 0x0203);
        assert_eq!(view.get_int(20, 4, false), 0);
    }

    #[test]
    fn get_int_round_trips_through_encode() {
        let view = PayloadView::new(&FRAME);
        for length in 1..=4usize {
            for flip in [false, true] {
                let value = view.get_int(2, length, flip);
                assert_eq!(encode_int(value, length, flip), FRAME[2..2 + length].to_vec());
            }
        }
    }

    #[test]
    fn finds_literal_bytes_and_patterns() {
        let payload = b"GET /index.html HTTP/1.1\r\nHost: plc01\r\n";
        let view = PayloadView::new(payload);
        assert_eq!(view.find_bytes(b"HTTP", 0, payload.len()), Some(16));
        assert_eq!(view.find_bytes(b"HTTP", 0, 10), None);
        assert_eq!(view.find_bytes(b"Host", 20, 100), Some(26));
        assert_eq!(view.find_bytes(b"", 0, 10), None);

        let host = Regex::new(r"Host: (\w+)").unwrap();
        assert_eq!(view.find(&host), Some("Host: plc01".to_string()));
        assert_eq!(view.find_in(&host, 0, 20), None);
    }

    #[test]
    fn int_at_needs_four_bytes() {
        let view = PayloadView::new(&FRAME);
        assert!(view.int_at(0, 0xdeadbeef));
        assert!(!view.int_at(1, 0xdeadbeef));
        assert!(!view.int_at(6, 0x0203));
    }

    #[test]
    fn extract_copies_between_bounds() {
        let view = PayloadView::new(&FRAME);
        assert_eq!(view.extract(0, 4, 10), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(view.extract(4, 0, 2), vec![0xde, 0xad]);
        assert_eq!(view.extract_little(0, 4, 2), vec![0xad, 0xde]);
        assert_eq!(view.extract(6, 8, 4), vec![0x02, 0x03]);
        assert!(view.extract(0, 9, 4).is_empty());
        assert!(view.extract(8, 8, 4).is_empty());
        assert!(view.extract(8, 7, 4).is_empty());
        assert!(view.extract_little(100, 6, 4).is_empty());
        assert_eq!(view.extract(7, 8, 4), vec![0x03]);
    }

    #[test]
    fn empty_view_has_no_end() {
        let view = PayloadView::new(&[]);
        assert_eq!(view.size(), 0);
        assert_eq!(view.end(), -1);
        assert!(view.get_byte_array(0, 4, false).is_empty());
    }
}
