//! Payload operations of a fingerprint and the compiled program that runs them.
//!
//! A payload is a straight sequence of operations over a [PayloadView] sharing one [Cursor].
//! The first operation that fails stops the payload and nothing it extracted is kept.
use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::buffer::PayloadView;
use super::cursor::{Cursor, CursorMark};
use super::details::{Category, Direction, HostDetails, Role};
use super::filter::FunctionalOperation;
use super::packet::FilterData;
use crate::error::RuleError;

/// Fixed points an offset can be taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    StartOfPayload,
    EndOfPayload,
    CursorStart,
    CursorMain,
    CursorEnd,
}

impl Position {
    fn resolve(self, payload: &PayloadView<'_>, cursor: &Cursor) -> i64 {
        match self {
            Position::StartOfPayload => 0,
            Position::EndOfPayload => payload.size() as i64,
            Position::CursorStart => cursor.start(),
            Position::CursorMain => cursor.main(),
            Position::CursorEnd => cursor.end(),
        }
    }
}

/// Either a named [Position] or an absolute offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bound {
    Position(Position),
    Offset(i64),
}

impl Default for Bound {
    fn default() -> Self {
        Bound::Position(Position::StartOfPayload)
    }
}

impl Bound {
    fn resolve(self, payload: &PayloadView<'_>, cursor: &Cursor) -> i64 {
        match self {
            Bound::Position(position) => position.resolve(payload, cursor),
            Bound::Offset(offset) => offset,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Endian {
    #[default]
    Big,
    Little,
}

impl Endian {
    fn flip(self) -> bool {
        self == Endian::Little
    }
}

/// Comparison applied by [ByteTest].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Test {
    Gt,
    Lt,
    Gte,
    Lte,
    And,
    Or,
    Eq,
}

impl Test {
    pub fn check(self, input: i64, value: i64) -> bool {
        match self {
            Test::Gt => input > value,
            Test::Lt => input < value,
            Test::Gte => input >= value,
            Test::Lte => input <= value,
            Test::And => input & value != 0,
            Test::Or => input | value != 0,
            Test::Eq => input == value,
        }
    }
}

/// How extracted bytes are rendered once they are read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    #[default]
    Hex,
    Integer,
    RawBytes,
    String,
    Ip,
    Uuid,
}

impl ContentType {
    /// Renders `bytes`. Values a type cannot represent fall back to upper-case hex.
    pub fn decode(self, bytes: &[u8], endian: Endian) -> String {
        match self {
            ContentType::Hex => hex::encode_upper(bytes),
            ContentType::Integer => signed_value(bytes)
                .map(|value| value.to_string())
                .unwrap_or_else(|| hex::encode_upper(bytes)),
            ContentType::RawBytes => {
                let signed: Vec<String> = bytes.iter().map(|byte| (*byte as i8).to_string()).collect();
                format!("[{}]", signed.join(", "))
            }
            ContentType::String => String::from_utf8_lossy(bytes).into_owned(),
            ContentType::Ip => signed_value(bytes)
                .map(|value| Ipv4Addr::from(value as u32).to_string())
                .unwrap_or_else(|| hex::encode_upper(bytes)),
            ContentType::Uuid => format_uuid(bytes, endian).unwrap_or_else(|| hex::encode_upper(bytes)),
        }
    }
}

/// Two's complement big-endian value of up to 16 bytes.
fn signed_value(bytes: &[u8]) -> Option<i128> {
    if bytes.is_empty() || bytes.len() > 16 {
        return None;
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut wide = [fill; 16];
    wide[16 - bytes.len()..].copy_from_slice(bytes);
    Some(i128::from_be_bytes(wide))
}

/// Formats 16 bytes as a UUID. Little-endian extracts were reversed on the way out, so they are
/// put back in wire order and the first three groups read little-endian (GUID layout).
fn format_uuid(bytes: &[u8], endian: Endian) -> Option<String> {
    let mut wire: [u8; 16] = bytes.try_into().ok()?;
    if endian == Endian::Little {
        wire.reverse();
        wire[0..4].reverse();
        wire[4..6].reverse();
        wire[6..8].reverse();
    }
    let hex = hex::encode(wire);
    Some(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}

/// Moves one cursor mark.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Anchor {
    pub cursor: CursorMark,
    pub position: Option<Position>,
    pub relative: bool,
    pub offset: i64,
}

/// Reads a length from the payload and moves the main mark by it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteJump {
    pub offset: i64,
    pub relative: bool,
    pub bytes: usize,
    pub endian: Endian,
    pub post_offset: i64,
}

/// Compares an integer read from the payload against a constant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteTest {
    pub test: Test,
    pub value: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub relative: bool,
    #[serde(default)]
    pub bytes: usize,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub post_offset: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsDataAt {
    pub offset: i64,
    pub relative: bool,
}

/// Searches for a byte pattern or a literal (hex encoded) byte string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Match {
    pub pattern: Option<String>,
    pub content: Option<String>,
    pub offset: i64,
    pub depth: usize,
    pub relative: bool,
    pub no_case: bool,
    pub move_cursor: bool,
}

/// Copies a range and stores it, undecoded, under `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extract {
    pub name: String,
    #[serde(default)]
    pub from: Bound,
    pub to: Bound,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub convert: ContentType,
}

impl Match {
    /// True when there is nothing to search for.
    pub fn is_empty(&self) -> bool {
        self.pattern.is_none() && self.content.as_deref().map_or(true, |content| content.trim().is_empty())
    }
}

fn default_max_length() -> usize {
    1024
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Anchor(Anchor),
    ByteJump(ByteJump),
    ByteTest(ByteTest),
    IsDataAt(IsDataAt),
    Match(Match),
    Extract(Extract),
}

/// What a successful payload says about the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Return {
    pub direction: Direction,
    pub confidence: u8,
    pub category: Option<Category>,
    pub role: Option<Role>,
    pub details: BTreeMap<String, String>,
}

impl Return {
    pub fn apply(&self, fingerprint: &str, details: &mut HostDetails) {
        details.add_name(fingerprint);
        details.set_confidence(self.confidence);
        details.set_direction(self.direction);
        if let Some(category) = self.category {
            details.set_category(category);
        }
        if let Some(role) = self.role {
            details.set_role(role);
        }
        for (key, value) in &self.details {
            details.put(key.as_str(), value.as_str());
        }
    }
}

/// A named payload as written in a fingerprint document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    pub name: String,
    /// Applied whenever the payload runs, before any operation.
    pub always: Vec<Return>,
    pub operations: Vec<Operation>,
    #[serde(rename = "return")]
    pub on_match: Option<Return>,
}

#[derive(Debug)]
enum Matcher {
    Pattern(Regex),
    Content(Vec<u8>),
}

#[derive(Debug)]
enum Step {
    Anchor(Anchor),
    ByteJump(ByteJump),
    ByteTest(ByteTest),
    IsDataAt(IsDataAt),
    Match(Match, Matcher),
    Extract(Extract),
}

/// Pending extract, registered only once the whole payload succeeded.
struct Staged {
    name: String,
    bytes: Vec<u8>,
    convert: ContentType,
    endian: Endian,
}

/// A [Payload] with its patterns compiled, ready to run against frames.
#[derive(Debug)]
pub struct PayloadProgram {
    fingerprint: String,
    name: String,
    always: Vec<Return>,
    steps: Vec<Step>,
    on_match: Option<Return>,
}

impl PayloadProgram {
    pub fn compile(fingerprint: &str, payload: &Payload) -> Result<Self, RuleError> {
        let steps = payload
            .operations
            .iter()
            .map(|operation| -> Result<Step, RuleError> {
                Ok(match operation {
                    Operation::Anchor(op) => Step::Anchor(op.clone()),
                    Operation::ByteJump(op) => Step::ByteJump(op.clone()),
                    Operation::ByteTest(op) => Step::ByteTest(op.clone()),
                    Operation::IsDataAt(op) => Step::IsDataAt(op.clone()),
                    Operation::Extract(op) => Step::Extract(op.clone()),
                    Operation::Match(op) => {
                        let matcher = match (&op.pattern, &op.content) {
                            (Some(pattern), _) => Matcher::Pattern(
                                RegexBuilder::new(pattern).case_insensitive(op.no_case).build()?,
                            ),
                            (None, Some(content)) if !op.is_empty() => {
                                Matcher::Content(hex::decode(content.replace(' ', ""))?)
                            }
                            _ => {
                                return Err(RuleError::EmptyMatch {
                                    fingerprint: fingerprint.to_string(),
                                    payload: payload.name.clone(),
                                })
                            }
                        };
                        Step::Match(op.clone(), matcher)
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            fingerprint: fingerprint.to_string(),
            name: payload.name.clone(),
            always: payload.always.clone(),
            steps,
            on_match: payload.on_match.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Runs every operation in order. Returns false, leaving extracts unwritten, on the first
    /// failing test or match.
    pub fn run(&self, payload: &PayloadView<'_>, cursor: &mut Cursor, details: &mut HostDetails) -> bool {
        for ret in &self.always {
            ret.apply(&self.fingerprint, details);
        }

        let mut staged = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            if !self.step(step, payload, cursor, &mut staged) {
                log::debug!("{}/{}: operation #{index} did not match", self.fingerprint, self.name);
                return false;
            }
        }

        for extract in staged {
            let Staged {
                name,
                bytes,
                convert,
                endian,
            } = extract;
            details
                .details()
                .put_raw(name, bytes, move |raw| convert.decode(raw, endian));
        }
        match &self.on_match {
            Some(ret) => ret.apply(&self.fingerprint, details),
            None => details.add_name(self.fingerprint.as_str()),
        }
        true
    }

    fn step(&self, step: &Step, payload: &PayloadView<'_>, cursor: &mut Cursor, staged: &mut Vec<Staged>) -> bool {
        match step {
            Step::Anchor(op) => {
                anchor(op, payload, cursor);
                true
            }
            Step::ByteJump(op) => byte_jump(op, payload, cursor),
            Step::ByteTest(op) => byte_test(op, payload, cursor),
            Step::IsDataAt(op) => {
                let offset = relative_to(cursor, op.offset, op.relative);
                offset >= 0 && offset < payload.size() as i64
            }
            Step::Match(op, matcher) => match_bytes(op, matcher, payload, cursor),
            Step::Extract(op) => {
                let from = op.from.resolve(payload, cursor);
                let to = op.to.resolve(payload, cursor);
                let bytes = match op.endian {
                    Endian::Big => payload.extract(from, to, op.max_length),
                    Endian::Little => payload.extract_little(from, to, op.max_length),
                };
                if bytes.is_empty() {
                    log::debug!("{}/{}: nothing to extract for '{}'", self.fingerprint, self.name, op.name);
                } else {
                    staged.push(Staged {
                        name: op.name.clone(),
                        bytes,
                        convert: op.convert,
                        endian: op.endian,
                    });
                }
                true
            }
        }
    }
}

impl FunctionalOperation for PayloadProgram {
    fn apply(
        &self,
        _data: &FilterData,
        payload: &PayloadView<'_>,
        cursor: &mut Cursor,
        details: &mut HostDetails,
    ) -> bool {
        self.run(payload, cursor, details)
    }
}

fn relative_to(cursor: &Cursor, offset: i64, relative: bool) -> i64 {
    if relative {
        cursor.main().saturating_add(offset)
    } else {
        offset
    }
}

/// Reads `bytes` (1 to 4, 0 meaning 4) at `offset`, failing on a short read.
fn read_int(payload: &PayloadView<'_>, offset: i64, bytes: usize, endian: Endian) -> Option<u32> {
    let bytes = if bytes == 0 { 4 } else { bytes.min(4) };
    if payload.get_byte_array(offset, bytes, false).len() < bytes {
        return None;
    }
    Some(payload.get_int(offset, bytes, endian.flip()))
}

fn anchor(op: &Anchor, payload: &PayloadView<'_>, cursor: &mut Cursor) {
    let offset = if op.relative {
        cursor.main().saturating_add(op.offset)
    } else {
        op.position
            .map(|position| position.resolve(payload, cursor).saturating_add(op.offset))
            .unwrap_or(op.offset)
    };
    cursor.set(op.cursor, offset);
}

fn byte_jump(op: &ByteJump, payload: &PayloadView<'_>, cursor: &mut Cursor) -> bool {
    let offset = relative_to(cursor, op.offset, op.relative);
    let Some(length) = read_int(payload, offset, op.bytes, op.endian) else {
        return false;
    };
    let location = i64::from(length).saturating_add(op.post_offset);
    let target = if op.relative {
        cursor.main().saturating_add(location)
    } else {
        location
    };
    if target < 0 || target >= payload.size() as i64 {
        return false;
    }
    cursor.set_main(target);
    true
}

fn byte_test(op: &ByteTest, payload: &PayloadView<'_>, cursor: &mut Cursor) -> bool {
    let offset = relative_to(cursor, op.offset, op.relative);
    let Some(input) = read_int(payload, offset, op.bytes, op.endian) else {
        return false;
    };
    if op.post_offset != 0 {
        cursor.forward(op.post_offset);
    }
    op.test.check(i64::from(input), op.value)
}

fn match_bytes(op: &Match, matcher: &Matcher, payload: &PayloadView<'_>, cursor: &mut Cursor) -> bool {
    let offset = relative_to(cursor, op.offset, op.relative);
    if offset < 0 || offset >= payload.size() as i64 {
        return false;
    }
    let remaining = payload.size() - offset as usize;
    let length = if op.depth > 0 { op.depth.min(remaining) } else { remaining };

    let hit = match matcher {
        Matcher::Pattern(pattern) => {
            let window = payload.get_byte_array(offset, length, false);
            pattern
                .find(&window)
                .map(|hit| (offset + hit.start() as i64, offset + hit.end() as i64, offset + hit.end() as i64))
        }
        Matcher::Content(content) => payload.find_bytes(content, offset, length).map(|start| {
            let start = start as i64;
            (start, start + content.len() as i64, start)
        }),
    };

    match hit {
        Some((start, end, main)) => {
            if op.move_cursor {
                cursor.set_start(start);
                cursor.set_end(end);
            }
            cursor.set_main(main);
            true
        }
        None => false,
    }
}
