//! Marks into a payload used by the payload operations.
use serde::{Deserialize, Serialize};

/// Three offsets into a payload: a start mark (`a`), an end mark (`b`) and the main mark.
///
/// Offsets are signed since anchors relative to the end of a payload can point before it; any
/// read through such an offset comes back empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    a: i64,
    b: i64,
    main: i64,
}

/// Which mark of a [Cursor] an operation addresses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorMark {
    Start,
    #[default]
    Main,
    End,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn start(&self) -> i64 {
        self.a
    }

    pub fn end(&self) -> i64 {
        self.b
    }

    pub fn main(&self) -> i64 {
        self.main
    }

    pub fn set_start(&mut self, offset: i64) {
        self.a = offset;
    }

    pub fn set_end(&mut self, offset: i64) {
        self.b = offset;
    }

    pub fn set_main(&mut self, offset: i64) {
        self.main = offset;
    }

    /// Moves the main mark by `by` bytes.
    pub fn forward(&mut self, by: i64) {
        self.main = self.main.saturating_add(by);
    }

    pub fn get(&self, mark: CursorMark) -> i64 {
        match mark {
            CursorMark::Start => self.a,
            CursorMark::Main => self.main,
            CursorMark::End => self.b,
        }
    }

    pub fn set(&mut self, mark: CursorMark, offset: i64) {
        match mark {
            CursorMark::Start => self.a = offset,
            CursorMark::Main => self.main = offset,
            CursorMark::End => self.b = offset,
        }
    }
}
