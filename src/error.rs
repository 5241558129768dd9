//! Error types shared by the fingerprinting and import halves of the crate.
//!
//! - [`TraitError`] - contract violations on a [`TraitMap`](crate::import::TraitMap)
//! - [`ImportError`] - failures while splitting or parsing vendor dumps
//! - [`RuleError`] - failures while loading fingerprint rules
use std::path::PathBuf;
use thiserror::Error;

use crate::import::Trait;

/// Misuse of the typed trait tree. These are programmer errors and are never retried.
#[derive(Error, Debug)]
pub enum TraitError {
    #[error("Trait {key:?} expects {expected}, found {found}")]
    TypeMismatch {
        key: Trait,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Cannot branch on existing vector {0:?}")]
    BranchExists(Trait),

    #[error("Trait {0:?} has no parse method")]
    NoParseMethod(Trait),

    #[error("Trait {key:?} cannot parse '{input}': {reason}")]
    Parse {
        key: Trait,
        input: String,
        reason: String,
    },
}

/// Errors raised while importing a vendor command dump.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot process duplicate commands, \"{0}\"")]
    DuplicateCommand(String),

    #[error("Could not determine device-name within file \"{}\"", .0.display())]
    NoDeviceName(PathBuf),

    #[error("Could not recognize commands within \"{}\"", .0.display())]
    NoCommands(PathBuf),

    #[error("Cannot parse address '{0}'")]
    UnsupportedAddress(String),

    #[error("Expected 2 or more module slots in '{0}'")]
    ModuleConfig(String),

    #[error(transparent)]
    Trait(#[from] TraitError),
}

/// Errors raised while loading fingerprint rule documents.
#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Malformed rule document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Bad hex content: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Range {min}..={max} of {field} is empty")]
    InvalidRange {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("Unknown TCP flag '{0}'")]
    UnknownFlag(String),

    #[error("Filter of '{fingerprint}' feeds unknown payload '{payload}'")]
    UnknownPayload {
        fingerprint: String,
        payload: String,
    },

    #[error("Match in '{fingerprint}/{payload}' has neither pattern nor content")]
    EmptyMatch {
        fingerprint: String,
        payload: String,
    },
}
