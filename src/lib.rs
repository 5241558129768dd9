//! Host fingerprinting from captured packets, and device import from vendor command dumps.
//!
//! - [fingerprint] - filter engine, payload operations and host details
//! - [import] - trait trees, topology and the Cisco show-command parsers
pub mod error;
pub mod fingerprint;
pub mod import;
pub mod ui;
