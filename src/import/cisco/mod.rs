//! Cisco IOS terminal dumps: one file holding the output of several `show` commands.
pub mod arp;
pub mod interfaces;
pub mod mac_table;
pub mod reader;
pub mod registry;
pub mod running_config;
pub mod splitter;
pub mod text;
pub mod version;

pub use reader::CiscoReader;
pub use registry::{CommandRegistry, Lookup, MacTableLayout, ParserKind};
pub use splitter::{CommandSplitter, SplitterOptions};
