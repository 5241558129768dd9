//! Byte path: classify hosts from captured frames.
pub mod buffer;
pub mod cursor;
pub mod details;
pub mod filter;
pub mod packet;
pub mod payload;
pub mod processor;
pub mod rules;

pub use buffer::PayloadView;
pub use cursor::{Cursor, CursorMark};
pub use details::{Category, Direction, HostDetails, LateBindingMap, Role};
pub use filter::{Condition, FilterEngine, FunctionalOperation};
pub use packet::FilterData;
pub use processor::{load_packet_records, FingerprintProcessor, PacketRecord, PacketReport};
pub use rules::{load_fingerprints, Fingerprint};
