//! Terminal and JSON rendering for the command line.
pub mod output;
