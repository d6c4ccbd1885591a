//! Hosts directory ingestion
//!
//! - [`parser`]: hosts file format, directory loading, snapshot diff
//! - [`detector`]: polling loop that applies deltas to the record store

pub mod detector;
pub mod parser;

pub use detector::{DETECTOR_SOURCE, DeltaCallback, HostsDetector};
pub use parser::{
    DeltaAction, HostDelta, HostsSnapshot, diff, load_directory, parse_hosts, parse_ipv4_literal,
};
