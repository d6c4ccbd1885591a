//! DNS serving
//!
//! - [`responder`]: UDP responder answering A queries from the record store
//! - [`lifecycle`]: start/stop state machine shared with the hosts detector

pub mod lifecycle;
pub mod responder;

pub use lifecycle::ServiceState;
pub use responder::{ANSWER_TTL_SECS, DnsResponder, build_response};
