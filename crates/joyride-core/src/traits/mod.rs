//! Core traits for the Joyride DNS service
//!
//! - [`EventPublisher`]: the handle producers hold to reach the event bus

pub mod event_publisher;

pub use event_publisher::EventPublisher;
