//! Channel abstraction for the inbound event stream.

pub mod channel;
pub mod envelope;
pub mod signal;

pub use channel::*;
pub use envelope::Envelope;
pub use signal::SignalCli;
