//! Join-verification pipeline.
//!
//! Every detected join request flows through, in order:
//! 1. Hidden-number check: no visible number means a privacy warning
//! 2. Carrier check: a definite non-mobile line is rejected
//! 3. Area-code routing: verified group or unverified holding group
//!
//! Each branch sends exactly one message and performs at most one group move.

pub mod messages;
pub mod processor;
pub mod rules;
pub mod types;

pub use processor::JoinPipeline;
pub use types::{JoinRequest, Verdict};
