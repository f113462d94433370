//! localis: a Signal bot that verifies join requests and routes members.

pub mod actions;
pub mod agent;
pub mod carrier;
pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
