//! Agent module: one-time setup and the listen loop.

pub mod listen_loop;
pub mod setup;

pub use listen_loop::{ListenLoop, ListenStats};
pub use setup::{ProfileMarker, ProfileSetup, SetupOutcome};
