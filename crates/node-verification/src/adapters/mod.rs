//! # Adapters Layer
//!
//! Implementations of the outbound ports.
//!
//! - `doh`: DNS-over-HTTPS resolver (reqwest)
//! - `memory`: in-memory challenge store, node registry and observations
//! - `time`: system and manually driven clocks

pub mod doh;
pub mod memory;
pub mod time;

pub use doh::DohResolver;
pub use memory::{InMemoryChallengeStore, InMemoryNodeRegistry, StaticPeerObservations};
pub use time::{ManualTimeSource, SystemTimeSource};
