//! # Ports Layer
//!
//! Inbound (driving) and outbound (driven) interfaces of the engine.

pub mod inbound;
pub mod outbound;
