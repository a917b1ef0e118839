//! # Node Verification Service
//!
//! Implements [`NodeVerificationApi`](crate::ports::inbound::NodeVerificationApi):
//! challenge creation, proof parsing, dispatch to the method's verifier and
//! the forward-only `pending → verified | failed | expired` state machine.
//!
//! Every terminal write is conditioned on the record still being pending, so
//! concurrent completions of one challenge produce exactly one transition.

mod api;
mod core;

pub use self::core::{NodeVerificationService, ServiceBuildError, ServicePorts};

#[cfg(test)]
mod tests;
