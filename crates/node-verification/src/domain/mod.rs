//! # Domain Layer
//!
//! Pure verification logic with no I/O dependencies: binary primitives,
//! chain parameters, signed-message recovery, tokens and the challenge model.

pub mod chain_params;
pub mod codec;
pub mod entities;
pub mod errors;
pub mod message_sign;
pub mod token;
