//! Shared data model for the tincan signaling protocol.
//!
//! Pure types only: identifiers, roles, the signaling message union and its
//! payloads. Both the client session core and the relay depend on this crate;
//! neither gets any I/O or negotiation logic from it.

pub mod model;

pub use model::*;
