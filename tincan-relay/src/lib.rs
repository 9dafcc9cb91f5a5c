//! Media-blind signaling relay for tincan.
//!
//! Pairs waiting participants two at a time and shuttles their signaling
//! messages across; session descriptions and candidates pass through
//! verbatim and media never touches this process. The [`switchboard`] actor
//! holds all pairing and routing state and is driven purely by commands, so
//! it is testable without a socket in sight; [`ws_handler`] adapts axum
//! WebSocket connections onto it.

pub mod service;
pub mod switchboard;
pub mod ws_handler;

pub use service::RelayService;
pub use switchboard::{SwitchCommand, Switchboard};
pub use ws_handler::{stats_handler, ws_handler};
