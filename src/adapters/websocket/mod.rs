//! WebSocket adapter for room connections.
//!
//! ```text
//!  GET /ws ──► handler ──(checks, admit)──► upgrade
//!                                             │
//!                                             ▼
//!                                      run_connection
//!                              ┌──────────────┴──────────────┐
//!                         inbound_pump                 outbound_pump
//!                       client ──► bus              bus ──► client (+ pings)
//!                              └──── one CancellationToken ────┘
//!                                             │
//!                                             ▼
//!                                  teardown (LEAVE, deregister)
//! ```
//!
//! - [`handler`] - upgrade handler and pre-upgrade rejections
//! - [`connection`] - runs the pump pair for one session
//! - [`pump`] - inbound and outbound pumps

pub mod connection;
pub mod handler;
pub mod pump;

pub use connection::run_connection;
pub use handler::{ws_handler, ConnectParams, RelayState};
pub use pump::{inbound_pump, outbound_pump, PumpExit};
