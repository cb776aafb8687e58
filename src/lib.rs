//! Connection lifecycle and command dispatch for the dispatch daemon.
//!
//! [`protocol`] parses one text message into a command, [`dispatch`] routes
//! it to the fixed handler set, and [`server`] owns the listener loop and
//! the per-connection sessions. [`config`] and [`logging`] supply the
//! configuration and diagnostics around them.

pub mod config;
pub mod dispatch;
pub mod logging;
pub mod protocol;
pub mod server;
