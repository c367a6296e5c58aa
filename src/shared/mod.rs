//! Modules used by both ends of the wire
//!
//! The server and the sender agree on the protocol constants, the transport
//! configuration value and the persisted settings defined here.

pub mod config;
pub mod protocol;
pub mod sender;
pub mod transport;
