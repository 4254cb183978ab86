//! Data Transfer Objects
//!
//! Payloads exchanged with callers of the entry points and with the
//! external notification channels.

pub mod notification;
pub mod run;
