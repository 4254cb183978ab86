//! Core domain types
//!
//! These types describe one pipeline run and are shared between the runner
//! (which produces them), the notifiers (which render them) and the entry
//! points (which return them to callers).

pub mod log;
pub mod run;
pub mod step;
