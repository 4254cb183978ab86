//! ReviewFlow Core
//!
//! Core types for the ReviewFlow data pipeline.
//!
//! This crate contains:
//! - Domain types: the run record and its step results
//! - DTOs: payloads exchanged with the entry points and notification channels

pub mod domain;
pub mod dto;
