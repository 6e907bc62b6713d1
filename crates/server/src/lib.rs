//! Availability monitor and lookup cache for the SEFAZ fiscal document
//! services.
//!
//! Two core services share a persistence gateway and an outbound transport:
//! the [`monitor::StatusMonitor`] probes the SEFAZ status endpoint on a
//! recurring timer and records state transitions, and the
//! [`lookup::DocumentService`] answers 44-digit document lookups from the
//! database cache, falling back to the upstream query service on a miss.

pub mod api;
pub mod client;
pub mod config;
pub mod entity;
pub mod error;
pub mod lookup;
pub mod monitor;
pub mod parser;
pub mod response;
pub mod store;
pub mod validation;
