//! # cmdb-observability
//!
//! Logging and audit infrastructure for the CMDB broker.
//!
//! This crate provides structured logging with tracing and the compliance
//! trail written after every change-management decision.
//!
//! ## Change-management audit
//!
//! Each record carries:
//! - The full decision request and the oracle's verdict
//! - The oracle instance, mode and disable flags taken from its arguments
//! - Whether production `ready` entities were in the blast radius

pub mod audit;
pub mod logging;

pub use audit::{ChangeAuditLog, ChangeAuditRecord, OracleFlags, CHANGE_AUDIT_TARGET};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
