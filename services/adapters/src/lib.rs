//! # Benchmark Service Adapters
//!
//! Thin HTTP clients for the services the harness drives besides the target
//! application itself:
//!
//! - **Bank** ([`BankClient`]): bank id registration and credit grants
//! - **Audit log** ([`AuditLogClient`]): per-run reset
//! - **Guest** ([`GuestClient`]): zero-identity application bootstrap
//!
//! Each client sits behind an async trait ([`BankService`],
//! [`AuditLogService`], [`ApplicationBootstrap`]) so the orchestrator can be
//! driven by in-memory doubles in tests.

pub mod audit_log;
pub mod bank;
pub mod error;
pub mod guest;
mod http;

pub use audit_log::{AuditLogClient, AuditLogService};
pub use bank::{BankClient, BankService};
pub use error::{AdapterError, Result};
pub use guest::{ApplicationBootstrap, BootstrapSettings, GuestClient};
