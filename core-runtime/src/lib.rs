//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the migration engine:
//! - Logging and tracing infrastructure
//! - Migration configuration with fail-fast validation
//! - Progress events over a bounded channel
//!
//! ## Overview
//!
//! Every other crate in the workspace depends on this one for its
//! configuration type, its logging conventions and the event vocabulary the
//! host UI consumes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::MigrationConfig;
pub use error::{Error, Result};
pub use events::{progress_channel, MigrationEvent, ProgressReceiver, ProgressSender, RunSummary};
