//! # OneDrive Provider
//!
//! Implements `UploadDestination` for the Microsoft Graph API (OneDrive).
//!
//! ## Overview
//!
//! This module provides:
//! - Path-addressed item lookup and folder creation
//! - Single-request uploads for small payloads
//! - Resumable upload sessions with `Content-Range` chunk submission
//! - Mapping of Graph errors onto the transfer error taxonomy

pub mod connector;
pub mod error;
pub mod types;

pub use connector::OneDriveConnector;
pub use error::{OneDriveError, Result};
