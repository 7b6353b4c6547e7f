//! # Google Drive Provider
//!
//! Implements `RemoteTreeSource` for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing of the whole drive (trashed items excluded)
//! - Streaming downloads of binary files
//! - Export of Docs, Sheets and Slides to office formats
//! - Form structure retrieval through the Forms API
//! - Mapping of Drive error reasons onto the transfer error taxonomy

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{GoogleDriveConnector, FOLDER_MIME_TYPE};
pub use error::{GoogleDriveError, Result};
