//! # Authentication Module
//!
//! Bearer-token plumbing for the source and destination connectors.
//!
//! ## Overview
//!
//! The migration engine never runs an OAuth flow itself. Hosts supply a
//! [`TokenSource`] (browser sign-in, device code, cached refresh token) and the
//! connectors consume a [`CredentialProvider`]. [`TokenManager`] sits between
//! the two, caching tokens and refreshing them before they expire.
//!
//! ## Features
//!
//! - Expiry-buffered token cache with serialized refresh
//! - Bounded acquisition time
//! - Re-authentication hook used after a provider rejects a token
//! - Redacted `Debug` output for every token-bearing type

pub mod credentials;
pub mod error;
pub mod types;

pub use credentials::{CredentialProvider, StaticCredential, TokenManager, TokenSource};
pub use error::{AuthError, Result};
pub use types::{OAuthTokens, ProviderKind};
