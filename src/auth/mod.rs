//! Authentication module for sessions and stored credentials.
//!
//! This module provides:
//! - `Session`: one anonymous-or-authenticated connection to the service
//! - `TokenStore`: username -> token persistence in a JSON file
//! - `auth_url`: authorization URL construction for the OAuth flow
//!
//! Tokens never expire on our side; the service revokes them.

pub mod oauth;
pub mod session;
pub mod token_store;

pub use oauth::{auth_url, auth_url_for};
pub use session::{login, Session, SessionError, SessionStatus};
pub use token_store::TokenStore;
