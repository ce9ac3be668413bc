//! REST API client module for the hosting service.
//!
//! This module provides the `GitlabClient` for communicating with the
//! GitLab v4 API behind Pavlovia.org: the authentication round-trip,
//! project fetch and listing, and user search.
//!
//! Bearer token authentication; the token comes from the service's
//! OAuth flow or a stored personal token.

pub mod client;
pub mod error;

pub use client::{GitlabClient, ProjectPages, ProjectQuery};
pub use error::ApiError;

/// Numeric access levels the service assigns to project members.
pub mod access {
    pub const GUEST: u64 = 10;
    pub const REPORTER: u64 = 20;
    pub const DEVELOPER: u64 = 30;
    pub const MAINTAINER: u64 = 30;
    pub const OWNER: u64 = 50;
}
