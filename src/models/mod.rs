//! Data models for hosting-service entities.
//!
//! This module contains the structures returned by discovery and
//! authentication:
//!
//! - `Project`: read-mostly view over one remote project's attributes
//! - `User`: account identity from the auth round-trip and user search

pub mod project;
pub mod user;

pub use project::{Attributes, Project, UnknownAttribute};
pub use user::User;
