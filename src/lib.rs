//! Client library for the Pavlovia.org project-hosting service.
//!
//! Pavlovia hosts behavioural-experiment projects on a GitLab instance;
//! this crate covers the non-Git half of talking to it: exchanging an
//! auth token for a session, remembering tokens per user, and finding
//! or opening projects.
//!
//! ```no_run
//! use pavlovia::{Session, TokenStore};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut tokens = TokenStore::open_default()?;
//!     let mut session = Session::new(true);
//!     session.set_token(Some("your-token"), &mut tokens)?;
//!     for project in session.find_user_projects()? {
//!         println!("{:?}: {}", project.id(), project.title()?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Everything is blocking; there is no runtime to set up. Git operations
//! on the hosted repositories are out of scope.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiError, GitlabClient, ProjectPages, ProjectQuery};
pub use auth::{auth_url, auth_url_for, login, Session, SessionError, SessionStatus, TokenStore};
pub use config::Config;
pub use models::{Attributes, Project, UnknownAttribute, User};

/// Root URL of the public service.
pub const ROOT_URL: &str = "https://gitlab.pavlovia.org";

/// OAuth application id registered with the service.
pub const CLIENT_ID: &str = "4bb79f0356a566cd7b49e3130c714d9140f1d3de4ff27c7583fb34fbfac604e0";

/// Where the authorization flow redirects with the token in the fragment.
pub const REDIRECT_URL: &str = "https://gitlab.pavlovia.org/";
