//! Session management: token exchange and project discovery.
//!
//! A `Session` starts anonymous, exchanges a personal or OAuth token
//! for an authenticated client via [`set_token`](Session::set_token),
//! and from there resolves and searches projects. Nothing here is a
//! process-wide global; callers construct a session and hand it the
//! stores it should use.

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{GitlabClient, ProjectQuery};
use crate::config::Config;
use crate::models::{Attributes, Project, User};
use crate::ROOT_URL;

use super::TokenStore;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not connected to the hosting service - set a token first")]
    NotConnected,

    #[error("'{0}' is not implemented")]
    NotImplemented(&'static str),
}

/// Where the session stands with the hosting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No token exchange attempted yet.
    Anonymous,
    /// The last token exchange succeeded.
    Authenticated,
    /// The last token exchange was rejected. Partial state (the client
    /// handle, the token) stays in place.
    Failed,
}

/// One connection to the hosting service, anonymous or authenticated.
pub struct Session {
    root_url: String,
    remember_me: bool,
    token: Option<String>,
    status: SessionStatus,
    user: Option<User>,
    client: Option<GitlabClient>,
    current_project: Option<Project>,
}

impl Session {
    /// New anonymous session against the public service.
    pub fn new(remember_me: bool) -> Self {
        Self::with_root_url(ROOT_URL, remember_me)
    }

    /// New anonymous session against a service rooted elsewhere
    /// (self-hosted instances, tests).
    pub fn with_root_url(root_url: impl Into<String>, remember_me: bool) -> Self {
        Self {
            root_url: root_url.into(),
            remember_me,
            token: None,
            status: SessionStatus::Anonymous,
            user: None,
            client: None,
            current_project: None,
        }
    }

    /// New session that exchanges `token` immediately.
    pub fn with_token(token: &str, remember_me: bool, tokens: &mut TokenStore) -> Result<Self> {
        let mut session = Self::new(remember_me);
        session.set_token(Some(token), tokens)?;
        Ok(session)
    }

    /// Exchange `token` for an authenticated connection.
    ///
    /// A missing or empty token leaves the session anonymous and touches
    /// nothing. Otherwise the token is traded for the account identity;
    /// on success with `remember_me` set, `username -> token` is recorded
    /// in the store and persisted. On failure the error propagates, the
    /// session reports `Failed`, and the client handle is left in place -
    /// callers must check `authenticated()` before proceeding.
    pub fn set_token(&mut self, token: Option<&str>, tokens: &mut TokenStore) -> Result<()> {
        let token = match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => token.to_owned(),
            None => {
                debug!("No token given, session stays anonymous");
                return Ok(());
            }
        };

        let client = GitlabClient::new(&self.root_url, Some(token.as_str()))?;
        let outcome = client.authenticate();
        // No rollback on failure: handle and token stay recorded.
        self.token = Some(token.clone());
        self.client = Some(client);

        match outcome {
            Ok(user) => {
                debug!(username = %user.username, "Token exchange succeeded");
                let username = user.username.clone();
                self.user = Some(user);
                self.status = SessionStatus::Authenticated;
                if self.remember_me {
                    tokens.insert(username, token);
                    tokens.save().context("Failed to persist token store")?;
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Token exchange failed");
                self.user = None;
                self.status = SessionStatus::Failed;
                Err(err.into())
            }
        }
    }

    /// True iff the last token exchange succeeded.
    pub fn authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Identity from the last successful exchange. Never touches the
    /// network.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Username from the last successful exchange.
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }

    /// The token currently held, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn remember_me(&self) -> bool {
        self.remember_me
    }

    pub fn set_remember_me(&mut self, remember_me: bool) {
        self.remember_me = remember_me;
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Project most recently opened through this session.
    pub fn current_project(&self) -> Option<&Project> {
        self.current_project.as_ref()
    }

    /// Resolve `id` and make it the session's current project.
    pub fn open_project(&mut self, id: &str) -> Result<Project> {
        let client = self.client()?;
        let project = Project::fetch(client.clone(), id)
            .with_context(|| format!("Failed to open project '{}'", id))?;
        self.current_project = Some(project.clone());
        Ok(project)
    }

    /// Resolve `id` into a project, or `Ok(None)` for an empty id -
    /// decided without touching the network. Remote resolution failures
    /// propagate.
    pub fn project_from_id(&self, id: &str) -> Result<Option<Project>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }
        let client = self.client()?;
        let project = Project::fetch(client.clone(), id)
            .with_context(|| format!("Failed to resolve project '{}'", id))?;
        Ok(Some(project))
    }

    /// Title search across the service's projects. Hits without a
    /// resolvable id are dropped; server order is kept. With `tags`
    /// non-empty, only projects whose tag list intersects are returned.
    pub fn find_projects(&self, search_str: &str, tags: &[&str]) -> Result<Vec<Project>> {
        let client = self.client()?;
        let mut projects = Vec::new();
        for bundle in client.projects(ProjectQuery::search(search_str)) {
            let bundle = bundle?;
            if bundle_id(&bundle).is_none() {
                debug!("Dropping search hit without id");
                continue;
            }
            if !tags.is_empty() && !has_any_tag(&bundle, tags) {
                continue;
            }
            projects.push(Project::from_attributes(client.clone(), bundle));
        }
        debug!(count = projects.len(), search = search_str, "Project search finished");
        Ok(projects)
    }

    /// All projects the user owns or is a member of - owned first, each
    /// exactly once.
    pub fn find_user_projects(&self) -> Result<Vec<Project>> {
        let client = self.client()?;
        let owned: Vec<Attributes> = client
            .projects(ProjectQuery::owned())
            .collect::<Result<_, _>>()?;
        let member: Vec<Attributes> = client
            .projects(ProjectQuery::membership())
            .collect::<Result<_, _>>()?;
        Ok(merge_unique_by_id(owned, member)
            .into_iter()
            .map(|bundle| Project::from_attributes(client.clone(), bundle))
            .collect())
    }

    /// Search the service's user directory.
    pub fn find_users(&self, search_str: &str) -> Result<Vec<User>> {
        Ok(self.client()?.users(search_str)?)
    }

    /// Not supported yet; projects are created through the web
    /// interface.
    pub fn create_project(
        &self,
        _title: &str,
        _description: &str,
        _tags: &[&str],
        _public: bool,
    ) -> Result<Project> {
        Err(SessionError::NotImplemented("create_project").into())
    }

    /// Not supported yet.
    pub fn apply_changes(&self) -> Result<()> {
        Err(SessionError::NotImplemented("apply_changes").into())
    }

    fn client(&self) -> Result<&GitlabClient, SessionError> {
        self.client.as_ref().ok_or(SessionError::NotConnected)
    }
}

/// Log in with either a raw token or the name of a user who has a
/// stored token, then record the user in the app preferences.
pub fn login(
    session: &mut Session,
    tokens: &mut TokenStore,
    config: &mut Config,
    token_or_username: &str,
    remember_me: bool,
) -> Result<()> {
    // A known username means "use that user's stored token".
    let token = match tokens.get(token_or_username) {
        Some(stored) => stored.to_owned(),
        None => token_or_username.to_owned(),
    };
    session.set_remember_me(remember_me);
    session.set_token(Some(&token), tokens)?;
    if let Some(username) = session.username() {
        config.last_user = Some(username.to_owned());
        config.save().context("Failed to record last logged-in user")?;
    }
    Ok(())
}

fn bundle_id(bundle: &Attributes) -> Option<u64> {
    bundle.get("id").and_then(Value::as_u64)
}

fn has_any_tag(bundle: &Attributes, tags: &[&str]) -> bool {
    bundle
        .get("tag_list")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .any(|tag| tags.contains(&tag))
        })
        .unwrap_or(false)
}

/// Merge two bundle listings, keeping the first occurrence of each id
/// and dropping bundles without one.
fn merge_unique_by_id(first: Vec<Attributes>, second: Vec<Attributes>) -> Vec<Attributes> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for bundle in first.into_iter().chain(second) {
        if let Some(id) = bundle_id(&bundle) {
            if seen.insert(id) {
                merged.push(bundle);
            }
        }
    }
    merged
}
