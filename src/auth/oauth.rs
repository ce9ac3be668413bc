//! Authorization URL construction for the service's OAuth flow.
//!
//! The service uses the implicit grant: the user visits the
//! authorization URL in a browser and the token comes back in the
//! redirect fragment. This module only builds the URL; catching the
//! redirect is the caller's job.

use uuid::Uuid;

use crate::{CLIENT_ID, REDIRECT_URL, ROOT_URL};

/// Build the authorization URL for the public service.
///
/// Returns the URL plus the freshly generated `state` value so the
/// caller can verify it on the redirect.
pub fn auth_url() -> (String, String) {
    auth_url_for(ROOT_URL)
}

/// Build the authorization URL for a service rooted at `root_url`.
pub fn auth_url_for(root_url: &str) -> (String, String) {
    let state = Uuid::new_v4().to_string();
    let url = format!(
        "{}/oauth/authorize?client_id={}&redirect_uri={}&response_type=token&state={}",
        root_url.trim_end_matches('/'),
        CLIENT_ID,
        REDIRECT_URL,
        state
    );
    (url, state)
}
