//! API client for communicating with the hosting service's REST API.
//!
//! This module provides the `GitlabClient` struct for making
//! authenticated requests against the v4 endpoints the session layer
//! needs: the authentication round-trip, project fetch and listing, and
//! user search.

use std::borrow::Cow;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::models::{Attributes, User};

use super::ApiError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Projects requested per listing page.
const PROJECTS_PER_PAGE: u32 = 50;

/// Response header carrying the next page number; empty on the last page.
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// Filters for the projects listing.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub owned: bool,
    pub membership: bool,
    pub simple: bool,
}

impl ProjectQuery {
    /// Title search across all visible projects.
    pub fn search(text: &str) -> Self {
        Self {
            search: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Projects owned by the authenticated user.
    pub fn owned() -> Self {
        Self {
            owned: true,
            ..Self::default()
        }
    }

    /// Projects the authenticated user is a member of.
    pub fn membership() -> Self {
        Self {
            membership: true,
            ..Self::default()
        }
    }

    fn params(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", page.to_string()),
            ("per_page", PROJECTS_PER_PAGE.to_string()),
        ];
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if self.owned {
            params.push(("owned", "true".to_string()));
        }
        if self.membership {
            params.push(("membership", "true".to_string()));
        }
        if self.simple {
            params.push(("simple", "true".to_string()));
        }
        params
    }
}

/// Client for the hosting service's v4 REST API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct GitlabClient {
    client: Client,
    root_url: String,
    token: Option<String>,
}

impl GitlabClient {
    /// Create a client for the service at `root_url`, optionally carrying
    /// a bearer token for authenticated requests.
    pub fn new(root_url: &str, token: Option<&str>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            root_url: root_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_owned),
        })
    }

    /// Exchange the held token for the account identity (`GET /user`).
    /// A rejected token surfaces as `ApiError::Unauthorized`.
    pub fn authenticate(&self) -> Result<User, ApiError> {
        debug!(root = %self.root_url, "Authenticating with hosting service");
        self.get_json(&self.endpoint("user"), &[])
    }

    /// Fetch one project's attribute bundle by numeric id or
    /// `namespace/project` path.
    pub fn project(&self, id: &str) -> Result<Attributes, ApiError> {
        let url = self.endpoint(&format!("projects/{}", encode_project_id(id)));
        self.get_json(&url, &[])
    }

    /// Lazy iterator over the paginated projects listing.
    pub fn projects(&self, query: ProjectQuery) -> ProjectPages<'_> {
        ProjectPages {
            client: self,
            query,
            next_page: Some(1),
            current: Vec::new().into_iter(),
        }
    }

    /// Search the user directory.
    pub fn users(&self, search: &str) -> Result<Vec<User>, ApiError> {
        self.get_json(&self.endpoint("users"), &[("search", search.to_string())])
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v4/{}", self.root_url, path)
    }

    fn request(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ApiError> {
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send()?;
        Self::check_response(response)
    }

    /// Check if a response is successful, returning an error with body if not.
    fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.request(url, query)?;
        response.json().map_err(|err| {
            ApiError::InvalidResponse(format!("failed to decode response from {}: {}", url, err))
        })
    }

    /// Fetch one listing page, returning the bundles plus the next page
    /// number the server advertised.
    fn projects_page(
        &self,
        query: &ProjectQuery,
        page: u32,
    ) -> Result<(Vec<Attributes>, Option<u32>), ApiError> {
        let response = self.request(&self.endpoint("projects"), &query.params(page))?;
        let next_page = response
            .headers()
            .get(NEXT_PAGE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok());
        let items: Vec<Attributes> = response.json().map_err(|err| {
            ApiError::InvalidResponse(format!("failed to decode project page {}: {}", page, err))
        })?;
        debug!(page, count = items.len(), "Fetched project page");
        Ok((items, next_page))
    }
}

/// Lazy iterator over the projects listing.
///
/// Pages are fetched on demand, following the `x-next-page` response
/// header until it runs out. A page-fetch error is yielded once and ends
/// the iteration.
pub struct ProjectPages<'a> {
    client: &'a GitlabClient,
    query: ProjectQuery,
    next_page: Option<u32>,
    current: std::vec::IntoIter<Attributes>,
}

impl Iterator for ProjectPages<'_> {
    type Item = Result<Attributes, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(attrs) = self.current.next() {
                return Some(Ok(attrs));
            }
            let page = self.next_page?;
            match self.client.projects_page(&self.query, page) {
                Ok((items, next_page)) => {
                    self.next_page = next_page;
                    self.current = items.into_iter();
                }
                Err(err) => {
                    self.next_page = None;
                    return Some(Err(err));
                }
            }
        }
    }
}

/// Path-style ids ("namespace/project") must travel as a single URL
/// segment; numeric ids pass through unchanged.
fn encode_project_id(id: &str) -> Cow<'_, str> {
    urlencoding::encode(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn test_authenticate_returns_user_identity() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/user")
                .header("authorization", "Bearer tok-123");
            then.status(200)
                .json_body(json!({"id": 5, "username": "jsmith", "name": "Jane Smith"}));
        });

        let client = GitlabClient::new(&server.base_url(), Some("tok-123")).unwrap();
        let user = client.authenticate().unwrap();

        mock.assert();
        assert_eq!(user.id, 5);
        assert_eq!(user.username, "jsmith");
    }

    #[test]
    fn test_rejected_token_maps_to_unauthorized() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/user");
            then.status(401).body(r#"{"message":"401 Unauthorized"}"#);
        });

        let client = GitlabClient::new(&server.base_url(), Some("bad-token")).unwrap();
        let err = client.authenticate().unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[test]
    fn test_projects_follow_next_page_header() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/projects")
                .query_param("page", "1");
            then.status(200)
                .header(NEXT_PAGE_HEADER, "2")
                .json_body(json!([{"id": 1}, {"id": 2}]));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/projects")
                .query_param("page", "2");
            then.status(200)
                .header(NEXT_PAGE_HEADER, "")
                .json_body(json!([{"id": 3}]));
        });

        let client = GitlabClient::new(&server.base_url(), None).unwrap();
        let bundles: Vec<Attributes> = client
            .projects(ProjectQuery::default())
            .collect::<Result<_, _>>()
            .unwrap();

        first.assert();
        second.assert();
        let ids: Vec<u64> = bundles
            .iter()
            .filter_map(|attrs| attrs.get("id").and_then(Value::as_u64))
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_page_error_is_yielded_once_then_iteration_ends() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/projects");
            then.status(500).body("boom");
        });

        let client = GitlabClient::new(&server.base_url(), None).unwrap();
        let mut pages = client.projects(ProjectQuery::default());

        assert!(matches!(pages.next(), Some(Err(ApiError::ServerError(_)))));
        assert!(pages.next().is_none());
    }

    #[test]
    fn test_project_fetch_by_numeric_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/v4/projects/42");
            then.status(200)
                .json_body(json!({"id": 42, "name": "Study1"}));
        });

        let client = GitlabClient::new(&server.base_url(), None).unwrap();
        let attrs = client.project("42").unwrap();

        mock.assert();
        assert_eq!(attrs.get("name").and_then(Value::as_str), Some("Study1"));
    }

    #[test]
    fn test_unknown_project_maps_to_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v4/projects/9999");
            then.status(404).body(r#"{"message":"404 Project Not Found"}"#);
        });

        let client = GitlabClient::new(&server.base_url(), None).unwrap();
        assert!(matches!(client.project("9999"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_path_ids_travel_as_one_segment() {
        assert_eq!(encode_project_id("42"), "42");
        assert_eq!(encode_project_id("jane/study1"), "jane%2Fstudy1");
        assert_eq!(encode_project_id("lab group/demo"), "lab%20group%2Fdemo");
    }

    #[test]
    fn test_users_search_sends_parameter() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v4/users")
                .query_param("search", "smith");
            then.status(200)
                .json_body(json!([{"id": 1, "username": "jsmith"}]));
        });

        let client = GitlabClient::new(&server.base_url(), None).unwrap();
        let users = client.users("smith").unwrap();

        mock.assert();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "jsmith");
    }
}
