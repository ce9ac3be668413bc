use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::api::{ApiError, GitlabClient};

/// Raw attribute bundle for one remote project, exactly as the hosting
/// service returned it.
pub type Attributes = Map<String, Value>;

/// Lookup failed in every source consulted for a project attribute.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no attribute '{field}' in {project}")]
pub struct UnknownAttribute {
    pub field: String,
    /// "project <id>", or a placeholder when the bundle carries no id.
    pub project: String,
}

/// Read-mostly view over one remote project.
///
/// Wraps the attribute bundle fetched from the hosting service plus any
/// instance-local overrides. Lookups never go back to the network; the
/// retained client handle is the one that fetched the bundle and is only
/// used again on an explicit [`refresh`](Self::refresh).
#[derive(Clone)]
pub struct Project {
    client: GitlabClient,
    attrs: Attributes,
    overrides: BTreeMap<String, Value>,
}

impl Project {
    /// Wrap an already-fetched attribute bundle.
    pub fn from_attributes(client: GitlabClient, attrs: Attributes) -> Self {
        Self {
            client,
            attrs,
            overrides: BTreeMap::new(),
        }
    }

    /// Fetch the bundle for `id` (numeric, or a `namespace/project` path)
    /// and wrap it. Resolution failures propagate to the caller.
    pub fn fetch(client: GitlabClient, id: &str) -> Result<Self, ApiError> {
        let attrs = client.project(id)?;
        Ok(Self::from_attributes(client, attrs))
    }

    /// Re-fetch the bundle through the handle that created this view.
    /// Instance-local overrides are kept.
    pub fn refresh(&mut self) -> Result<(), ApiError> {
        let id = match self.id() {
            Some(id) => id.to_string(),
            None => {
                return Err(ApiError::NotFound(
                    "project has no id to refresh by".to_string(),
                ))
            }
        };
        self.attrs = self.client.project(&id)?;
        Ok(())
    }

    /// Numeric project id. `None` means the project was never resolved;
    /// ids are immutable once the bundle carries one.
    pub fn id(&self) -> Option<u64> {
        self.attrs.get("id").and_then(Value::as_u64)
    }

    /// Look up an attribute: instance-local overrides first, then the raw
    /// bundle, then the bundle's `attributes` sub-object if present.
    pub fn attribute(&self, name: &str) -> Result<&Value, UnknownAttribute> {
        if let Some(value) = self.overrides.get(name) {
            return Ok(value);
        }
        if let Some(value) = self.attrs.get(name) {
            return Ok(value);
        }
        if let Some(value) = self
            .attrs
            .get("attributes")
            .and_then(Value::as_object)
            .and_then(|nested| nested.get(name))
        {
            return Ok(value);
        }
        Err(self.unknown(name))
    }

    /// Set an instance-local value, shadowing the fetched bundle.
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.overrides.insert(name.into(), value);
    }

    /// The raw bundle, exactly as fetched.
    pub fn attributes(&self) -> &Attributes {
        &self.attrs
    }

    /// Project title (the service calls this `name`).
    pub fn title(&self) -> Result<String, UnknownAttribute> {
        self.attribute("name")?
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| self.unknown("name"))
    }

    /// Project tags (the service calls this `tag_list`).
    pub fn tags(&self) -> Result<Vec<String>, UnknownAttribute> {
        let items = self
            .attribute("tag_list")?
            .as_array()
            .ok_or_else(|| self.unknown("tag_list"))?;
        Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect())
    }

    /// Owning account name: the owner's username when the bundle has an
    /// `owner` object, else the namespace name.
    pub fn owner(&self) -> Result<String, UnknownAttribute> {
        let from_owner = self
            .attrs
            .get("owner")
            .and_then(Value::as_object)
            .and_then(|owner| owner.get("username"))
            .and_then(Value::as_str);
        let from_namespace = self
            .attrs
            .get("namespace")
            .and_then(Value::as_object)
            .and_then(|namespace| namespace.get("name"))
            .and_then(Value::as_str);
        from_owner
            .or(from_namespace)
            .map(str::to_owned)
            .ok_or_else(|| self.unknown("owner"))
    }

    fn unknown(&self, field: &str) -> UnknownAttribute {
        UnknownAttribute {
            field: field.to_string(),
            project: self.label(),
        }
    }

    fn label(&self) -> String {
        match self.id() {
            Some(id) => format!("project {}", id),
            None => "unresolved project".to_string(),
        }
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("id", &self.id())
            .field("attributes", &self.attrs.len())
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
