//! Filters for CI and relationship searches.
//!
//! Filters are plain values built either fluently or from string parameters
//! (as they arrive on a query string). The store evaluates them under its
//! locks; see [`Cmdb::find_cis`](crate::Cmdb::find_cis) and
//! [`Cmdb::find_relationships`](crate::Cmdb::find_relationships).

use crate::error::{CmdbError, Result};
use crate::model::{Ci, Relationship};
use std::collections::HashMap;

/// Equality filter over CI fields plus a required-properties list.
///
/// Every criterion that is set must match. An empty filter matches every CI.
///
/// # Examples
///
/// ```
/// use cmdb::CiFilter;
///
/// let filter = CiFilter::new().ci_type("Server").has_property("os");
/// assert_eq!(filter.required_properties(), &["os".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiFilter {
    id: Option<String>,
    name: Option<String>,
    ci_type: Option<String>,
    level: Option<usize>,
    has_props: Vec<String>,
}

impl CiFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require an exact id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Require an exact name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Require an exact type.
    pub fn ci_type(mut self, ci_type: impl Into<String>) -> Self {
        self.ci_type = Some(ci_type.into());
        self
    }

    /// Require a level index.
    pub fn level(mut self, level: usize) -> Self {
        self.level = Some(level);
        self
    }

    /// Require that the CI carries this property.
    pub fn has_property(mut self, key: impl Into<String>) -> Self {
        self.has_props.push(key.into());
        self
    }

    /// Build a filter from string parameters.
    ///
    /// Recognized keys are `id`, `name`, `type`, `level` and `has_props`
    /// (comma-separated property names, already URL-decoded). Other keys are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Validation`] if `level` is not a non-negative integer.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let level = match params.get("level") {
            None => None,
            Some(raw) => Some(raw.trim().parse::<usize>().map_err(|_| {
                CmdbError::validation(format!("level must be a non-negative integer, got '{raw}'"))
            })?),
        };

        let has_props = params
            .get("has_props")
            .map(|raw| split_names(raw))
            .unwrap_or_default();

        Ok(Self {
            id: params.get("id").cloned(),
            name: params.get("name").cloned(),
            ci_type: params.get("type").cloned(),
            level,
            has_props,
        })
    }

    /// Property names every match must carry.
    pub fn required_properties(&self) -> &[String] {
        &self.has_props
    }

    /// Whether no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.name.is_none()
            && self.ci_type.is_none()
            && self.level.is_none()
            && self.has_props.is_empty()
    }

    /// Evaluate the equality criteria against a CI.
    ///
    /// Required properties are checked too, so this is correct on its own; the
    /// store narrows candidates through its property index first.
    pub fn matches(&self, ci: &Ci) -> bool {
        self.id.as_deref().map_or(true, |id| ci.id() == id)
            && self.name.as_deref().map_or(true, |name| ci.name() == name)
            && self.ci_type.as_deref().map_or(true, |t| ci.ci_type() == t)
            && self.level.map_or(true, |level| ci.level() == level)
            && self.has_props.iter().all(|key| ci.has_property(key))
    }
}

/// Filter over relationship endpoints and type.
///
/// Unset criteria and the `"*"` wildcard match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipFilter {
    source: Option<String>,
    destination: Option<String>,
    rel_type: Option<String>,
}

impl RelationshipFilter {
    /// Create a filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a source id.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Require a destination id.
    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Require a relationship type.
    pub fn rel_type(mut self, rel_type: impl Into<String>) -> Self {
        self.rel_type = Some(rel_type.into());
        self
    }

    /// Build a filter from `source`, `destination` and `type` parameters.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            source: params.get("source").cloned(),
            destination: params.get("destination").cloned(),
            rel_type: params.get("type").cloned(),
        }
    }

    /// Requested source id, if any.
    pub fn source_id(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Requested destination id, if any.
    pub fn destination_id(&self) -> Option<&str> {
        self.destination.as_deref()
    }

    /// Whether neither endpoint is constrained.
    pub fn has_no_endpoint(&self) -> bool {
        self.source.is_none() && self.destination.is_none()
    }

    /// Evaluate the filter against a relationship.
    pub fn matches(&self, relationship: &Relationship) -> bool {
        relationship.matches(
            self.source.as_deref(),
            self.destination.as_deref(),
            self.rel_type.as_deref(),
        )
    }
}

/// Split a comma-separated list of names, trimming blanks and dropping empties.
pub fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
