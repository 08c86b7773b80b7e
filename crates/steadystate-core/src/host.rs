//! Host-side view of one resource instance
//!
//! The host owns desired configuration and the persisted identity token.
//! `ResourceData` is what a lifecycle invocation receives: it reads desired
//! attributes from it and writes observed attributes back.

use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attribute record for one resource instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    resource_type: String,

    /// Identity token; `None` until created, cleared when gone
    id: Option<String>,

    /// Created during the current pass
    #[serde(skip)]
    is_new: bool,

    /// Desired and computed attributes
    attributes: Map<String, Value>,

    /// Attributes as of the last committed apply
    #[serde(default)]
    prior: Map<String, Value>,
}

impl ResourceData {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: None,
            is_new: false,
            attributes: Map::new(),
            prior: Map::new(),
        }
    }

    /// Desired attributes for an instance that does not exist yet
    pub fn with_attributes(resource_type: impl Into<String>, attributes: Map<String, Value>) -> Self {
        let mut data = Self::new(resource_type);
        data.attributes = attributes;
        data
    }

    /// Restore a previously committed instance
    pub fn from_state(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.into()),
            is_new: false,
            prior: attributes.clone(),
            attributes,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The identity token, or `MissingIdentity`
    pub fn require_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| CoreError::MissingIdentity {
            resource_type: self.resource_type.clone(),
        })
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Drop the instance from tracked state
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn mark_new(&mut self) {
        self.is_new = true;
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field).filter(|v| !v.is_null())
    }

    /// Required attribute
    pub fn get<T: DeserializeOwned>(&self, field: &str) -> Result<T> {
        self.get_opt(field)?.ok_or_else(|| {
            CoreError::validation(format!(
                "{}: missing required attribute \"{}\"",
                self.resource_type, field
            ))
        })
    }

    /// Optional attribute; `null` counts as absent
    pub fn get_opt<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>> {
        match self.raw(field) {
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                CoreError::validation(format!(
                    "{}: attribute \"{}\": {}",
                    self.resource_type, field, e
                ))
            }),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&mut self, field: &str, value: T) -> Result<()> {
        self.attributes
            .insert(field.to_string(), serde_json::to_value(value)?);
        Ok(())
    }

    /// Merge new desired values over the current attributes
    pub fn merge(&mut self, changes: Map<String, Value>) {
        for (field, value) in changes {
            self.attributes.insert(field, value);
        }
    }

    /// Whether `field` differs from the last committed value
    pub fn has_change(&self, field: &str) -> bool {
        let current = self.attributes.get(field).filter(|v| !v.is_null());
        let prior = self.prior.get(field).filter(|v| !v.is_null());
        current != prior
    }

    pub fn has_changes(&self, fields: &[&str]) -> bool {
        fields.iter().any(|f| self.has_change(f))
    }

    /// Record the current attributes as applied
    pub fn commit(&mut self) {
        self.prior = self.attributes.clone();
        self.is_new = false;
    }
}

/// Severity of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One structured message returned to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Operation, resource type and identity
    pub summary: String,

    pub detail: String,

    /// The host may retry the invocation later
    pub retryable: bool,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, err: &CoreError) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: err.to_string(),
            retryable: err.is_retryable(),
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            retryable: false,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.summary, self.detail)
    }
}

/// Diagnostics for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn has_error(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn is_retryable(&self) -> bool {
        self.0
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .all(|d| d.retryable)
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_get_and_set() {
        let mut data = ResourceData::with_attributes(
            "connect_rule",
            attrs(json!({"name": "r1", "publish_status": null})),
        );

        assert_eq!(data.get::<String>("name").unwrap(), "r1");
        assert_eq!(data.get_opt::<String>("publish_status").unwrap(), None);
        assert!(data.get::<String>("function").is_err());

        data.set("rule_arn", "arn:rule/1").unwrap();
        assert_eq!(data.get::<String>("rule_arn").unwrap(), "arn:rule/1");
    }

    #[test]
    fn test_type_mismatch_is_validation_error() {
        let data = ResourceData::with_attributes("connect_rule", attrs(json!({"name": 7})));
        let err = data.get::<String>("name").unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn test_has_change_against_committed() {
        let mut data = ResourceData::from_state(
            "connect_rule",
            "inst-1,rule-1",
            attrs(json!({"name": "r1", "function": "f()"})),
        );
        assert!(!data.has_change("name"));

        data.merge(attrs(json!({"name": "r2"})));
        assert!(data.has_change("name"));
        assert!(!data.has_change("function"));
        assert!(data.has_changes(&["function", "name"]));

        data.commit();
        assert!(!data.has_change("name"));
    }

    #[test]
    fn test_identity_lifecycle() {
        let mut data = ResourceData::new("connect_approved_origin");
        assert!(matches!(
            data.require_id(),
            Err(CoreError::MissingIdentity { .. })
        ));

        data.set_id("inst-1,origin-A");
        data.mark_new();
        assert_eq!(data.id(), Some("inst-1,origin-A"));
        assert!(data.is_new());

        data.commit();
        assert!(!data.is_new());

        data.clear_id();
        assert!(data.id().is_none());
    }

    #[test]
    fn test_diagnostics_retryable() {
        let not_stable = CoreError::NotStable {
            key: "k".to_string(),
            elapsed: std::time::Duration::from_secs(1),
            polls: 2,
            last_observed: Some("x".to_string()),
        };
        let diags = Diagnostics::from(Diagnostic::error("update connect_rule (k)", &not_stable));
        assert!(diags.has_error());
        assert!(diags.is_retryable());
        assert!(diags.to_string().starts_with("update connect_rule (k): "));
    }
}
