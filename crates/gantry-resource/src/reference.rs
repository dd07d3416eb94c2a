//! Resource identity: URNs and references to custom or component resources.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Globally unique resource name.
///
/// The URN is treated as an opaque string; the plugin protocol never parses
/// it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Urn(String);

impl Urn {
    /// Wraps a URN string.
    #[must_use]
    pub fn new(urn: impl Into<String>) -> Self {
        Self(urn.into())
    }

    /// Returns the URN text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the URN, returning its text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Urn {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Provider-assigned identity of a custom resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReferenceId {
    /// The ID has been assigned.
    Known(String),
    /// The resource exists but its ID is not yet known (e.g. during preview).
    Unknown,
}

/// Reference to another resource.
///
/// A reference with an [`id`](Self::id) refers to a custom resource; a
/// reference without one refers to a component resource. An ID that is
/// present but [`ReferenceId::Unknown`] is distinct from an absent ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceReference {
    /// URN of the referenced resource.
    pub urn: Urn,
    /// ID of the referenced custom resource, if any.
    pub id: Option<ReferenceId>,
    /// Version of the package that defines the resource; empty when unknown.
    pub package_version: String,
}

impl ResourceReference {
    /// Builds a reference to a custom resource with a known ID.
    #[must_use]
    pub fn custom(urn: Urn, id: impl Into<String>, package_version: impl Into<String>) -> Self {
        Self {
            urn,
            id: Some(ReferenceId::Known(id.into())),
            package_version: package_version.into(),
        }
    }

    /// Builds a reference to a custom resource whose ID is not yet known.
    #[must_use]
    pub fn custom_unknown(urn: Urn, package_version: impl Into<String>) -> Self {
        Self {
            urn,
            id: Some(ReferenceId::Unknown),
            package_version: package_version.into(),
        }
    }

    /// Builds a reference to a component resource.
    #[must_use]
    pub fn component(urn: Urn, package_version: impl Into<String>) -> Self {
        Self {
            urn,
            id: None,
            package_version: package_version.into(),
        }
    }

    /// Whether the reference names a custom resource.
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.id.is_some()
    }

    /// Returns the known ID, if any.
    #[must_use]
    pub fn id_string(&self) -> Option<&str> {
        match &self.id {
            Some(ReferenceId::Known(id)) => Some(id.as_str()),
            Some(ReferenceId::Unknown) | None => None,
        }
    }
}
