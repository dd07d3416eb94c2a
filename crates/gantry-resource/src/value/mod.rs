//! The [`PropertyValue`] union and its unknown, output, and secret wrappers.

use std::collections::BTreeSet;

use crate::asset::{Archive, Asset};
use crate::map::PropertyMap;
use crate::reference::{ResourceReference, Urn};

/// A configuration or resource value.
///
/// Exactly one variant is active. Accessors such as [`as_str`](Self::as_str)
/// return `None` for any other variant rather than a defaulted value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PropertyValue {
    /// The absence of a value.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// An IEEE-754 double. There is no separate integer variant.
    Number(f64),
    /// A UTF-8 string.
    String(String),
    /// An ordered sequence of values.
    Array(Vec<PropertyValue>),
    /// A map of named values.
    Object(PropertyMap),
    /// A content-addressed blob.
    Asset(Asset),
    /// A content-addressed collection of assets and archives.
    Archive(Archive),
    /// A value that is not yet known.
    Computed(Computed),
    /// A known or unknown value with secrecy and dependency provenance.
    Output(Output),
    /// A value that must be persisted securely.
    Secret(Secret),
    /// A reference to another resource.
    ResourceReference(ResourceReference),
}

/// An unknown value.
///
/// The element is a placeholder whose variant describes the shape the value
/// will have once resolved; its contents carry no meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Computed {
    /// Placeholder describing the eventual shape.
    pub element: Box<PropertyValue>,
}

impl Computed {
    /// Wraps a shape placeholder.
    #[must_use]
    pub fn new(element: PropertyValue) -> Self {
        Self {
            element: Box::new(element),
        }
    }
}

/// A value annotated with whether it is known, whether it is secret, and the
/// resources it was derived from.
///
/// When `known` is false, `element` is a shape placeholder as for
/// [`Computed`].
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// The resolved value, or a placeholder when unknown.
    pub element: Box<PropertyValue>,
    /// Whether `element` holds the resolved value.
    pub known: bool,
    /// Whether the value is secret.
    pub secret: bool,
    /// URNs of the resources this value depends on.
    pub dependencies: BTreeSet<Urn>,
}

impl Output {
    /// Builds a known, non-secret output without dependencies.
    #[must_use]
    pub fn known(element: PropertyValue) -> Self {
        Self {
            element: Box::new(element),
            known: true,
            secret: false,
            dependencies: BTreeSet::new(),
        }
    }

    /// Builds an unknown output whose eventual shape matches `placeholder`.
    #[must_use]
    pub fn unknown(placeholder: PropertyValue) -> Self {
        Self {
            element: Box::new(placeholder),
            known: false,
            secret: false,
            dependencies: BTreeSet::new(),
        }
    }

    /// Marks the output as secret or not.
    #[must_use]
    pub const fn with_secret(mut self, secret: bool) -> Self {
        self.secret = secret;
        self
    }

    /// Replaces the dependency set.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = Urn>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}

/// A value that must be persisted securely.
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    /// The protected value.
    pub element: Box<PropertyValue>,
}

impl Secret {
    /// Wraps `element` without checking whether it is already secret.
    ///
    /// Prefer [`PropertyValue::make_secret`], which never double-wraps.
    #[must_use]
    pub fn new(element: PropertyValue) -> Self {
        Self {
            element: Box::new(element),
        }
    }
}

impl PropertyValue {
    /// Marks `value` as secret. An already-secret value is returned unchanged.
    #[must_use]
    pub fn make_secret(value: Self) -> Self {
        match value {
            secret @ Self::Secret(_) => secret,
            other => Self::Secret(Secret::new(other)),
        }
    }

    /// Builds an unknown value whose eventual shape matches `placeholder`.
    #[must_use]
    pub fn make_computed(placeholder: Self) -> Self {
        Self::Computed(Computed::new(placeholder))
    }

    /// Whether the value is [`PropertyValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the array elements, if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Self]> {
        match self {
            Self::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    /// Returns the map, if this is an object.
    #[must_use]
    pub const fn as_object(&self) -> Option<&PropertyMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Returns the asset, if this is one.
    #[must_use]
    pub const fn as_asset(&self) -> Option<&Asset> {
        match self {
            Self::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    /// Returns the archive, if this is one.
    #[must_use]
    pub const fn as_archive(&self) -> Option<&Archive> {
        match self {
            Self::Archive(archive) => Some(archive),
            _ => None,
        }
    }

    /// Returns the computed wrapper, if this is one.
    #[must_use]
    pub const fn as_computed(&self) -> Option<&Computed> {
        match self {
            Self::Computed(computed) => Some(computed),
            _ => None,
        }
    }

    /// Returns the output wrapper, if this is one.
    #[must_use]
    pub const fn as_output(&self) -> Option<&Output> {
        match self {
            Self::Output(output) => Some(output),
            _ => None,
        }
    }

    /// Returns the secret wrapper, if this is one.
    #[must_use]
    pub const fn as_secret(&self) -> Option<&Secret> {
        match self {
            Self::Secret(secret) => Some(secret),
            _ => None,
        }
    }

    /// Returns the resource reference, if this is one.
    #[must_use]
    pub const fn as_resource_reference(&self) -> Option<&ResourceReference> {
        match self {
            Self::ResourceReference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Whether the value is semantically meaningful.
    ///
    /// Null and unknown outputs are not; a [`Computed`] value is, since it is
    /// expected to resolve.
    #[must_use]
    pub fn has_value(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Output(output) => output.known,
            _ => true,
        }
    }

    /// Whether the value is unknown or contains an unknown, searching deeply.
    #[must_use]
    pub fn contains_unknowns(&self) -> bool {
        match self {
            Self::Computed(_) => true,
            Self::Output(output) => !output.known || output.element.contains_unknowns(),
            Self::Array(values) => values.iter().any(Self::contains_unknowns),
            Self::Object(map) => map.contains_unknowns(),
            Self::Secret(secret) => secret.element.contains_unknowns(),
            Self::Null
            | Self::Bool(_)
            | Self::Number(_)
            | Self::String(_)
            | Self::Asset(_)
            | Self::Archive(_)
            | Self::ResourceReference(_) => false,
        }
    }

    /// Whether the value is secret or contains a secret, searching deeply.
    #[must_use]
    pub fn contains_secrets(&self) -> bool {
        match self {
            Self::Secret(_) => true,
            Self::Output(output) => output.secret || output.element.contains_secrets(),
            Self::Computed(computed) => computed.element.contains_secrets(),
            Self::Array(values) => values.iter().any(Self::contains_secrets),
            Self::Object(map) => map.contains_secrets(),
            Self::Null
            | Self::Bool(_)
            | Self::Number(_)
            | Self::String(_)
            | Self::Asset(_)
            | Self::Archive(_)
            | Self::ResourceReference(_) => false,
        }
    }

    /// Describes the value's type for diagnostics, e.g. `secret<string>`.
    #[must_use]
    pub fn type_string(&self) -> String {
        match self {
            Self::Null => "null".to_owned(),
            Self::Bool(_) => "bool".to_owned(),
            Self::Number(_) => "number".to_owned(),
            Self::String(_) => "string".to_owned(),
            Self::Array(_) => "[]".to_owned(),
            Self::Object(_) => "object".to_owned(),
            Self::Asset(_) => "asset".to_owned(),
            Self::Archive(_) => "archive".to_owned(),
            Self::Computed(computed) => format!("output<{}>", computed.element.type_string()),
            Self::Output(output) => format!("output<{}>", output.element.type_string()),
            Self::Secret(secret) => format!("secret<{}>", secret.element.type_string()),
            Self::ResourceReference(reference) => format!(
                "resourceReference({:?}, {:?}, {:?})",
                reference.urn.as_str(),
                reference.id_string().unwrap_or_default(),
                reference.package_version
            ),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for PropertyValue {
    fn from(values: Vec<Self>) -> Self {
        Self::Array(values)
    }
}

impl From<PropertyMap> for PropertyValue {
    fn from(map: PropertyMap) -> Self {
        Self::Object(map)
    }
}

impl From<Asset> for PropertyValue {
    fn from(asset: Asset) -> Self {
        Self::Asset(asset)
    }
}

impl From<Archive> for PropertyValue {
    fn from(archive: Archive) -> Self {
        Self::Archive(archive)
    }
}

impl From<Computed> for PropertyValue {
    fn from(computed: Computed) -> Self {
        Self::Computed(computed)
    }
}

impl From<Output> for PropertyValue {
    fn from(output: Output) -> Self {
        Self::Output(output)
    }
}

impl From<Secret> for PropertyValue {
    fn from(secret: Secret) -> Self {
        Self::Secret(secret)
    }
}

impl From<ResourceReference> for PropertyValue {
    fn from(reference: ResourceReference) -> Self {
        Self::ResourceReference(reference)
    }
}
