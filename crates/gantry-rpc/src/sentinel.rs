//! Reserved strings that stand in for unknown values on the wire.
//!
//! A wire string equal to one of these constants is never decoded as a
//! literal. Collision with a genuine user string is possible but accepted.

use gantry_resource::{Archive, Asset, PropertyMap, PropertyValue};

/// An unknown boolean.
pub const UNKNOWN_BOOL: &str = "1c4a061d-8072-4f0a-a4cb-0ff528b18fe7";
/// An unknown number.
pub const UNKNOWN_NUMBER: &str = "3eeb2bf0-c639-47a8-9e75-3b44932eb421";
/// An unknown string.
pub const UNKNOWN_STRING: &str = "04da6b54-80e4-46f7-96ec-b56ff0331ba9";
/// An unknown array.
pub const UNKNOWN_ARRAY: &str = "6a19a0b0-7e62-4c92-b797-7f8e31da9cc2";
/// An unknown asset.
pub const UNKNOWN_ASSET: &str = "030794c1-ac77-496b-92df-f27374a8bd58";
/// An unknown archive.
pub const UNKNOWN_ARCHIVE: &str = "e48ece36-62e2-4504-bad9-02848725956a";
/// An unknown object.
pub const UNKNOWN_OBJECT: &str = "dd056dcd-154b-4c76-9bd3-c8f88648b5ff";

/// Picks the sentinel for an unknown whose eventual shape is `placeholder`.
///
/// Nested unknown and secret placeholders are unwrapped until a concrete
/// shape is found. A null placeholder carries no shape and is sent as an
/// unknown string. Resource references are sent as objects when the far end
/// understands them and as strings (their collapsed form) otherwise.
pub(crate) fn sentinel_for(placeholder: &PropertyValue, keep_resources: bool) -> &'static str {
    match placeholder {
        PropertyValue::Bool(_) => UNKNOWN_BOOL,
        PropertyValue::Number(_) => UNKNOWN_NUMBER,
        PropertyValue::Null | PropertyValue::String(_) => UNKNOWN_STRING,
        PropertyValue::Array(_) => UNKNOWN_ARRAY,
        PropertyValue::Asset(_) => UNKNOWN_ASSET,
        PropertyValue::Archive(_) => UNKNOWN_ARCHIVE,
        PropertyValue::Object(_) => UNKNOWN_OBJECT,
        PropertyValue::ResourceReference(_) if keep_resources => UNKNOWN_OBJECT,
        PropertyValue::ResourceReference(_) => UNKNOWN_STRING,
        PropertyValue::Computed(computed) => sentinel_for(&computed.element, keep_resources),
        PropertyValue::Output(output) => sentinel_for(&output.element, keep_resources),
        PropertyValue::Secret(secret) => sentinel_for(&secret.element, keep_resources),
    }
}

/// Returns a zero-valued placeholder if `text` is a sentinel.
pub(crate) fn placeholder_for(text: &str) -> Option<PropertyValue> {
    let placeholder = match text {
        UNKNOWN_BOOL => PropertyValue::Bool(false),
        UNKNOWN_NUMBER => PropertyValue::Number(0.0),
        UNKNOWN_STRING => PropertyValue::String(String::new()),
        UNKNOWN_ARRAY => PropertyValue::Array(Vec::new()),
        UNKNOWN_ASSET => PropertyValue::Asset(Asset::hash_only("")),
        UNKNOWN_ARCHIVE => PropertyValue::Archive(Archive::hash_only("")),
        UNKNOWN_OBJECT => PropertyValue::Object(PropertyMap::new()),
        _ => return None,
    };
    Some(placeholder)
}

/// Whether `text` is one of the reserved sentinels.
#[must_use]
pub fn is_unknown_sentinel(text: &str) -> bool {
    placeholder_for(text).is_some()
}
