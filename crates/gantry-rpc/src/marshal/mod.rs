//! Encoding of [`PropertyValue`] trees to [`WireValue`] trees and back.
//!
//! Both directions return `Ok(None)` for a value that should be left out of
//! its parent container, which happens for unknowns when `keep_unknowns` is
//! unset. Objects skip such keys; arrays are compacted rather than left with
//! holes. Rich values that the wire cannot express natively are flattened to
//! objects carrying [`SIG_KEY`](gantry_resource::sig::SIG_KEY) and recovered
//! by a single signature dispatch after an object has been decoded
//! generically.

mod decode;
mod encode;

use gantry_resource::{PropertyMap, PropertyValue};

use crate::error::MarshalError;
use crate::options::MarshalOptions;
use crate::wire::{WireStruct, WireValue};

const MARSHAL_TARGET: &str = "gantry_rpc::marshal";

/// Field of a secret or output object holding the wrapped value.
pub(crate) const VALUE_FIELD: &str = "value";
/// Field of an output object flagging secrecy.
pub(crate) const SECRET_FIELD: &str = "secret";
/// Field of an output object listing dependency URNs.
pub(crate) const DEPENDENCIES_FIELD: &str = "dependencies";
/// Field of a resource reference object holding the URN.
pub(crate) const URN_FIELD: &str = "urn";
/// Field of a resource reference object holding the ID.
pub(crate) const ID_FIELD: &str = "id";
/// Field of a resource reference object holding the package version.
pub(crate) const PACKAGE_VERSION_FIELD: &str = "packageVersion";

/// Encodes a single value.
///
/// Returns `Ok(None)` when the value should be omitted from its container.
///
/// # Errors
///
/// Returns [`MarshalError`] when an unknown or asset is rejected by `opts`,
/// or when a missing asset hash cannot be computed.
pub fn marshal_value(
    value: &PropertyValue,
    opts: &MarshalOptions,
) -> Result<Option<WireValue>, MarshalError> {
    encode::value(value, opts)
}

/// Encodes a property map, visiting keys in sorted order.
///
/// Never returns `None`: a map whose every entry is omitted encodes to an
/// empty struct.
///
/// # Errors
///
/// Returns the first [`MarshalError`] raised by any entry.
pub fn marshal_properties(
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> Result<WireStruct, MarshalError> {
    encode::properties(props, opts)
}

/// Decodes a single value.
///
/// Returns `Ok(None)` when the value should be omitted from its container.
///
/// # Errors
///
/// Returns [`MarshalError`] when an unknown or asset is rejected by `opts`,
/// or when a signature-tagged object is malformed.
pub fn unmarshal_value(
    wire: &WireValue,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, MarshalError> {
    decode::value(wire, opts)
}

/// Decodes a wire struct into a property map.
///
/// # Errors
///
/// Returns the first [`MarshalError`] raised by any field.
pub fn unmarshal_properties(
    fields: &WireStruct,
    opts: &MarshalOptions,
) -> Result<PropertyMap, MarshalError> {
    decode::properties(fields, opts)
}

#[cfg(test)]
mod tests;
