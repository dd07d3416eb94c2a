use std::collections::BTreeSet;

use gantry_resource::sig::{
    ARCHIVE_SIG, ASSET_SIG, OUTPUT_VALUE_SIG, RESOURCE_REFERENCE_SIG, SECRET_SIG, SIG_KEY,
};
use gantry_resource::{
    Archive, Asset, Output, PropertyKey, PropertyMap, PropertyValue, ReferenceId,
    ResourceReference, Urn,
};
use tracing::{debug, trace};

use super::{
    DEPENDENCIES_FIELD, ID_FIELD, MARSHAL_TARGET, PACKAGE_VERSION_FIELD, SECRET_FIELD, URN_FIELD,
    VALUE_FIELD,
};
use crate::error::MarshalError;
use crate::options::MarshalOptions;
use crate::sentinel::{UNKNOWN_STRING, placeholder_for};
use crate::wire::{WireStruct, WireValue};

const SECRET_OBJECT: &str = "secret";
const OUTPUT_OBJECT: &str = "output value";
const REFERENCE_OBJECT: &str = "resource reference";

pub(super) fn value(
    wire: &WireValue,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, MarshalError> {
    match wire {
        WireValue::Null => Ok(Some(PropertyValue::Null)),
        WireValue::Bool(flag) => Ok(Some(PropertyValue::Bool(*flag))),
        WireValue::Number(number) => Ok(Some(PropertyValue::Number(*number))),
        WireValue::String(text) => string(text, opts),
        WireValue::List(items) => list(items, opts).map(Some),
        WireValue::Struct(fields) => object(fields, opts),
    }
}

pub(super) fn properties(
    fields: &WireStruct,
    opts: &MarshalOptions,
) -> Result<PropertyMap, MarshalError> {
    let mut props = PropertyMap::new();
    for (name, field) in fields {
        let key = PropertyKey::from(name.as_str());
        if opts.skip_internal_keys && key.is_internal() {
            trace!(
                target: MARSHAL_TARGET,
                label = %opts.label,
                key = %key,
                "skipping internal field"
            );
            continue;
        }
        let Some(decoded) = value(field, opts)? else {
            continue;
        };
        if opts.skip_nulls && decoded.is_null() {
            trace!(target: MARSHAL_TARGET, label = %opts.label, key = %key, "skipping null field");
            continue;
        }
        trace!(
            target: MARSHAL_TARGET,
            label = %opts.label,
            key = %key,
            kind = %decoded.type_string(),
            "unmarshaled property"
        );
        props.insert(key, decoded);
    }
    Ok(props)
}

fn string(text: &str, opts: &MarshalOptions) -> Result<Option<PropertyValue>, MarshalError> {
    let Some(placeholder) = placeholder_for(text) else {
        return Ok(Some(PropertyValue::String(text.to_owned())));
    };
    if opts.reject_unknowns {
        return Err(MarshalError::UnknownRejected);
    }
    if !opts.keep_unknowns {
        trace!(target: MARSHAL_TARGET, label = %opts.label, "dropping unknown value");
        return Ok(None);
    }
    Ok(Some(PropertyValue::make_computed(placeholder)))
}

fn list(items: &[WireValue], opts: &MarshalOptions) -> Result<PropertyValue, MarshalError> {
    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        if let Some(element) = value(item, opts)? {
            decoded.push(element);
        }
    }
    Ok(PropertyValue::Array(decoded))
}

fn object(
    fields: &WireStruct,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, MarshalError> {
    let signature = match fields.get(SIG_KEY) {
        None => return properties(fields, opts).map(|props| Some(PropertyValue::Object(props))),
        Some(WireValue::String(signature)) => signature.as_str(),
        Some(other) => {
            return Err(MarshalError::UnrecognizedSignature {
                signature: other.kind_name().to_owned(),
            });
        }
    };
    match signature {
        ASSET_SIG => asset(&signature_fields(fields, opts)?, opts).map(Some),
        ARCHIVE_SIG => archive(&signature_fields(fields, opts)?, opts).map(Some),
        SECRET_SIG => secret(fields, opts),
        OUTPUT_VALUE_SIG => output(signature_fields(fields, opts)?).map(Some),
        RESOURCE_REFERENCE_SIG => reference(fields, &signature_fields(fields, opts)?, opts),
        _ => Err(MarshalError::UnrecognizedSignature {
            signature: signature.to_owned(),
        }),
    }
}

/// Decodes the fields of a signature-tagged object.
///
/// The null and internal-key filters apply to user maps only. A field is
/// absent from the result only when it held an unknown that `opts` drops.
fn signature_fields(
    fields: &WireStruct,
    opts: &MarshalOptions,
) -> Result<PropertyMap, MarshalError> {
    let mut props = PropertyMap::new();
    for (name, field) in fields {
        if let Some(decoded) = value(field, opts)? {
            props.insert(PropertyKey::from(name.as_str()), decoded);
        }
    }
    Ok(props)
}

fn asset(props: &PropertyMap, opts: &MarshalOptions) -> Result<PropertyValue, MarshalError> {
    const KIND: &str = "asset";
    if opts.reject_assets {
        return Err(MarshalError::AssetRejected { kind: KIND });
    }
    let mut decoded = Asset::from_property_map(props)
        .map_err(|source| MarshalError::InvalidAsset { kind: KIND, source })?;
    if opts.compute_asset_hashes && decoded.hash().is_none() && !decoded.is_elided() {
        decoded = decoded
            .ensure_hash()
            .map_err(|source| MarshalError::AssetHash { kind: KIND, source })?;
    }
    Ok(PropertyValue::Asset(decoded))
}

fn archive(props: &PropertyMap, opts: &MarshalOptions) -> Result<PropertyValue, MarshalError> {
    const KIND: &str = "archive";
    if opts.reject_assets {
        return Err(MarshalError::AssetRejected { kind: KIND });
    }
    let mut decoded = Archive::from_property_map(props)
        .map_err(|source| MarshalError::InvalidAsset { kind: KIND, source })?;
    if opts.compute_asset_hashes && decoded.hash().is_none() && !decoded.is_elided() {
        decoded = decoded
            .ensure_hash()
            .map_err(|source| MarshalError::AssetHash { kind: KIND, source })?;
    }
    Ok(PropertyValue::Archive(decoded))
}

fn secret(
    fields: &WireStruct,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, MarshalError> {
    let Some(wire) = fields.get(VALUE_FIELD) else {
        return Err(MarshalError::MissingField {
            object: SECRET_OBJECT,
            field: VALUE_FIELD,
        });
    };
    // A dropped unknown takes its secret wrapper with it.
    let Some(element) = value(wire, opts)? else {
        return Ok(None);
    };
    if !opts.keep_secrets {
        debug!(target: MARSHAL_TARGET, label = %opts.label, "unmarshaling secret as its raw value");
        return Ok(Some(element));
    }
    Ok(Some(PropertyValue::make_secret(element)))
}

fn output(mut props: PropertyMap) -> Result<PropertyValue, MarshalError> {
    let (element, known) = match props.remove(VALUE_FIELD) {
        Some(PropertyValue::Computed(computed)) => (*computed.element, false),
        Some(resolved) => (resolved, true),
        None => (PropertyValue::Null, false),
    };
    let secret = match props.get(SECRET_FIELD) {
        None => false,
        Some(PropertyValue::Bool(flag)) => *flag,
        Some(_) => {
            return Err(MarshalError::WrongFieldKind {
                object: OUTPUT_OBJECT,
                field: SECRET_FIELD,
                expected: "a bool",
            });
        }
    };
    let dependencies = match props.get(DEPENDENCIES_FIELD) {
        None => BTreeSet::new(),
        Some(PropertyValue::Array(items)) => dependency_urns(items)?,
        Some(_) => return Err(dependencies_error()),
    };
    Ok(PropertyValue::Output(Output {
        element: Box::new(element),
        known,
        secret,
        dependencies,
    }))
}

fn dependency_urns(items: &[PropertyValue]) -> Result<BTreeSet<Urn>, MarshalError> {
    items
        .iter()
        .map(|item| item.as_str().map(Urn::from).ok_or_else(dependencies_error))
        .collect()
}

const fn dependencies_error() -> MarshalError {
    MarshalError::WrongFieldKind {
        object: OUTPUT_OBJECT,
        field: DEPENDENCIES_FIELD,
        expected: "an array of strings",
    }
}

fn reference(
    fields: &WireStruct,
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> Result<Option<PropertyValue>, MarshalError> {
    let urn = match props.get(URN_FIELD) {
        Some(PropertyValue::String(urn)) => Urn::new(urn.as_str()),
        Some(_) => return Err(reference_field_error(URN_FIELD)),
        None => {
            return Err(MarshalError::MissingField {
                object: REFERENCE_OBJECT,
                field: URN_FIELD,
            });
        }
    };
    let id = match props.get(ID_FIELD) {
        Some(PropertyValue::String(id)) => Some(ReferenceId::Known(id.clone())),
        Some(PropertyValue::Computed(_)) => Some(ReferenceId::Unknown),
        Some(_) => return Err(reference_field_error(ID_FIELD)),
        None if fields.contains_key(ID_FIELD) => Some(ReferenceId::Unknown),
        None => None,
    };
    let package_version = match props.get(PACKAGE_VERSION_FIELD) {
        Some(PropertyValue::String(version)) => version.clone(),
        Some(_) => return Err(reference_field_error(PACKAGE_VERSION_FIELD)),
        None => String::new(),
    };

    if !opts.keep_resources {
        debug!(
            target: MARSHAL_TARGET,
            label = %opts.label,
            urn = %urn,
            "unmarshaling resource reference as its raw ID or URN"
        );
        return match id {
            Some(ReferenceId::Known(known)) => Ok(Some(PropertyValue::String(known))),
            Some(ReferenceId::Unknown) => string(UNKNOWN_STRING, opts),
            None => Ok(Some(PropertyValue::String(urn.into_string()))),
        };
    }
    Ok(Some(PropertyValue::ResourceReference(ResourceReference {
        urn,
        id,
        package_version,
    })))
}

const fn reference_field_error(field: &'static str) -> MarshalError {
    MarshalError::WrongFieldKind {
        object: REFERENCE_OBJECT,
        field,
        expected: "a string",
    }
}
