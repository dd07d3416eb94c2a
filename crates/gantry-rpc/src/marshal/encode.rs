use gantry_resource::sig::{OUTPUT_VALUE_SIG, RESOURCE_REFERENCE_SIG, SECRET_SIG, SIG_KEY};
use gantry_resource::{
    Archive, Asset, Output, PropertyMap, PropertyValue, ReferenceId, ResourceReference, Secret,
};
use tracing::{debug, trace};

use super::{
    DEPENDENCIES_FIELD, ID_FIELD, MARSHAL_TARGET, PACKAGE_VERSION_FIELD, SECRET_FIELD, URN_FIELD,
    VALUE_FIELD,
};
use crate::error::MarshalError;
use crate::options::MarshalOptions;
use crate::sentinel::sentinel_for;
use crate::wire::{WireStruct, WireValue};

pub(super) fn value(
    value: &PropertyValue,
    opts: &MarshalOptions,
) -> Result<Option<WireValue>, MarshalError> {
    match value {
        PropertyValue::Null => Ok(Some(WireValue::Null)),
        PropertyValue::Bool(flag) => Ok(Some(WireValue::Bool(*flag))),
        PropertyValue::Number(number) => Ok(Some(WireValue::Number(*number))),
        PropertyValue::String(text) => Ok(Some(WireValue::String(text.clone()))),
        PropertyValue::Array(items) => array(items, opts).map(Some),
        PropertyValue::Object(map) => {
            properties(map, opts).map(|fields| Some(WireValue::Struct(fields)))
        }
        PropertyValue::Asset(asset) => self::asset(asset, opts).map(Some),
        PropertyValue::Archive(archive) => self::archive(archive, opts).map(Some),
        PropertyValue::Computed(computed) => unknown(&computed.element, opts),
        PropertyValue::Output(output) => self::output(output, opts),
        PropertyValue::Secret(secret) => self::secret(secret, opts),
        PropertyValue::ResourceReference(reference) => self::reference(reference, opts),
    }
}

pub(super) fn properties(
    props: &PropertyMap,
    opts: &MarshalOptions,
) -> Result<WireStruct, MarshalError> {
    let mut fields = WireStruct::new();
    for (key, entry) in props {
        if opts.skip_nulls && entry.is_null() {
            trace!(
                target: MARSHAL_TARGET,
                label = %opts.label,
                key = %key,
                "skipping null property"
            );
            continue;
        }
        if opts.skip_internal_keys && key.is_internal() {
            trace!(
                target: MARSHAL_TARGET,
                label = %opts.label,
                key = %key,
                "skipping internal property"
            );
            continue;
        }
        trace!(
            target: MARSHAL_TARGET,
            label = %opts.label,
            key = %key,
            kind = %entry.type_string(),
            "marshaling property"
        );
        if let Some(encoded) = value(entry, opts)? {
            fields.insert(key.as_str().to_owned(), encoded);
        }
    }
    Ok(fields)
}

fn array(items: &[PropertyValue], opts: &MarshalOptions) -> Result<WireValue, MarshalError> {
    let mut encoded = Vec::with_capacity(items.len());
    for item in items {
        if let Some(element) = value(item, opts)? {
            encoded.push(element);
        }
    }
    Ok(WireValue::List(encoded))
}

fn unknown(
    placeholder: &PropertyValue,
    opts: &MarshalOptions,
) -> Result<Option<WireValue>, MarshalError> {
    if opts.reject_unknowns {
        return Err(MarshalError::UnknownRejected);
    }
    if !opts.keep_unknowns {
        trace!(target: MARSHAL_TARGET, label = %opts.label, "dropping unknown value");
        return Ok(None);
    }
    let sentinel = sentinel_for(placeholder, opts.keep_resources);
    Ok(Some(WireValue::from(sentinel)))
}

fn wrap_secret(inner: WireValue) -> WireValue {
    let mut fields = WireStruct::new();
    fields.insert(SIG_KEY.to_owned(), WireValue::from(SECRET_SIG));
    fields.insert(VALUE_FIELD.to_owned(), inner);
    WireValue::Struct(fields)
}

fn secret(secret: &Secret, opts: &MarshalOptions) -> Result<Option<WireValue>, MarshalError> {
    let mut element = secret.element.as_ref();
    while let PropertyValue::Secret(nested) = element {
        element = nested.element.as_ref();
    }
    if !opts.keep_secrets {
        debug!(target: MARSHAL_TARGET, label = %opts.label, "marshaling secret as its raw value");
        return value(element, opts);
    }
    Ok(value(element, opts)?.map(wrap_secret))
}

fn output(output: &Output, opts: &MarshalOptions) -> Result<Option<WireValue>, MarshalError> {
    if !output.known && opts.reject_unknowns {
        return Err(MarshalError::UnknownRejected);
    }
    if opts.keep_output_values {
        return output_object(output, opts).map(Some);
    }
    let encoded = if output.known {
        value(&output.element, opts)?
    } else {
        unknown(&output.element, opts)?
    };
    if output.secret && opts.keep_secrets {
        return Ok(encoded.map(wrap_secret));
    }
    if output.secret {
        debug!(
            target: MARSHAL_TARGET,
            label = %opts.label,
            "marshaling secret output as its raw value"
        );
    }
    Ok(encoded)
}

fn output_object(output: &Output, opts: &MarshalOptions) -> Result<WireValue, MarshalError> {
    let mut fields = WireStruct::new();
    fields.insert(SIG_KEY.to_owned(), WireValue::from(OUTPUT_VALUE_SIG));
    if output.known {
        if let Some(encoded) = value(&output.element, opts)? {
            fields.insert(VALUE_FIELD.to_owned(), encoded);
        }
    }
    if output.secret {
        fields.insert(SECRET_FIELD.to_owned(), WireValue::Bool(true));
    }
    if !output.dependencies.is_empty() {
        let urns = output
            .dependencies
            .iter()
            .map(|urn| WireValue::from(urn.as_str()))
            .collect();
        fields.insert(DEPENDENCIES_FIELD.to_owned(), WireValue::List(urns));
    }
    Ok(WireValue::Struct(fields))
}

fn unknown_id(opts: &MarshalOptions) -> Result<Option<WireValue>, MarshalError> {
    unknown(&PropertyValue::String(String::new()), opts)
}

fn reference(
    reference: &ResourceReference,
    opts: &MarshalOptions,
) -> Result<Option<WireValue>, MarshalError> {
    if !opts.keep_resources {
        debug!(
            target: MARSHAL_TARGET,
            label = %opts.label,
            urn = %reference.urn,
            "marshaling resource reference as its raw ID or URN"
        );
        return match &reference.id {
            Some(ReferenceId::Known(id)) => Ok(Some(WireValue::from(id.as_str()))),
            Some(ReferenceId::Unknown) => unknown_id(opts),
            None => Ok(Some(WireValue::from(reference.urn.as_str()))),
        };
    }

    let mut fields = WireStruct::new();
    fields.insert(SIG_KEY.to_owned(), WireValue::from(RESOURCE_REFERENCE_SIG));
    fields.insert(URN_FIELD.to_owned(), WireValue::from(reference.urn.as_str()));
    let id = match &reference.id {
        Some(ReferenceId::Known(id)) => Some(WireValue::from(id.as_str())),
        Some(ReferenceId::Unknown) => unknown_id(opts)?,
        None => None,
    };
    if let Some(encoded) = id {
        fields.insert(ID_FIELD.to_owned(), encoded);
    }
    if !reference.package_version.is_empty() {
        fields.insert(
            PACKAGE_VERSION_FIELD.to_owned(),
            WireValue::from(reference.package_version.as_str()),
        );
    }
    Ok(Some(WireValue::Struct(fields)))
}

fn asset(asset: &Asset, opts: &MarshalOptions) -> Result<WireValue, MarshalError> {
    const KIND: &str = "asset";
    if opts.reject_assets {
        return Err(MarshalError::AssetRejected { kind: KIND });
    }
    let mut prepared = asset.clone();
    // An elided value must still carry its hash.
    let needs_hash =
        opts.elide_asset_contents || (opts.compute_asset_hashes && !prepared.is_elided());
    if needs_hash && prepared.hash().is_none() {
        prepared = prepared
            .ensure_hash()
            .map_err(|source| MarshalError::AssetHash { kind: KIND, source })?;
    }
    if opts.elide_asset_contents {
        prepared = prepared.elided();
    }
    properties(&prepared.to_property_map(), opts).map(WireValue::Struct)
}

fn archive(archive: &Archive, opts: &MarshalOptions) -> Result<WireValue, MarshalError> {
    const KIND: &str = "archive";
    if opts.reject_assets {
        return Err(MarshalError::AssetRejected { kind: KIND });
    }
    let mut prepared = archive.clone();
    // An elided value must still carry its hash.
    let needs_hash =
        opts.elide_asset_contents || (opts.compute_asset_hashes && !prepared.is_elided());
    if needs_hash && prepared.hash().is_none() {
        prepared = prepared
            .ensure_hash()
            .map_err(|source| MarshalError::AssetHash { kind: KIND, source })?;
    }
    if opts.elide_asset_contents {
        prepared = prepared.elided();
    }
    properties(&prepared.to_property_map(), opts).map(WireValue::Struct)
}
