//! Scenario tests for the marshaling engine.

use gantry_resource::sig::{
    ASSET_SIG, OUTPUT_VALUE_SIG, RESOURCE_REFERENCE_SIG, SECRET_SIG, SIG_KEY,
};
use gantry_resource::{
    Archive, Asset, Output, PropertyMap, PropertyValue, ResourceReference, Urn,
};
use rstest::rstest;

use super::*;
use crate::sentinel::{UNKNOWN_BOOL, UNKNOWN_NUMBER, UNKNOWN_STRING};

// sha256("hello")
const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";
const URN: &str = "urn:pulumi:stack::proj::type::name";

fn fields(wire: Option<WireValue>) -> WireStruct {
    match wire {
        Some(WireValue::Struct(fields)) => fields,
        other => panic!("expected struct, got {other:?}"),
    }
}

fn reference() -> ResourceReference {
    ResourceReference::custom(Urn::new(URN), "abc123", "1.2.3")
}

#[rstest]
fn encodes_equal_maps_identically_regardless_of_insertion_order() {
    let mut forward = PropertyMap::new();
    forward.insert("zeta", 1.0);
    forward.insert("alpha", "a");
    forward.insert("mid", vec![PropertyValue::from(true)]);
    let backward: PropertyMap = [
        ("mid", PropertyValue::from(vec![PropertyValue::from(true)])),
        ("alpha", PropertyValue::from("a")),
        ("zeta", PropertyValue::from(1.0)),
    ]
    .into_iter()
    .collect();

    let opts = MarshalOptions::default();
    let first = serde_json::to_string(&marshal_properties(&forward, &opts).expect("marshal"))
        .expect("serialise");
    let second = serde_json::to_string(&marshal_properties(&backward, &opts).expect("marshal"))
        .expect("serialise");
    assert_eq!(first, second);
    assert_eq!(first, r#"{"alpha":"a","mid":[true],"zeta":1.0}"#);
}

#[rstest]
fn dropped_unknowns_leave_empty_containers() {
    let unknown = PropertyValue::make_computed(PropertyValue::from(""));
    let props = PropertyMap::new()
        .with("a", unknown.clone())
        .with("b", Output::unknown(PropertyValue::Null));
    let opts = MarshalOptions::default();

    assert!(marshal_properties(&props, &opts).expect("marshal").is_empty());
    assert_eq!(
        marshal_value(&PropertyValue::from(vec![unknown.clone(), unknown]), &opts)
            .expect("marshal"),
        Some(WireValue::List(Vec::new()))
    );
}

#[rstest]
fn array_compaction_renumbers_remaining_elements() {
    let items = PropertyValue::from(vec![
        PropertyValue::from("a"),
        PropertyValue::make_computed(PropertyValue::Bool(false)),
        PropertyValue::from("c"),
    ]);
    let wire = marshal_value(&items, &MarshalOptions::default()).expect("marshal");
    assert_eq!(
        wire,
        Some(WireValue::List(vec![WireValue::from("a"), WireValue::from("c")]))
    );

    let incoming = WireValue::List(vec![
        WireValue::from(UNKNOWN_BOOL),
        WireValue::from("b"),
        WireValue::from(UNKNOWN_NUMBER),
    ]);
    let decoded = unmarshal_value(&incoming, &MarshalOptions::default()).expect("unmarshal");
    assert_eq!(decoded, Some(PropertyValue::from(vec![PropertyValue::from("b")])));
}

#[rstest]
#[case::computed(PropertyValue::make_computed(PropertyValue::Number(0.0)))]
#[case::unknown_output(Output::unknown(PropertyValue::Null).into())]
fn reject_unknowns_wins_over_keep(#[case] unknown: PropertyValue) {
    let opts = MarshalOptions::default().keep_unknowns(true).reject_unknowns(true);
    let props = PropertyMap::new().with("x", unknown);
    assert!(matches!(
        marshal_properties(&props, &opts),
        Err(MarshalError::UnknownRejected)
    ));
    assert!(matches!(
        unmarshal_value(&WireValue::from(UNKNOWN_STRING), &opts),
        Err(MarshalError::UnknownRejected)
    ));
}

#[rstest]
fn kept_unknowns_round_trip_by_shape() {
    let opts = MarshalOptions::default().keep_unknowns(true);
    let value = PropertyValue::make_computed(PropertyValue::Bool(true));
    let wire = marshal_value(&value, &opts).expect("marshal");
    assert_eq!(wire, Some(WireValue::from(UNKNOWN_BOOL)));
    let decoded = unmarshal_value(&wire.expect("kept"), &opts).expect("unmarshal");
    assert_eq!(decoded, Some(PropertyValue::make_computed(PropertyValue::Bool(false))));
}

#[rstest]
fn resource_reference_collapses_to_id_without_resource_support() {
    let value = PropertyValue::from(reference());
    let wire = marshal_value(&value, &MarshalOptions::default()).expect("marshal");
    assert_eq!(wire, Some(WireValue::from("abc123")));
}

#[rstest]
fn component_reference_collapses_to_urn() {
    let value = PropertyValue::from(ResourceReference::component(Urn::new(URN), ""));
    let wire = marshal_value(&value, &MarshalOptions::default()).expect("marshal");
    assert_eq!(wire, Some(WireValue::from(URN)));
}

#[rstest]
fn resource_reference_round_trips_with_resource_support() {
    let opts = MarshalOptions::default().keep_resources(true);
    let value = PropertyValue::from(reference());
    let wire = marshal_value(&value, &opts).expect("marshal");

    let encoded = fields(wire.clone());
    assert_eq!(encoded.get(SIG_KEY), Some(&WireValue::from(RESOURCE_REFERENCE_SIG)));
    assert_eq!(encoded.get("urn"), Some(&WireValue::from(URN)));
    assert_eq!(encoded.get("id"), Some(&WireValue::from("abc123")));
    assert_eq!(encoded.get("packageVersion"), Some(&WireValue::from("1.2.3")));

    let decoded = unmarshal_value(&wire.expect("kept"), &opts).expect("unmarshal");
    assert_eq!(decoded, Some(value));
}

#[rstest]
fn unknown_reference_id_stays_distinct_from_absent_id() {
    let opts = MarshalOptions::default().keep_resources(true).keep_unknowns(true);
    let value = PropertyValue::from(ResourceReference::custom_unknown(Urn::new(URN), ""));
    let wire = marshal_value(&value, &opts).expect("marshal").expect("kept");
    assert_eq!(
        wire.as_struct().and_then(|encoded| encoded.get("id")),
        Some(&WireValue::from(UNKNOWN_STRING))
    );
    assert_eq!(unmarshal_value(&wire, &opts).expect("unmarshal"), Some(value));
}

#[rstest]
fn decoding_reference_without_resource_support_prefers_id() {
    let opts = MarshalOptions::default().keep_resources(true);
    let wire = marshal_value(&PropertyValue::from(reference()), &opts)
        .expect("marshal")
        .expect("kept");
    let decoded = unmarshal_value(&wire, &MarshalOptions::default()).expect("unmarshal");
    assert_eq!(decoded, Some(PropertyValue::from("abc123")));
}

#[rstest]
fn elided_asset_carries_only_its_hash() {
    let asset = Asset::text("hello").with_hash(HELLO_SHA256);
    let opts = MarshalOptions::default().elide_asset_contents(true);
    let encoded = fields(marshal_value(&PropertyValue::from(asset), &opts).expect("marshal"));

    assert_eq!(encoded.get(SIG_KEY), Some(&WireValue::from(ASSET_SIG)));
    assert_eq!(encoded.get("hash"), Some(&WireValue::from(HELLO_SHA256)));
    assert!(!encoded.contains_key("text"));

    let decoded = unmarshal_value(&WireValue::Struct(encoded), &opts).expect("unmarshal");
    assert_eq!(decoded, Some(PropertyValue::from(Asset::hash_only(HELLO_SHA256))));
}

#[rstest]
fn eliding_computes_a_missing_hash_first() {
    let opts = MarshalOptions::default().elide_asset_contents(true);
    let wire = marshal_value(&Asset::text("hello").into(), &opts)
        .expect("marshal")
        .expect("kept");
    let encoded = fields(Some(wire.clone()));
    assert_eq!(encoded.get("hash"), Some(&WireValue::from(HELLO_SHA256)));
    assert!(!encoded.contains_key("text"));
    assert_eq!(
        unmarshal_value(&wire, &opts).expect("unmarshal"),
        Some(PropertyValue::from(Asset::hash_only(HELLO_SHA256)))
    );
}

#[rstest]
#[case::asset(Asset::hash_only("").into(), "asset")]
#[case::archive(Archive::hash_only("").into(), "archive")]
fn eliding_without_contents_or_hash_is_an_error(
    #[case] value: PropertyValue,
    #[case] expected: &str,
) {
    let opts = MarshalOptions::default().elide_asset_contents(true);
    let err = marshal_value(&value, &opts).expect_err("nothing to identify the contents");
    assert!(matches!(err, MarshalError::AssetHash { kind, .. } if kind == expected));
}

#[rstest]
fn computes_missing_asset_hash_before_encoding() {
    let opts = MarshalOptions::default().compute_asset_hashes(true);
    let encoded = fields(marshal_value(&Asset::text("hello").into(), &opts).expect("marshal"));
    assert_eq!(encoded.get("hash"), Some(&WireValue::from(HELLO_SHA256)));
    assert_eq!(encoded.get("text"), Some(&WireValue::from("hello")));
}

#[rstest]
fn reports_unreadable_asset_hash() {
    let opts = MarshalOptions::default().compute_asset_hashes(true);
    let asset = Asset::uri("https://example.com/blob");
    assert!(matches!(
        marshal_value(&asset.into(), &opts),
        Err(MarshalError::AssetHash { kind: "asset", .. })
    ));
}

#[rstest]
#[case::asset(Asset::text("x").into(), "asset")]
#[case::archive(Archive::path("./dist").into(), "archive")]
fn rejects_assets_when_asked(#[case] value: PropertyValue, #[case] expected: &str) {
    let opts = MarshalOptions::default().reject_assets(true);
    let err = marshal_value(&value, &opts).expect_err("assets rejected");
    assert!(matches!(err, MarshalError::AssetRejected { kind } if kind == expected));
}

#[rstest]
fn archive_members_round_trip() {
    let archive = Archive::assets([
        ("index.html", Asset::text("<html/>")),
        ("logo.png", Asset::path("./logo.png").with_hash("abc")),
    ]);
    let opts = MarshalOptions::default();
    let wire = marshal_value(&archive.clone().into(), &opts).expect("marshal").expect("kept");
    assert_eq!(
        unmarshal_value(&wire, &opts).expect("unmarshal"),
        Some(PropertyValue::from(archive))
    );
}

#[rstest]
fn secrets_in_arrays_keep_per_element_secrecy() {
    let props = PropertyMap::new().with(
        "items",
        vec![
            PropertyValue::from("a"),
            PropertyValue::make_secret("b".into()),
            PropertyValue::from("c"),
        ],
    );
    let opts = MarshalOptions::default().keep_secrets(true);
    let wire = marshal_properties(&props, &opts).expect("marshal");
    let decoded = unmarshal_properties(&wire, &opts).expect("unmarshal");

    let items = decoded
        .get("items")
        .and_then(PropertyValue::as_array)
        .expect("items array");
    assert_eq!(items.first(), Some(&PropertyValue::from("a")));
    assert_eq!(items.get(1), Some(&PropertyValue::make_secret("b".into())));
    assert_eq!(items.get(2), Some(&PropertyValue::from("c")));
    assert_eq!(decoded, props);
}

#[rstest]
fn nested_secret_encodes_like_a_single_secret() {
    let once = PropertyValue::make_secret("x".into());
    let twice = PropertyValue::Secret(gantry_resource::Secret::new(once.clone()));
    let opts = MarshalOptions::default().keep_secrets(true);

    let single = marshal_value(&once, &opts).expect("marshal");
    let double = marshal_value(&twice, &opts).expect("marshal");
    assert_eq!(single, double);
    assert_eq!(
        unmarshal_value(&double.expect("kept"), &opts).expect("unmarshal"),
        Some(once)
    );
}

#[rstest]
fn secrets_unwrap_without_secret_support() {
    let value = PropertyValue::make_secret("x".into());
    let wire = marshal_value(&value, &MarshalOptions::default()).expect("marshal");
    assert_eq!(wire, Some(WireValue::from("x")));
}

#[rstest]
fn secret_without_value_is_malformed() {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from(SECRET_SIG));
    let err = unmarshal_value(&WireValue::Struct(encoded), &MarshalOptions::default())
        .expect_err("value is required");
    assert_eq!(err.to_string(), "malformed secret: missing value");
}

#[rstest]
fn secret_of_dropped_unknown_is_omitted() {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from(SECRET_SIG));
    encoded.insert("value".to_owned(), WireValue::from(UNKNOWN_STRING));
    let opts = MarshalOptions::default().keep_secrets(true);
    assert_eq!(unmarshal_value(&WireValue::Struct(encoded), &opts).expect("unmarshal"), None);
}

#[rstest]
fn unrecognised_signature_is_an_error() {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from("not-a-signature"));
    let err = unmarshal_value(&WireValue::Struct(encoded), &MarshalOptions::default())
        .expect_err("unknown signature");
    assert_eq!(
        err.to_string(),
        "unrecognized signature 'not-a-signature' in property map"
    );
}

#[rstest]
#[case::missing_urn(None, "malformed resource reference: missing urn")]
#[case::numeric_urn(Some(WireValue::Number(1.0)), "malformed resource reference: urn not a string")]
fn malformed_reference_names_the_field(#[case] urn: Option<WireValue>, #[case] message: &str) {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from(RESOURCE_REFERENCE_SIG));
    if let Some(value) = urn {
        encoded.insert("urn".to_owned(), value);
    }
    let err = unmarshal_value(&WireValue::Struct(encoded), &MarshalOptions::default())
        .expect_err("malformed");
    assert_eq!(err.to_string(), message);
}

#[rstest]
fn sparse_output_object_reflects_metadata() {
    let opts = MarshalOptions::keep_all();
    let unknown = Output::unknown(PropertyValue::Null);
    let encoded = fields(marshal_value(&unknown.into(), &opts).expect("marshal"));
    assert_eq!(encoded.len(), 1);
    assert_eq!(encoded.get(SIG_KEY), Some(&WireValue::from(OUTPUT_VALUE_SIG)));

    let known = Output::known(PropertyValue::from("v"))
        .with_secret(true)
        .with_dependencies([Urn::new(URN)]);
    let wire = marshal_value(&known.clone().into(), &opts).expect("marshal").expect("kept");
    let encoded_known = fields(Some(wire.clone()));
    assert_eq!(encoded_known.get("value"), Some(&WireValue::from("v")));
    assert_eq!(encoded_known.get("secret"), Some(&WireValue::Bool(true)));
    assert_eq!(
        encoded_known.get("dependencies"),
        Some(&WireValue::List(vec![WireValue::from(URN)]))
    );
    assert_eq!(
        unmarshal_value(&wire, &opts).expect("unmarshal"),
        Some(PropertyValue::from(known))
    );
}

#[rstest]
fn outputs_collapse_without_output_support() {
    let opts = MarshalOptions::default().keep_secrets(true).keep_unknowns(true);
    let secret_output = Output::known(PropertyValue::from("v")).with_secret(true);
    let decoded = unmarshal_value(
        &marshal_value(&secret_output.into(), &opts).expect("marshal").expect("kept"),
        &opts,
    )
    .expect("unmarshal");
    assert_eq!(decoded, Some(PropertyValue::make_secret("v".into())));

    let unknown = Output::unknown(PropertyValue::Number(0.0));
    assert_eq!(
        marshal_value(&unknown.into(), &opts).expect("marshal"),
        Some(WireValue::from(UNKNOWN_NUMBER))
    );
}

#[rstest]
fn output_with_malformed_dependencies_is_an_error() {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from(OUTPUT_VALUE_SIG));
    encoded.insert("dependencies".to_owned(), WireValue::List(vec![WireValue::Bool(true)]));
    assert!(matches!(
        unmarshal_value(&WireValue::Struct(encoded), &MarshalOptions::default()),
        Err(MarshalError::WrongFieldKind { field: "dependencies", .. })
    ));
}

#[rstest]
fn null_and_internal_filters_apply_both_ways() {
    let props = PropertyMap::new()
        .with("kept", "x")
        .with("gone", PropertyValue::Null)
        .with("__internal", "y");
    let opts = MarshalOptions::default().skip_nulls(true).skip_internal_keys(true);
    let wire = marshal_properties(&props, &opts).expect("marshal");
    assert_eq!(wire.keys().collect::<Vec<_>>(), vec!["kept"]);

    let mut incoming = WireStruct::new();
    incoming.insert("kept".to_owned(), WireValue::from("x"));
    incoming.insert("gone".to_owned(), WireValue::Null);
    incoming.insert("__internal".to_owned(), WireValue::from("y"));
    let decoded = unmarshal_properties(&incoming, &opts).expect("unmarshal");
    assert_eq!(decoded, PropertyMap::new().with("kept", "x"));
}

#[rstest]
#[case::known_null_output(Output::known(PropertyValue::Null).into())]
#[case::secret_null_output(Output::known(PropertyValue::Null).with_secret(true).into())]
#[case::secret_null(PropertyValue::make_secret(PropertyValue::Null))]
#[case::secret_object(PropertyValue::make_secret(
    PropertyValue::Object(PropertyMap::new().with("kept", "x"))
))]
fn nulls_inside_signature_objects_survive_skip_nulls(#[case] entry: PropertyValue) {
    let opts = MarshalOptions::keep_all().skip_nulls(true).skip_internal_keys(true);
    let props = PropertyMap::new().with("entry", entry);
    let wire = marshal_properties(&props, &opts).expect("marshal");
    assert_eq!(unmarshal_properties(&wire, &opts).expect("unmarshal"), props);
}

#[rstest]
fn secret_of_null_from_the_wire_is_kept_when_skipping_nulls() {
    let mut encoded = WireStruct::new();
    encoded.insert(SIG_KEY.to_owned(), WireValue::from(SECRET_SIG));
    encoded.insert("value".to_owned(), WireValue::Null);
    let mut incoming = WireStruct::new();
    incoming.insert("password".to_owned(), WireValue::Struct(encoded));

    let opts = MarshalOptions::keep_all().skip_nulls(true);
    let decoded = unmarshal_properties(&incoming, &opts).expect("unmarshal");
    assert_eq!(
        decoded.get("password"),
        Some(&PropertyValue::make_secret(PropertyValue::Null))
    );
}

#[rstest]
fn null_encodes_as_null_even_when_skipping_nulls() {
    let opts = MarshalOptions::default().skip_nulls(true);
    assert_eq!(
        marshal_value(&PropertyValue::Null, &opts).expect("marshal"),
        Some(WireValue::Null)
    );
}
