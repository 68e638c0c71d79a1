//! Parse and compose round trips for filename patterns.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use pattern_parser::{compose_str, FieldValue, Pattern, PatternError};

const FILE_PATTERN: &str = "{start_time:%Y%m%d_%H%M}_{area}_{product}.tif";

#[test]
fn test_parse_typed_fields() {
    let pattern = Pattern::new(FILE_PATTERN).unwrap();
    let fields = pattern.parse("20200818_1200_europe_airmass.tif").unwrap();

    let expected = NaiveDate::from_ymd_opt(2020, 8, 18)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    assert_eq!(fields["start_time"].as_time(), Some(expected));
    assert_eq!(fields["area"].as_text(), Some("europe"));
    assert_eq!(fields["product"].as_text(), Some("airmass"));
}

#[test]
fn test_parse_rejects_nonmatching_input() {
    let pattern = Pattern::new(FILE_PATTERN).unwrap();

    let err = pattern.parse("not_an_image.txt").unwrap_err();
    assert!(matches!(err, PatternError::NoMatch { .. }));

    // Right shape, but the timestamp digits are not a valid date.
    let err = pattern.parse("20201340_9900_europe_airmass.tif").unwrap_err();
    assert!(matches!(err, PatternError::TimeParse { .. }));
}

#[test]
fn test_parse_fields_are_identical_for_both_directions() {
    // A candidate and a stored location parsed with the same pattern
    // produce the same field names.
    let pattern = Pattern::new(FILE_PATTERN).unwrap();
    let a = pattern.parse("20200818_1200_europe_airmass.tif").unwrap();
    let b = pattern.parse("20200818_1201_europe_ash.tif").unwrap();
    let keys_a: Vec<_> = a.keys().collect();
    let keys_b: Vec<_> = b.keys().collect();
    assert_eq!(keys_a, keys_b);
}

#[test]
fn test_compose_round_trip() {
    let pattern = Pattern::new(FILE_PATTERN).unwrap();
    let fields = pattern.parse("20200818_1200_europe_airmass.tif").unwrap();
    assert_eq!(
        pattern.compose(&fields).unwrap(),
        "20200818_1200_europe_airmass.tif"
    );
}

#[test]
fn test_compose_missing_field() {
    let pattern = Pattern::new("{area}_{product}.tif").unwrap();
    let mut fields = BTreeMap::new();
    fields.insert("area".to_string(), FieldValue::Text("europe".to_string()));

    let err = pattern.compose(&fields).unwrap_err();
    assert!(matches!(err, PatternError::MissingField(name) if name == "product"));

    // Partial composition leaves the unknown field in place.
    assert_eq!(pattern.compose_partial(&fields), "europe_{product}.tif");
}

#[test]
fn test_compose_str_layer_name() {
    let mut meta = BTreeMap::new();
    meta.insert("area_name".to_string(), "europe".to_string());
    meta.insert("product_name".to_string(), "airmass".to_string());

    let name = compose_str("{area_name}_{product_name}", &meta, false).unwrap();
    assert_eq!(name, "europe_airmass");
}

#[test]
fn test_compose_str_partial_property_line() {
    let meta = BTreeMap::new();
    let line = compose_str("Name={layer_name}", &meta, true).unwrap();
    assert_eq!(line, "Name={layer_name}");
}

#[test]
fn test_repeated_field_must_agree() {
    let pattern = Pattern::new("{area}_{area}.tif").unwrap();
    assert!(pattern.parse("europe_europe.tif").is_ok());
    assert!(matches!(
        pattern.parse("europe_africa.tif"),
        Err(PatternError::NoMatch { .. })
    ));
}

#[test]
fn test_trailing_field_swallows_rest() {
    let pattern = Pattern::new("{area}_{rest}").unwrap();
    let fields = pattern.parse("europe_air_mass_rgb").unwrap();
    assert_eq!(fields["area"].as_text(), Some("europe"));
    assert_eq!(fields["rest"].as_text(), Some("air_mass_rgb"));
}

#[test]
fn test_date_only_spec_parses_to_midnight() {
    let pattern = Pattern::new("{start_time:%Y%m%d}_{product}.tif").unwrap();
    let fields = pattern.parse("20200818_airmass.tif").unwrap();
    let expected = NaiveDate::from_ymd_opt(2020, 8, 18)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(fields["start_time"].as_time(), Some(expected));
}
