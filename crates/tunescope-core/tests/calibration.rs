//! Calibration tests - document parsing, value coercion and clamped lookups

use pretty_assertions::assert_eq;
use serde_json::json;
use tunescope_core::calibration::{
    bin_index, interpolate_1d, interpolate_2d, CalibrationStore, MapIds, MapKind,
};
use tunescope_core::demo::calibration_document;

fn store(doc: serde_json::Value) -> CalibrationStore {
    let mut store = CalibrationStore::new();
    store.try_parse_value(doc).expect("document should parse");
    store
}

#[test]
fn test_interpolate_1d_clamps_at_both_ends() {
    let values = [10.0, 20.0, 30.0];
    let axis = [0.0, 10.0, 20.0];

    assert_eq!(interpolate_1d(&values, &axis, -100.0), 10.0);
    assert_eq!(interpolate_1d(&values, &axis, 0.0), 10.0);
    assert_eq!(interpolate_1d(&values, &axis, 5.0), 15.0);
    assert_eq!(interpolate_1d(&values, &axis, 10.0), 20.0);
    assert_eq!(interpolate_1d(&values, &axis, 20.0), 30.0);
    assert_eq!(interpolate_1d(&values, &axis, 1e9), 30.0);
}

#[test]
fn test_interpolate_2d_corners_and_center() {
    let table = vec![vec![0.0, 10.0], vec![20.0, 30.0]];
    let rows = [1000.0, 2000.0];
    let cols = [0.0, 1.0];

    assert_eq!(interpolate_2d(&table, &rows, &cols, 1000.0, 0.0), 0.0);
    assert_eq!(interpolate_2d(&table, &rows, &cols, 2000.0, 1.0), 30.0);
    assert_eq!(interpolate_2d(&table, &rows, &cols, 1500.0, 0.5), 15.0);
    // Each axis clamps independently
    assert_eq!(interpolate_2d(&table, &rows, &cols, 500.0, 0.5), 5.0);
    assert_eq!(interpolate_2d(&table, &rows, &cols, 1500.0, 9.0), 20.0);
}

#[test]
fn test_bin_index_edges() {
    let axis = [1000.0, 2000.0, 3000.0];
    assert_eq!(bin_index(0.0, &axis), 0);
    assert_eq!(bin_index(1000.0, &axis), 0);
    assert_eq!(bin_index(1999.0, &axis), 0);
    assert_eq!(bin_index(2000.0, &axis), 1);
    assert_eq!(bin_index(3000.0, &axis), 2);
    assert_eq!(bin_index(9000.0, &axis), 2);
}

#[test]
fn test_mixed_encodings_read_the_same() {
    let cal = store(json!({"maps": [
        {"id": "nested", "data": [[1, 2], [3, 4]]},
        {"id": "nested_text", "data": [["1", "2"], ["3", "4"]]},
        {"id": "row_strings", "data": ["1,2", "3,4"]},
        {"id": "json_rows", "data": ["[1,2]", "[3,4]"]}
    ]}));

    let expected = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
    for id in ["nested", "nested_text", "row_strings", "json_rows"] {
        assert_eq!(cal.get_table(id), Some(expected.clone()), "map {id}");
        assert_eq!(cal.entry(id).map(|e| e.kind), Some(MapKind::Table), "map {id}");
    }
}

#[test]
fn test_scalars_and_arrays() {
    let cal = store(json!({"maps": [
        {"id": "step", "value": "1.4"},
        {"id": "limit", "value": 6800},
        {"id": "first_of_list", "value": [3, 4]},
        {"id": "axis_text", "data": "800, 1600,2400"},
        {"id": "garbage", "data": [1, "x", null, 4]}
    ]}));

    assert_eq!(cal.get_parameter("step"), Some(1.4));
    assert_eq!(cal.get_parameter("limit"), Some(6800.0));
    assert_eq!(cal.get_parameter("first_of_list"), Some(3.0));
    assert_eq!(cal.get_array("axis_text"), Some(vec![800.0, 1600.0, 2400.0]));
    assert_eq!(cal.get_array("garbage"), Some(vec![1.0, 0.0, 0.0, 4.0]));
    assert_eq!(cal.get_parameter("missing"), None);
}

#[test]
fn test_value_field_wins_over_data() {
    let cal = store(json!({"maps": [
        {"id": "both", "value": 2, "data": 5},
        {"id": "null_value", "value": null, "data": 7}
    ]}));
    assert_eq!(cal.get_parameter("both"), Some(2.0));
    assert_eq!(cal.get_parameter("null_value"), Some(7.0));
}

#[test]
fn test_rejects_documents_without_maps() {
    let mut cal = CalibrationStore::new();
    assert!(cal.try_parse(r#"{"cal_id": "x"}"#).is_err());
    assert!(cal.try_parse("[]").is_err());
    assert!(cal.try_parse("nope").is_err());
    assert!(!cal.is_loaded());
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tune.json");
    std::fs::write(&path, calibration_document().to_string()).unwrap();

    let mut cal = CalibrationStore::new();
    cal.load(&path).unwrap();
    let meta = cal.metadata().unwrap();
    assert_eq!(meta.cal_id.as_deref(), Some("DEMO-0001"));
    assert_eq!(cal.version().as_deref(), Some("1.0"));
    assert_eq!(cal.table_shape("fuel_base"), Some((8, 8)));

    assert!(cal.load(dir.path().join("missing.json")).is_err());
    assert!(!cal.is_loaded());
}

#[test]
fn test_lookups_use_declared_axes() {
    let cal = store(json!({"maps": [
        {"id": "rpm_a", "data": [1000, 3000]},
        {"id": "curve", "data": [10, 30], "row_axis": "rpm_a"},
        {"id": "other_axis", "data": [0, 1]}
    ]}));

    // The map's own row_axis overrides the axis id passed in
    assert_eq!(cal.lookup_1d("curve", "other_axis", 2000.0), Some(20.0));
    assert_eq!(cal.lookup_1d("curve", "missing_axis", 5000.0), Some(30.0));
}

#[test]
fn test_lookup_rejects_bad_axes() {
    let cal = store(json!({"maps": [
        {"id": "descending", "data": [3000, 1000]},
        {"id": "short", "data": [1000]},
        {"id": "curve", "data": [10, 30]}
    ]}));
    assert_eq!(cal.lookup_1d("curve", "descending", 2000.0), None);
    assert_eq!(cal.lookup_1d("curve", "short", 2000.0), None);
    assert_eq!(cal.axis("descending"), None);
}

#[test]
fn test_domain_accessors_on_demo_calibration() {
    let cal = store(calibration_document());

    // Exactly on a breakpoint
    assert_eq!(cal.boost_target(3000.0, 100.0), 200.0);
    // Halfway between the 2000 and 4000 rpm limits
    assert_eq!(cal.boost_limit(3000.0), 245.0);
    assert_eq!(cal.boost_limit(100.0), 240.0);
    assert!((cal.pe_lambda_target(4000.0, 1.5) - 0.81).abs() < 1e-9);
    assert_eq!(cal.fan_thresholds().high_on, 102.0);
    assert_eq!(cal.iat_thresholds().warning, 50.0);
    assert_eq!(cal.knock_parameters().retard_step, 1.4);
    assert_eq!(cal.rev_limit(), 6800.0);
    assert_eq!(cal.pe_enable_thresholds(3000.0).throttle, 70.0);
}

#[test]
fn test_accessor_defaults_without_maps() {
    let cal = store(json!({"maps": []}));
    assert_eq!(cal.boost_target(3000.0, 100.0), 180.0);
    assert_eq!(cal.boost_limit(3000.0), 250.0);
    assert_eq!(cal.pe_lambda_target(3000.0, 1.0), 0.82);
    assert_eq!(cal.fan_thresholds().high_on, 102.0);
    assert_eq!(cal.rev_limit(), 7000.0);
}

#[test]
fn test_custom_map_ids() {
    let ids = MapIds {
        rev_limit: "redline".to_string(),
        ..MapIds::default()
    };
    let mut cal = CalibrationStore::with_map_ids(ids);
    cal.try_parse_value(json!({"maps": [{"id": "redline", "value": 7400}]}))
        .unwrap();
    assert_eq!(cal.rev_limit(), 7400.0);
}
