//! Session tests - full analysis of the simulated drive

use pretty_assertions::assert_eq;
use tunescope_core::calibration::CalibrationStore;
use tunescope_core::config::AnalysisConfig;
use tunescope_core::demo::{calibration_document, PullSettings, PullSimulator};
use tunescope_core::detect::{Domain, Severity};
use tunescope_core::log::{IngestOptions, LogDataset};
use tunescope_core::session::{AnalysisSession, SessionReport};

fn demo_calibration() -> CalibrationStore {
    let mut store = CalibrationStore::new();
    store.try_parse_value(calibration_document()).unwrap();
    store
}

fn run(dataset: &LogDataset, config: &AnalysisConfig) -> SessionReport {
    let calibration = demo_calibration();
    AnalysisSession::new(&calibration, dataset, config).run(true)
}

fn groups_of<'r>(report: &'r SessionReport, domain: Domain) -> Vec<(&'r str, Severity)> {
    report
        .detections
        .iter()
        .find(|d| d.domain == domain)
        .map(|d| {
            d.event_groups
                .iter()
                .map(|g| (g.event_type.as_str(), g.severity))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn test_demo_drive_findings() {
    let dataset = PullSimulator::new(42).dataset();
    let report = run(&dataset, &AnalysisConfig::default());

    assert_eq!(report.detections.len(), 7);
    assert!(report.detections.iter().all(|d| d.is_ok()));
    assert_eq!(report.log.rows, dataset.len());
    assert_eq!(
        report.calibration.as_ref().and_then(|c| c.cal_id.as_deref()),
        Some("DEMO-0001")
    );

    // One lean stretch late in each pull
    let afr = groups_of(&report, Domain::Afr);
    assert_eq!(afr.iter().filter(|(t, _)| *t == "lean").count(), 2);
    assert!(afr.iter().all(|(t, _)| *t != "rich"));

    let boost = groups_of(&report, Domain::Boost);
    assert!(boost.iter().any(|(t, _)| *t == "overboost"));

    let knock = groups_of(&report, Domain::Knock);
    assert_eq!(knock.len(), 2);
    assert!(knock.iter().all(|(t, _)| *t == "heavy_knock"));

    assert!(groups_of(&report, Domain::CoolantTemp).is_empty());
    assert!(groups_of(&report, Domain::IntakeAirTemp).is_empty());
}

#[test]
fn test_demo_drive_autotune() {
    let dataset = PullSimulator::new(42).dataset();
    let report = run(&dataset, &AnalysisConfig::default());

    assert_eq!(report.autotune_error, None);
    let autotune = report.autotune.expect("autotune should run");
    assert!(autotune.rows.open_loop > 0);
    assert!(autotune.rows.closed_loop > 0);
    assert!(!autotune.open_loop_cells.is_empty());
    // Cruise trims sit above the 10% limit
    assert!(!autotune.clamped_cells.is_empty());
    for cell in autotune.cells() {
        assert!(cell.applied_change_pct.abs() <= autotune.change_limit_percent + 1e-9);
    }
}

#[test]
fn test_quiet_drive_has_no_events() {
    let settings = PullSettings {
        lean_bias: 0.0,
        boost_overshoot: 0.0,
        knock_burst: false,
        ..PullSettings::default()
    };
    let dataset = PullSimulator::with_settings(3, settings).dataset();
    let report = run(&dataset, &AnalysisConfig::default());

    assert!(groups_of(&report, Domain::Afr).is_empty());
    assert!(groups_of(&report, Domain::Knock).is_empty());
    assert!(groups_of(&report, Domain::Boost)
        .iter()
        .all(|(t, _)| *t != "overboost"));
}

#[test]
fn test_partial_log_reports_missing_detectors() {
    let mut raw = PullSimulator::new(5).raw_log();
    // Keep time, rpm and coolant only
    let keep = [0usize, 1, 11];
    raw.columns = keep.iter().map(|&i| raw.columns[i].clone()).collect();
    for row in &mut raw.rows {
        *row = keep.iter().map(|&i| row[i].clone()).collect();
    }
    let dataset = LogDataset::from_raw(raw, &IngestOptions::default());
    let report = run(&dataset, &AnalysisConfig::default());

    let failed: Vec<Domain> = report
        .detections
        .iter()
        .filter(|d| !d.is_ok())
        .map(|d| d.domain)
        .collect();
    assert_eq!(
        failed,
        vec![
            Domain::Afr,
            Domain::Boost,
            Domain::ShortTermTrim,
            Domain::LongTermTrim,
            Domain::IntakeAirTemp,
            Domain::Knock,
        ]
    );
    assert!(report.autotune.is_none());
    assert!(report
        .autotune_error
        .as_deref()
        .is_some_and(|e| e.starts_with("Missing")));
}

#[test]
fn test_config_file_changes_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tunescope.json");
    std::fs::write(
        &path,
        r#"{
            "afr": { "lean_threshold": 0.2, "tolerance": 0.2 },
            "autotune": { "change_limit_percent": 2.5 }
        }"#,
    )
    .unwrap();
    let config = AnalysisConfig::load(&path).unwrap();
    assert_eq!(config.afr.rich_threshold, 0.05);

    let dataset = PullSimulator::new(42).dataset();
    let report = run(&dataset, &config);

    assert!(groups_of(&report, Domain::Afr).is_empty());
    let autotune = report.autotune.unwrap();
    assert_eq!(autotune.change_limit_percent, 2.5);
    for cell in autotune.cells() {
        assert!(cell.applied_change_pct.abs() <= 2.5 + 1e-9);
    }
}

#[test]
fn test_report_serializes() {
    let dataset = PullSimulator::new(42).dataset();
    let report = run(&dataset, &AnalysisConfig::default());
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["detections"][0]["domain"], "afr");
    assert_eq!(value["detections"][0]["type_a_label"], "lean");
    assert!(value["autotune"]["corrected_table"].is_array());
    assert!(value.get("autotune_error").is_none());
}
