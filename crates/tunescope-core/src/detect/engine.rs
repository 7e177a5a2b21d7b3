//! Shared detection pipeline
//!
//! rows -> classified samples -> events (contiguous significant runs that
//! last long enough) -> event groups (nearby events of one class) plus
//! statistics over the kept events.

use std::collections::BTreeMap;

use crate::calibration::CalibrationStore;
use crate::log::{Channel, LogDataset, LogRow};

use super::profile::DetectionProfile;
use super::types::{
    Classification, DetectionResult, Domain, Event, EventGroup, Sample, Statistics, Thresholds,
    Timing,
};

const TIME_EPSILON: f64 = 1e-9;

/// Run one profile over a dataset
pub fn detect(
    profile: &dyn DetectionProfile,
    dataset: &LogDataset,
    calibration: &CalibrationStore,
) -> DetectionResult {
    let interval = dataset.sampling_interval();
    let mut result = DetectionResult::empty(profile.domain(), profile.labels(), interval);
    result.columns = profile
        .required_channels()
        .into_iter()
        .chain(profile.context_channels())
        .filter_map(|c| dataset.column_for(c).map(|name| (c, name.to_string())))
        .collect();

    let missing = profile.missing_channels(dataset);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(Channel::label).collect();
        let error = format!("Missing required column(s): {}", names.join(", "));
        tracing::warn!("{}: {error}", profile.domain().name());
        result.error = Some(error);
        return result;
    }

    let thresholds = profile.thresholds(calibration);
    let timing = profile.timing();
    let samples = classify_rows(profile, dataset.rows(), calibration, &thresholds);
    let events = build_events(profile, &samples, &thresholds, &timing, interval);
    let groups = coalesce(profile, &events, &thresholds, &timing, interval);

    result.statistics = statistics(profile, samples.len(), &events, &groups);
    tracing::debug!(
        "{}: {} samples, {} events, {} groups",
        profile.domain().name(),
        samples.len(),
        events.len(),
        groups.len()
    );
    result.events = events;
    result.event_groups = groups;
    result
}

/// Regime-filter and classify every row
pub fn classify_rows(
    profile: &dyn DetectionProfile,
    rows: &[LogRow],
    calibration: &CalibrationStore,
    thresholds: &Thresholds,
) -> Vec<Sample> {
    rows.iter()
        .filter_map(|row| {
            let reading = profile.reading(row, calibration)?;
            if !reading.value.is_finite() || !reading.deviation.is_finite() {
                return None;
            }
            let (classification, significant) = profile.classify(&reading, row, thresholds);
            Some(Sample {
                time: row.time,
                value: reading.value,
                target: reading.target,
                deviation: reading.deviation,
                rpm: row.rpm,
                load: row.load,
                throttle: row.throttle,
                aux: reading.aux,
                classification,
                significant,
            })
        })
        .collect()
}

/// Duration covered by a run of `count` samples
///
/// Each sample stands for one sampling interval, so a lone sample lasts one
/// interval rather than zero.
pub fn event_duration(first: f64, last: f64, count: usize, interval: f64) -> f64 {
    let span = (last - first) + interval;
    span.max((count as f64 * interval).max(interval))
}

/// Merge significant samples into events and drop the short ones
///
/// Samples must be in non-decreasing time order.
pub fn build_events(
    profile: &dyn DetectionProfile,
    samples: &[Sample],
    thresholds: &Thresholds,
    timing: &Timing,
    interval: f64,
) -> Vec<Event> {
    let mut events = Vec::new();
    let mut run: Vec<Sample> = Vec::new();
    let mut run_class = Classification::Normal;

    for sample in samples.iter().filter(|s| s.significant) {
        if let Some(last) = run.last() {
            let gap = sample.time - last.time;
            let class_change = timing.split_on_change
                && !run_class.is_normal()
                && !sample.classification.is_normal()
                && sample.classification != run_class;
            if gap > timing.run_gap + TIME_EPSILON || class_change {
                let members = std::mem::take(&mut run);
                events.extend(finish_event(profile, members, run_class, thresholds, timing, interval));
                run_class = Classification::Normal;
            }
        }
        if run_class.is_normal() {
            run_class = sample.classification;
        }
        run.push(sample.clone());
    }
    if !run.is_empty() {
        events.extend(finish_event(profile, run, run_class, thresholds, timing, interval));
    }
    events
}

fn finish_event(
    profile: &dyn DetectionProfile,
    members: Vec<Sample>,
    run_class: Classification,
    thresholds: &Thresholds,
    timing: &Timing,
    interval: f64,
) -> Option<Event> {
    let first = members.first()?;
    let last = members.last()?;
    let (start, end) = (first.time, last.time);
    let duration = event_duration(start, end, members.len(), interval);
    if duration + TIME_EPSILON < timing.min_duration {
        return None;
    }

    let representative = most_severe(profile, members.iter())?.clone();
    let classification = if timing.split_on_change {
        run_class
    } else {
        most_severe(profile, members.iter().filter(|s| !s.classification.is_normal()))
            .map(|s| s.classification)
            .unwrap_or(Classification::Normal)
    };

    let n = members.len() as f64;
    Some(Event {
        classification,
        event_type: profile.label(classification).to_string(),
        start,
        end,
        duration,
        sample_count: members.len(),
        severity: profile.severity(&representative, thresholds),
        mean_value: members.iter().map(|s| s.value).sum::<f64>() / n,
        mean_deviation: members.iter().map(|s| s.deviation).sum::<f64>() / n,
        max_abs_deviation: members.iter().map(|s| s.deviation.abs()).fold(0.0, f64::max),
        mean_rpm: mean_present(members.iter().map(|s| s.rpm)),
        mean_load: mean_present(members.iter().map(|s| s.load)),
        mean_throttle: mean_present(members.iter().map(|s| s.throttle)),
        representative,
        samples: members,
    })
}

/// Group nearby events of the same classification, sorted by start time
///
/// Events whose members were all within the type thresholds are not grouped.
pub fn coalesce(
    profile: &dyn DetectionProfile,
    events: &[Event],
    thresholds: &Thresholds,
    timing: &Timing,
    interval: f64,
) -> Vec<EventGroup> {
    let mut groups = Vec::new();
    for class in [Classification::TypeA, Classification::TypeB] {
        let mut members: Vec<&Event> = Vec::new();
        for event in events.iter().filter(|e| e.classification == class) {
            if let Some(previous) = members.last() {
                if event.start - previous.start > timing.coalesce_window + TIME_EPSILON {
                    groups.extend(make_group(profile, &members, thresholds, interval));
                    members.clear();
                }
            }
            members.push(event);
        }
        groups.extend(make_group(profile, &members, thresholds, interval));
    }
    groups.sort_by(|a, b| a.start.total_cmp(&b.start));
    groups
}

fn make_group(
    profile: &dyn DetectionProfile,
    members: &[&Event],
    thresholds: &Thresholds,
    interval: f64,
) -> Option<EventGroup> {
    let first = members.first()?;
    let lead = members.iter().copied().fold(*first, |best, e| {
        if profile.severity_score(&e.representative) > profile.severity_score(&best.representative) {
            e
        } else {
            best
        }
    });

    let start = members.iter().map(|e| e.start).fold(f64::INFINITY, f64::min);
    let end = members.iter().map(|e| e.end).fold(f64::NEG_INFINITY, f64::max);
    let count = members.len();
    let summed: f64 = members.iter().map(|e| e.duration).sum();
    let duration = if summed > 0.0 {
        summed
    } else {
        (end - start) + count as f64 * interval
    };
    let n = count as f64;
    let representative = lead.representative.clone();

    Some(EventGroup {
        classification: first.classification,
        event_type: first.event_type.clone(),
        start,
        end,
        duration,
        event_count: count,
        sample_count: members.iter().map(|e| e.sample_count).sum(),
        severity: profile.severity(&representative, thresholds),
        peak_deviation: representative.deviation,
        peak_value: representative.value,
        max_abs_deviation: members.iter().map(|e| e.max_abs_deviation).fold(0.0, f64::max),
        mean_value: members.iter().map(|e| e.mean_value).sum::<f64>() / n,
        mean_deviation: members.iter().map(|e| e.mean_deviation).sum::<f64>() / n,
        mean_rpm: mean_present(members.iter().map(|e| e.mean_rpm)),
        mean_load: mean_present(members.iter().map(|e| e.mean_load)),
        mean_throttle: mean_present(members.iter().map(|e| e.mean_throttle)),
        representative,
    })
}

/// Statistics over kept-event samples
pub fn statistics(
    profile: &dyn DetectionProfile,
    total_samples: usize,
    events: &[Event],
    groups: &[EventGroup],
) -> Statistics {
    let samples: Vec<&Sample> = events.iter().flat_map(|e| e.samples.iter()).collect();
    let count_class = |class| samples.iter().filter(|s| s.classification == class).count();
    let count_groups = |class| groups.iter().filter(|g| g.classification == class).count();

    let mut stats = Statistics {
        total_samples,
        event_samples: samples.len(),
        type_a_samples: count_class(Classification::TypeA),
        type_b_samples: count_class(Classification::TypeB),
        event_count: events.len(),
        group_count: groups.len(),
        type_a_groups: count_groups(Classification::TypeA),
        type_b_groups: count_groups(Classification::TypeB),
        total_event_time: events.iter().map(|e| e.duration).sum(),
        ..Statistics::default()
    };
    if samples.is_empty() {
        return stats;
    }

    let n = samples.len() as f64;
    stats.mean_deviation = samples.iter().map(|s| s.deviation).sum::<f64>() / n;
    stats.mean_abs_deviation = samples.iter().map(|s| s.deviation.abs()).sum::<f64>() / n;
    stats.max_abs_deviation = samples.iter().map(|s| s.deviation.abs()).fold(0.0, f64::max);
    stats.peak_value = most_severe(profile, samples.iter().copied())
        .map(|s| s.value)
        .unwrap_or(0.0);
    if total_samples > 0 {
        stats.out_of_target_pct = n / total_samples as f64 * 100.0;
    }
    stats
}

/// Highest-scoring sample; the earliest wins ties
fn most_severe<'s>(
    profile: &dyn DetectionProfile,
    samples: impl Iterator<Item = &'s Sample>,
) -> Option<&'s Sample> {
    samples.fold(None, |best: Option<&Sample>, s| match best {
        Some(b) if profile.severity_score(s) <= profile.severity_score(b) => Some(b),
        _ => Some(s),
    })
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let present: Vec<f64> = values.flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

/// One configured detector bound to a dataset and calibration
///
/// Caches its last result; the accessors run [`EventDetector::analyze`] on
/// first use.
pub struct EventDetector<'a> {
    profile: Box<dyn DetectionProfile + 'a>,
    dataset: &'a LogDataset,
    calibration: &'a CalibrationStore,
    result: Option<DetectionResult>,
}

impl<'a> EventDetector<'a> {
    /// Detector for one profile over a dataset
    pub fn new<P: DetectionProfile + 'a>(
        profile: P,
        dataset: &'a LogDataset,
        calibration: &'a CalibrationStore,
    ) -> Self {
        Self::boxed(Box::new(profile), dataset, calibration)
    }

    /// Detector over an already boxed profile
    pub fn boxed(
        profile: Box<dyn DetectionProfile + 'a>,
        dataset: &'a LogDataset,
        calibration: &'a CalibrationStore,
    ) -> Self {
        Self {
            profile,
            dataset,
            calibration,
            result: None,
        }
    }

    /// Domain of the profile
    pub fn domain(&self) -> Domain {
        self.profile.domain()
    }

    /// Recompute from scratch
    pub fn analyze(&mut self) -> &DetectionResult {
        let result = detect(self.profile.as_ref(), self.dataset, self.calibration);
        self.result.insert(result)
    }

    /// Cached result, computing it if needed
    pub fn result(&mut self) -> &DetectionResult {
        let (dataset, calibration) = (self.dataset, self.calibration);
        let profile = &self.profile;
        self.result
            .get_or_insert_with(|| detect(profile.as_ref(), dataset, calibration))
    }

    /// Statistics of the cached result
    pub fn statistics(&mut self) -> &Statistics {
        &self.result().statistics
    }

    /// Kept events of the cached result
    pub fn events(&mut self) -> &[Event] {
        &self.result().events
    }

    /// Event groups of the cached result
    pub fn event_groups(&mut self) -> &[EventGroup] {
        &self.result().event_groups
    }

    /// Columns the detector read
    pub fn columns(&mut self) -> &BTreeMap<Channel, String> {
        &self.result().columns
    }

    /// Consume the detector, computing the result if it never ran
    pub fn into_result(mut self) -> DetectionResult {
        match self.result.take() {
            Some(result) => result,
            None => detect(self.profile.as_ref(), self.dataset, self.calibration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::types::{Reading, Severity};

    struct Plain {
        timing: Timing,
    }

    impl DetectionProfile for Plain {
        fn domain(&self) -> Domain {
            Domain::Afr
        }
        fn labels(&self) -> (&'static str, &'static str) {
            ("high", "low")
        }
        fn required_channels(&self) -> Vec<Channel> {
            vec![Channel::LambdaMeasured]
        }
        fn reading(&self, row: &LogRow, _calibration: &CalibrationStore) -> Option<Reading> {
            row.lambda_measured.map(Reading::value)
        }
        fn thresholds(&self, _calibration: &CalibrationStore) -> Thresholds {
            Thresholds::Deviation {
                upper: 1.0,
                lower: 1.0,
                tolerance: 0.5,
            }
        }
        fn timing(&self) -> Timing {
            self.timing
        }
        fn severity(&self, _sample: &Sample, _thresholds: &Thresholds) -> Severity {
            Severity::Low
        }
    }

    fn plain(min_duration: f64) -> Plain {
        Plain {
            timing: Timing::new(0.25, min_duration, 1.0, true),
        }
    }

    fn samples(points: &[(f64, f64)]) -> Vec<Sample> {
        let profile = plain(0.0);
        let rule = profile.thresholds(&CalibrationStore::new());
        points
            .iter()
            .map(|&(time, value)| {
                let (classification, significant) = rule.classify(value, value);
                Sample {
                    time,
                    value,
                    deviation: value,
                    classification,
                    significant,
                    ..Sample::default()
                }
            })
            .collect()
    }

    fn events(profile: &Plain, points: &[(f64, f64)]) -> Vec<Event> {
        let rule = profile.thresholds(&CalibrationStore::new());
        build_events(profile, &samples(points), &rule, &profile.timing, 0.05)
    }

    #[test]
    fn test_single_sample_duration() {
        assert!((event_duration(1.0, 1.0, 1, 0.05) - 0.05).abs() < 1e-9);
        let found = events(&plain(0.0), &[(1.0, 2.0)]);
        assert_eq!(found.len(), 1);
        assert!((found[0].duration - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_min_duration_boundary() {
        let points = [(0.0, 2.0), (0.05, 2.0)];
        assert_eq!(events(&plain(0.1), &points).len(), 1);
        assert!(events(&plain(0.15), &points).is_empty());
    }

    #[test]
    fn test_gap_splits_runs() {
        let found = events(&plain(0.0), &[(0.0, 2.0), (0.2, 2.0), (0.6, 2.0)]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].sample_count, 2);
    }

    #[test]
    fn test_in_tolerance_samples_are_skipped() {
        let found = events(&plain(0.0), &[(0.0, 2.0), (0.05, 0.1), (0.1, 2.0)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].sample_count, 2);
    }

    #[test]
    fn test_class_change_splits() {
        let found = events(&plain(0.0), &[(0.0, 2.0), (0.05, 0.7), (0.1, -2.0)]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].classification, Classification::TypeA);
        assert_eq!(found[0].sample_count, 2);
        assert_eq!(found[1].classification, Classification::TypeB);
    }

    #[test]
    fn test_no_split_takes_most_severe_class() {
        let profile = Plain {
            timing: Timing::new(0.25, 0.0, 1.0, false),
        };
        let found = events(&profile, &[(0.0, 2.0), (0.05, -3.0)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].classification, Classification::TypeB);
        assert_eq!(found[0].representative.value, -3.0);
    }

    #[test]
    fn test_coalesce_window() {
        let profile = plain(0.0);
        let rule = profile.thresholds(&CalibrationStore::new());
        let found = events(&profile, &[(0.0, 2.0), (0.8, 3.0), (2.5, 2.0)]);
        assert_eq!(found.len(), 3);
        let groups = coalesce(&profile, &found, &rule, &profile.timing, 0.05);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].event_count, 2);
        assert_eq!(groups[0].peak_value, 3.0);
        assert!((groups[0].duration - 0.1).abs() < 1e-9);
        assert_eq!(groups[1].event_count, 1);
    }

    #[test]
    fn test_normal_events_not_grouped() {
        let profile = plain(0.0);
        let rule = profile.thresholds(&CalibrationStore::new());
        let found = events(&profile, &[(0.0, 0.7), (0.05, 0.8)]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].classification, Classification::Normal);
        assert!(coalesce(&profile, &found, &rule, &profile.timing, 0.05).is_empty());

        let stats = statistics(&profile, 2, &found, &[]);
        assert_eq!(stats.event_samples, 2);
        assert_eq!(stats.group_count, 0);
        assert!((stats.out_of_target_pct - 100.0).abs() < 1e-9);
    }
}
