//! Column name resolution
//!
//! Maps a logical channel role (e.g. "target AFR") onto one of the column
//! names present in a log. Stages are tried in order and the first hit wins:
//!
//! 1. exact match against the candidates, in priority order
//! 2. case-insensitive match
//! 3. normalized substring match (units and punctuation removed; every
//!    significant candidate word must appear inside the column, so
//!    "EngineRPM" matches "Engine RPM"; three-letter abbreviations must sit
//!    at the start or end of a column word, and target-like names only
//!    match target-like columns)
//! 4. keyword scoring by role (target-like vs measured-like)
//!
//! No match is a soft failure: callers get `None`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Words marking a target/commanded role
const TARGET_WORDS: &[&str] = &["target", "commanded", "desired", "requested", "cmd"];

/// Words marking a measured role
const MEASURED_WORDS: &[&str] = &["actual", "measured", "sensor", "wideband", "current", "feedback"];

/// Unit tokens dropped during normalization
const UNIT_WORDS: &[&str] = &[
    "kpa", "psi", "bar", "deg", "degc", "degf", "pct", "percent", "volts", "ms", "sec",
];

/// Related words pulled into the keyword set for common abbreviations
const SYNONYMS: &[(&str, &[&str])] = &[
    ("afr", &["air", "fuel", "lambda", "ratio"]),
    ("lambda", &["afr", "air", "fuel", "ratio"]),
    ("stft", &["fuel", "trim", "short"]),
    ("ltft", &["fuel", "trim", "long"]),
    ("rpm", &["engine", "speed"]),
    ("map", &["manifold", "pressure", "boost"]),
    ("iat", &["intake", "air", "temp"]),
    ("ect", &["coolant", "temp"]),
    ("clt", &["coolant", "temp"]),
    ("tps", &["throttle", "position"]),
    ("wgdc", &["wastegate", "duty"]),
    ("iam", &["advance", "multiplier"]),
    ("dam", &["advance", "multiplier"]),
    ("knock", &["retard"]),
];

/// Minimum keyword hits for stage 4
const MIN_KEYWORD_HITS: usize = 2;

/// Which stage produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    /// Exact string match
    Exact,
    /// ASCII case-insensitive match
    CaseInsensitive,
    /// Normalized substring match
    Normalized,
    /// Role keyword scoring
    Keyword,
}

/// A resolved column and how it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMatch<'a> {
    /// Matched column
    pub column: &'a str,
    /// Stage that matched
    pub stage: MatchStage,
}

/// Resolves candidate names against a fixed set of log columns
pub struct ColumnResolver<'a> {
    columns: Vec<&'a str>,
    normalized: Vec<String>,
}

impl<'a> ColumnResolver<'a> {
    /// Build a resolver over the given columns
    pub fn new<S: AsRef<str>>(columns: &'a [S]) -> Self {
        let columns: Vec<&'a str> = columns.iter().map(AsRef::as_ref).collect();
        let normalized = columns.iter().map(|c| normalize(c)).collect();
        Self {
            columns,
            normalized,
        }
    }

    /// Resolve using every stage
    pub fn resolve(&self, candidates: &[&str]) -> Option<&'a str> {
        self.resolve_match(candidates, MatchStage::Keyword, &HashSet::new())
            .map(|m| m.column)
    }

    /// Resolve using stages up to and including `max_stage`, skipping
    /// columns in `claimed`
    pub fn resolve_match(
        &self,
        candidates: &[&str],
        max_stage: MatchStage,
        claimed: &HashSet<&str>,
    ) -> Option<ColumnMatch<'a>> {
        let open = |i: &usize| !claimed.contains(self.columns[*i]);
        let hit = |i: usize, stage| {
            Some(ColumnMatch {
                column: self.columns[i],
                stage,
            })
        };

        for candidate in candidates {
            if let Some(i) = (0..self.columns.len())
                .filter(open)
                .find(|&i| self.columns[i] == *candidate)
            {
                return hit(i, MatchStage::Exact);
            }
        }
        if max_stage == MatchStage::Exact {
            return None;
        }

        for candidate in candidates {
            if let Some(i) = (0..self.columns.len())
                .filter(open)
                .find(|&i| self.columns[i].eq_ignore_ascii_case(candidate))
            {
                return hit(i, MatchStage::CaseInsensitive);
            }
        }
        if max_stage == MatchStage::CaseInsensitive {
            return None;
        }

        for candidate in candidates {
            let normalized = normalize(candidate);
            let words = significant_words(&normalized);
            if words.is_empty() {
                continue;
            }
            let target_candidate = has_target_word(&normalized);
            if let Some(i) = (0..self.columns.len()).filter(open).find(|&i| {
                has_target_word(&self.normalized[i]) == target_candidate
                    && words.iter().all(|w| contains_word(&self.normalized[i], w))
            }) {
                return hit(i, MatchStage::Normalized);
            }
        }
        if max_stage == MatchStage::Normalized {
            return None;
        }

        let target_role = candidates.iter().any(|c| has_target_word(&normalize(c)));
        let keywords = keyword_set(candidates, target_role);

        (0..self.columns.len())
            .filter(open)
            .find(|&i| {
                if target_role != has_target_word(&self.normalized[i]) {
                    return false;
                }
                let words: Vec<&str> = self.normalized[i].split(' ').collect();
                let hits = words
                    .iter()
                    .filter(|w| keywords.iter().any(|k| keyword_matches(w, k)))
                    .collect::<HashSet<_>>()
                    .len();
                hits >= MIN_KEYWORD_HITS
            })
            .and_then(|i| hit(i, MatchStage::Keyword))
    }
}

/// Resolve a logical role against the available columns
pub fn resolve_column<'a, S: AsRef<str>>(columns: &'a [S], candidates: &[&str]) -> Option<&'a str> {
    ColumnResolver::new(columns).resolve(candidates)
}

fn unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("valid unit pattern"))
}

/// Lowercase, drop bracketed units and punctuation, collapse whitespace
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let stripped = unit_pattern().replace_all(&lowered, " ");
    let spaced: String = stripped
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .filter(|w| !UNIT_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Target words may be glued to other words ("TargetAFR")
fn has_target_word(normalized: &str) -> bool {
    TARGET_WORDS.iter().any(|w| normalized.contains(w))
}

/// Substring test for a significant word; short abbreviations are anchored
/// to a word edge so "ect" does not hit "correction"
fn contains_word(normalized_column: &str, word: &str) -> bool {
    if word.chars().count() > 3 {
        return normalized_column.contains(word);
    }
    normalized_column
        .split(' ')
        .any(|w| w.starts_with(word) || w.ends_with(word))
}

/// Words longer than two characters
fn significant_words(normalized: &str) -> Vec<String> {
    normalized
        .split(' ')
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

fn keyword_set(candidates: &[&str], target_role: bool) -> HashSet<String> {
    let role_words = if target_role { TARGET_WORDS } else { MEASURED_WORDS };
    let mut set: HashSet<String> = role_words.iter().map(|w| w.to_string()).collect();

    for candidate in candidates {
        for word in significant_words(&normalize(candidate)) {
            if let Some((_, related)) = SYNONYMS.iter().find(|(key, _)| *key == word) {
                set.extend(related.iter().map(|w| w.to_string()));
            }
            set.insert(word);
        }
    }
    set
}

/// Whole-word match, or prefix match for longer keywords ("temp" ~ "temperature")
fn keyword_matches(word: &str, keyword: &str) -> bool {
    word == keyword || (keyword.len() >= 4 && word.starts_with(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_units() {
        assert_eq!(normalize("Air/Fuel Sensor #1 (λ)"), "air fuel sensor 1");
        assert_eq!(normalize("Boost  Target [kPa]"), "boost target");
        assert_eq!(normalize("Coolant Temp degC"), "coolant temp");
    }

    #[test]
    fn test_stage_order() {
        let columns = vec!["afr".to_string(), "AFR".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let m = resolver
            .resolve_match(&["AFR"], MatchStage::Keyword, &HashSet::new())
            .unwrap();
        assert_eq!(m.column, "AFR");
        assert_eq!(m.stage, MatchStage::Exact);
    }

    #[test]
    fn test_case_insensitive() {
        let columns = vec!["engine rpm".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let m = resolver
            .resolve_match(&["Engine RPM"], MatchStage::Keyword, &HashSet::new())
            .unwrap();
        assert_eq!(m.stage, MatchStage::CaseInsensitive);
    }

    #[test]
    fn test_normalized_anchors_abbreviations() {
        let columns = vec!["Knock Correction".to_string(), "Coolant Temp (C)".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let m = resolver
            .resolve_match(&["ECT", "Coolant Temp"], MatchStage::Normalized, &HashSet::new())
            .unwrap();
        assert_eq!(m.column, "Coolant Temp (C)");
        assert_eq!(m.stage, MatchStage::Normalized);
    }

    #[test]
    fn test_normalized_matches_concatenated_names() {
        let columns = vec![
            "Time (s)".to_string(),
            "EngineRPM".to_string(),
            "TargetAFR".to_string(),
            "WidebandAFR".to_string(),
            "CoolantTemp".to_string(),
        ];
        let resolver = ColumnResolver::new(&columns);
        let resolve = |candidates: &[&str]| {
            resolver
                .resolve_match(candidates, MatchStage::Normalized, &HashSet::new())
                .map(|m| (m.column, m.stage))
        };

        assert_eq!(
            resolve(&["Engine RPM"]),
            Some(("EngineRPM", MatchStage::Normalized))
        );
        assert_eq!(resolve(&["RPM"]), Some(("EngineRPM", MatchStage::Normalized)));
        // Measured names skip the glued target column
        assert_eq!(
            resolve(&["AFR"]),
            Some(("WidebandAFR", MatchStage::Normalized))
        );
        assert_eq!(
            resolve(&["Target AFR"]),
            Some(("TargetAFR", MatchStage::Normalized))
        );
        assert_eq!(
            resolve(&["Coolant Temp"]),
            Some(("CoolantTemp", MatchStage::Normalized))
        );
    }

    #[test]
    fn test_normalized_respects_role() {
        let columns = vec!["Desired Lambda".to_string(), "Lambda (Bank 1)".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let m = resolver
            .resolve_match(&["Lambda"], MatchStage::Normalized, &HashSet::new())
            .unwrap();
        assert_eq!(m.column, "Lambda (Bank 1)");
    }

    #[test]
    fn test_target_role_requires_target_word() {
        let columns = vec!["AFR Sensor #1".to_string(), "Commanded Air/Fuel".to_string()];
        assert_eq!(
            resolve_column(&columns, &["Target AFR"]),
            Some("Commanded Air/Fuel")
        );
    }

    #[test]
    fn test_measured_role_skips_target_columns() {
        let columns = vec!["Air Fuel Commanded".to_string(), "Wideband Air Fuel".to_string()];
        assert_eq!(resolve_column(&columns, &["Measured AFR"]), Some("Wideband Air Fuel"));
    }

    #[test]
    fn test_claimed_columns_are_skipped() {
        let columns = vec!["RPM".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let claimed: HashSet<&str> = ["RPM"].into_iter().collect();
        assert!(resolver
            .resolve_match(&["RPM"], MatchStage::Keyword, &claimed)
            .is_none());
    }

    #[test]
    fn test_strict_stage_limit() {
        let columns = vec!["Air/Fuel Sensor #1 (λ)".to_string()];
        let resolver = ColumnResolver::new(&columns);
        let candidates = ["Measured AFR", "AFR Sensor #1"];
        assert!(resolver
            .resolve_match(&candidates, MatchStage::Normalized, &HashSet::new())
            .is_none());
        assert!(resolver
            .resolve_match(&candidates, MatchStage::Keyword, &HashSet::new())
            .is_some());
    }
}
