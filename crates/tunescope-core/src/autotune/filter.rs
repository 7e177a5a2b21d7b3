//! Row filters
//!
//! Optional gates applied before a row is binned: minimum rpm, minimum
//! coolant temperature and a free-form `evalexpr` expression.

use evalexpr::{build_operator_tree, ContextWithMutableVariables, HashMapContext, Node, Value};
use serde::{Deserialize, Serialize};

use crate::log::LogRow;

/// Data filters for autotune, all disabled by default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutotuneFilters {
    /// Skip rows below this engine speed
    pub min_rpm: Option<f64>,
    /// Skip rows while the engine is cold (°C)
    pub min_coolant_temp: Option<f64>,
    /// Boolean expression over `rpm`, `load`, `throttle`, `lambda_target`,
    /// `lambda_measured`, `stft`, `ltft` and `coolant`
    pub custom_filter: Option<String>,
}

impl AutotuneFilters {
    /// Prepare the filters for one pass over a log
    ///
    /// The custom expression is parsed here; an expression that does not
    /// parse is reported once and rejects every row.
    pub fn compile(&self) -> RowFilter<'_> {
        let expression = match self.custom_filter.as_deref().map(str::trim) {
            None | Some("") => Expression::None,
            Some(text) => match build_operator_tree(text) {
                Ok(node) => Expression::Compiled(node),
                Err(e) => {
                    tracing::warn!("Autotune custom filter '{text}' is invalid, rejecting every row: {e}");
                    Expression::Invalid
                }
            },
        };
        RowFilter {
            filters: self,
            expression,
            failures: 0,
            first_failure: None,
        }
    }
}

enum Expression {
    None,
    Compiled(Node),
    Invalid,
}

/// [`AutotuneFilters`] ready to test rows
pub struct RowFilter<'f> {
    filters: &'f AutotuneFilters,
    expression: Expression,
    failures: usize,
    first_failure: Option<String>,
}

impl RowFilter<'_> {
    /// Whether a row may contribute to the bins
    pub fn passes(&mut self, row: &LogRow) -> bool {
        if let Some(min) = self.filters.min_rpm {
            if row.rpm.unwrap_or(0.0) < min {
                return false;
            }
        }
        if let Some(min) = self.filters.min_coolant_temp {
            // Rows without a coolant reading fail
            if !row.coolant_temp.is_some_and(|clt| clt >= min) {
                return false;
            }
        }

        match &self.expression {
            Expression::None => true,
            Expression::Invalid => false,
            Expression::Compiled(node) => match evaluate(node, row) {
                Ok(pass) => pass,
                Err(e) => {
                    self.failures += 1;
                    self.first_failure.get_or_insert(e);
                    false
                }
            },
        }
    }

    /// Rows the expression failed to evaluate on
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Log a single summary of evaluation failures
    pub fn report(&self) {
        if let Some(first) = &self.first_failure {
            tracing::warn!(
                "Autotune custom filter failed on {} rows (first error: {first})",
                self.failures
            );
        }
    }
}

fn evaluate(node: &Node, row: &LogRow) -> Result<bool, String> {
    let mut ctx = HashMapContext::new();

    let set_value = |ctx: &mut HashMapContext, name: &str, value: Option<f64>| {
        ctx.set_value(name.to_string(), Value::Float(value.unwrap_or(0.0)))
            .map_err(|e| format!("Failed to set {name}: {e}"))
    };

    set_value(&mut ctx, "rpm", row.rpm)?;
    set_value(&mut ctx, "load", row.load)?;
    set_value(&mut ctx, "throttle", row.throttle)?;
    set_value(&mut ctx, "lambda_target", row.lambda_target)?;
    set_value(&mut ctx, "lambda_measured", row.lambda_measured)?;
    set_value(&mut ctx, "stft", row.short_term_trim)?;
    set_value(&mut ctx, "ltft", row.long_term_trim)?;
    set_value(&mut ctx, "coolant", row.coolant_temp)?;

    match node.eval_with_context(&ctx) {
        Ok(Value::Boolean(val)) => Ok(val),
        Ok(Value::Int(val)) => Ok(val != 0),
        Ok(Value::Float(val)) => Ok(val != 0.0),
        Ok(other) => Err(format!(
            "Custom filter must return boolean or number, got {other:?}"
        )),
        Err(e) => Err(format!("Custom filter eval error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Channel;

    fn row() -> LogRow {
        LogRow::at(1.0)
            .with(Channel::Rpm, 2500.0)
            .with(Channel::Throttle, 25.0)
            .with(Channel::CoolantTemp, 85.0)
            .with(Channel::LambdaMeasured, 1.0)
    }

    #[test]
    fn default_filters_pass_everything() {
        assert!(AutotuneFilters::default().compile().passes(&LogRow::at(0.0)));
    }

    #[test]
    fn min_rpm_and_coolant() {
        let filters = AutotuneFilters {
            min_rpm: Some(3000.0),
            ..AutotuneFilters::default()
        };
        assert!(!filters.compile().passes(&row()));

        let filters = AutotuneFilters {
            min_coolant_temp: Some(70.0),
            ..AutotuneFilters::default()
        };
        let mut filter = filters.compile();
        assert!(filter.passes(&row()));
        assert!(!filter.passes(&LogRow::at(0.0)));
    }

    #[test]
    fn custom_filter_allows_matching_row() {
        let filters = AutotuneFilters {
            custom_filter: Some("rpm > 2000 && throttle < 50 && coolant > 70".to_string()),
            ..AutotuneFilters::default()
        };
        assert!(filters.compile().passes(&row()));
    }

    #[test]
    fn custom_filter_rejects_non_matching_row() {
        let filters = AutotuneFilters {
            custom_filter: Some("rpm > 3000 && lambda_measured < 0.9".to_string()),
            ..AutotuneFilters::default()
        };
        assert!(!filters.compile().passes(&row()));
    }

    #[test]
    fn custom_filter_invalid_expression_rejects_row() {
        let filters = AutotuneFilters {
            custom_filter: Some("(rpm > 2000".to_string()),
            ..AutotuneFilters::default()
        };
        let mut filter = filters.compile();
        assert!(matches!(filter.expression, Expression::Invalid));
        for _ in 0..100 {
            assert!(!filter.passes(&row()));
        }
        // A parse error is not counted per row
        assert_eq!(filter.failures(), 0);
    }

    #[test]
    fn custom_filter_evaluation_failures_are_counted() {
        let filters = AutotuneFilters {
            custom_filter: Some("unknown_channel > 1".to_string()),
            ..AutotuneFilters::default()
        };
        let mut filter = filters.compile();
        assert!(matches!(filter.expression, Expression::Compiled(_)));
        for _ in 0..50 {
            assert!(!filter.passes(&row()));
        }
        assert_eq!(filter.failures(), 50);
        assert!(filter.first_failure.is_some());
    }
}
