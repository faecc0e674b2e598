//! Derived metrics: secondary values computed from raw counters after a file
//! has been fully parsed.
//!
//! Each formula is a pure function of base metrics already in the table. A
//! missing base metric is a hard error for that file, unlike line-level drops
//! which are silent.

use crate::line::MetricValue;
use crate::table::EntityMetrics;
use serde::Deserialize;

/// One derived metric definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Formula {
    /// `part / total * 100`. A zero total yields 0.
    Percent {
        name: String,
        part: String,
        total: String,
    },
    /// `sum / count`. A zero count yields 0.
    Average {
        name: String,
        sum: String,
        count: String,
    },
}

impl Formula {
    pub fn percent(name: &str, part: &str, total: &str) -> Self {
        Formula::Percent {
            name: name.to_string(),
            part: part.to_string(),
            total: total.to_string(),
        }
    }

    pub fn average(name: &str, sum: &str, count: &str) -> Self {
        Formula::Average {
            name: name.to_string(),
            sum: sum.to_string(),
            count: count.to_string(),
        }
    }

    /// Name of the metric this formula produces.
    pub fn name(&self) -> &str {
        match self {
            Formula::Percent { name, .. } | Formula::Average { name, .. } => name,
        }
    }

    /// Evaluate against `metrics` without modifying them.
    pub fn evaluate(&self, metrics: &EntityMetrics) -> Result<f64, MissingMetricError> {
        let lookup = |base: &str| {
            metrics
                .get(base)
                .map(|v| v.as_f64())
                .ok_or_else(|| MissingMetricError {
                    metric: base.to_string(),
                    formula: self.name().to_string(),
                })
        };

        let value = match self {
            Formula::Percent { part, total, .. } => {
                let (part, total) = (lookup(part.as_str())?, lookup(total.as_str())?);
                if total == 0.0 {
                    0.0
                } else {
                    part / total * 100.0
                }
            }
            Formula::Average { sum, count, .. } => {
                let (sum, count) = (lookup(sum.as_str())?, lookup(count.as_str())?);
                if count == 0.0 {
                    0.0
                } else {
                    sum / count
                }
            }
        };
        Ok(value)
    }
}

/// Built-in formula set for PathORAM memory-system logs.
pub fn default_formulas() -> Vec<Formula> {
    vec![
        Formula::percent(
            "integrity_controller_percent_active",
            "integrity_controller_active_cycles",
            "memory_system_cycles",
        ),
        Formula::percent(
            "integrity_controller_percent_idle",
            "integrity_controller_idle_cycles",
            "memory_system_cycles",
        ),
        Formula::average(
            "integrity_controller_avg_latency",
            "integrity_controller_latency",
            "integrity_controller_num_reqs",
        ),
        Formula::average(
            "oram_controller_avg_latency",
            "oram_controller_cumulative_latency",
            "total_num_read_requests",
        ),
    ]
}

/// Evaluate every formula and insert the results into `metrics`.
///
/// Formulas run in order, so a later formula may use an earlier result. On
/// error `metrics` may already hold some of the derived values.
pub fn apply(metrics: &mut EntityMetrics, formulas: &[Formula]) -> Result<(), MissingMetricError> {
    for formula in formulas {
        let value = formula.evaluate(metrics)?;
        metrics.insert(formula.name().to_string(), MetricValue::Float(value));
    }
    Ok(())
}

/// A base metric needed by a formula is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMetricError {
    pub metric: String,
    pub formula: String,
}

impl std::fmt::Display for MissingMetricError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "missing base metric '{}' required by '{}'",
            self.metric, self.formula
        )
    }
}

impl std::error::Error for MissingMetricError {}
