//! Multi-file datasets built from section-scoped logs.
//!
//! Each input file that contains the section becomes one [`Record`] with a
//! 1-based index assigned in insertion order. Files are parsed in parallel but
//! inserted in the order they were listed, so indices are deterministic.

use crate::config::MissingMetricPolicy;
use crate::derived::{self, Formula, MissingMetricError};
use crate::input;
use crate::section::{self, SectionMarkers};
use crate::table::{EntityMetrics, ParseError};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One processed file.
#[derive(Debug, Clone)]
pub struct Record {
    pub file: String,
    pub index: usize,
    /// Sub-entities (controllers) counted in the section.
    pub entities: u32,
    pub metrics: EntityMetrics,
}

/// Ordered collection of records.
#[derive(Debug, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record and return the index assigned to it.
    pub fn push(&mut self, file: String, entities: u32, metrics: EntityMetrics) -> usize {
        let index = self.records.len() + 1;
        self.records.push(Record {
            file,
            index,
            entities,
            metrics,
        });
        index
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split records on `counter`: nonzero first, zero second. A record
    /// without the counter goes with the zeros.
    pub fn partition(&self, counter: &str) -> (Vec<&Record>, Vec<&Record>) {
        self.records
            .iter()
            .partition(|r| r.metrics.get(counter).is_some_and(|v| !v.is_zero()))
    }

    /// Write `file = index` lines in insertion order.
    pub fn write_index(&self, mut out: impl Write) -> std::io::Result<()> {
        for r in &self.records {
            writeln!(out, "{} = {}", r.file, r.index)?;
        }
        Ok(())
    }
}

/// Outcome of loading a directory of logs.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub dataset: Dataset,
    /// Files that never entered the section.
    pub without_section: Vec<String>,
    /// Files dropped under [`MissingMetricPolicy::Skip`].
    pub missing_metric: Vec<(String, MissingMetricError)>,
}

/// How to parse and post-process each file.
#[derive(Debug, Clone)]
pub struct LoadOptions<'a> {
    pub markers: &'a SectionMarkers,
    pub formulas: &'a [Formula],
    pub on_missing: MissingMetricPolicy,
}

enum FileOutcome {
    Loaded { entities: u32, metrics: EntityMetrics },
    NoSection,
    Missing(MissingMetricError),
}

fn load_file(path: &Path, opts: &LoadOptions<'_>) -> Result<FileOutcome, ParseError> {
    let parsed = section::parse_section_log(path, opts.markers)?;
    if !parsed.found {
        return Ok(FileOutcome::NoSection);
    }

    let mut metrics = parsed.metrics;
    if let Err(e) = derived::apply(&mut metrics, opts.formulas) {
        return Ok(FileOutcome::Missing(e));
    }
    Ok(FileOutcome::Loaded {
        entities: parsed.entities,
        metrics,
    })
}

/// Parse every file and assemble a dataset in the order of `files`.
pub fn load(files: &[PathBuf], opts: &LoadOptions<'_>) -> Result<LoadReport, DatasetError> {
    let outcomes: Vec<Result<FileOutcome, ParseError>> =
        files.par_iter().map(|path| load_file(path, opts)).collect();

    let mut report = LoadReport::default();
    for (path, outcome) in files.iter().zip(outcomes) {
        let name = input::display_name(path);
        match outcome.map_err(DatasetError::Parse)? {
            FileOutcome::Loaded { entities, metrics } => {
                let index = report.dataset.push(name, entities, metrics);
                tracing::debug!(file = %path.display(), index, entities, "loaded");
            }
            FileOutcome::NoSection => {
                tracing::debug!(file = %path.display(), "no section found, skipping");
                report.without_section.push(name);
            }
            FileOutcome::Missing(source) => match opts.on_missing {
                MissingMetricPolicy::Abort => {
                    return Err(DatasetError::MissingMetric { file: name, source });
                }
                MissingMetricPolicy::Skip => {
                    tracing::warn!(file = %path.display(), error = %source, "skipping file");
                    report.missing_metric.push((name, source));
                }
            },
        }
    }
    Ok(report)
}

#[derive(Debug)]
pub enum DatasetError {
    Parse(ParseError),
    MissingMetric {
        file: String,
        source: MissingMetricError,
    },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Parse(e) => write!(f, "{e}"),
            DatasetError::MissingMetric { file, source } => write!(f, "{file}: {source}"),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Parse(e) => Some(e),
            DatasetError::MissingMetric { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::MetricValue;

    fn metrics(pairs: &[(&str, i64)]) -> EntityMetrics {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), MetricValue::Int(*v)))
            .collect()
    }

    fn full_log(active: u64) -> String {
        format!(
            "MemorySystem:
  memory_system_cycles: 1000
  integrity_controller_active_cycles: {active}
  integrity_controller_idle_cycles: {}
  integrity_controller_latency: 40
  integrity_controller_num_reqs: 4
  oram_controller_cumulative_latency: 300
  total_num_read_requests: 30
  Controller:
  Controller:
",
            1000 - active
        )
    }

    fn opts<'a>(markers: &'a SectionMarkers, formulas: &'a [Formula], on_missing: MissingMetricPolicy) -> LoadOptions<'a> {
        LoadOptions {
            markers,
            formulas,
            on_missing,
        }
    }

    #[test]
    fn test_push_assigns_sequential_indices() {
        let mut ds = Dataset::new();
        assert_eq!(ds.push("F1".into(), 1, EntityMetrics::new()), 1);
        assert_eq!(ds.push("F2".into(), 1, EntityMetrics::new()), 2);
        assert_eq!(ds.push("F3".into(), 1, EntityMetrics::new()), 3);
        assert_eq!(ds.len(), 3);
    }

    #[test]
    fn test_index_file_preserves_order() {
        let mut ds = Dataset::new();
        for f in ["F1", "F2", "F3"] {
            ds.push(f.to_string(), 1, EntityMetrics::new());
        }
        let mut buf = Vec::new();
        ds.write_index(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "F1 = 1\nF2 = 2\nF3 = 3\n");
    }

    #[test]
    fn test_partition_on_counter() {
        let mut ds = Dataset::new();
        ds.push("a".into(), 1, metrics(&[("active", 5)]));
        ds.push("b".into(), 1, metrics(&[("active", 0)]));
        ds.push("c".into(), 1, metrics(&[("other", 1)]));
        ds.push("d".into(), 1, metrics(&[("active", 2)]));

        let (with, without) = ds.partition("active");
        assert_eq!(with.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 4]);
        assert_eq!(without.iter().map(|r| r.index).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_load_keeps_listing_order_and_skips_no_section() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["zeta.log", "alpha.log", "plain.log", "mid.log"];
        for (i, name) in names.iter().enumerate() {
            let body = if *name == "plain.log" {
                "Frontend:\n  cycles: 1\n".to_string()
            } else {
                full_log(100 * i as u64)
            };
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let files: Vec<PathBuf> = names.iter().map(|n| dir.path().join(n)).collect();

        let markers = SectionMarkers::default();
        let formulas = derived::default_formulas();
        let report = load(&files, &opts(&markers, &formulas, MissingMetricPolicy::Abort)).unwrap();

        let order: Vec<(&str, usize)> = report
            .dataset
            .records()
            .iter()
            .map(|r| (r.file.as_str(), r.index))
            .collect();
        assert_eq!(order, vec![("zeta.log", 1), ("alpha.log", 2), ("mid.log", 3)]);
        assert_eq!(report.without_section, vec!["plain.log"]);

        let alpha = &report.dataset.records()[1];
        assert_eq!(alpha.entities, 2);
        assert_eq!(
            alpha.metrics["integrity_controller_percent_active"],
            MetricValue::Float(10.0)
        );
        assert_eq!(
            alpha.metrics["oram_controller_avg_latency"],
            MetricValue::Float(10.0)
        );
    }

    #[test]
    fn test_missing_metric_aborts_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.log");
        let bad = dir.path().join("bad.log");
        std::fs::write(&good, full_log(10)).unwrap();
        std::fs::write(&bad, "MemorySystem:\n  memory_system_cycles: 5\n").unwrap();

        let markers = SectionMarkers::default();
        let formulas = derived::default_formulas();
        let err = load(
            &[good, bad],
            &opts(&markers, &formulas, MissingMetricPolicy::Abort),
        )
        .unwrap_err();
        match err {
            DatasetError::MissingMetric { file, source } => {
                assert_eq!(file, "bad.log");
                assert_eq!(source.metric, "integrity_controller_active_cycles");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_metric_skip_policy_continues() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.log");
        let good = dir.path().join("good.log");
        std::fs::write(&bad, "MemorySystem:\n  memory_system_cycles: 5\n").unwrap();
        std::fs::write(&good, full_log(10)).unwrap();

        let markers = SectionMarkers::default();
        let formulas = derived::default_formulas();
        let report = load(
            &[bad, good],
            &opts(&markers, &formulas, MissingMetricPolicy::Skip),
        )
        .unwrap();
        assert_eq!(report.dataset.len(), 1);
        assert_eq!(report.dataset.records()[0].file, "good.log");
        assert_eq!(report.dataset.records()[0].index, 1);
        assert_eq!(report.missing_metric.len(), 1);
        assert_eq!(report.missing_metric[0].0, "bad.log");
    }

    #[test]
    fn test_unreadable_file_is_parse_error() {
        let markers = SectionMarkers::default();
        let err = load(
            &[PathBuf::from("/nonexistent/x.log")],
            &opts(&markers, &[], MissingMetricPolicy::Skip),
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::Parse(_)));
    }
}
