//! Command implementations: each one validates its inputs, runs the
//! extraction pipeline, writes chart series and returns a summary.

use crate::chart::{self, ChartWriter, OutputError};
use crate::config::{MissingMetricPolicy, StatsConfig};
use crate::dataset::{self, DatasetError, LoadOptions, Record};
use crate::input::{self, InputError};
use crate::reduce;
use crate::stash;
use crate::table::{self, ParseError};
use crate::trace::{self, TraceError};
use std::path::Path;

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub charts_written: usize,
    /// Chart groups that had no common metric.
    pub empty_groups: Vec<String>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s) processed, {} skipped, {} chart series written",
            self.files_processed, self.files_skipped, self.charts_written
        )?;
        if !self.empty_groups.is_empty() {
            write!(f, "; nothing to chart for: {}", self.empty_groups.join(", "))?;
        }
        Ok(())
    }
}

/// Per-channel charts from a single log.
pub fn channels(config: &StatsConfig, input: &Path, output: &Path) -> Result<Summary, RunError> {
    input::require_file(input)?;
    let table = table::parse_channel_log(input)?;
    let writer = ChartWriter::create(output)?;

    if table.is_empty() {
        tracing::warn!(file = %input.display(), "no per-channel metrics found");
    }
    if table.stats.skipped() > 0 {
        tracing::debug!(skipped = table.stats.skipped(), "lines skipped");
    }

    let series = chart::channel_series(
        &table,
        &config.channels.label_prefix,
        &config.channels.color,
    );
    let charts_written = writer.write_all(&series)?;

    tracing::info!(
        channels = table.channel_ids().count(),
        metrics = table.metric_names().len(),
        charts = charts_written,
        dir = %writer.dir().display(),
        "channel charts written"
    );

    let mut summary = Summary {
        files_processed: 1,
        charts_written,
        ..Default::default()
    };
    if series.is_empty() {
        summary.empty_groups.push("channels".to_string());
    }
    Ok(summary)
}

/// Dataset charts across a directory of aggregate logs: all files, then the
/// nonzero and zero partitions of the partition counter.
pub fn memory_system(
    config: &StatsConfig,
    input: &Path,
    output: &Path,
    on_missing: Option<MissingMetricPolicy>,
) -> Result<Summary, RunError> {
    let ms = &config.memory_system;
    input::require_dir(input)?;
    let pattern = glob::Pattern::new(&ms.file_pattern).map_err(|e| RunError::Pattern {
        pattern: ms.file_pattern.clone(),
        source: e,
    })?;
    let files = input::list_files(input, Some(&pattern))?;
    let writer = ChartWriter::create(output)?;

    let markers = ms.markers();
    let opts = LoadOptions {
        markers: &markers,
        formulas: &config.derived,
        on_missing: on_missing.unwrap_or(ms.on_missing_metric),
    };
    let report = dataset::load(&files, &opts)?;
    let ds = &report.dataset;
    if ds.is_empty() {
        tracing::warn!(dir = %input.display(), "no file contained the section");
    }

    let mut index = Vec::new();
    ds.write_index(&mut index).map_err(|e| OutputError::Write {
        path: ms.index_file.clone(),
        source: e,
    })?;
    let index_path = writer.dir().join(&ms.index_file);
    chart::write_atomic(&index_path, &index)?;

    let mut summary = Summary {
        files_processed: ds.len(),
        files_skipped: report.without_section.len() + report.missing_metric.len(),
        ..Default::default()
    };

    let all: Vec<&Record> = ds.records().iter().collect();
    let (with, without) = ds.partition(&ms.partition_counter);
    let groups = [
        ("all", "", "skyblue", all),
        ("with", ms.with_prefix.as_str(), "skyblue", with),
        ("without", ms.without_prefix.as_str(), "red", without),
    ];

    for (group, prefix, color, records) in groups {
        let common = reduce::common_metrics(records.iter().map(|r| &r.metrics));
        if common.is_empty() {
            tracing::warn!(group, files = records.len(), "no common metric across files");
            summary.empty_groups.push(group.to_string());
            continue;
        }
        let series = chart::dataset_series(&records, &common, prefix, color);
        let written = writer.write_all(&series)?;
        tracing::info!(group, files = records.len(), metrics = common.len(), "dataset charts written");
        summary.charts_written += written;
    }

    tracing::info!(
        files = summary.files_processed,
        skipped = summary.files_skipped,
        index = %index_path.display(),
        "memory-system run complete"
    );
    Ok(summary)
}

/// One occupancy line chart per file in `input`, empty traces included.
pub fn stash(config: &StatsConfig, input: &Path, output: &Path) -> Result<Summary, RunError> {
    input::require_dir(input)?;
    let files = input::list_files(input, None)?;
    let writer = ChartWriter::create(output)?;

    let mut summary = Summary::default();
    for path in &files {
        let name = input::display_name(path);
        let trace = stash::parse_occupancy_file(path)?;
        if trace.samples.is_empty() {
            tracing::warn!(file = %path.display(), "no samples, writing an empty chart");
        }
        let series = stash::occupancy_series(&name, &trace, &config.stash.artifact_prefix);
        writer.write(&series)?;
        summary.files_processed += 1;
        summary.charts_written += 1;
    }

    tracing::info!(
        files = summary.files_processed,
        skipped = summary.files_skipped,
        "stash charts written"
    );
    Ok(summary)
}

/// Convert a trace file to SimpleO3 format.
pub fn convert_trace(input: &Path, output: &Path) -> Result<Summary, RunError> {
    input::require_file(input)?;
    let lines = trace::convert_file(input, output)?;
    tracing::info!(lines, output = %output.display(), "trace converted");
    Ok(Summary {
        files_processed: 1,
        ..Default::default()
    })
}

/// Any error that stops a command.
#[derive(Debug)]
pub enum RunError {
    Input(InputError),
    Parse(ParseError),
    Dataset(DatasetError),
    Output(OutputError),
    Trace(TraceError),
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunError::Input(e) => write!(f, "{e}"),
            RunError::Parse(e) => write!(f, "{e}"),
            RunError::Dataset(e) => write!(f, "{e}"),
            RunError::Output(e) => write!(f, "{e}"),
            RunError::Trace(e) => write!(f, "{e}"),
            RunError::Pattern { pattern, source } => {
                write!(f, "invalid file pattern '{pattern}': {source}")
            }
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Input(e) => Some(e),
            RunError::Parse(e) => Some(e),
            RunError::Dataset(e) => Some(e),
            RunError::Output(e) => Some(e),
            RunError::Trace(e) => Some(e),
            RunError::Pattern { source, .. } => Some(source),
        }
    }
}

impl From<InputError> for RunError {
    fn from(e: InputError) -> Self {
        RunError::Input(e)
    }
}

impl From<ParseError> for RunError {
    fn from(e: ParseError) -> Self {
        RunError::Parse(e)
    }
}

impl From<DatasetError> for RunError {
    fn from(e: DatasetError) -> Self {
        RunError::Dataset(e)
    }
}

impl From<OutputError> for RunError {
    fn from(e: OutputError) -> Self {
        RunError::Output(e)
    }
}

impl From<TraceError> for RunError {
    fn from(e: TraceError) -> Self {
        RunError::Trace(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ms_log(active: u64, extra: &str) -> String {
        format!(
            "MemorySystem:
  memory_system_cycles: 1000
  integrity_controller_active_cycles: {active}
  integrity_controller_idle_cycles: {}
  integrity_controller_latency: 40
  integrity_controller_num_reqs: 4
  oram_controller_cumulative_latency: 300
  total_num_read_requests: 30
{extra}  Controller:
",
            1000 - active
        )
    }

    fn json_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".json"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_channels_writes_one_series_per_nonzero_metric() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("channels.log");
        std::fs::write(
            &log,
            "avg_read_latency_0: 10.5\navg_read_latency_1: 12\nrefreshes_0: 0\nrefreshes_1: 0\nnoise\n",
        )
        .unwrap();
        let out = dir.path().join("out");

        let summary = channels(&StatsConfig::default(), &log, &out).unwrap();
        assert_eq!(summary.charts_written, 1);
        assert_eq!(json_files(&out), vec!["avg_read_latency.json"]);
    }

    #[test]
    fn test_channels_rejects_directory_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = channels(&StatsConfig::default(), dir.path(), &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, RunError::Input(InputError::NotAFile(_))));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_memory_system_partitions_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::write(logs.join("hash.log"), ms_log(200, "  hash_ops: 7\n")).unwrap();
        std::fs::write(logs.join("plain.log"), ms_log(0, "")).unwrap();
        std::fs::write(logs.join("other.txt"), "Frontend:\n").unwrap();
        let out = dir.path().join("out");

        let summary = memory_system(&StatsConfig::default(), &logs, &out, None).unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_skipped, 1);
        assert!(summary.empty_groups.is_empty());

        let index = std::fs::read_to_string(out.join("index_configurations.txt")).unwrap();
        assert_eq!(index.lines().count(), 2);
        assert!(index.contains("hash.log = "));
        assert!(index.contains("plain.log = "));

        let files = json_files(&out);
        // hash_ops only exists in one file: charted in its partition, not in "all"
        assert!(files.contains(&"with_hash_hash_ops.json".to_string()));
        assert!(!files.contains(&"hash_ops.json".to_string()));
        assert!(!files.contains(&"no_hash_hash_ops.json".to_string()));
        assert!(files.contains(&"integrity_controller_percent_active.json".to_string()));
        assert!(files.contains(&"no_hash_memory_system_cycles.json".to_string()));
    }

    #[test]
    fn test_memory_system_empty_partition_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::write(logs.join("a.log"), ms_log(0, "")).unwrap();
        let out = dir.path().join("out");

        let summary = memory_system(&StatsConfig::default(), &logs, &out, None).unwrap();
        assert_eq!(summary.empty_groups, vec!["with"]);
        assert!(json_files(&out).iter().any(|n| n.starts_with("no_hash_")));
    }

    #[test]
    fn test_memory_system_missing_metric_policy_override() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        std::fs::write(logs.join("bad.log"), "MemorySystem:\n  memory_system_cycles: 1\n").unwrap();
        std::fs::write(logs.join("good.log"), ms_log(10, "")).unwrap();
        let out = dir.path().join("out");

        let err = memory_system(&StatsConfig::default(), &logs, &out, None).unwrap_err();
        assert!(matches!(err, RunError::Dataset(DatasetError::MissingMetric { .. })));

        let summary = memory_system(
            &StatsConfig::default(),
            &logs,
            &out,
            Some(MissingMetricPolicy::Skip),
        )
        .unwrap();
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.files_skipped, 1);
        let index = std::fs::read_to_string(out.join("index_configurations.txt")).unwrap();
        assert_eq!(index, "good.log = 1\n");
    }

    #[test]
    fn test_memory_system_rejects_missing_dir() {
        let err = memory_system(
            &StatsConfig::default(),
            &PathBuf::from("/nonexistent/logs"),
            &PathBuf::from("/nonexistent/out"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Input(_)));
    }

    #[test]
    fn test_stash_one_chart_per_csv() {
        let dir = tempfile::tempdir().unwrap();
        let traces = dir.path().join("traces");
        std::fs::create_dir(&traces).unwrap();
        std::fs::write(traces.join("run1"), "0,0\n10,20\n").unwrap();
        std::fs::write(traces.join("empty"), "header,row\n").unwrap();
        let out = dir.path().join("out");

        let summary = stash(&StatsConfig::default(), &traces, &out).unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_skipped, 0);
        assert_eq!(summary.charts_written, 2);
        assert_eq!(json_files(&out), vec!["grafico_empty.json", "grafico_run1.json"]);
    }

    #[test]
    fn test_stash_empty_trace_still_gets_a_chart() {
        let dir = tempfile::tempdir().unwrap();
        let traces = dir.path().join("traces");
        std::fs::create_dir(&traces).unwrap();
        std::fs::write(traces.join("blank.csv"), "").unwrap();
        let out = dir.path().join("out");

        stash(&StatsConfig::default(), &traces, &out).unwrap();
        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("grafico_blank.csv.json")).unwrap())
                .unwrap();
        assert_eq!(doc["image"], "grafico_blank.csv.png");
        assert_eq!(doc["points"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_convert_trace_command() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.trace");
        let output = dir.path().join("out.trace");
        std::fs::write(&input, "LD 0xff\n").unwrap();
        convert_trace(&input, &output).unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "0 255\n");
    }

    #[test]
    fn test_summary_display() {
        let s = Summary {
            files_processed: 3,
            files_skipped: 1,
            charts_written: 12,
            empty_groups: vec!["without".to_string()],
        };
        assert_eq!(
            s.to_string(),
            "3 file(s) processed, 1 skipped, 12 chart series written; nothing to chart for: without"
        );
    }
}
