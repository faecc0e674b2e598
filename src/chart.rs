/// Chart series: the ordered (label, value) data handed to a renderer.
///
/// Each series is written as `<stem>.json` next to where the renderer will put
/// `<stem>.png`. Writes go to a temp file in the same directory and are then
/// renamed, so a renderer watching the directory never sees a partial file.
use crate::dataset::Record;
use crate::line::MetricValue;
use crate::table::ChannelTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
}

/// X-axis label of one point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Label {
    Text(String),
    Index(usize),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub label: Label,
    pub value: MetricValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Artifact file name the renderer should produce.
    pub image: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_range: Option<(f64, f64)>,
    pub points: Vec<Point>,
    pub generated_at: DateTime<Utc>,
}

impl ChartSeries {
    /// File stem shared by the `.json` series and the `.png` image.
    pub fn stem(&self) -> &str {
        self.image.strip_suffix(".png").unwrap_or(&self.image)
    }
}

/// Filesystem-safe artifact stem: `<prefix><metric>` with `/` replaced by `_`.
pub fn artifact_stem(prefix: &str, metric: &str) -> String {
    format!("{prefix}{}", metric.replace('/', "_"))
}

/// Image artifact name: `<stem>.png`.
pub fn image_name(prefix: &str, metric: &str) -> String {
    format!("{}.png", artifact_stem(prefix, metric))
}

/// Human title for dataset charts: underscores become spaces, first letter
/// upper case, the rest lower case.
pub fn humanize(metric: &str) -> String {
    let spaced = metric.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// One bar chart per chartable metric, channels in ascending id order.
/// Metrics that are zero on every channel produce no series.
pub fn channel_series(table: &ChannelTable, label_prefix: &str, color: &str) -> Vec<ChartSeries> {
    let now = Utc::now();
    table
        .chartable_metrics()
        .into_iter()
        .map(|metric| ChartSeries {
            kind: ChartKind::Bar,
            title: metric.to_string(),
            x_label: String::new(),
            y_label: metric.to_string(),
            image: image_name("", metric),
            color: color.to_string(),
            y_range: None,
            points: table
                .values_for(metric)
                .into_iter()
                .map(|(id, value)| Point {
                    label: Label::Text(format!("{label_prefix} {id}")),
                    value,
                })
                .collect(),
            generated_at: now,
        })
        .collect()
}

/// One bar chart per metric in `common`, one bar per record labelled by its
/// dataset index.
pub fn dataset_series(
    records: &[&Record],
    common: &BTreeSet<String>,
    prefix: &str,
    color: &str,
) -> Vec<ChartSeries> {
    let now = Utc::now();
    common
        .iter()
        .map(|metric| ChartSeries {
            kind: ChartKind::Bar,
            title: humanize(metric),
            x_label: "Index configuration number".to_string(),
            y_label: metric.clone(),
            image: image_name(prefix, metric),
            color: color.to_string(),
            y_range: None,
            points: records
                .iter()
                .filter_map(|r| {
                    r.metrics.get(metric).map(|v| Point {
                        label: Label::Index(r.index),
                        value: *v,
                    })
                })
                .collect(),
            generated_at: now,
        })
        .collect()
}

/// Writes series documents into an output directory.
pub struct ChartWriter {
    dir: PathBuf,
}

impl ChartWriter {
    /// Create the output directory if needed.
    pub fn create(dir: &Path) -> Result<Self, OutputError> {
        std::fs::create_dir_all(dir).map_err(|e| OutputError::CreateDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Atomically write `series` as `<stem>.json`; returns the final path.
    pub fn write(&self, series: &ChartSeries) -> Result<PathBuf, OutputError> {
        let json = serde_json::to_string_pretty(series)
            .map_err(|e| OutputError::Serialize { source: e })?;
        let path = self.dir.join(format!("{}.json", series.stem()));
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), points = series.points.len(), "wrote series");
        Ok(path)
    }

    /// Write every series, returning how many were written.
    pub fn write_all(&self, series: &[ChartSeries]) -> Result<usize, OutputError> {
        for s in series {
            self.write(s)?;
        }
        Ok(series.len())
    }
}

/// Write to a temp file beside `path`, then rename over it.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), OutputError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, contents).map_err(|e| OutputError::Write {
        path: tmp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| OutputError::Rename {
        from: tmp_path,
        to: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[derive(Debug)]
pub enum OutputError {
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::CreateDir { path, source } => {
                write!(f, "failed to create {}: {source}", path.display())
            }
            OutputError::Serialize { source } => write!(f, "failed to serialize series: {source}"),
            OutputError::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            OutputError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for OutputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OutputError::CreateDir { source, .. } => Some(source),
            OutputError::Serialize { source } => Some(source),
            OutputError::Write { source, .. } => Some(source),
            OutputError::Rename { source, .. } => Some(source),
        }
    }
}
