/// Metric tables: per-entity accumulation of parsed `key: value` lines.
///
/// Every parse builds its own table; nothing is shared between files.
use crate::line::{self, KeyClass, MetricValue};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::Path;

/// Metric name to value for one entity or one file. Last write wins.
pub type EntityMetrics = BTreeMap<String, MetricValue>;

/// Counts of lines dropped during a parse, reported in verbose mode only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: u64,
    pub stored: u64,
    pub no_colon: u64,
    pub non_numeric: u64,
    pub unmatched_key: u64,
}

impl ParseStats {
    pub fn skipped(&self) -> u64 {
        self.no_colon + self.non_numeric + self.unmatched_key
    }
}

/// Per-channel metrics extracted from a single log.
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: BTreeMap<u32, EntityMetrics>,
    scalars: EntityMetrics,
    metric_names: BTreeSet<String>,
    pub stats: ParseStats,
}

impl ChannelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw log line into the table.
    pub fn accept_line(&mut self, raw: &str) {
        self.stats.lines += 1;

        let Some((key, value)) = line::split_key_value(raw) else {
            self.stats.no_colon += 1;
            return;
        };

        let Some(value) = line::coerce_value(value) else {
            self.stats.non_numeric += 1;
            return;
        };

        match line::classify_key(key) {
            KeyClass::Entity { name, id } => self.insert(id, name, value),
            KeyClass::Scalar(key) => {
                self.scalars.insert(key.to_string(), value);
                self.stats.unmatched_key += 1;
            }
        }
    }

    /// Store a value for `metric` on channel `id`, replacing any earlier one.
    pub fn insert(&mut self, id: u32, metric: &str, value: MetricValue) {
        self.channels
            .entry(id)
            .or_default()
            .insert(metric.to_string(), value);
        self.metric_names.insert(metric.to_string());
        self.stats.stored += 1;
    }

    /// Channel ids in ascending order.
    pub fn channel_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.channels.keys().copied()
    }

    /// Every distinct entity metric name seen, sorted.
    pub fn metric_names(&self) -> &BTreeSet<String> {
        &self.metric_names
    }

    #[cfg(test)]
    pub fn channel(&self, id: u32) -> Option<&EntityMetrics> {
        self.channels.get(&id)
    }

    /// Keys without an entity suffix. Not charted per channel.
    pub fn scalars(&self) -> &EntityMetrics {
        &self.scalars
    }

    /// Values of `metric` for every channel in id order; absent entries read as 0.
    pub fn values_for(&self, metric: &str) -> Vec<(u32, MetricValue)> {
        self.channels
            .iter()
            .map(|(id, m)| (*id, m.get(metric).copied().unwrap_or(MetricValue::Int(0))))
            .collect()
    }

    /// Metrics with at least one nonzero channel value, sorted.
    pub fn chartable_metrics(&self) -> Vec<&str> {
        self.metric_names
            .iter()
            .filter(|m| self.values_for(m).iter().any(|(_, v)| !v.is_zero()))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Errors produced while reading a log.
#[derive(Debug)]
pub enum ParseError {
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Io { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io { source, .. } => Some(source),
        }
    }
}

/// Build a channel table from any line source.
pub fn read_channel_table(reader: impl BufRead) -> std::io::Result<ChannelTable> {
    let mut table = ChannelTable::new();
    line::for_each_line(reader, |l| table.accept_line(l))?;
    Ok(table)
}

/// Parse a per-channel log file.
pub fn parse_channel_log(path: &Path) -> Result<ChannelTable, ParseError> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let table = read_channel_table(std::io::BufReader::new(file)).map_err(io_err)?;

    tracing::debug!(
        file = %path.display(),
        lines = table.stats.lines,
        stored = table.stats.stored,
        no_colon = table.stats.no_colon,
        non_numeric = table.stats.non_numeric,
        unmatched_key = table.stats.unmatched_key,
        scalars = table.scalars().len(),
        "parsed channel log"
    );
    Ok(table)
}
