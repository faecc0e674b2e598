/// Section-scoped parsing of aggregate simulator logs.
///
/// Only lines inside a recognized section (e.g. `MemorySystem:`) contribute
/// metrics. Inside it, a repeated sub-entity marker (e.g. `Controller:`) counts
/// entities. A blank line closes the section.
use crate::line::{self, MetricValue};
use crate::table::{EntityMetrics, ParseError, ParseStats};
use std::io::BufRead;
use std::path::Path;

/// Parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    Outside,
    InSection,
}

/// What one line means for the current state.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent<'a> {
    /// Section header: enter, reset the entity counter.
    Enter,
    /// Blank line while inside: leave.
    Leave,
    /// Sub-entity marker: count it, store nothing.
    Entity,
    /// A coerced `key: value` inside the section.
    Metric(&'a str, MetricValue),
    /// Anything else inside the section, or any line outside it.
    Ignore,
}

/// Section header and sub-entity marker, matched as line prefixes after trimming.
#[derive(Debug, Clone)]
pub struct SectionMarkers {
    pub header: String,
    pub entity: String,
}

impl Default for SectionMarkers {
    fn default() -> Self {
        Self {
            header: "MemorySystem:".to_string(),
            entity: "Controller:".to_string(),
        }
    }
}

impl SectionMarkers {
    /// Classify a line given the current state. Markers take priority over
    /// generic `key: value` parsing since they carry no value.
    pub fn classify<'a>(&self, state: SectionState, raw: &'a str) -> LineEvent<'a> {
        let line = raw.trim();
        match state {
            SectionState::Outside => {
                if line.starts_with(self.header.as_str()) {
                    LineEvent::Enter
                } else {
                    LineEvent::Ignore
                }
            }
            SectionState::InSection => {
                if line.is_empty() {
                    LineEvent::Leave
                } else if line.starts_with(self.entity.as_str()) {
                    LineEvent::Entity
                } else {
                    match line::split_key_value(line)
                        .and_then(|(k, v)| Some((k, line::coerce_value(v)?)))
                    {
                        Some((key, value)) => LineEvent::Metric(key, value),
                        None => LineEvent::Ignore,
                    }
                }
            }
        }
    }
}

/// Transition table. Only `Enter` and `Leave` change state.
pub fn transition(state: SectionState, event: &LineEvent<'_>) -> SectionState {
    match (state, event) {
        (SectionState::Outside, LineEvent::Enter) => SectionState::InSection,
        (SectionState::InSection, LineEvent::Leave) => SectionState::Outside,
        (state, _) => state,
    }
}

/// Result of parsing one aggregate log.
#[derive(Debug, Default)]
pub struct SectionParse {
    /// Sub-entity markers seen in the most recently entered section.
    pub entities: u32,
    pub metrics: EntityMetrics,
    /// Whether the section header was ever seen.
    pub found: bool,
    pub stats: ParseStats,
}

/// Run the state machine over every line from `reader`.
///
/// A section may occur more than once; re-entering resets the entity counter
/// and later values overwrite earlier ones.
pub fn read_section(reader: impl BufRead, markers: &SectionMarkers) -> std::io::Result<SectionParse> {
    let mut out = SectionParse::default();
    let mut state = SectionState::Outside;

    line::for_each_line(reader, |line| {
        out.stats.lines += 1;
        let event = markers.classify(state, line);

        match &event {
            LineEvent::Enter => {
                out.found = true;
                out.entities = 0;
            }
            LineEvent::Entity => out.entities += 1,
            LineEvent::Metric(key, value) => {
                out.metrics.insert((*key).to_string(), *value);
                out.stats.stored += 1;
            }
            LineEvent::Ignore if state == SectionState::InSection => {
                if line.contains(':') {
                    out.stats.non_numeric += 1;
                } else {
                    out.stats.no_colon += 1;
                }
            }
            LineEvent::Ignore | LineEvent::Leave => {}
        }

        state = transition(state, &event);
    })?;

    Ok(out)
}

/// Parse an aggregate log file.
pub fn parse_section_log(path: &Path, markers: &SectionMarkers) -> Result<SectionParse, ParseError> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let parsed = read_section(std::io::BufReader::new(file), markers).map_err(io_err)?;

    tracing::debug!(
        file = %path.display(),
        found = parsed.found,
        entities = parsed.entities,
        stored = parsed.stats.stored,
        skipped = parsed.stats.skipped(),
        "parsed section log"
    );
    Ok(parsed)
}
