/// Stash-occupancy traces: two-column `cycle,percent` CSV rows.
use crate::chart::{self, ChartKind, ChartSeries, Label, Point};
use crate::line::{self, MetricValue};
use crate::table::ParseError;
use chrono::Utc;
use std::io::BufRead;
use std::path::Path;

/// Occupancy samples from one trace, in file order.
#[derive(Debug, Default, PartialEq)]
pub struct OccupancyTrace {
    pub samples: Vec<(f64, f64)>,
    pub skipped_rows: u64,
}

/// Read rows with exactly two numeric fields; anything else is skipped.
pub fn read_occupancy(reader: impl BufRead) -> std::io::Result<OccupancyTrace> {
    let mut trace = OccupancyTrace::default();
    line::for_each_line(reader, |line| {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let sample = match fields.as_slice() {
            [x, y] => x.parse::<f64>().ok().zip(y.parse::<f64>().ok()),
            _ => None,
        };
        match sample {
            Some(s) => trace.samples.push(s),
            None if line.trim().is_empty() => {}
            None => trace.skipped_rows += 1,
        }
    })?;
    Ok(trace)
}

pub fn parse_occupancy_file(path: &Path) -> Result<OccupancyTrace, ParseError> {
    let io_err = |source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let trace = read_occupancy(std::io::BufReader::new(file)).map_err(io_err)?;
    tracing::debug!(
        file = %path.display(),
        samples = trace.samples.len(),
        skipped = trace.skipped_rows,
        "parsed stash trace"
    );
    Ok(trace)
}

/// Line chart of occupancy over clock cycles, y fixed to 0..100.
pub fn occupancy_series(file_name: &str, trace: &OccupancyTrace, prefix: &str) -> ChartSeries {
    ChartSeries {
        kind: ChartKind::Line,
        title: "Stash occupancy during simulation".to_string(),
        x_label: "Clock cycle".to_string(),
        y_label: "% Stash occupancy".to_string(),
        image: chart::image_name(prefix, file_name),
        color: "b".to_string(),
        y_range: Some((0.0, 100.0)),
        points: trace
            .samples
            .iter()
            .map(|(x, y)| Point {
                label: Label::Number(*x),
                value: MetricValue::Float(*y),
            })
            .collect(),
        generated_at: Utc::now(),
    }
}
