/// Line-level parsing of simulator logs: `key: value` splitting, entity-suffix
/// classification of keys, and numeric coercion of values.
use regex::Regex;
use serde::Serialize;
use std::io::BufRead;
use std::sync::LazyLock;

/// `<name>_<digits>` at end of key. Greedy `\w+` so the split happens at the
/// last underscore followed only by digits.
static ENTITY_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+)_([0-9]+)$").unwrap());

/// Call `f` with every line of `reader`, line terminator stripped.
///
/// Bytes that are not valid UTF-8 are replaced on their own line only, so a
/// stray binary byte in free text never fails the whole read.
pub fn for_each_line(mut reader: impl BufRead, mut f: impl FnMut(&str)) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let mut bytes = buf.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        f(&String::from_utf8_lossy(bytes));
    }
}

/// A numeric metric value, integral or floating-point by surface form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }

    pub fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// How a raw key was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyClass<'a> {
    /// `<name>_<id>`: a metric scoped to one entity (channel).
    Entity { name: &'a str, id: u32 },
    /// Anything else, used verbatim.
    Scalar(&'a str),
}

/// Split a line on its first `:` into trimmed key and value.
///
/// Returns `None` for lines without a colon; those are free text, not errors.
pub fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.trim().split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Classify a key as entity-scoped or scalar.
///
/// An entity suffix too large for `u32` is treated as part of a scalar key.
pub fn classify_key(key: &str) -> KeyClass<'_> {
    if let Some(caps) = ENTITY_KEY.captures(key) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        if let Some(id) = caps.get(2).and_then(|m| m.as_str().parse().ok()) {
            return KeyClass::Entity { name, id };
        }
    }
    KeyClass::Scalar(key)
}

/// Coerce a raw value: float if it contains `.`, integer otherwise.
///
/// `None` means the value is not numeric and the line should be dropped.
pub fn coerce_value(raw: &str) -> Option<MetricValue> {
    if raw.contains('.') {
        raw.parse::<f64>().ok().map(MetricValue::Float)
    } else {
        raw.parse::<i64>().ok().map(MetricValue::Int)
    }
}
