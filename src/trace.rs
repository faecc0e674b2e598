/// Memory-access trace conversion to the SimpleO3 frontend format.
///
/// `LD 0x39484` becomes `0 234884` and `ST 0x27483 0x28273` becomes
/// `0 160643 164467`: a leading bubble count of 0, the opcode dropped, hex
/// arguments rewritten in decimal and other arguments passed through.
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

/// Convert one line. `None` for blank lines.
pub fn convert_line(line: &str) -> Result<Option<String>, std::num::ParseIntError> {
    let mut parts = line.split_whitespace();
    if parts.next().is_none() {
        return Ok(None);
    }

    let mut out = String::from("0");
    for arg in parts {
        out.push(' ');
        match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
            Some(hex) => out.push_str(&u128::from_str_radix(hex, 16)?.to_string()),
            None => out.push_str(arg),
        }
    }
    Ok(Some(out))
}

/// Convert every line from `input` into `output`, returning lines written.
pub fn convert(input: impl BufRead, mut output: impl Write) -> Result<u64, TraceError> {
    let mut written = 0;
    for (i, line) in input.lines().enumerate() {
        let line = line.map_err(TraceError::Io)?;
        let converted = convert_line(&line).map_err(|e| TraceError::BadAddress {
            line: i + 1,
            text: line.clone(),
            source: e,
        })?;
        if let Some(out) = converted {
            writeln!(output, "{out}").map_err(TraceError::Io)?;
            written += 1;
        }
    }
    output.flush().map_err(TraceError::Io)?;
    Ok(written)
}

/// Convert `input` file into `output` file.
pub fn convert_file(input: &Path, output: &Path) -> Result<u64, TraceError> {
    let infile = std::fs::File::open(input).map_err(|e| TraceError::Open {
        path: input.to_path_buf(),
        source: e,
    })?;
    let outfile = std::fs::File::create(output).map_err(|e| TraceError::Open {
        path: output.to_path_buf(),
        source: e,
    })?;
    convert(
        std::io::BufReader::new(infile),
        std::io::BufWriter::new(outfile),
    )
}

#[derive(Debug)]
pub enum TraceError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Io(std::io::Error),
    /// Not hex, or wider than 128 bits.
    BadAddress {
        line: usize,
        text: String,
        source: std::num::ParseIntError,
    },
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Open { path, source } => {
                write!(f, "failed to open {}: {source}", path.display())
            }
            TraceError::Io(e) => write!(f, "I/O error during conversion: {e}"),
            TraceError::BadAddress { line, text, source } => {
                write!(f, "line {line}: bad hex address in '{text}': {source}")
            }
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TraceError::Open { source, .. } => Some(source),
            TraceError::Io(e) => Some(e),
            TraceError::BadAddress { source, .. } => Some(source),
        }
    }
}
