/// Input path validation and directory enumeration.
///
/// Validation runs before any parsing starts. Directory entries are returned
/// in the order the filesystem lists them; that order decides dataset indices,
/// so it is never re-sorted here.
use std::path::{Path, PathBuf};

/// Fail fast unless `path` is an existing regular file.
pub fn require_file(path: &Path) -> Result<(), InputError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(InputError::NotAFile(path.to_path_buf())),
        Err(e) => Err(InputError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Fail fast unless `path` is an existing directory.
pub fn require_dir(path: &Path) -> Result<(), InputError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(InputError::NotADirectory(path.to_path_buf())),
        Err(e) => Err(InputError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Regular files directly inside `dir`, optionally filtered by a name pattern.
pub fn list_files(dir: &Path, pattern: Option<&glob::Pattern>) -> Result<Vec<PathBuf>, InputError> {
    require_dir(dir)?;
    let read_err = |source| InputError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match pattern {
            Some(p) if !p.matches(&entry.file_name().to_string_lossy()) => {
                tracing::debug!(file = %path.display(), pattern = %p, "skipping file not matching pattern");
            }
            _ => files.push(path),
        }
    }
    Ok(files)
}

/// File name component as an owned string, for labels and the index file.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug)]
pub enum InputError {
    NotAFile(PathBuf),
    NotADirectory(PathBuf),
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for InputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputError::NotAFile(p) => write!(f, "input '{}' is not a file", p.display()),
            InputError::NotADirectory(p) => {
                write!(f, "input '{}' is not a directory", p.display())
            }
            InputError::Unreadable { path, source } => {
                write!(f, "cannot read input '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InputError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}
