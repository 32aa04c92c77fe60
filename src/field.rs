use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Scalar field samples: one `(x, y, value)` triple per data row.
#[derive(Debug, Clone)]
pub struct ScalarSamples {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub value: Vec<f64>,
}

impl ScalarSamples {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Velocity field samples: `(x, y, vx, vy, magnitude)` per data row.
#[derive(Debug, Clone)]
pub struct VelocitySamples {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub magnitude: Vec<f64>,
}

impl VelocitySamples {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Why a field file could not be turned into a sample set.
///
/// `FileNotFound` is the ordinary "no data" case: the solver simply did
/// not write that field, and the caller disables the matching charts.
/// `Malformed` and `Io` also disable the field but deserve a louder
/// message.
#[derive(Debug)]
pub enum LoadError {
    FileNotFound(PathBuf),
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    Io(PathBuf, io::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::FileNotFound(path) => {
                write!(f, "no data: {} does not exist", path.display())
            }
            LoadError::Malformed { path, line, reason } => {
                write!(f, "malformed input in {} (line {}): {}", path.display(), line, reason)
            }
            LoadError::Io(path, err) => {
                write!(f, "failed to read {}: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Load a 3-column scalar field file (`x y value`).
///
/// Extra columns are ignored, so a velocity dump also loads as a
/// scalar field of its first value column.
pub fn load_scalar(path: &Path, comment: char) -> Result<ScalarSamples, LoadError> {
    let columns = read_columns(path, 3, comment)?;
    let [x, y, value] = columns.try_into().expect("read_columns returned 3 columns");
    Ok(ScalarSamples { x, y, value })
}

/// Load a 5-column velocity field file (`x y vx vy magnitude`).
pub fn load_velocity(path: &Path, comment: char) -> Result<VelocitySamples, LoadError> {
    let columns = read_columns(path, 5, comment)?;
    let [x, y, vx, vy, magnitude] = columns.try_into().expect("read_columns returned 5 columns");
    Ok(VelocitySamples { x, y, vx, vy, magnitude })
}

fn read_columns(path: &Path, ncols: usize, comment: char) -> Result<Vec<Vec<f64>>, LoadError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        Err(err) => return Err(LoadError::Io(path.to_path_buf(), err)),
    };
    parse_columns(&text, ncols, comment).map_err(|(line, reason)| LoadError::Malformed {
        path: path.to_path_buf(),
        line,
        reason,
    })
}

/// Parse whitespace-delimited numeric columns out of `text`.
///
/// Blank lines and lines starting with `comment` are skipped. Returns
/// `ncols` parallel arrays of equal length, or `(line_number, reason)`
/// for the first offending line.
fn parse_columns(
    text: &str,
    ncols: usize,
    comment: char,
) -> Result<Vec<Vec<f64>>, (usize, String)> {
    let mut columns = vec![Vec::new(); ncols];
    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(comment) {
            continue;
        }
        let mut fields = line.split_whitespace();
        for col in columns.iter_mut() {
            let token = fields.next().ok_or_else(|| {
                (
                    lineno + 1,
                    format!("expected {} columns, found {}", ncols, line.split_whitespace().count()),
                )
            })?;
            let parsed: f64 = token
                .parse()
                .map_err(|_| (lineno + 1, format!("cannot parse '{}' as a number", token)))?;
            col.push(parsed);
        }
        // Trailing columns (e.g. magnitude in a velocity file read as a
        // scalar) are ignored.
    }
    Ok(columns)
}
