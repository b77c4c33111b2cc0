/*!
 * World file artifact: six affine coefficients, one per line, in the order
 * A, D, B, E, C, F.
 *
 * | line | meaning |
 * |------|---------|
 * | A | pixel width in map units |
 * | D | row rotation |
 * | B | column rotation |
 * | E | pixel height (negative for north-up images) |
 * | C | X of the centre of the top-left pixel |
 * | F | Y of the centre of the top-left pixel |
 */

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorldFileError {
    #[error("I/O error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("world file {path:?} has {found} values, expected 6")]
    LineCount { path: PathBuf, found: usize },

    #[error("world file {path:?} line {line}: '{value}' is not a number")]
    Parse {
        path: PathBuf,
        line: usize,
        value: String,
    },
}

/// Affine coefficients mapping pixel (col, row) to map (x, y):
/// `x = A*col + B*row + C`, `y = D*col + E*row + F`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldFileParameters {
    pub a: f64,
    pub d: f64,
    pub b: f64,
    pub e: f64,
    pub c: f64,
    pub f: f64,
}

impl WorldFileParameters {
    /// Coefficients in file order
    pub fn to_lines(&self) -> [f64; 6] {
        [self.a, self.d, self.b, self.e, self.c, self.f]
    }

    pub fn from_lines(values: [f64; 6]) -> Self {
        let [a, d, b, e, c, f] = values;
        Self { a, d, b, e, c, f }
    }

    /// Map coordinate of the centre of pixel `(col, row)`
    pub fn pixel_to_map(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }
}

/// Companion extension for a raster filename, or `None` when unsupported
pub fn companion_extension(filename: &str) -> Option<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jgw"),
        "png" => Some("pgw"),
        _ => None,
    }
}

/// Path of the world file that accompanies `raster_path`
pub fn world_file_path(raster_path: &Path) -> Option<PathBuf> {
    let name = raster_path.file_name()?.to_str()?;
    let ext = companion_extension(name)?;
    Some(raster_path.with_extension(ext))
}

/// Write the six coefficients to `path`, replacing any existing file.
///
/// Values use Rust's shortest round-trip float formatting, so reading the
/// file back yields bit-identical numbers.
pub fn write_world_file(path: &Path, params: &WorldFileParameters) -> Result<(), WorldFileError> {
    let io_err = |source| WorldFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for value in params.to_lines() {
        writeln!(writer, "{}", value).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)?;
    Ok(())
}

pub fn read_world_file(path: &Path) -> Result<WorldFileParameters, WorldFileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| WorldFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let lines: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.len() != 6 {
        return Err(WorldFileError::LineCount {
            path: path.to_path_buf(),
            found: lines.len(),
        });
    }

    let mut values = [0.0; 6];
    for (i, line) in lines.iter().enumerate() {
        values[i] = line.parse().map_err(|_| WorldFileError::Parse {
            path: path.to_path_buf(),
            line: i + 1,
            value: line.to_string(),
        })?;
    }
    Ok(WorldFileParameters::from_lines(values))
}
