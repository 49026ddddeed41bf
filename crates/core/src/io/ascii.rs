//! ESRI ASCII grid reading/writing
//!
//! The format is a short `key value` header followed by `nrows` lines of
//! `ncols` values, northernmost row first:
//!
//! ```text
//! ncols        4
//! nrows        3
//! xllcorner    500000.0
//! yllcorner    4100000.0
//! cellsize     30.0
//! NODATA_value -9999
//! 1 2 3 4
//! ...
//! ```
//!
//! `xllcenter`/`yllcenter` are accepted and converted to corner origins.

use crate::error::{Result, RiskError};
use crate::grid::{GridSystem, Raster, DEFAULT_NO_DATA};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Read an ASCII grid file into a raster
///
/// # Errors
///
/// Returns [`RiskError::Io`] if the file cannot be read and
/// [`RiskError::Parse`] for a malformed header or body.
pub fn read_ascii_grid<P: AsRef<Path>>(path: P) -> Result<Raster> {
    let file = File::open(path.as_ref())?;
    decode_ascii_grid(BufReader::new(file))
}

/// Decode an ASCII grid from any buffered reader
///
/// # Errors
///
/// Same as [`read_ascii_grid`].
pub fn decode_ascii_grid<R: BufRead>(reader: R) -> Result<Raster> {
    let mut header = Header::default();
    let mut values = Vec::new();
    let mut in_body = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !in_body {
            let mut parts = trimmed.split_whitespace();
            let key = parts.next().unwrap_or_default();
            if key.starts_with(|c: char| c.is_ascii_alphabetic()) {
                let value = parts.next().ok_or_else(|| RiskError::Parse {
                    line: line_no,
                    reason: format!("header key '{key}' has no value"),
                })?;
                header.assign(key, value, line_no)?;
                continue;
            }
            in_body = true;
        }

        for token in trimmed.split_whitespace() {
            let value = token.parse::<f64>().map_err(|_| RiskError::Parse {
                line: line_no,
                reason: format!("'{token}' is not a number"),
            })?;
            values.push(value);
        }
    }

    let (system, no_data) = header.finish()?;
    if values.len() != system.cell_count() {
        return Err(RiskError::Parse {
            line: 0,
            reason: format!(
                "expected {} values for a {}x{} grid, found {}",
                system.cell_count(),
                system.width,
                system.height,
                values.len()
            ),
        });
    }

    // File rows run north to south; storage rows run south to north
    let mut data = Vec::with_capacity(values.len());
    for row in values.chunks_exact(system.width).rev() {
        data.extend_from_slice(row);
    }

    Raster::from_vec(system, data, no_data)
}

/// Decode an ASCII grid held in memory
///
/// # Errors
///
/// Same as [`read_ascii_grid`].
pub fn read_ascii_grid_from_str(text: &str) -> Result<Raster> {
    decode_ascii_grid(text.as_bytes())
}

/// Write a raster as an ASCII grid file
///
/// # Errors
///
/// Returns [`RiskError::Io`] if the file cannot be written.
pub fn write_ascii_grid<P: AsRef<Path>>(raster: &Raster, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_ascii_grid(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a raster as ASCII grid text
///
/// No-data cells (including NaN) are written as the raster's sentinel.
///
/// # Errors
///
/// Returns [`RiskError::Io`] on write failure.
pub fn encode_ascii_grid<W: Write>(raster: &Raster, writer: &mut W) -> Result<()> {
    let system = raster.system();
    writeln!(writer, "ncols        {}", system.width)?;
    writeln!(writer, "nrows        {}", system.height)?;
    writeln!(writer, "xllcorner    {}", system.x_min)?;
    writeln!(writer, "yllcorner    {}", system.y_min)?;
    writeln!(writer, "cellsize     {}", system.cell_size)?;
    writeln!(writer, "NODATA_value {}", raster.no_data_value())?;

    let no_data = raster.no_data_value();
    for row in raster.as_slice().chunks_exact(system.width).rev() {
        let mut first = true;
        for &value in row {
            if !first {
                writer.write_all(b" ")?;
            }
            first = false;
            let value = if raster.is_no_data_value(value) {
                no_data
            } else {
                value
            };
            write!(writer, "{value}")?;
        }
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Header {
    ncols: Option<usize>,
    nrows: Option<usize>,
    x_corner: Option<f64>,
    y_corner: Option<f64>,
    x_center: Option<f64>,
    y_center: Option<f64>,
    cell_size: Option<f64>,
    no_data: Option<f64>,
}

impl Header {
    fn assign(&mut self, key: &str, value: &str, line: usize) -> Result<()> {
        let number = || {
            value.parse::<f64>().map_err(|_| RiskError::Parse {
                line,
                reason: format!("header '{key}' has non-numeric value '{value}'"),
            })
        };
        let count = || {
            value.parse::<usize>().map_err(|_| RiskError::Parse {
                line,
                reason: format!("header '{key}' must be a positive integer, got '{value}'"),
            })
        };

        match key.to_ascii_lowercase().as_str() {
            "ncols" => self.ncols = Some(count()?),
            "nrows" => self.nrows = Some(count()?),
            "xllcorner" => self.x_corner = Some(number()?),
            "yllcorner" => self.y_corner = Some(number()?),
            "xllcenter" => self.x_center = Some(number()?),
            "yllcenter" => self.y_center = Some(number()?),
            "cellsize" => self.cell_size = Some(number()?),
            "nodata_value" => self.no_data = Some(number()?),
            _ => {
                return Err(RiskError::Parse {
                    line,
                    reason: format!("unknown header key '{key}'"),
                })
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<(GridSystem, f64)> {
        let missing = |key: &str| RiskError::Parse {
            line: 0,
            reason: format!("missing header key '{key}'"),
        };
        let width = self.ncols.ok_or_else(|| missing("ncols"))?;
        let height = self.nrows.ok_or_else(|| missing("nrows"))?;
        let cell_size = self.cell_size.ok_or_else(|| missing("cellsize"))?;

        let half = cell_size / 2.0;
        let x_min = self
            .x_corner
            .or(self.x_center.map(|c| c - half))
            .ok_or_else(|| missing("xllcorner"))?;
        let y_min = self
            .y_corner
            .or(self.y_center.map(|c| c - half))
            .ok_or_else(|| missing("yllcorner"))?;

        let system = GridSystem::new(width, height, cell_size)
            .map_err(|e| RiskError::Parse {
                line: 0,
                reason: e.to_string(),
            })?
            .with_origin(x_min, y_min);
        Ok((system, self.no_data.unwrap_or(DEFAULT_NO_DATA)))
    }
}
