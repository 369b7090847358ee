//! Prerecorded respiration data
//!
//! Delimited text with a header row; one column holds the amplitude.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Load one numeric column from a delimited text file.
///
/// The first line is a header and is skipped; blank lines are ignored.
pub fn load_recording(path: &Path, column: usize, delimiter: char) -> Result<Vec<f64>> {
    info!("Loading prerecorded respiration from {:?}...", path);

    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();

    for (index, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let field = trimmed.split(delimiter).nth(column).ok_or_else(|| Error::Recording {
            path: path.to_path_buf(),
            line: line_no,
            reason: format!("no column {}", column),
        })?;

        let value = field.trim().parse::<f64>().map_err(|e| Error::Recording {
            path: path.to_path_buf(),
            line: line_no,
            reason: format!("{:?} is not a number ({})", field.trim(), e),
        })?;
        samples.push(value);
    }

    if samples.is_empty() {
        return Err(Error::Recording {
            path: path.to_path_buf(),
            line: 1,
            reason: "no samples after the header".to_string(),
        });
    }

    info!("Loaded {} samples", samples.len());
    Ok(samples)
}
