pub mod csv;
pub mod text;

use crate::signal::Waveform;
use anyhow::Result;
use std::path::Path;

/// Load a stored reading, picking the format from the file extension:
/// `.csv` is a `time,value` table, anything else a newline-delimited series.
pub fn read_waveform(path: &Path) -> Result<Waveform> {
    let is_csv = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        csv::read_waveform_csv(path)
    } else {
        let values = text::read_f64_series(path)?;
        Ok(Waveform::from_values(values)?)
    }
}
