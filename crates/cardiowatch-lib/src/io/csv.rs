use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::path::Path;

use crate::signal::{Sample, Waveform};

/// Load a `time,value` CSV. Header names are matched case-insensitively;
/// `timestamp`/`t` and `amplitude`/`ecg` are accepted as aliases.
pub fn read_waveform_csv(path: &Path) -> Result<Waveform> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();
    let time_idx = locate_column(&headers, &["time", "timestamp", "t"])
        .context("missing time column")?;
    let value_idx = locate_column(&headers, &["value", "amplitude", "ecg"])
        .context("missing value column")?;
    let mut samples = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading record {}", row + 1))?;
        let time_str = record
            .get(time_idx)
            .ok_or_else(|| anyhow::anyhow!("missing time in record {}", row + 1))?;
        let time: u64 = time_str
            .parse()
            .with_context(|| format!("parsing time {}", time_str))?;
        let value_str = record
            .get(value_idx)
            .ok_or_else(|| anyhow::anyhow!("missing value in record {}", row + 1))?;
        let value: f64 = value_str
            .parse()
            .with_context(|| format!("parsing value {}", value_str))?;
        samples.push(Sample { time, value });
    }
    let waveform =
        Waveform::new(samples).with_context(|| format!("validating {}", path.display()))?;
    Ok(waveform)
}

pub fn write_waveform_csv(path: &Path, w: &Waveform) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(["time", "value"])?;
    for sample in w.samples() {
        writer.write_record(&[sample.time.to_string(), sample.value.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn locate_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|name| h.eq_ignore_ascii_case(name)))
}
