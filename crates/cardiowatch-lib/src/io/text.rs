use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use crate::signal::Waveform;

/// Parse newline-delimited amplitudes, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        if !val.is_finite() {
            anyhow::bail!("line {} is not a finite amplitude: {}", idx + 1, trimmed);
        }
        out.push(val);
    }
    Ok(out)
}

/// Read a newline-delimited amplitude series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text).with_context(|| format!("in {}", path.display()))
}

pub fn format_series(w: &Waveform) -> String {
    let mut out = String::with_capacity(w.len() * 8);
    for value in w.values() {
        let _ = writeln!(out, "{}", value);
    }
    out
}

pub fn write_series(path: &Path, w: &Waveform) -> Result<()> {
    std::fs::write(path, format_series(w))
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blanks() {
        let values = parse_f64_series("# reading\n70.5\n\n 71.0 \n").unwrap();
        assert_eq!(values, vec![70.5, 71.0]);
    }

    #[test]
    fn reports_bad_line_number() {
        let err = parse_f64_series("70\nabc\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_text_is_an_empty_reading() {
        assert!(parse_f64_series("# nothing\n").unwrap().is_empty());
    }

    #[test]
    fn rejects_nan() {
        assert!(parse_f64_series("NaN\n").is_err());
    }

    #[test]
    fn formats_one_value_per_line() {
        let w = Waveform::from_values(vec![1.5, 2.0]).unwrap();
        assert_eq!(format_series(&w), "1.5\n2\n");
    }
}
