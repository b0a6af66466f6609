use crate::error::MonitorError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Thresholds that turn a waveform into an irregular-beat count and severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Resting amplitude the reading is expected to oscillate around.
    pub baseline: f64,
    /// A sample further than this from the baseline counts as an irregular beat.
    pub deviation_threshold: f64,
    /// More irregular beats than this requires attention (moderate).
    pub moderate_count: usize,
    /// More irregular beats than this is classified as high severity.
    pub high_count: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            baseline: 70.0,
            deviation_threshold: 25.0,
            moderate_count: 5,
            high_count: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !self.baseline.is_finite() {
            return Err(invalid("baseline must be finite"));
        }
        if !self.deviation_threshold.is_finite() || self.deviation_threshold <= 0.0 {
            return Err(invalid(format!(
                "deviation_threshold must be positive, got {}",
                self.deviation_threshold
            )));
        }
        if self.high_count < self.moderate_count {
            return Err(invalid(format!(
                "high_count ({}) must not be below moderate_count ({})",
                self.high_count, self.moderate_count
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingConfig {
    /// Samples per reading session.
    pub duration_samples: usize,
    /// Nominal sampling rate (Hz), used for display and export.
    pub sample_rate_hz: f64,
}

impl Default for ReadingConfig {
    fn default() -> Self {
        Self {
            duration_samples: 500,
            sample_rate_hz: 250.0,
        }
    }
}

impl ReadingConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.duration_samples == 0 {
            return Err(invalid("duration_samples must be positive"));
        }
        if !self.sample_rate_hz.is_finite() || self.sample_rate_hz <= 0.0 {
            return Err(invalid(format!(
                "sample_rate_hz must be positive, got {}",
                self.sample_rate_hz
            )));
        }
        Ok(())
    }
}

/// Parameters of the synthetic generator used for demos and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// RNG seed. `None` lets the caller pick one.
    pub seed: Option<u64>,
    /// Peak amplitude of the periodic baseline oscillation.
    pub amplitude: f64,
    /// Samples per oscillation period.
    pub period_samples: f64,
    /// Bound on uniform per-sample jitter.
    pub jitter: f64,
    /// Per-sample probability of an injected irregular beat.
    pub anomaly_rate: f64,
    /// Size of an injected perturbation.
    pub anomaly_magnitude: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            seed: None,
            amplitude: 8.0,
            period_samples: 200.0,
            jitter: 3.0,
            anomaly_rate: 0.02,
            anomaly_magnitude: 40.0,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        if !(0.0..=1.0).contains(&self.anomaly_rate) {
            return Err(invalid(format!(
                "anomaly_rate must be within [0, 1], got {}",
                self.anomaly_rate
            )));
        }
        if !self.period_samples.is_finite() || self.period_samples <= 0.0 {
            return Err(invalid("period_samples must be positive"));
        }
        // The jitter range spans 2 * jitter and must stay representable.
        if !(2.0 * self.jitter).is_finite() || self.jitter < 0.0 {
            return Err(invalid(format!(
                "jitter must be non-negative and finite when doubled, got {}",
                self.jitter
            )));
        }
        if !self.amplitude.is_finite() || !self.anomaly_magnitude.is_finite() {
            return Err(invalid("amplitude and anomaly_magnitude must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Longest wait for a single sample from a live feed.
    pub timeout_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { timeout_ms: 2000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub analysis: AnalysisConfig,
    pub reading: ReadingConfig,
    pub synthetic: SyntheticConfig,
    pub feed: FeedConfig,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), MonitorError> {
        self.analysis.validate()?;
        self.reading.validate()?;
        self.synthetic.validate()?;
        if self.feed.timeout_ms == 0 {
            return Err(invalid("feed.timeout_ms must be positive"));
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<MonitorConfig> {
    let config: MonitorConfig = toml::from_str(text).context("parsing monitor config")?;
    Ok(config)
}

/// Read a TOML config from disk. Missing keys fall back to defaults; the
/// result is not validated.
pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("in {}", path.display()))
}

fn invalid(msg: impl Into<String>) -> MonitorError {
    MonitorError::InvalidConfiguration(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_counts() {
        let mut cfg = MonitorConfig::default();
        cfg.analysis.moderate_count = 8;
        cfg.analysis.high_count = 4;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfiguration(_)));
    }

    #[test]
    fn rejects_zero_duration() {
        let mut cfg = MonitorConfig::default();
        cfg.reading.duration_samples = 0;
        assert!(matches!(
            cfg.validate(),
            Err(MonitorError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let cfg = AnalysisConfig {
            deviation_threshold: 0.0,
            ..AnalysisConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_jitter_whose_range_overflows() {
        let cfg = SyntheticConfig {
            jitter: 1e308,
            ..SyntheticConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(MonitorError::InvalidConfiguration(_))
        ));
        let negative = SyntheticConfig {
            jitter: -1.0,
            ..SyntheticConfig::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = parse_config(
            r#"
[analysis]
baseline = 60.0
high_count = 12

[synthetic]
seed = 7
"#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.baseline, 60.0);
        assert_eq!(cfg.analysis.high_count, 12);
        assert_eq!(cfg.analysis.moderate_count, 5);
        assert_eq!(cfg.synthetic.seed, Some(7));
        assert_eq!(cfg.reading, ReadingConfig::default());
    }

    #[test]
    fn loads_config_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        fs::write(&path, "[reading]\nduration_samples = 42\n").unwrap();
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.reading.duration_samples, 42);
    }

    #[test]
    fn missing_config_reports_path() {
        let err = load_config(Path::new("/nonexistent/monitor.toml")).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/monitor.toml"));
    }
}
