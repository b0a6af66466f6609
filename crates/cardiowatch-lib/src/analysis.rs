use crate::{config::AnalysisConfig, signal::Waveform};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Moderate,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::None => "none",
            Severity::Moderate => "moderate",
            Severity::High => "high",
        };
        f.write_str(label)
    }
}

/// Outcome of analyzing one reading. Recomputed per reading, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub irregular_beat_count: usize,
    pub requires_attention: bool,
    pub severity: Severity,
    pub sample_count: usize,
    /// Largest absolute distance from the baseline; 0 for an empty reading.
    pub max_deviation: f64,
}

impl AnalysisResult {
    /// Result of an empty reading.
    pub fn empty() -> Self {
        Self {
            irregular_beat_count: 0,
            requires_attention: false,
            severity: Severity::None,
            sample_count: 0,
            max_deviation: 0.0,
        }
    }

    /// Classify an irregular-beat count against the configured limits.
    pub fn classify(irregular_beat_count: usize, cfg: &AnalysisConfig) -> (bool, Severity) {
        let requires_attention = irregular_beat_count > cfg.moderate_count;
        let severity = if irregular_beat_count > cfg.high_count {
            Severity::High
        } else if requires_attention {
            Severity::Moderate
        } else {
            Severity::None
        };
        (requires_attention, severity)
    }
}

/// Count samples deviating from the baseline by more than the threshold and
/// classify the count. Pure: the same inputs always give the same result.
pub fn analyze(w: &Waveform, cfg: &AnalysisConfig) -> AnalysisResult {
    let mut irregular_beat_count = 0usize;
    let mut max_deviation = 0.0f64;
    for value in w.values() {
        let deviation = (value - cfg.baseline).abs();
        if deviation > cfg.deviation_threshold {
            irregular_beat_count += 1;
        }
        max_deviation = max_deviation.max(deviation);
    }
    let (requires_attention, severity) = AnalysisResult::classify(irregular_beat_count, cfg);
    debug!(
        "analyzed {} samples: {} irregular, severity {}",
        w.len(),
        irregular_beat_count,
        severity
    );
    AnalysisResult {
        irregular_beat_count,
        requires_attention,
        severity,
        sample_count: w.len(),
        max_deviation,
    }
}

/// Same as [`analyze`] with the thresholds passed individually.
pub fn analyze_with(
    w: &Waveform,
    baseline: f64,
    deviation_threshold: f64,
    moderate_count: usize,
    high_count: usize,
) -> AnalysisResult {
    let cfg = AnalysisConfig {
        baseline,
        deviation_threshold,
        moderate_count,
        high_count,
    };
    analyze(w, &cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading_with_deviations(count: usize, total: usize) -> Waveform {
        let mut values = vec![72.0; total];
        for (i, v) in values.iter_mut().take(count).enumerate() {
            *v = if i % 2 == 0 { 100.0 } else { 40.0 };
        }
        Waveform::from_values(values).unwrap()
    }

    #[test]
    fn empty_reading_is_not_an_anomaly() {
        let result = analyze(&Waveform::empty(), &AnalysisConfig::default());
        assert_eq!(result, AnalysisResult::empty());
        assert_eq!(result.irregular_beat_count, 0);
        assert!(!result.requires_attention);
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.max_deviation, 0.0);
    }

    #[test]
    fn six_deviations_are_moderate() {
        let w = reading_with_deviations(6, 100);
        let result = analyze_with(&w, 70.0, 25.0, 5, 10);
        assert_eq!(result.irregular_beat_count, 6);
        assert!(result.requires_attention);
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[test]
    fn eleven_deviations_are_high() {
        let w = reading_with_deviations(11, 100);
        let result = analyze_with(&w, 70.0, 25.0, 5, 10);
        assert_eq!(result.irregular_beat_count, 11);
        assert!(result.requires_attention);
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn count_at_moderate_limit_needs_no_attention() {
        let w = reading_with_deviations(5, 50);
        let result = analyze(&w, &AnalysisConfig::default());
        assert!(!result.requires_attention);
        assert_eq!(result.severity, Severity::None);
    }

    #[test]
    fn count_at_high_limit_stays_moderate() {
        let w = reading_with_deviations(10, 50);
        let result = analyze(&w, &AnalysisConfig::default());
        assert_eq!(result.severity, Severity::Moderate);
    }

    #[test]
    fn deviation_equal_to_threshold_is_regular() {
        let w = Waveform::from_values(vec![95.0, 45.0, 70.0]).unwrap();
        let result = analyze(&w, &AnalysisConfig::default());
        assert_eq!(result.irregular_beat_count, 0);
        assert!((result.max_deviation - 25.0).abs() < 1e-12);
    }

    #[test]
    fn analysis_is_deterministic() {
        let w = reading_with_deviations(7, 300);
        let cfg = AnalysisConfig::default();
        assert_eq!(analyze(&w, &cfg), analyze(&w, &cfg));
    }

    #[test]
    fn classification_bands_cover_all_counts() {
        let cfg = AnalysisConfig::default();
        for count in 0..30 {
            let (attention, severity) = AnalysisResult::classify(count, &cfg);
            let expected = if count > cfg.high_count {
                Severity::High
            } else if count > cfg.moderate_count {
                Severity::Moderate
            } else {
                Severity::None
            };
            assert_eq!(severity, expected, "count {}", count);
            assert_eq!(attention, count > cfg.moderate_count);
        }
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Moderate).unwrap(),
            "\"moderate\""
        );
    }
}
