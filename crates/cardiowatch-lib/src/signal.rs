use crate::error::MonitorError;
use serde::{Deserialize, Serialize};

/// One amplitude reading at a sample index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: u64,
    pub value: f64,
}

/// One reading session. Times are strictly increasing; the sample buffer is
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct Waveform {
    samples: Vec<Sample>,
}

impl Waveform {
    /// Build from explicit samples, rejecting duplicate or decreasing times.
    pub fn new(samples: Vec<Sample>) -> Result<Self, MonitorError> {
        for (i, pair) in samples.windows(2).enumerate() {
            if pair[1].time <= pair[0].time {
                return Err(MonitorError::MalformedWaveform(format!(
                    "sample {} has time {} after {}",
                    i + 1,
                    pair[1].time,
                    pair[0].time
                )));
            }
        }
        if let Some(bad) = samples.iter().find(|s| !s.value.is_finite()) {
            return Err(MonitorError::MalformedWaveform(format!(
                "non-finite amplitude at time {}",
                bad.time
            )));
        }
        Ok(Self { samples })
    }

    /// Assign contiguous times `0..values.len()`. Non-finite amplitudes are
    /// rejected like in [`Waveform::new`].
    pub fn from_values(values: Vec<f64>) -> Result<Self, MonitorError> {
        let samples = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| Sample {
                time: i as u64,
                value,
            })
            .collect();
        Self::new(samples)
    }

    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the given sampling rate.
    pub fn duration(&self, fs: f64) -> f64 {
        self.samples.len() as f64 / fs
    }
}

impl TryFrom<Vec<Sample>> for Waveform {
    type Error = MonitorError;

    fn try_from(samples: Vec<Sample>) -> Result<Self, Self::Error> {
        Waveform::new(samples)
    }
}

impl From<Waveform> for Vec<Sample> {
    fn from(w: Waveform) -> Self {
        w.samples
    }
}
