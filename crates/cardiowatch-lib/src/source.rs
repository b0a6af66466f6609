use crate::{
    config::{FeedConfig, SyntheticConfig},
    error::MonitorError,
    io,
    signal::Waveform,
};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::Path;
use std::time::Duration;

/// Where readings come from. `acquire` is the only I/O entry point of the
/// monitoring pipeline.
///
/// Implementations must return exactly `duration_samples` samples with times
/// `0..duration_samples` or fail; a partial reading is never returned.
pub trait SignalSource {
    fn acquire(&mut self, duration_samples: usize) -> Result<Waveform, MonitorError>;

    /// Short human-readable name used in logs.
    fn label(&self) -> &str;

    /// Throw away anything buffered for a reading nobody will consume.
    fn discard_stale(&mut self) {}
}

impl<S: SignalSource + ?Sized> SignalSource for Box<S> {
    fn acquire(&mut self, duration_samples: usize) -> Result<Waveform, MonitorError> {
        (**self).acquire(duration_samples)
    }

    fn label(&self) -> &str {
        (**self).label()
    }

    fn discard_stale(&mut self) {
        (**self).discard_stale()
    }
}

fn check_duration(duration_samples: usize) -> Result<(), MonitorError> {
    if duration_samples == 0 {
        return Err(MonitorError::InvalidConfiguration(
            "reading duration must be at least one sample".into(),
        ));
    }
    Ok(())
}

/// Sinusoid around a resting baseline with bounded jitter and occasional
/// injected irregular beats. All randomness comes from a seeded `StdRng`.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    baseline: f64,
    cfg: SyntheticConfig,
    seed: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(baseline: f64, cfg: SyntheticConfig, seed: u64) -> Result<Self, MonitorError> {
        cfg.validate()?;
        Ok(Self {
            baseline,
            cfg,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Use the configured seed, or `fallback_seed` when none is set.
    pub fn from_config(
        baseline: f64,
        cfg: &SyntheticConfig,
        fallback_seed: u64,
    ) -> Result<Self, MonitorError> {
        Self::new(baseline, *cfg, cfg.seed.unwrap_or(fallback_seed))
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn next_value(&mut self, i: usize) -> f64 {
        let phase = 2.0 * std::f64::consts::PI * i as f64 / self.cfg.period_samples;
        let mut value = self.baseline + self.cfg.amplitude * phase.sin();
        if self.cfg.jitter > 0.0 {
            value += self.rng.gen_range(-self.cfg.jitter..=self.cfg.jitter);
        }
        if self.cfg.anomaly_rate > 0.0 && self.rng.gen_bool(self.cfg.anomaly_rate) {
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            value += sign * self.cfg.anomaly_magnitude;
        }
        value
    }
}

impl SignalSource for SyntheticSource {
    fn acquire(&mut self, duration_samples: usize) -> Result<Waveform, MonitorError> {
        check_duration(duration_samples)?;
        let values: Vec<f64> = (0..duration_samples).map(|i| self.next_value(i)).collect();
        debug!(
            "synthetic source (seed {}) produced {} samples",
            self.seed, duration_samples
        );
        Waveform::from_values(values)
    }

    fn label(&self) -> &str {
        "synthetic"
    }
}

/// Replays a stored reading in consecutive chunks. Running out of stored
/// samples behaves like an unavailable device.
#[derive(Debug, Clone)]
pub struct RecordedSource {
    values: Vec<f64>,
    cursor: usize,
}

impl RecordedSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    pub fn from_waveform(w: &Waveform) -> Self {
        Self::new(w.values().collect())
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let w = io::read_waveform(path)?;
        Ok(Self::from_waveform(&w))
    }

    pub fn remaining(&self) -> usize {
        self.values.len() - self.cursor
    }
}

impl SignalSource for RecordedSource {
    fn acquire(&mut self, duration_samples: usize) -> Result<Waveform, MonitorError> {
        check_duration(duration_samples)?;
        if self.remaining() < duration_samples {
            return Err(MonitorError::AcquisitionFailed(format!(
                "recorded feed exhausted: {} samples left, {} requested",
                self.remaining(),
                duration_samples
            )));
        }
        let chunk = self.values[self.cursor..self.cursor + duration_samples].to_vec();
        self.cursor += duration_samples;
        debug!(
            "recorded source served {} samples, {} left",
            duration_samples,
            self.remaining()
        );
        Waveform::from_values(chunk)
    }

    fn label(&self) -> &str {
        "recorded"
    }
}

/// Live feed: an external producer (device link, stream inlet) pushes
/// amplitudes into a channel.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Receiver<f64>,
    timeout: Duration,
}

impl ChannelSource {
    pub fn new(rx: Receiver<f64>, timeout: Duration) -> Self {
        Self { rx, timeout }
    }

    pub fn from_config(rx: Receiver<f64>, cfg: &FeedConfig) -> Self {
        Self::new(rx, Duration::from_millis(cfg.timeout_ms))
    }

    /// Drop samples left over from an abandoned acquisition.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("discarded {} stale feed samples", dropped);
        }
        dropped
    }
}

impl SignalSource for ChannelSource {
    fn acquire(&mut self, duration_samples: usize) -> Result<Waveform, MonitorError> {
        check_duration(duration_samples)?;
        let mut values = Vec::with_capacity(duration_samples);
        while values.len() < duration_samples {
            match self.rx.recv_timeout(self.timeout) {
                Ok(value) if value.is_finite() => values.push(value),
                Ok(value) => {
                    warn!(
                        "feed sent {} at sample {}, discarding reading",
                        value,
                        values.len()
                    );
                    return Err(MonitorError::AcquisitionFailed(format!(
                        "non-finite sample {} at index {}",
                        value,
                        values.len()
                    )));
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "feed timed out after {} of {} samples",
                        values.len(),
                        duration_samples
                    );
                    return Err(MonitorError::AcquisitionFailed(format!(
                        "no sample within {} ms",
                        self.timeout.as_millis()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!(
                        "feed disconnected after {} of {} samples",
                        values.len(),
                        duration_samples
                    );
                    return Err(MonitorError::AcquisitionFailed(
                        "device disconnected".into(),
                    ));
                }
            }
        }
        Waveform::from_values(values)
    }

    fn label(&self) -> &str {
        "live feed"
    }

    fn discard_stale(&mut self) {
        self.discard_pending();
    }
}
