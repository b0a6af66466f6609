use crate::{
    analysis::{analyze, AnalysisResult},
    config::{AnalysisConfig, MonitorConfig},
    error::MonitorError,
    source::SignalSource,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an alert episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Dismissed,
    ClearedByRetake,
}

/// Alert workflow state. Every variant except `Idle` carries the single
/// analysis result that justified it, so two concurrent alerts cannot be
/// represented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AlertState {
    Idle,
    /// Alert raised; the confirmation surface is open.
    Alerting { result: AnalysisResult },
    AwaitingUserChoice { result: AnalysisResult },
    /// Terminal state of an episode. The coordinator collapses it to `Idle`.
    Resolved {
        result: AnalysisResult,
        resolution: Resolution,
    },
}

impl AlertState {
    pub fn name(&self) -> &'static str {
        match self {
            AlertState::Idle => "idle",
            AlertState::Alerting { .. } => "alerting",
            AlertState::AwaitingUserChoice { .. } => "awaiting_user_choice",
            AlertState::Resolved { .. } => "resolved",
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            AlertState::Idle => None,
            AlertState::Alerting { result }
            | AlertState::AwaitingUserChoice { result }
            | AlertState::Resolved { result, .. } => Some(result),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, AlertState::Idle)
    }

    /// True while an episode is open and waiting for the user.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AlertState::Alerting { .. } | AlertState::AwaitingUserChoice { .. }
        )
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertEvent {
    /// A fresh analysis result from a routine reading.
    Reading(AnalysisResult),
    /// The alert was shown to the user.
    Presented,
    Dismiss,
    /// Result of the reading taken because the user asked for a retake.
    Retake(AnalysisResult),
}

impl AlertEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AlertEvent::Reading(_) => "reading",
            AlertEvent::Presented => "presented",
            AlertEvent::Dismiss => "dismiss",
            AlertEvent::Retake(_) => "retake",
        }
    }
}

/// Guarded transition function of the alert workflow.
pub fn transition(state: &AlertState, event: &AlertEvent) -> Result<AlertState, MonitorError> {
    use AlertEvent as E;
    use AlertState as S;
    let next = match (state, event) {
        (S::Idle | S::Resolved { .. }, E::Reading(result)) => {
            if result.requires_attention {
                S::Alerting { result: *result }
            } else {
                S::Idle
            }
        }
        (S::Alerting { result }, E::Presented) => S::AwaitingUserChoice { result: *result },
        (S::Alerting { result } | S::AwaitingUserChoice { result }, E::Dismiss) => S::Resolved {
            result: *result,
            resolution: Resolution::Dismissed,
        },
        (S::Alerting { .. } | S::AwaitingUserChoice { .. }, E::Retake(result)) => {
            if result.requires_attention {
                S::Alerting { result: *result }
            } else {
                S::Resolved {
                    result: *result,
                    resolution: Resolution::ClearedByRetake,
                }
            }
        }
        _ => {
            return Err(MonitorError::IllegalTransition {
                state: state.name(),
                event: event.name(),
            })
        }
    };
    Ok(next)
}

/// The user's answer to a presented alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChoice {
    TakeEcg,
    Dismiss,
}

/// Presentation boundary. The UI renders the alert and later reports the
/// user's decision through [`AlertCoordinator::respond`].
pub trait AlertPresenter {
    fn render_alert(&mut self, result: &AnalysisResult);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Nothing requires attention.
    Clear,
    /// A new alert episode was opened.
    AlertRaised,
    /// An episode is already open; the result was dropped.
    Ignored,
}

/// A finished alert episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub trigger: AnalysisResult,
    pub last: AnalysisResult,
    pub resolution: Resolution,
    pub retakes: usize,
}

#[derive(Debug, Clone, Copy)]
struct OpenEpisode {
    trigger: AnalysisResult,
    retakes: usize,
}

/// Drives one alert episode at a time: reading → analysis → alert → user
/// response, re-acquiring through the owned source on retake.
pub struct AlertCoordinator<S> {
    source: S,
    analysis: AnalysisConfig,
    duration_samples: usize,
    state: AlertState,
    episode: Option<OpenEpisode>,
    history: Vec<EpisodeRecord>,
}

impl<S: SignalSource> AlertCoordinator<S> {
    /// Validates the configuration before any acquisition can happen.
    pub fn new(source: S, cfg: &MonitorConfig) -> Result<Self, MonitorError> {
        cfg.analysis.validate()?;
        cfg.reading.validate()?;
        Ok(Self {
            source,
            analysis: cfg.analysis,
            duration_samples: cfg.reading.duration_samples,
            state: AlertState::Idle,
            episode: None,
            history: Vec::new(),
        })
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn history(&self) -> &[EpisodeRecord] {
        &self.history
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.analysis
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Feed an externally computed result. Only an idle coordinator reacts.
    pub fn ingest(&mut self, result: AnalysisResult) -> Result<IngestOutcome, MonitorError> {
        if !self.state.is_idle() {
            warn!(
                "ignoring reading ({} irregular beats) while {}",
                result.irregular_beat_count, self.state
            );
            return Ok(IngestOutcome::Ignored);
        }
        self.apply(AlertEvent::Reading(result))?;
        if self.state.is_active() {
            Ok(IngestOutcome::AlertRaised)
        } else {
            Ok(IngestOutcome::Clear)
        }
    }

    /// Acquire and analyze a routine reading, then ingest it. While an
    /// episode is open no acquisition is made and `None` is returned.
    pub fn take_reading(&mut self) -> Result<Option<AnalysisResult>, MonitorError> {
        if !self.state.is_idle() {
            warn!("routine reading skipped while {}", self.state);
            return Ok(None);
        }
        let result = self.acquire_and_analyze()?;
        self.ingest(result)?;
        Ok(Some(result))
    }

    /// Hand the current alert to the presenter; `Alerting → AwaitingUserChoice`.
    pub fn present<P: AlertPresenter + ?Sized>(
        &mut self,
        presenter: &mut P,
    ) -> Result<(), MonitorError> {
        let result = match self.state {
            AlertState::Alerting { result } => result,
            _ => {
                return Err(MonitorError::IllegalTransition {
                    state: self.state.name(),
                    event: AlertEvent::Presented.name(),
                })
            }
        };
        presenter.render_alert(&result);
        self.apply(AlertEvent::Presented)
    }

    /// Close the episode without another acquisition.
    pub fn dismiss(&mut self) -> Result<(), MonitorError> {
        self.apply(AlertEvent::Dismiss)?;
        self.source.discard_stale();
        Ok(())
    }

    /// Retake the reading. An acquisition failure leaves the state untouched
    /// so the user can retry or dismiss.
    pub fn take_ecg(&mut self) -> Result<AnalysisResult, MonitorError> {
        if !self.state.is_active() {
            return Err(MonitorError::IllegalTransition {
                state: self.state.name(),
                event: "retake",
            });
        }
        let result = match self.acquire_and_analyze() {
            Ok(result) => result,
            Err(err) => {
                warn!("retake failed while {}: {}", self.state, err);
                return Err(err);
            }
        };
        if let Some(episode) = self.episode.as_mut() {
            episode.retakes += 1;
        }
        self.apply(AlertEvent::Retake(result))?;
        Ok(result)
    }

    pub fn respond(&mut self, choice: UserChoice) -> Result<(), MonitorError> {
        match choice {
            UserChoice::Dismiss => self.dismiss(),
            UserChoice::TakeEcg => self.take_ecg().map(|_| ()),
        }
    }

    fn acquire_and_analyze(&mut self) -> Result<AnalysisResult, MonitorError> {
        let waveform = self.source.acquire(self.duration_samples)?;
        Ok(analyze(&waveform, &self.analysis))
    }

    fn apply(&mut self, event: AlertEvent) -> Result<(), MonitorError> {
        let next = transition(&self.state, &event)?;
        if next != self.state {
            info!(
                "alert state {} -> {} on {} ({})",
                self.state,
                next,
                event.name(),
                self.source.label()
            );
        }
        match next {
            AlertState::Alerting { result } if self.episode.is_none() => {
                self.episode = Some(OpenEpisode {
                    trigger: result,
                    retakes: 0,
                });
                self.state = next;
            }
            AlertState::Resolved { result, resolution } => {
                let episode = self.episode.take().unwrap_or(OpenEpisode {
                    trigger: result,
                    retakes: 0,
                });
                self.history.push(EpisodeRecord {
                    trigger: episode.trigger,
                    last: result,
                    resolution,
                    retakes: episode.retakes,
                });
                self.state = AlertState::Idle;
            }
            _ => self.state = next,
        }
        Ok(())
    }
}
