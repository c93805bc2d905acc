use serde::{Deserialize, Serialize};

/// Trial state machine states
#[derive(Debug, Clone, PartialEq)]
pub enum TrialState {
    /// Fixation cross alone, pre-run delay.
    Fixation,
    /// Array on screen, response clock running.
    Search,
    /// Tick or cross after the response (or timeout).
    Feedback,
    Complete,
}

/// The two speeded response alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKey {
    TargetPresent,
    TargetAbsent,
}

impl ResponseKey {
    /// Whether this key is the correct answer for a trial.
    pub fn is_correct_for(self, target_present: bool) -> bool {
        match self {
            Self::TargetPresent => target_present,
            Self::TargetAbsent => !target_present,
        }
    }
}

/// One CSV row, written once per trial and never mutated afterwards.
/// Field order is the on-disk column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub subject: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub run: u32,
    pub block: usize,
    pub trial: usize,
    pub set_size: usize,
    pub radius: f32,
    pub fixation_ms: u64,
    pub feedback_ms: u64,
    pub response_timeout_ms: Option<u64>,
    pub rotated: bool,
    pub target_present: bool,
    /// Unix timestamp (seconds) at trial start.
    pub timestamp: u64,
    /// Reaction time from array onset, milliseconds. Empty on timeout.
    pub response_time_ms: Option<f64>,
    pub correct: bool,
    /// Key pressed, empty on timeout.
    pub key: Option<char>,
    pub timed_out: bool,
}
