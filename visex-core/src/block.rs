use serde::{Deserialize, Serialize};

/// One block of trials sharing configuration parameters.
///
/// `radius` and stimulus sizes are in fixation-relative units; the
/// application maps them to pixels with a configurable scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Number of stimuli shown per trial.
    pub set_size: usize,
    /// Distance of every stimulus from the fixation point.
    pub radius: f32,
    /// Number of trials in this block.
    pub repetitions: usize,
    /// Fixation-only period before the array appears.
    #[serde(default = "default_fixation_ms")]
    pub fixation_ms: u64,
    /// How long the feedback mark stays on screen.
    #[serde(default = "default_feedback_ms")]
    pub feedback_ms: u64,
    /// Response deadline after array onset. `None` waits indefinitely.
    #[serde(default)]
    pub response_timeout_ms: Option<u64>,
    /// Rotate the whole circle by a random offset each trial.
    #[serde(default = "default_rotate")]
    pub rotate: bool,
}

const fn default_fixation_ms() -> u64 {
    2000
}

const fn default_feedback_ms() -> u64 {
    3000
}

const fn default_rotate() -> bool {
    true
}

impl BlockConfig {
    pub fn new(set_size: usize, radius: f32, repetitions: usize) -> Self {
        Self {
            set_size,
            radius,
            repetitions,
            fixation_ms: default_fixation_ms(),
            feedback_ms: default_feedback_ms(),
            response_timeout_ms: None,
            rotate: default_rotate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_block_fills_timing_defaults() {
        let block: BlockConfig =
            serde_json::from_str(r#"{"set_size": 8, "radius": 10.0, "repetitions": 10}"#).unwrap();

        assert_eq!(block.fixation_ms, 2000);
        assert_eq!(block.feedback_ms, 3000);
        assert_eq!(block.response_timeout_ms, None);
        assert!(block.rotate);
    }

    #[test]
    fn explicit_timeout_overrides_default() {
        let block: BlockConfig = serde_json::from_str(
            r#"{"set_size": 4, "radius": 6.0, "repetitions": 2, "response_timeout_ms": 1500, "rotate": false}"#,
        )
        .unwrap();

        assert_eq!(block.response_timeout_ms, Some(1500));
        assert!(!block.rotate);
    }
}
