use crate::error::{invalid_parameter, ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use visex_core::BlockConfig;

/// Experiment configuration: the block table plus presentation parameters.
///
/// Defaults reproduce the stock template: three blocks of set sizes 8, 12
/// and 16 at increasing radii, ten trials each, `x`/`m` response keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_blocks")]
    pub blocks: Vec<BlockConfig>,
    /// Key meaning "target present".
    #[serde(default = "default_present_key")]
    pub target_present_key: char,
    /// Key meaning "target absent".
    #[serde(default = "default_absent_key")]
    pub target_absent_key: char,
    /// Pixels per fixation-relative unit.
    #[serde(default = "default_px_per_unit")]
    pub px_per_unit: f32,
    /// Square stimulus edge length, in units.
    #[serde(default = "default_stimulus_size")]
    pub stimulus_size: f32,
    /// Pause between trials, milliseconds.
    #[serde(default = "default_intertrial_ms")]
    pub intertrial_ms: u64,
}

fn default_blocks() -> Vec<BlockConfig> {
    vec![
        BlockConfig::new(8, 10.0, 10),
        BlockConfig::new(12, 12.0, 10),
        BlockConfig::new(16, 14.0, 10),
    ]
}

const fn default_present_key() -> char {
    'x'
}

const fn default_absent_key() -> char {
    'm'
}

const fn default_px_per_unit() -> f32 {
    40.0
}

const fn default_stimulus_size() -> f32 {
    2.0
}

const fn default_intertrial_ms() -> u64 {
    500
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            blocks: default_blocks(),
            target_present_key: default_present_key(),
            target_absent_key: default_absent_key(),
            px_per_unit: default_px_per_unit(),
            stimulus_size: default_stimulus_size(),
            intertrial_ms: default_intertrial_ms(),
        }
    }
}

impl ExperimentConfig {
    /// Load a configuration from a JSON file and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// parameter fails validation.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ExperimentError::FileSystem {
            path: path.to_path_buf(),
            operation: "read config",
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ExperimentError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(invalid_parameter(
                "blocks",
                &"[]",
                &"at least one block is required",
            ));
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if block.set_size == 0 {
                return Err(invalid_parameter(
                    "set_size",
                    &block.set_size,
                    &format!("block {i}: must be at least 1"),
                ));
            }
            if block.repetitions == 0 {
                return Err(invalid_parameter(
                    "repetitions",
                    &block.repetitions,
                    &format!("block {i}: must be at least 1"),
                ));
            }
            if block.radius <= 0.0 {
                return Err(invalid_parameter(
                    "radius",
                    &block.radius,
                    &format!("block {i}: must be positive"),
                ));
            }
        }
        if self.target_present_key == self.target_absent_key {
            return Err(invalid_parameter(
                "target_absent_key",
                &self.target_absent_key,
                &"response keys must differ",
            ));
        }
        if self.px_per_unit <= 0.0 {
            return Err(invalid_parameter(
                "px_per_unit",
                &self.px_per_unit,
                &"must be positive",
            ));
        }
        Ok(())
    }

    /// Total number of trials over all blocks.
    pub fn total_trials(&self) -> usize {
        self.blocks.iter().map(|b| b.repetitions).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_stock_template() {
        let config = ExperimentConfig::default();
        assert_eq!(config.blocks.len(), 3);
        assert_eq!(config.blocks[0].set_size, 8);
        assert_eq!(config.blocks[2].radius, 14.0);
        assert_eq!(config.total_trials(), 30);
        assert_eq!(config.target_present_key, 'x');
        assert_eq!(config.target_absent_key, 'm');
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ExperimentConfig = serde_json::from_str(
            r#"{"blocks": [{"set_size": 4, "radius": 8.0, "repetitions": 6}]}"#,
        )
        .unwrap();
        assert_eq!(config.blocks.len(), 1);
        assert_eq!(config.target_present_key, 'x');
        assert_eq!(config.total_trials(), 6);
    }

    #[test]
    fn zero_set_size_is_rejected() {
        let mut config = ExperimentConfig::default();
        config.blocks[1].set_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("set_size"));
    }

    #[test]
    fn identical_response_keys_are_rejected() {
        let config = ExperimentConfig {
            target_absent_key: 'x',
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        std::fs::write(
            &path,
            r#"{"blocks": [{"set_size": 2, "radius": 5.0, "repetitions": 4, "response_timeout_ms": 2000}], "intertrial_ms": 250}"#,
        )
        .unwrap();

        let config = ExperimentConfig::from_json_file(&path).unwrap();
        assert_eq!(config.blocks[0].response_timeout_ms, Some(2000));
        assert_eq!(config.intertrial_ms, 250);
    }

    #[test]
    fn malformed_config_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = ExperimentConfig::from_json_file(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }
}
