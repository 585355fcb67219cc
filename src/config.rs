use std::{fs, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct SynthConfig {
    /// Size of the segment array. The path itself is always shorter.
    pub max_segments: usize,

    /// Upper bound on component string length, a tractability knob.
    pub max_component_len: Option<usize>,

    pub min_components: usize,

    /// Exact logical length of the synthesized path.
    pub path_len: Option<usize>,

    pub expect: Expectation,

    pub random_seed: u32,

    pub skip_scenarios: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Expectation {
    #[default]
    Any,
    Resolves,
    Fails,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            max_segments:      8,
            max_component_len: Some(2),
            min_components:    3,
            path_len:          Some(7),
            expect:            Expectation::Any,
            random_seed:       0,
            skip_scenarios:    false,
        }
    }
}

impl SynthConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let reader = BufReader::new(fs::File::open(path)?);
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            | Some("json") => serde_json::from_reader(reader)?,
            | Some("yml") | Some("yaml") => serde_yml::from_reader(reader)?,
            | _ => return Err(ConfigError::UnknownFormat(path.display().to_string())),
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The built-in scenarios need room for `a/b` plus padding.
        if self.max_segments < 4 {
            return Err(ConfigError::TooFewSegments(self.max_segments));
        }

        if let Some(path_len) = self.path_len {
            if path_len == 0 || path_len >= self.max_segments {
                return Err(ConfigError::PathLenOutOfRange {
                    path_len,
                    max_segments: self.max_segments,
                });
            }
        }

        if self.max_component_len == Some(0) {
            return Err(ConfigError::ZeroComponentLen);
        }

        Ok(())
    }
}
