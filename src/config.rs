use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid runtime configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Scheduler quantum must be at least 1 statement")]
    ZeroQuantum,
    #[error("Maximum call depth must be at least 1 frame")]
    ZeroCallDepth,
}

/// Knobs for one interpreter run.
///
/// Loaded from YAML with every field optional:
///
/// ```yaml
/// quantum: 8
/// max_call_depth: 64
/// debug: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Statements a context may start before the scheduler preempts it.
    pub quantum: usize,
    /// Frames per context before a call fails with a stack overflow.
    pub max_call_depth: usize,
    /// Start with the debugger enabled.
    pub debug: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            quantum: 32,
            max_call_depth: 256,
            debug: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(input: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = if input.trim().is_empty() {
            RuntimeConfig::default()
        } else {
            serde_yaml::from_str(input)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::ZeroCallDepth);
        }
        Ok(())
    }
}
