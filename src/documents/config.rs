//! Configuration types for page chunking.

use serde::{Deserialize, Serialize};

/// Configuration for page chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters. Larger pages are split.
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Characters repeated between adjacent chunks of the same page.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

fn default_max_chunk_chars() -> usize {
    500
}

fn default_overlap_chars() -> usize {
    100
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl ChunkingConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_chars == 0 {
            return Err("max_chunk_chars must be greater than zero".to_string());
        }

        if self.overlap_chars >= self.max_chunk_chars {
            return Err(format!(
                "overlap_chars ({}) must be less than max_chunk_chars ({})",
                self.overlap_chars, self.max_chunk_chars
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_config_defaults() {
        let config = ChunkingConfig::default();
        assert_eq!(config.max_chunk_chars, 500);
        assert_eq!(config.overlap_chars, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_chunking_config_validation() {
        let mut config = ChunkingConfig::default();

        config.overlap_chars = 500;
        assert!(config.validate().is_err());

        config.max_chunk_chars = 0;
        config.overlap_chars = 0;
        assert!(config.validate().is_err());
    }
}
