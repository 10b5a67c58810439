use serde::{Deserialize, Serialize};

/// Static configuration of one playout channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Video format name, e.g. "1080i5000". Must match the format table.
    pub format: String,
    /// Optional display label used in logs.
    #[serde(default)]
    pub label: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            format: "pal".to_string(),
            label: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayoutConfig {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl PlayoutConfig {
    pub fn load_from_file(path: &std::path::Path) -> crate::AircastResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: PlayoutConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> crate::AircastResult<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_config() {
        let source = r#"
            [[channels]]
            format = "1080i5000"
            label = "main"

            [[channels]]
            format = "pal"
        "#;
        let config: PlayoutConfig = toml::from_str(source).unwrap();
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].format, "1080i5000");
        assert_eq!(config.channels[0].label.as_deref(), Some("main"));
        assert!(config.channels[1].label.is_none());
    }

    #[test]
    fn test_default_config_is_empty() {
        let config = PlayoutConfig::default();
        assert!(config.channels.is_empty());
    }
}
