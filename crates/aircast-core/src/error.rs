/// Core error types for the aircast engine.

/// A specialized Result type for aircast operations.
pub type AircastResult<T> = Result<T, AircastError>;

/// Top-level error type encompassing all aircast subsystems.
#[derive(Debug, thiserror::Error)]
pub enum AircastError {
    #[error("gpu device error: {0}")]
    Device(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("unknown video format: {0}")]
    UnknownFormat(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl AircastError {
    /// Create a render error.
    pub fn render(message: impl Into<String>) -> Self {
        AircastError::Render(message.into())
    }

    /// Create a device error.
    pub fn device(message: impl Into<String>) -> Self {
        AircastError::Device(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_display() {
        let err = AircastError::render("shader compilation failed");
        assert_eq!(err.to_string(), "render error: shader compilation failed");
    }

    #[test]
    fn test_unknown_format_display() {
        let err = AircastError::UnknownFormat("1080i2500".into());
        assert!(err.to_string().contains("1080i2500"));
    }
}
