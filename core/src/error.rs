//! Error types shared across the idlecatcher crates.

/// Result alias for idlecatcher operations.
pub type Result<T> = std::result::Result<T, IdleError>;

/// Common error type for sampling, configuration and power-off operations.
///
/// None of these are fatal to the monitor loop: sampling errors skip an
/// interval and power-off errors are retried on the next idle interval.
#[derive(Debug, thiserror::Error)]
pub enum IdleError {
    /// I/O error occurred while reading counters or configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing data from text format.
    #[error("Parse error: {message}")]
    Parse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Invalid or out-of-range setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The counter source is not available on this system.
    #[error("Sampler unavailable: {0}")]
    Unavailable(String),

    /// Permission denied accessing a resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Counter data was readable but unusable.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The host power-off request failed.
    #[error("Power-off failed via {method}: {reason}")]
    PowerOff { method: String, reason: String },
}

impl IdleError {
    /// Create a new parse error with a simple message.
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new parse error with a source error.
    pub fn parse_with_source<S: Into<String>, E>(message: S, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn unavailable<S: Into<String>>(reason: S) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn permission_denied<S: Into<String>>(resource: S) -> Self {
        Self::PermissionDenied(resource.into())
    }

    pub fn invalid_data<S: Into<String>>(message: S) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn power_off<M: Into<String>, R: Into<String>>(method: M, reason: R) -> Self {
        Self::PowerOff {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means a single sample was lost rather than the
    /// source being gone for good.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Parse { .. } | Self::InvalidData(_) => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = IdleError::parse("bad field");
        assert!(matches!(err, IdleError::Parse { .. }));
        assert!(err.is_transient());

        let err = IdleError::config("Threshold out of range: 1.5");
        assert_eq!(err.to_string(), "Configuration error: Threshold out of range: 1.5");
        assert!(!err.is_transient());

        let err = IdleError::unavailable("/proc/stat does not exist");
        assert!(!err.is_transient());
        assert!(IdleError::invalid_data("no cpu line").is_transient());
    }

    #[test]
    fn test_power_off_error_message() {
        let err = IdleError::power_off("reboot(2)", "EPERM");
        assert_eq!(err.to_string(), "Power-off failed via reboot(2): EPERM");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IdleError = io.into();
        assert!(matches!(err, IdleError::Io(_)));
        assert!(!err.is_transient());
    }
}
