//! Error types for image loading.
//!
//! [`LoadError`] is the failure value carried by a hunter and fanned out to
//! every attached action, so it is cheap to clone and holds no live I/O
//! handles. [`LoaderError`] covers mistakes made at the caller-facing API.

use thiserror::Error;

/// Failure produced while fetching or decoding an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// A load strategy reported an opaque failure.
    #[error("Strategy '{strategy}' failed: {message}")]
    Strategy { strategy: String, message: String },

    /// Reading the source failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// Transport-level network failure (connect, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The response carried no usable body length.
    ///
    /// The next attempt must bypass any response cache.
    #[error("Received response with unknown or zero content length")]
    ContentLengthUnknown,

    /// The bytes could not be decoded into an image.
    #[error("Decode error: {0}")]
    Decode(String),

    /// No registered strategy accepts the request.
    #[error("Unrecognized type of request: {0}")]
    NoStrategy(String),

    /// The request requires the network but its policy forbids it.
    #[error("Request is offline-only and no cached copy exists")]
    Offline,

    /// The dispatcher has been shut down.
    #[error("Dispatcher is shut down")]
    Shutdown,

    /// The work was cancelled before it produced a result.
    #[error("Load cancelled")]
    Cancelled,
}

impl LoadError {
    /// Creates a strategy failure.
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    /// Whether the failure goes through the retry decision.
    ///
    /// Only cancellation skips it; for everything else the strategy's
    /// retry policy decides.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether this is the content-length-unknown class of failure.
    pub fn is_content_length_unknown(&self) -> bool {
        matches!(self, Self::ContentLengthUnknown)
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<image::ImageError> for LoadError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors returned by the caller-facing API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// The loader has been shut down and accepts no new requests.
    #[error("Image loader is shut down")]
    Shutdown,

    /// The request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A built-in component could not be created.
    #[error("Failed to start image loader: {0}")]
    Startup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(LoadError::Io("broken pipe".into()).is_retryable());
        assert!(LoadError::Network("timeout".into()).is_retryable());
        assert!(LoadError::ContentLengthUnknown.is_retryable());
        assert!(LoadError::Decode("bad magic".into()).is_retryable());
        assert!(LoadError::Http {
            status: 503,
            url: "http://x".into()
        }
        .is_retryable());
        assert!(LoadError::strategy("custom", "boom").is_retryable());

        assert!(!LoadError::Cancelled.is_retryable());
    }

    #[test]
    fn test_content_length_unknown_is_distinguished() {
        assert!(LoadError::ContentLengthUnknown.is_content_length_unknown());
        assert!(!LoadError::Io("x".into()).is_content_length_unknown());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.png");
        let err: LoadError = io.into();
        assert!(matches!(err, LoadError::Io(ref m) if m.contains("missing.png")));
    }

    #[test]
    fn test_display_messages() {
        let err = LoadError::strategy("file", "boom");
        assert_eq!(err.to_string(), "Strategy 'file' failed: boom");
        assert_eq!(
            LoaderError::InvalidRequest("zero width".into()).to_string(),
            "Invalid request: zero width"
        );
    }
}
