//! Error type shared by every part of the library.

use std::error::Error as StdError;

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed source error carried by [`Error::Communication`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors returned by the Sky Q client.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Requested channel sid is not present in the EPG.
    #[error("channel not found: sid={sid}. Did you call load_channel_data()?")]
    NotFound {
        /// The sid that was looked up.
        sid: String,
    },

    /// Network failure or malformed response from the box or a feed source.
    #[error("{context}: {source}")]
    Communication {
        /// What was being attempted.
        context: String,
        /// Underlying cause.
        #[source]
        source: BoxError,
    },

    /// Malformed XMLTV document, channel JSON or timestamp.
    #[error("{context}: {message}")]
    Parse {
        /// What was being parsed.
        context: String,
        /// Parser message.
        message: String,
    },

    /// Unknown remote-control keyword.
    #[error("unknown remote command: {0}")]
    InvalidCommand(String),

    /// Invalid argument passed by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Background runtime is unavailable or misused.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// Local file-system failure (XMLTV cache).
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Builds a [`Error::Communication`] from any error source.
    pub fn communication(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Communication {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Builds a [`Error::Parse`].
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Builds a [`Error::Io`].
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for [`Error::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`Error::Communication`].
    #[must_use]
    pub const fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. })
    }

    /// Returns `true` for [`Error::Parse`].
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_names_sid() {
        // Arrange
        let err = Error::NotFound {
            sid: String::from("1234567"),
        };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("sid=1234567"));
        assert!(err.is_not_found());
        assert!(!err.is_communication());
    }

    #[test]
    fn test_communication_keeps_source() {
        // Arrange
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");

        // Act
        let err = Error::communication("connect to box", io);

        // Assert
        assert!(err.is_communication());
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "connect to box: refused");
    }
}
