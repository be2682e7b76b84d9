//! Unified error type for gifify.
//!
//! Every fallible step funnels its failure into [`Error`], which carries
//! enough context for the HTTP layer to derive a status code via
//! [`Error::http_status`] and for the CLI to derive a process exit code via
//! [`Error::exit_code`].

use std::path::PathBuf;

/// Unified error type covering all failure modes in gifify.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad or missing user input (missing input file, malformed request).
    #[error("Usage error: {0}")]
    Usage(String),

    /// A conversion option could not be parsed or is out of its domain.
    #[error("Invalid option '{field}': {message}")]
    InvalidOption {
        /// Name of the offending option field.
        field: String,
        /// Human-readable reason.
        message: String,
    },

    /// The request body uses a transfer encoding the server does not accept.
    #[error("Unsupported media type: {0}")]
    UnsupportedEncoding(String),

    /// The declared upload exceeds the configured limit.
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The output already exists and overwriting was not requested.
    #[error("Output already exists: {}", path.display())]
    PreexistingOutput {
        /// The path that would have been written.
        path: PathBuf,
    },

    /// A required external tool could not be located.
    #[error("Required tool not found: {tool}")]
    ToolNotFound {
        /// Tool name (e.g. "ffmpeg").
        tool: String,
    },

    /// The filter-graph processor exited with a non-zero status.
    #[error("ffmpeg failed with exit code {code}: {message}")]
    Processor {
        /// Child exit code.
        code: i32,
        /// Captured diagnostic output, if any.
        message: String,
    },

    /// The sequence optimizer exited with a non-zero status.
    #[error("gifsicle failed with exit code {code}: {message}")]
    Optimizer {
        /// Child exit code.
        code: i32,
        /// Captured diagnostic output, if any.
        message: String,
    },

    /// An external tool could not be spawned or awaited.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// The user interrupted the conversion.
    #[error("Interrupted by user")]
    Interrupted,

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Usage(_) => 400,
            Error::InvalidOption { .. } => 400,
            Error::UnsupportedEncoding(_) => 415,
            Error::PayloadTooLarge { .. } => 413,
            Error::PreexistingOutput { .. } => 400,
            Error::ToolNotFound { .. } => 500,
            Error::Processor { .. } => 500,
            Error::Optimizer { .. } => 500,
            Error::Tool { .. } => 500,
            Error::Interrupted => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Map this error to a CLI process exit code.
    ///
    /// Child-process failures propagate the child's own exit code; codes the
    /// shell cannot represent collapse to 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_)
            | Error::InvalidOption { .. }
            | Error::UnsupportedEncoding(_)
            | Error::PayloadTooLarge { .. }
            | Error::ToolNotFound { .. } => 2,
            Error::PreexistingOutput { .. } => 1,
            Error::Processor { code, .. } | Error::Optimizer { code, .. } => {
                u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1)
            }
            Error::Interrupted => 130,
            Error::Tool { .. } | Error::Io { .. } | Error::Internal(_) => 1,
        }
    }

    /// Convenience constructor for [`Error::InvalidOption`].
    pub fn invalid_option(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidOption {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ToolNotFound`].
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Error::ToolNotFound { tool: tool.into() }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_maps_to_400_and_exit_2() {
        let err = Error::Usage("no input given".into());
        assert_eq!(err.to_string(), "Usage error: no input given");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn invalid_option_names_field() {
        let err = Error::invalid_option("fps", "not a number: abc");
        assert_eq!(err.to_string(), "Invalid option 'fps': not a number: abc");
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn unsupported_encoding_is_415() {
        let err = Error::UnsupportedEncoding("text/plain".into());
        assert_eq!(err.http_status(), 415);
    }

    #[test]
    fn preexisting_output_exit_1() {
        let err = Error::PreexistingOutput {
            path: PathBuf::from("/tmp/out.gif"),
        };
        assert_eq!(err.to_string(), "Output already exists: /tmp/out.gif");
        assert_eq!(err.http_status(), 400);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn processor_propagates_child_code() {
        let err = Error::Processor {
            code: 69,
            message: String::new(),
        };
        assert_eq!(err.exit_code(), 69);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn unrepresentable_child_codes_collapse_to_1() {
        for code in [-1, 0, 256, 1000] {
            let err = Error::Optimizer {
                code,
                message: String::new(),
            };
            assert_eq!(err.exit_code(), 1, "code {code}");
        }
    }

    #[test]
    fn interrupted_exit_130() {
        assert_eq!(Error::Interrupted.exit_code(), 130);
    }

    #[test]
    fn missing_tool_is_fatal_usage() {
        let err = Error::tool_not_found("ffmpeg");
        assert_eq!(err.to_string(), "Required tool not found: ffmpeg");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.exit_code(), 1);
    }
}
