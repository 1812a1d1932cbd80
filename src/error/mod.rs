use crate::engine::Aggregate;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The unified error type for the aggregation engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Source unavailable: {path:?} {message}")]
    SourceUnavailable {
        code: u16,
        message: String,
        path: PathBuf,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Failed to read record at line {line}: {message}")]
    SourceRead {
        code: u16,
        message: String,
        line: u64,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Dispatch failed in round {round}: {message}")]
    DispatchFailure {
        code: u16,
        message: String,
        round: u64,
        /// Aggregate reached before the failed round, when the driver aborted.
        partial: Option<Box<Aggregate>>,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("[E{code:04}] Reduce error: {message}")]
    Reduce { code: u16, message: String },
}

impl EngineError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: ErrorCode::CONFIG_GENERIC,
            message: message.into(),
            field: None,
            source: None,
        }
    }

    /// Create a configuration error with specific code and field
    pub fn config_with_code(code: u16, message: impl Into<String>, field: Option<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a source-unavailable error for `path`
    pub fn source_unavailable(code: u16, message: impl Into<String>, path: PathBuf) -> Self {
        Self::SourceUnavailable {
            code,
            message: message.into(),
            path,
            source: None,
        }
    }

    /// Create a read error for the given 1-based line
    pub fn source_read(code: u16, message: impl Into<String>, line: u64) -> Self {
        Self::SourceRead {
            code,
            message: message.into(),
            line,
            source: None,
        }
    }

    /// Create a dispatch failure for a round
    pub fn dispatch(code: u16, message: impl Into<String>, round: u64) -> Self {
        Self::DispatchFailure {
            code,
            message: message.into(),
            round,
            partial: None,
            source: None,
        }
    }

    /// Create a reduce error with specific code
    pub fn reduce(code: u16, message: impl Into<String>) -> Self {
        Self::Reduce {
            code,
            message: message.into(),
        }
    }

    /// Add a source error to this error
    pub fn with_source(mut self, source: impl Into<BoxedSource>) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::SourceUnavailable { source: src, .. }
            | Self::SourceRead { source: src, .. }
            | Self::DispatchFailure { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::Reduce { .. } => {}
        }
        self
    }

    /// Attach the aggregate reached before an aborted round
    pub fn with_partial(mut self, aggregate: Aggregate) -> Self {
        if let Self::DispatchFailure {
            partial: ref mut p, ..
        } = self
        {
            *p = Some(Box::new(aggregate));
        }
        self
    }

    /// The partial aggregate carried by an aborted dispatch, if any
    pub fn partial(&self) -> Option<&Aggregate> {
        match self {
            Self::DispatchFailure { partial, .. } => partial.as_deref(),
            _ => None,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::SourceUnavailable { .. } | Self::SourceRead { .. } => 3,
            Self::DispatchFailure { .. } => 4,
            Self::Reduce { .. } => 5,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::SourceUnavailable { code, .. }
            | Self::SourceRead { code, .. }
            | Self::DispatchFailure { code, .. }
            | Self::Reduce { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, field, .. } => match field {
                Some(f) => format!("Configuration problem in '{}': {}", f, message),
                None => format!("Configuration problem: {}", message),
            },
            Self::SourceUnavailable { message, path, .. } => {
                format!("Cannot read \"{}\": {}", path.display(), message)
            }
            Self::SourceRead { message, line, .. } => {
                format!("Input error at line {}: {}", line, message)
            }
            Self::DispatchFailure { message, round, .. } => {
                format!("Batch {} could not be processed: {}", round, message)
            }
            Self::Reduce { message, .. } => format!("Could not combine results: {}", message),
        }
    }

    /// Terminal line pairing the registry description with `user_message`
    pub fn summary(&self) -> String {
        let code = self.code();
        format!(
            "[E{:04}] {}. {}",
            code,
            describe_error_code(code),
            self.user_message()
        )
    }

    /// Whether this is a dispatch failure, the only kind a failure policy may skip
    pub fn is_dispatch_failure(&self) -> bool {
        matches!(self, Self::DispatchFailure { .. })
    }
}

/// Type alias for Results using EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
