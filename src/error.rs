//! Error taxonomy for the verification engine.
//!
//! Every error carries a domain, a code within that domain and a message. The
//! underlying cause, when there is one, is exposed through `source()` so the
//! CLI can print the whole chain.

use std::collections::TryReserveError;
use std::fmt;
use std::io;

use thiserror::Error;

/// Broad classification of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorDomain {
    Argument,
    Io,
    Memory,
    Runtime,
    Output,
}

impl fmt::Display for ErrorDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorDomain::Argument => "argument",
            ErrorDomain::Io => "io",
            ErrorDomain::Memory => "memory",
            ErrorDomain::Runtime => "runtime",
            ErrorDomain::Output => "output",
        };
        f.write_str(name)
    }
}

/// Specific failure within a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorCode {
    UnsupportedValue,
    OpenFailed,
    CloseFailed,
    SeekFailed,
    Insufficient,
    InitializeFailed,
    SetFailed,
    InvalidState,
    WriteFailed,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::UnsupportedValue => "unsupported_value",
            ErrorCode::OpenFailed => "open_failed",
            ErrorCode::CloseFailed => "close_failed",
            ErrorCode::SeekFailed => "seek_failed",
            ErrorCode::Insufficient => "insufficient",
            ErrorCode::InitializeFailed => "initialize_failed",
            ErrorCode::SetFailed => "set_failed",
            ErrorCode::InvalidState => "invalid_state",
            ErrorCode::WriteFailed => "write_failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub(crate) enum VerifyError {
    #[error("{message}")]
    Argument { code: ErrorCode, message: String },

    #[error("{message}")]
    Io {
        code: ErrorCode,
        message: String,
        #[source]
        source: io::Error,
    },

    #[error("{message}")]
    Memory {
        message: String,
        #[source]
        source: Option<TryReserveError>,
    },

    #[error("{message}")]
    Runtime { code: ErrorCode, message: String },

    #[error("{message}")]
    Output {
        message: String,
        #[source]
        source: io::Error,
    },
}

impl VerifyError {
    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        VerifyError::Argument {
            code: ErrorCode::UnsupportedValue,
            message: message.into(),
        }
    }

    pub(crate) fn io(code: ErrorCode, message: impl Into<String>, source: io::Error) -> Self {
        VerifyError::Io {
            code,
            message: message.into(),
            source,
        }
    }

    pub(crate) fn runtime(code: ErrorCode, message: impl Into<String>) -> Self {
        VerifyError::Runtime {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn domain(&self) -> ErrorDomain {
        match self {
            VerifyError::Argument { .. } => ErrorDomain::Argument,
            VerifyError::Io { .. } => ErrorDomain::Io,
            VerifyError::Memory { .. } => ErrorDomain::Memory,
            VerifyError::Runtime { .. } => ErrorDomain::Runtime,
            VerifyError::Output { .. } => ErrorDomain::Output,
        }
    }

    pub(crate) fn code(&self) -> ErrorCode {
        match self {
            VerifyError::Argument { code, .. }
            | VerifyError::Io { code, .. }
            | VerifyError::Runtime { code, .. } => *code,
            VerifyError::Memory { .. } => ErrorCode::Insufficient,
            VerifyError::Output { .. } => ErrorCode::WriteFailed,
        }
    }
}

pub(crate) type Result<T, E = VerifyError> = std::result::Result<T, E>;
