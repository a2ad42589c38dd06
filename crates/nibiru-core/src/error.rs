// src/error.rs
use crate::parser::ParseError;
use std::io;
use thiserror::Error;

/// Central error type for the nibiru engine.
#[derive(Debug, Error)]
pub enum NibiruError {
    /// Underlying I/O error from the OS or network.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Name resolution for the listen port failed outright.
    #[error("failed to resolve listen address for port {port}: {detail}")]
    Resolve { port: String, detail: String },

    /// Every resolved candidate address refused to bind.
    #[error("could not bind any address for port {0}")]
    Bind(String),

    /// Error during HTTP request-line parsing.
    #[error("request parse error: {0:?}")]
    Parse(ParseError),

    /// The application specifier matched nothing in the registry.
    #[error("unknown application {0:?}")]
    UnknownApplication(String),

    /// Generic or miscellaneous error.
    #[error("{0}")]
    Other(String),
}

impl From<ParseError> for NibiruError {
    fn from(e: ParseError) -> Self {
        NibiruError::Parse(e)
    }
}

impl NibiruError {
    /// True for EINTR-class failures of blocking syscalls; the accept and
    /// pause loops retry these after re-checking the shutdown flag.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, NibiruError::Io(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}

pub type NibiruResult<T> = Result<T, NibiruError>;
