//! Error types
//!
//! Library code returns these; the binary wraps them with anyhow context.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Bus, backend or reactor setup failed
    #[error("failed to initialize {component}: {source}")]
    Init {
        component: &'static str,
        #[source]
        source: io::Error,
    },

    /// Backend refused the seat assignment
    #[error("input backend rejected seat assignment '{seat}'")]
    SeatAssign { seat: String },

    /// Event loop creation, registration or dispatch failed
    #[error("event loop failed: {0}")]
    Reactor(#[from] calloop::Error),

    /// Config file could not be read or parsed
    #[error("config {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// libseat session failure
    #[error("seat session: {0}")]
    Session(String),
}

impl Error {
    pub(crate) fn init(component: &'static str, source: io::Error) -> Self {
        Error::Init { component, source }
    }
}

/// Gatekeeper open failures
#[derive(Debug, Error)]
pub enum AccessError {
    /// Permission check failed (EACCES / EPERM, or refused by the seat daemon)
    #[error("access denied: {}", path.display())]
    Denied { path: PathBuf },

    /// Any other I/O failure while opening the node
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AccessError {
    /// Classify an io::Error from an open attempt
    pub fn from_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        match err.raw_os_error() {
            Some(libc::EACCES) | Some(libc::EPERM) => AccessError::Denied { path },
            _ => AccessError::Io { path, source: err },
        }
    }

    /// Negative errno, as expected by libinput's open_restricted
    pub fn errno(&self) -> i32 {
        match self {
            AccessError::Denied { .. } => -libc::EACCES,
            AccessError::Io { source, .. } => -source.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
