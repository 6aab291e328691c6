//! Crate-wide error type.
//!
//! Mirrors the closed error-kind taxonomy from the external interface: every fallible entry
//! point returns `Result<T>`, and no panic-based control flow is used outside of
//! `debug_assert!`-guarded internal invariants and test code.

use std::fmt;

/// The kinds of failure a graph build, schedule or record pass can report.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InvalidArguments,
    TypeMismatch,
    IndexOutOfBounds,
    NotFound,
    OutOfMemory,
    InvalidProgram,
    NotImplemented,
    Unspecified,
}

impl ErrorKind {
    /// Numeric code matching the external (bit-exact) return-enum convention: negative is
    /// failure, zero is success. `Ok` itself has no `ErrorKind` representation.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidArguments => -1,
            ErrorKind::TypeMismatch => -2,
            ErrorKind::IndexOutOfBounds => -3,
            ErrorKind::NotFound => -4,
            ErrorKind::OutOfMemory => -5,
            ErrorKind::InvalidProgram => -6,
            ErrorKind::NotImplemented => -7,
            ErrorKind::Unspecified => -8,
        }
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Clone, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidArguments, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::TypeMismatch, message)
    }

    pub fn index_out_of_bounds(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::IndexOutOfBounds, message)
    }

    pub fn not_found(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::NotFound, message)
    }

    pub fn out_of_memory(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::OutOfMemory, message)
    }

    pub fn invalid_program(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::InvalidProgram, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::NotImplemented, message)
    }

    pub fn unspecified(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Unspecified, message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

pub type Result<T> = ::std::result::Result<T, Error>;
