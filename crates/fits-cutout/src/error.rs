//! Error taxonomy for the cutout core.
//!
//! Every fallible operation returns an [`Error`] carrying an HTTP-style
//! [`ErrorClass`], a human-readable message, and the source location where it
//! was raised. Errors propagate unchanged to the core entry point; nothing is
//! swallowed along the way.

use std::panic::Location;

use thiserror::Error;

/// HTTP-style classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed request parameters (400).
    BadRequest,
    /// The requested file does not exist (404).
    NotFound,
    /// A request body length is required but missing (411).
    LengthRequired,
    /// The request entity exceeds server limits (413).
    EntityTooLarge,
    /// Anything that went wrong on the server side (500).
    Internal,
}

impl ErrorClass {
    /// The numeric HTTP status code.
    pub fn code(&self) -> u16 {
        match self {
            ErrorClass::BadRequest => 400,
            ErrorClass::NotFound => 404,
            ErrorClass::LengthRequired => 411,
            ErrorClass::EntityTooLarge => 413,
            ErrorClass::Internal => 500,
        }
    }

    /// The HTTP reason phrase.
    pub fn summary(&self) -> &'static str {
        match self {
            ErrorClass::BadRequest => "Bad Request",
            ErrorClass::NotFound => "Not Found",
            ErrorClass::LengthRequired => "Length Required",
            ErrorClass::EntityTooLarge => "Request Entity Too Large",
            ErrorClass::Internal => "Internal Server Error",
        }
    }

    /// The longer description used in error-response bodies.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorClass::BadRequest => {
                "The request could not be understood by the server due to \
                 malformed syntax."
            }
            ErrorClass::NotFound => {
                "The server has not found anything matching the Request-URI."
            }
            ErrorClass::LengthRequired => {
                "The server refuses to accept the request without a defined \
                 Content-Length."
            }
            ErrorClass::EntityTooLarge => {
                "The server is refusing to process a request because the \
                 request entity is larger than the server is willing or able \
                 to process."
            }
            ErrorClass::Internal => {
                "The server encountered an unexpected condition which \
                 prevented it from fulfilling the request."
            }
        }
    }
}

impl core::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.code(), self.summary())
    }
}

/// An error raised anywhere in the cutout pipeline.
#[derive(Debug, Error)]
#[error("{class}: {message}")]
pub struct Error {
    /// HTTP-style classification.
    pub class: ErrorClass,
    /// Human-readable message.
    pub message: String,
    location: &'static Location<'static>,
}

impl Error {
    /// Create an error with an explicit class.
    #[track_caller]
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Error {
            class,
            message: message.into(),
            location: Location::caller(),
        }
    }

    /// A 400 Bad Request error.
    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::new(ErrorClass::BadRequest, message)
    }

    /// A 404 Not Found error.
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Error::new(ErrorClass::NotFound, message)
    }

    /// A 500 Internal Server Error.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::new(ErrorClass::Internal, message)
    }

    /// The source location where the error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorClass::Internal, format!("I/O error: {e}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
