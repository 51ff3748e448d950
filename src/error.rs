//! Error handling for html-datastack
//!
//! This module provides the error type shared by every stage of the engine:
//! loading a template, compiling selectors, running queries, assigning data
//! and rendering it.
//!
//! # Error Types
//!
//! - [`Error::ParseError`] - Template loading errors (no template, unreadable file)
//! - [`Error::SelectorError`] - Malformed selectors and malformed compiled queries
//! - [`Error::DirectiveError`] - Invalid compound directives, params or repeat functions
//! - [`Error::ImportError`] - Import sources that are missing or produce nothing
//! - [`Error::DomError`] - Document tree manipulation failures while filling lists
//! - [`Error::JsonError`] - JSON parsing and serialization errors
//! - [`Error::HttpError`] - HTTP client and networking errors
//! - [`Error::IoError`] - File system and I/O errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use html_datastack::{HtmlTemplate, Error};
//! use serde_json::json;
//!
//! let mut template = HtmlTemplate::from_str("<p></p>")?;
//! match template.assign("p", json!({"@content": "x", "bogus": "y"})) {
//!     Err(Error::DirectiveError(msg)) => println!("Rejected: {}", msg),
//!     Err(err) => println!("Other error: {}", err),
//!     Ok(()) => {}
//! }
//! ```
//!
//! # Memory Efficiency
//!
//! Error messages use `Cow<'static, str>` to avoid unnecessary allocations
//! when using static error messages, while still supporting owned strings
//! for dynamic error context.

use std::borrow::Cow;
use thiserror::Error;

/// Error type for all html-datastack operations
#[derive(Error, Debug)]
pub enum Error {
    /// Template loading errors
    ///
    /// Occurs when no template was provided, or when a template file
    /// cannot be found or read.
    #[error("Parse error: {0}")]
    ParseError(Cow<'static, str>),

    /// Selector compilation and query errors
    ///
    /// Occurs when a CSS selector cannot be compiled, or when the resulting
    /// XPath expression is malformed. The message always carries the
    /// offending query.
    #[error("Selector error: {0}")]
    SelectorError(Cow<'static, str>),

    /// Directive errors
    ///
    /// Occurs when a compound directive map carries a key outside the
    /// reserved set, when `@params` is malformed, or when a repeat function
    /// cannot be understood.
    #[error("Directive error: {0}")]
    DirectiveError(Cow<'static, str>),

    /// Import errors
    ///
    /// Occurs when an import location is malformed, cannot be fetched, or
    /// selects an empty fragment.
    #[error("Import error: {0}")]
    ImportError(Cow<'static, str>),

    /// DOM manipulation errors
    ///
    /// Occurs when an element cannot be copied while a list is being filled.
    #[error("DOM error: {0}")]
    DomError(Cow<'static, str>),

    /// JSON parsing and serialization errors
    ///
    /// Automatically converted from `serde_json::Error` when JSON operations fail.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client and networking errors
    ///
    /// Occurs when a `url:` import cannot be fetched.
    #[error("HTTP error: {0}")]
    HttpError(Cow<'static, str>),

    /// File system and I/O errors
    ///
    /// Automatically converted from `std::io::Error` when file operations fail.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error with a static string
    ///
    /// Use this for compile-time known error messages to avoid allocations.
    pub fn parse_static(msg: &'static str) -> Self {
        Error::ParseError(Cow::Borrowed(msg))
    }

    /// Create a parse error with an owned string
    ///
    /// Use this for dynamic error messages that include runtime context.
    pub fn parse_owned(msg: String) -> Self {
        Error::ParseError(Cow::Owned(msg))
    }

    /// Create a selector error with a static string
    pub fn selector_static(msg: &'static str) -> Self {
        Error::SelectorError(Cow::Borrowed(msg))
    }

    /// Create a selector error with an owned string
    pub fn selector_owned(msg: String) -> Self {
        Error::SelectorError(Cow::Owned(msg))
    }

    /// Create a directive error with a static string
    pub fn directive_static(msg: &'static str) -> Self {
        Error::DirectiveError(Cow::Borrowed(msg))
    }

    /// Create a directive error with an owned string
    pub fn directive_owned(msg: String) -> Self {
        Error::DirectiveError(Cow::Owned(msg))
    }

    /// Create an import error with a static string
    pub fn import_static(msg: &'static str) -> Self {
        Error::ImportError(Cow::Borrowed(msg))
    }

    /// Create an import error with an owned string
    pub fn import_owned(msg: String) -> Self {
        Error::ImportError(Cow::Owned(msg))
    }

    /// Create a DOM error with a static string
    pub fn dom_static(msg: &'static str) -> Self {
        Error::DomError(Cow::Borrowed(msg))
    }

    /// Create a DOM error with an owned string
    pub fn dom_owned(msg: String) -> Self {
        Error::DomError(Cow::Owned(msg))
    }

    /// Create an HTTP error with an owned string
    pub fn http_owned(msg: String) -> Self {
        Error::HttpError(Cow::Owned(msg))
    }

    /// Create an IO error from a message
    ///
    /// For more specific IO errors, use the standard `std::io::Error`
    /// constructors and let them be converted automatically.
    pub fn io(msg: String) -> Self {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, msg);
        Error::IoError(io_err)
    }

    /// Whether this error belongs to a single directive
    ///
    /// Directive-level errors are reported as diagnostics during rendering
    /// instead of aborting the whole render, unless strict mode is on.
    pub fn is_directive_level(&self) -> bool {
        matches!(
            self,
            Error::DirectiveError(_)
                | Error::ImportError(_)
                | Error::HttpError(_)
                | Error::IoError(_)
        )
    }
}

/// Result type alias for html-datastack operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::parse_static("No template provided");
        assert_eq!(err.to_string(), "Parse error: No template provided");

        let err = Error::selector_owned("Malformed XPath query: //p[".to_string());
        assert_eq!(err.to_string(), "Selector error: Malformed XPath query: //p[");

        let err = Error::directive_static("unknown key");
        assert_eq!(err.to_string(), "Directive error: unknown key");

        let err = Error::import_static("empty fragment");
        assert_eq!(err.to_string(), "Import error: empty fragment");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::JsonError(_)));
    }

    #[test]
    fn test_error_from_io() {
        use std::io;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_directive_level_classification() {
        assert!(Error::directive_static("x").is_directive_level());
        assert!(Error::import_static("x").is_directive_level());
        assert!(Error::io("gone".to_string()).is_directive_level());
        assert!(!Error::selector_static("x").is_directive_level());
        assert!(!Error::parse_static("x").is_directive_level());
    }
}
