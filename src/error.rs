use std::{fmt, io};

use http::status::StatusCode;
use http::uri::InvalidUri;
use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum MenuError {
    /// Missing or malformed menu-source registry entries.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A persisted entry failed field validation (e.g. a URI with an unknown scheme).
    #[error("Validation error: {0}")]
    Validation(String),
    /// A node declared itself as its own parent, or the parent chain loops.
    #[error("Structural error: {0}")]
    Structural(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Menu store error: {0}")]
    Store(String),
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl MenuError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MenuError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MenuError::Validation(_) => StatusCode::BAD_REQUEST,
            MenuError::Structural(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MenuError::NotFound(_) => StatusCode::NOT_FOUND,
            MenuError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MenuError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MenuError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MenuError::Cancelled(_) => StatusCode::NO_CONTENT,
        }
    }

    /// Errors that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MenuError::Configuration(_) | MenuError::Validation(_) | MenuError::Structural(_)
        )
    }
}

impl From<toml::de::Error> for MenuError {
    fn from(src: toml::de::Error) -> MenuError {
        MenuError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for MenuError {
    fn from(src: toml::ser::Error) -> MenuError {
        MenuError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for MenuError {
    fn from(src: JsonError) -> MenuError {
        MenuError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<InvalidUri> for MenuError {
    fn from(src: InvalidUri) -> MenuError {
        MenuError::Validation(format!("Invalid request URI: {src}"))
    }
}

impl From<io::Error> for MenuError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MenuError::NotFound(format!("{x}")),
            _ => MenuError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for MenuError {
    fn from(x: fmt::Error) -> Self {
        MenuError::Serialization(format!("{x}"))
    }
}

impl From<RegexError> for MenuError {
    fn from(x: RegexError) -> Self {
        MenuError::Configuration(format!("Regex parse failed: {x}"))
    }
}
