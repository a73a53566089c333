use std::path::PathBuf;
use thiserror::Error;

use crate::order::OrderStatus;

#[derive(Error, Debug)]
pub enum PrintHubError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Order not found: {id}")]
    NotFound { id: String },

    #[error("Illegal status transition for order {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

impl PrintHubError {
    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            PrintHubError::Config(_) => "config",
            PrintHubError::Validation(_) => "validation",
            PrintHubError::NotFound { .. } => "not_found",
            PrintHubError::InvalidTransition { .. } => "invalid_transition",
            PrintHubError::Storage(_) => "storage",
            PrintHubError::Database(_) => "database",
        }
    }

    /// Whether a caller may reasonably retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PrintHubError::Storage(_) | PrintHubError::Database(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid value '{value}' for environment variable {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Input problems the submitting client can fix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("An order must contain at least one file")]
    EmptyOrder,

    #[error("File '{file_name}' has no storage reference")]
    MissingStorageRef { file_name: String },

    #[error("File metadata (fileRanges) is missing")]
    MissingMetadata,

    #[error("File metadata (fileRanges) is malformed: {0}")]
    MalformedMetadata(String),

    #[error("Malformed multipart body: {0}")]
    MalformedUpload(String),

    #[error("Unsupported status '{0}', expected 'completed' or 'failed'")]
    UnsupportedStatus(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find a free file name for '{0}'")]
    NameExhausted(String),
}

pub type Result<T> = std::result::Result<T, PrintHubError>;
