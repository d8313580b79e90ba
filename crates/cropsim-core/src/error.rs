// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for cropsim-core.

use thiserror::Error;

/// Core pipeline errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Required configuration is absent or malformed (e.g. no Simulation Start record).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog data could not be encoded into model input files.
    #[error("Encode error: {0}")]
    Encode(String),

    /// An agronomic catalog lookup failed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// An output file could not be parsed or reshaped.
    #[error("Output error in {file}: {message}")]
    Output {
        /// Output file name.
        file: String,
        /// What went wrong.
        message: String,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Running store migrations failed.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Delimited text parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn encode(message: impl Into<String>) -> Self {
        Self::Encode(message.into())
    }

    pub(crate) fn output(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Output {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// Result type using the core Error.
pub type Result<T> = std::result::Result<T, Error>;
