// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the hub core.
//!
//! The taxonomy follows how each failure is handled:
//!
//! - [`TransportError`]: connectivity failures. Always retryable, handled
//!   locally with backoff and never surfaced to command callers.
//! - [`PerformError`]: what a caller of `perform` sees when a command is
//!   rejected, either before any network call (validation) or because the
//!   device embedded faults in its reply.
//! - [`StorageError`]: registry collaborator failures. Logged, and
//!   reconciliation degrades instead of failing.
//! - [`ParseError`] and [`ValueError`]: decoding and range checks.

use thiserror::Error;

use crate::action::Fault;
use crate::command::ValidationReport;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The device could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A payload could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The persistent registry failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A command was rejected.
    #[error("perform rejected: {0}")]
    Perform(#[from] PerformError),

    /// No device is registered under the requested identifier.
    #[error("device not found")]
    DeviceNotFound,
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u32,
        /// Maximum allowed value.
        max: u32,
        /// The actual value that was provided.
        actual: u32,
    },

    /// A play mode name is not recognised.
    #[error("invalid play mode: {0}")]
    InvalidPlayMode(String),

    /// An on/off string is neither `on` nor `off`.
    #[error("invalid on/off value: {0}")]
    InvalidOnOff(String),
}

/// Connectivity failures between the hub and a device.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed before a response was received.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The device refused the connection or did not answer in time.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The device answered with a non-success status and no usable body.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The response body was not a decodable envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request could not be built (bad URL, bad method).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors related to decoding device payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// XML decoding failed.
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// An expected element or header is missing.
    #[error("missing field: {0}")]
    MissingField(String),

    /// The payload has an unexpected shape.
    #[error("unexpected format: {0}")]
    UnexpectedFormat(String),
}

/// Failures of the persistent registry collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A lookup failed after the store's own retries.
    #[error("lookup of {key} failed: {message}")]
    Lookup {
        /// The composite key that was looked up.
        key: String,
        /// Store diagnostic.
        message: String,
    },

    /// Creating a record failed.
    #[error("create of {key} failed: {message}")]
    Create {
        /// The composite key of the record.
        key: String,
        /// Store diagnostic.
        message: String,
    },
}

/// Why a `perform` call was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PerformError {
    /// The arguments failed validation; nothing was sent to the device.
    #[error("invalid command: {0}")]
    Invalid(ValidationReport),

    /// The device reported application-level faults.
    #[error("device reported {} fault(s)", .0.len())]
    Fault(Vec<Fault>),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
