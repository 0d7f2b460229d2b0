// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Argument validation reports.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded perform parameters.
pub type Params = Map<String, Value>;

/// Structured outcome of validating a perform.
///
/// `invalid` names arguments that are present but unusable, `requires`
/// names arguments that are missing. An empty report means the perform may
/// be sent.
///
/// ```
/// use homehub_lib::command::ValidationReport;
///
/// let mut report = ValidationReport::new();
/// assert!(report.is_valid());
///
/// report.require("name");
/// assert_eq!(report.requires(), ["name"]);
/// assert!(report.invalid().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    invalid: Vec<String>,
    requires: Vec<String>,
}

impl ValidationReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `field` as invalid.
    pub fn invalidate(&mut self, field: &str) {
        if !self.invalid.iter().any(|f| f == field) {
            self.invalid.push(field.to_string());
        }
    }

    /// Marks `field` as missing.
    pub fn require(&mut self, field: &str) {
        if !self.requires.iter().any(|f| f == field) {
            self.requires.push(field.to_string());
        }
    }

    /// Invalid arguments.
    #[must_use]
    pub fn invalid(&self) -> &[String] {
        &self.invalid
    }

    /// Missing arguments.
    #[must_use]
    pub fn requires(&self) -> &[String] {
        &self.requires
    }

    /// Returns `true` if nothing is invalid or missing.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.invalid.is_empty() && self.requires.is_empty()
    }

    /// Converts the report into a result.
    ///
    /// # Errors
    ///
    /// Returns the report itself when it is not valid.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_valid() { Ok(()) } else { Err(self) }
    }

    /// A report carrying a single invalid field.
    #[must_use]
    pub fn invalid_field(field: &str) -> Self {
        let mut report = Self::new();
        report.invalidate(field);
        report
    }

    /// A report carrying a single missing field.
    #[must_use]
    pub fn required_field(field: &str) -> Self {
        let mut report = Self::new();
        report.require(field);
        report
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid: [{}], requires: [{}]",
            self.invalid.join(", "),
            self.requires.join(", ")
        )
    }
}

/// Decodes a parameter that must be present.
///
/// # Errors
///
/// A missing parameter requires `parameter`; text that is not a JSON
/// object invalidates it.
pub fn parse_params(parameter: Option<&str>) -> Result<Params, ValidationReport> {
    match parameter {
        None => Err(ValidationReport::required_field("parameter")),
        Some(text) => decode(text),
    }
}

/// Decodes a parameter that may be omitted; an absent one is empty.
///
/// # Errors
///
/// Text that is not a JSON object invalidates `parameter`.
pub fn parse_optional_params(parameter: Option<&str>) -> Result<Params, ValidationReport> {
    parameter.map_or_else(|| Ok(Params::new()), decode)
}

fn decode(text: &str) -> Result<Params, ValidationReport> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) | Err(_) => {
            tracing::debug!(parameter = text, "Undecodable perform parameter");
            Err(ValidationReport::invalid_field("parameter"))
        }
    }
}

/// Checks that `field` holds a non-empty string and returns it.
///
/// A missing or empty value is recorded as required, a non-string value as
/// invalid.
pub fn require_text<'a>(
    params: &'a Params,
    field: &str,
    report: &mut ValidationReport,
) -> Option<&'a str> {
    match params.get(field) {
        None | Some(Value::Null) => {
            report.require(field);
            None
        }
        Some(Value::String(text)) if text.is_empty() => {
            report.require(field);
            None
        }
        Some(Value::String(text)) => Some(text),
        Some(_) => {
            report.invalidate(field);
            None
        }
    }
}

/// Returns the text of an optional field, recording non-strings as invalid.
pub fn optional_text<'a>(
    params: &'a Params,
    field: &str,
    report: &mut ValidationReport,
) -> Option<&'a str> {
    match params.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(_) => {
            report.invalidate(field);
            None
        }
    }
}

/// Returns an optional numeric field, accepting numbers or numeric strings.
pub fn optional_number(params: &Params, field: &str, report: &mut ValidationReport) -> Option<f64> {
    let value = params.get(field)?;
    let number = match value {
        Value::Null => return None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if number.is_none() {
        report.invalidate(field);
    }
    number
}
