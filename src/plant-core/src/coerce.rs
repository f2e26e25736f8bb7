// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Conversion between optional numeric text and optional typed numbers.
//!
//! Transfer files and SQL columns carry numbers as text, where a missing
//! or empty value means "unset". The domain model carries real numbers.
//! These helpers are the only place the two meet: an unset field stays
//! unset in both directions, and text that isn't a valid number is an
//! error rather than a silent zero.

use std::fmt;
use std::str::FromStr;

use crate::common::{Error, ErrorCode, ErrorKind};

/// Numeric types that can appear as optional text fields.
pub trait Numeric: FromStr + fmt::Display + Copy {
    const TYPE_NAME: &'static str;
}

impl Numeric for i32 {
    const TYPE_NAME: &'static str = "integer";
}

impl Numeric for i64 {
    const TYPE_NAME: &'static str = "long integer";
}

impl Numeric for f32 {
    const TYPE_NAME: &'static str = "float";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoercionError {
    Malformed {
        field: String,
        text: String,
        expected: &'static str,
    },
}

impl CoercionError {
    pub fn field(&self) -> &str {
        match self {
            CoercionError::Malformed { field, .. } => field,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            CoercionError::Malformed { text, .. } => text,
        }
    }

    /// Replaces the reported field path, e.g. to qualify a bare attribute
    /// name with the entity it belongs to.
    pub fn in_field(self, field: String) -> Self {
        match self {
            CoercionError::Malformed { text, expected, .. } => CoercionError::Malformed {
                field,
                text,
                expected,
            },
        }
    }

    pub fn into_error(self, kind: ErrorKind) -> Error {
        Error::new(kind, ErrorCode::MalformedNumber, Some(self.to_string()))
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CoercionError::Malformed {
                field,
                text,
                expected,
            } => write!(f, "{field}: {text:?} is not a valid {expected}"),
        }
    }
}

impl std::error::Error for CoercionError {}

/// Parses an optional text field. `None` and `""` are both "unset".
pub fn parse_optional<T: Numeric>(
    field: &str,
    text: Option<&str>,
) -> Result<Option<T>, CoercionError> {
    match text {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| CoercionError::Malformed {
                field: field.to_owned(),
                text: text.to_owned(),
                expected: T::TYPE_NAME,
            }),
    }
}

/// The inverse of `parse_optional`: unset stays unset, numbers are
/// written in their shortest decimal form.
pub fn format_optional<T: Numeric>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}
