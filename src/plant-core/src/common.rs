// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::{error, fmt, result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoError,         // will never be produced
    DoesNotExist,    // the named entity doesn't exist
    MalformedNumber, // numeric text that doesn't parse as its declared type
    UnresolvedReference,
    EmptyReference,
    DuplicateName,
    BrokenBackReference,
    XmlDeserialization,
    XmlSerialization,
    JsonDeserialization,
    Database,
    Io,
    Generic,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorCode::*;
        let name = match self {
            NoError => "no_error",
            DoesNotExist => "does_not_exist",
            MalformedNumber => "malformed_number",
            UnresolvedReference => "unresolved_reference",
            EmptyReference => "empty_reference",
            DuplicateName => "duplicate_name",
            BrokenBackReference => "broken_back_reference",
            XmlDeserialization => "xml_deserialization",
            XmlSerialization => "xml_serialization",
            JsonDeserialization => "json_deserialization",
            Database => "database",
            Io => "io",
            Generic => "generic",
        };
        write!(f, "{name}")
    }
}

/// Which operation an error surfaced from.
///
/// The same `ErrorCode` can show up under different kinds: a malformed
/// number is an `Import` error when it comes from a transfer file, but a
/// `Load` error when it comes out of a persisted graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Import,
    Export,
    Integrity,
    Store,
    Load,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub details: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, code: ErrorCode, details: Option<String>) -> Self {
        Error {
            kind,
            code,
            details,
        }
    }

    pub fn get_details(&self) -> Option<String> {
        self.details.clone()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Import => "ImportError",
            ErrorKind::Export => "ExportError",
            ErrorKind::Integrity => "IntegrityError",
            ErrorKind::Store => "StoreError",
            ErrorKind::Load => "LoadError",
        };
        match self.details {
            Some(ref details) => write!(f, "{}{{{}: {}}}", kind, self.code, details),
            None => write!(f, "{}{{{}}}", kind, self.code),
        }
    }
}

impl error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(
            ErrorKind::Import,
            ErrorCode::JsonDeserialization,
            Some(err.to_string()),
        )
    }
}

pub type Result<T> = result::Result<T, Error>;

#[macro_export]
macro_rules! import_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Import, ErrorCode::$code, Some($str)))
    }}
);

#[macro_export]
macro_rules! store_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Store, ErrorCode::$code, Some($str)))
    }}
);

#[macro_export]
macro_rules! load_err(
    ($code:tt, $str:expr) => {{
        use $crate::common::{Error, ErrorCode, ErrorKind};
        Err(Error::new(ErrorKind::Load, ErrorCode::$code, Some($str)))
    }}
);

#[test]
fn test_error_display() {
    let err = Error::new(
        ErrorKind::Import,
        ErrorCode::MalformedNumber,
        Some("points[P1].xPosition: \"abc\"".to_owned()),
    );
    assert_eq!(
        "ImportError{malformed_number: points[P1].xPosition: \"abc\"}",
        format!("{err}")
    );

    let err = Error::new(ErrorKind::Load, ErrorCode::DoesNotExist, None);
    assert_eq!("LoadError{does_not_exist}", format!("{err}"));
}

#[test]
fn test_err_macros() {
    let result: Result<()> = import_err!(DuplicateName, "point 'P1'".to_owned());
    let err = result.unwrap_err();
    assert_eq!(ErrorKind::Import, err.kind);
    assert_eq!(ErrorCode::DuplicateName, err.code);
    assert_eq!(Some("point 'P1'".to_owned()), err.get_details());

    let result: Result<()> = load_err!(DoesNotExist, "no stored model".to_owned());
    assert_eq!(ErrorKind::Load, result.unwrap_err().kind);
}
