// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod coerce;
pub mod common;
pub mod datamodel;
pub mod integrity;

pub use coerce::{CoercionError, Numeric, format_optional, parse_optional};
pub use common::{Error, ErrorCode, ErrorKind, Result};
pub use datamodel::{EntityId, Model, VehicleStatus};
pub use integrity::{IntegrityViolation, LINK_NAME_SEPARATOR};
