// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Vehicle telemetry: fetching fresh status reports and merging them into
//! the status persisted with each vehicle.

use std::path::PathBuf;

use plant_core::common::{Error, ErrorCode, ErrorKind, Result};
use plant_core::datamodel::VehicleStatus;
use tracing::{debug, warn};

use crate::PlantModelStore;

/// Somewhere fresh vehicle status reports come from.
pub trait StatusSource {
    fn fetch(&self, vehicle: &str) -> Result<VehicleStatus>;
}

impl<F> StatusSource for F
where
    F: Fn(&str) -> Result<VehicleStatus>,
{
    fn fetch(&self, vehicle: &str) -> Result<VehicleStatus> {
        self(vehicle)
    }
}

/// Reads a single JSON status record from a file, whichever vehicle is
/// asked for.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileSource { path: path.into() }
    }
}

impl StatusSource for JsonFileSource {
    fn fetch(&self, _vehicle: &str) -> Result<VehicleStatus> {
        let contents = std::fs::read_to_string(&self.path).map_err(|err| {
            Error::new(
                ErrorKind::Import,
                ErrorCode::Io,
                Some(format!("{}: {}", self.path.display(), err)),
            )
        })?;
        VehicleStatus::from_json(&contents)
    }
}

/// Merges a fresh report for `vehicle` into its stored status and
/// persists the result.
///
/// A source that fails to report is not an error: the stored status is
/// returned as it was and nothing is written.
pub fn refresh_vehicle_status<S, T>(store: &mut S, source: &T, vehicle: &str) -> Result<VehicleStatus>
where
    S: PlantModelStore + ?Sized,
    T: StatusSource + ?Sized,
{
    let stored = store.load_vehicle(vehicle)?;
    let mut status = stored.status.unwrap_or_default();

    let fresh = match source.fetch(vehicle) {
        Ok(fresh) => fresh,
        Err(err) => {
            warn!(vehicle, error = %err, "couldn't fetch vehicle status, keeping stored status");
            return Ok(status);
        }
    };

    status.merge_from(&fresh);
    store.save_vehicle_status(vehicle, &status)?;
    debug!(vehicle, "refreshed vehicle status");

    Ok(status)
}
