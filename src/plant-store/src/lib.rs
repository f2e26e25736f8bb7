// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Persistence gateways for the plant model.
//!
//! Exactly one plant model is persisted at a time. Storing a model
//! replaces the previous one atomically: either the new graph is stored
//! in full, or the old one is left untouched.

#![forbid(unsafe_code)]

use plant_core::common::{ErrorKind, Result};
use plant_core::datamodel::{Model, Vehicle, VehicleStatus};

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod telemetry;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use telemetry::{JsonFileSource, StatusSource, refresh_vehicle_status};

/// Surrogate id of the single persisted model.
pub const MODEL_ID: plant_core::EntityId = 1;

pub trait PlantModelStore {
    /// Replaces the stored model with `model`.
    fn store(&mut self, model: &Model) -> Result<()>;

    /// Loads the stored model, with surrogate ids assigned.
    fn load(&self) -> Result<Model>;

    fn load_vehicle(&self, name: &str) -> Result<Vehicle> {
        match self.load()?.vehicles.into_iter().find(|v| v.name == name) {
            Some(vehicle) => Ok(vehicle),
            None => plant_core::load_err!(DoesNotExist, format!("vehicle '{name}'")),
        }
    }

    /// Persists a new status for the named vehicle, leaving the rest of
    /// the stored model as it is.
    fn save_vehicle_status(&mut self, name: &str, status: &VehicleStatus) -> Result<()>;
}

/// Rejects models that violate their structural invariants before any
/// stored state is touched.
fn check_before_store(model: &Model) -> Result<()> {
    model
        .check_integrity()
        .map_err(|violation| violation.into_error(ErrorKind::Integrity))
}
