// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use plant_core::common::Result;
use plant_core::datamodel::{EntityId, Model, VehicleStatus};
use tracing::info;

use crate::{MODEL_ID, PlantModelStore, check_before_store};

/// A gateway that keeps the stored model in memory, handing out
/// sequential surrogate ids like an auto-increment column would.
#[derive(Debug)]
pub struct MemoryStore {
    model: Option<Model>,
    next_id: EntityId,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            model: None,
            next_id: 1,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> Option<EntityId> {
        let id = self.next_id;
        self.next_id += 1;
        Some(id)
    }

    fn assign_ids(&mut self, model: &mut Model) {
        model.id = Some(MODEL_ID);
        for point in model.points.iter_mut() {
            point.id = self.next_id();
            for op in point.outgoing_paths.iter_mut() {
                op.id = self.next_id();
            }
        }
        for block in model.blocks.iter_mut() {
            block.id = self.next_id();
            for member in block.members.iter_mut() {
                member.id = self.next_id();
            }
        }
        for lt in model.location_types.iter_mut() {
            lt.id = self.next_id();
            for op in lt.allowed_operations.iter_mut() {
                op.id = self.next_id();
            }
            for prop in lt.properties.iter_mut() {
                prop.id = self.next_id();
            }
        }
        for location in model.locations.iter_mut() {
            location.id = self.next_id();
            for link in location.links.iter_mut() {
                link.id = self.next_id();
            }
        }
        for path in model.paths.iter_mut() {
            path.id = self.next_id();
        }
        for vehicle in model.vehicles.iter_mut() {
            vehicle.id = self.next_id();
        }
        for vl in model.visual_layouts.iter_mut() {
            vl.id = self.next_id();
            for element in vl.model_layout_elements.iter_mut() {
                element.id = self.next_id();
                for prop in element.properties.iter_mut() {
                    prop.id = self.next_id();
                }
            }
            for prop in vl.properties.iter_mut() {
                prop.id = self.next_id();
            }
        }
    }
}

impl PlantModelStore for MemoryStore {
    fn store(&mut self, model: &Model) -> Result<()> {
        check_before_store(model)?;

        let mut stored = model.clone();
        self.assign_ids(&mut stored);
        info!(
            model = %stored.name,
            entities = stored.entity_count(),
            "replaced stored plant model"
        );
        self.model = Some(stored);
        Ok(())
    }

    fn load(&self) -> Result<Model> {
        match self.model {
            Some(ref model) => Ok(model.clone()),
            None => plant_core::load_err!(DoesNotExist, "no plant model is stored".to_owned()),
        }
    }

    fn save_vehicle_status(&mut self, name: &str, status: &VehicleStatus) -> Result<()> {
        match self.model {
            Some(ref mut model) => model.set_vehicle_status(name, status.clone()),
            None => plant_core::store_err!(DoesNotExist, "no plant model is stored".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plant_compat::convert::to_transfer;
    use plant_core::common::{ErrorCode, ErrorKind};
    use plant_core::datamodel::{Point, Vehicle};

    fn model_with_vehicle() -> Model {
        let mut model = Model::new("0.0.2", "plant");
        model.points.push(Point {
            id: None,
            name: "P1".to_owned(),
            x_position: Some(0),
            y_position: None,
            z_position: None,
            vehicle_orientation_angle: None,
            kind: None,
            outgoing_paths: vec![],
        });
        model.vehicles.push(Vehicle {
            id: None,
            name: "V1".to_owned(),
            length: Some(1000),
            energy_level_critical: None,
            energy_level_good: None,
            max_velocity: None,
            max_reverse_velocity: None,
            kind: None,
            status: None,
        });
        model
    }

    #[test]
    fn test_load_empty() {
        let store = MemoryStore::new();
        let err = store.load().unwrap_err();
        assert_eq!(ErrorKind::Load, err.kind);
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }

    #[test]
    fn test_store_assigns_ids() {
        let mut store = MemoryStore::new();
        let model = model_with_vehicle();
        store.store(&model).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(Some(MODEL_ID), loaded.id);
        assert!(loaded.points[0].id.is_some());
        assert_ne!(loaded.points[0].id, loaded.vehicles[0].id);

        assert_eq!(
            to_transfer(&model).unwrap(),
            to_transfer(&loaded).unwrap()
        );
    }

    #[test]
    fn test_failed_store_keeps_previous() {
        let mut store = MemoryStore::new();
        store.store(&model_with_vehicle()).unwrap();

        let mut broken = model_with_vehicle();
        broken.name = "broken".to_owned();
        broken.points.push(broken.points[0].clone());
        let err = store.store(&broken).unwrap_err();
        assert_eq!(ErrorKind::Integrity, err.kind);
        assert_eq!(ErrorCode::DuplicateName, err.code);

        assert_eq!("plant", store.load().unwrap().name);
    }

    #[test]
    fn test_vehicle_status() {
        let mut store = MemoryStore::new();
        let status = VehicleStatus {
            engine_temp: Some("85".to_owned()),
            ..Default::default()
        };
        assert!(store.save_vehicle_status("V1", &status).is_err());

        store.store(&model_with_vehicle()).unwrap();
        store.save_vehicle_status("V1", &status).unwrap();
        assert_eq!(Some(status), store.load_vehicle("V1").unwrap().status);

        let err = store.load_vehicle("V2").unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }
}
