// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The normalized plant model as it is persisted.
//!
//! Every child entity lives in exactly one parent collection and records
//! which parent that is through a typed index key (`PointKey`,
//! `BlockKey`, ...). Keys are positions in the owning `Vec`, so a graph
//! is only consistent as long as collections aren't reordered without
//! re-keying; `Model::check_integrity` verifies this.

use serde::{Deserialize, Serialize};

use crate::common::Result;

/// Surrogate identity assigned by a persistence gateway.
pub type EntityId = i64;

macro_rules! entity_key(
    ($name:ident) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    }
);

entity_key!(PointKey);
entity_key!(BlockKey);
entity_key!(LocationTypeKey);
entity_key!(LocationKey);
entity_key!(VisualLayoutKey);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LayoutElementKey {
    pub visual_layout: VisualLayoutKey,
    pub element: usize,
}

/// The single structural owner of a `Property`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyOwner {
    LocationType(LocationTypeKey),
    LayoutElement(LayoutElementKey),
    VisualLayout(VisualLayoutKey),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub id: Option<EntityId>,
    pub name: String,
    pub value: String,
    pub owner: PropertyOwner,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingPath {
    pub id: Option<EntityId>,
    pub name: String,
    pub point: PointKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub id: Option<EntityId>,
    pub name: String,
    pub x_position: Option<i64>,
    pub y_position: Option<i64>,
    pub z_position: Option<i64>,
    pub vehicle_orientation_angle: Option<f32>,
    pub kind: Option<String>,
    pub outgoing_paths: Vec<OutgoingPath>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub id: Option<EntityId>,
    pub name: String,
    pub source_point: String,
    pub destination_point: String,
    pub length: Option<i64>,
    pub routing_cost: Option<i64>,
    pub max_velocity: Option<i64>,
    pub max_reverse_velocity: Option<i64>,
    pub locked: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub id: Option<EntityId>,
    pub name: String,
    pub block: BlockKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: Option<EntityId>,
    pub name: String,
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllowedOperation {
    pub id: Option<EntityId>,
    pub name: String,
    pub location_type: LocationTypeKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocationType {
    pub id: Option<EntityId>,
    pub name: String,
    pub allowed_operations: Vec<AllowedOperation>,
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub id: Option<EntityId>,
    pub point: String,
    pub location: LocationKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub id: Option<EntityId>,
    pub name: String,
    pub x_position: Option<i64>,
    pub y_position: Option<i64>,
    pub z_position: Option<i64>,
    pub location_type: String,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vehicle {
    pub id: Option<EntityId>,
    pub name: String,
    pub length: Option<i64>,
    pub energy_level_critical: Option<i64>,
    pub energy_level_good: Option<i64>,
    pub max_velocity: Option<i32>,
    pub max_reverse_velocity: Option<i32>,
    pub kind: Option<String>,
    pub status: Option<VehicleStatus>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelLayoutElement {
    pub id: Option<EntityId>,
    pub visualized_object_name: Option<String>,
    pub layer: Option<i64>,
    pub properties: Vec<Property>,
    pub visual_layout: VisualLayoutKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VisualLayout {
    pub id: Option<EntityId>,
    pub name: String,
    pub scale_x: Option<f32>,
    pub scale_y: Option<f32>,
    pub model_layout_elements: Vec<ModelLayoutElement>,
    pub properties: Vec<Property>,
}

/// The root of a plant model. There is only ever one stored at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub id: Option<EntityId>,
    pub version: String,
    pub name: String,
    pub points: Vec<Point>,
    pub paths: Vec<Path>,
    pub vehicles: Vec<Vehicle>,
    pub location_types: Vec<LocationType>,
    pub locations: Vec<Location>,
    pub blocks: Vec<Block>,
    pub visual_layouts: Vec<VisualLayout>,
}

impl Model {
    pub fn new(version: impl Into<String>, name: impl Into<String>) -> Self {
        Model {
            version: version.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn get_point(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.name == name)
    }

    pub fn get_path(&self, name: &str) -> Option<&Path> {
        self.paths.iter().find(|p| p.name == name)
    }

    pub fn get_location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    pub fn get_location_type(&self, name: &str) -> Option<&LocationType> {
        self.location_types.iter().find(|lt| lt.name == name)
    }

    pub fn get_block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn get_vehicle(&self, name: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.name == name)
    }

    pub fn get_vehicle_mut(&mut self, name: &str) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.name == name)
    }

    /// The properties declared by `owner`, if the owner exists.
    pub fn properties_of(&self, owner: PropertyOwner) -> Option<&[Property]> {
        match owner {
            PropertyOwner::LocationType(key) => self
                .location_types
                .get(key.index())
                .map(|lt| lt.properties.as_slice()),
            PropertyOwner::VisualLayout(key) => self
                .visual_layouts
                .get(key.index())
                .map(|vl| vl.properties.as_slice()),
            PropertyOwner::LayoutElement(key) => self
                .visual_layouts
                .get(key.visual_layout.index())
                .and_then(|vl| vl.model_layout_elements.get(key.element))
                .map(|el| el.properties.as_slice()),
        }
    }

    /// Total number of entities in the graph, root excluded.
    pub fn entity_count(&self) -> usize {
        let points: usize = self.points.iter().map(|p| 1 + p.outgoing_paths.len()).sum();
        let blocks: usize = self.blocks.iter().map(|b| 1 + b.members.len()).sum();
        let location_types: usize = self
            .location_types
            .iter()
            .map(|lt| 1 + lt.allowed_operations.len() + lt.properties.len())
            .sum();
        let locations: usize = self.locations.iter().map(|l| 1 + l.links.len()).sum();
        let layouts: usize = self
            .visual_layouts
            .iter()
            .map(|vl| {
                let elements: usize = vl
                    .model_layout_elements
                    .iter()
                    .map(|el| 1 + el.properties.len())
                    .sum();
                1 + vl.properties.len() + elements
            })
            .sum();

        points
            + self.paths.len()
            + self.vehicles.len()
            + blocks
            + location_types
            + locations
            + layouts
    }

    /// Replaces the status of the named vehicle.
    pub fn set_vehicle_status(&mut self, vehicle: &str, status: VehicleStatus) -> Result<()> {
        match self.get_vehicle_mut(vehicle) {
            Some(v) => {
                v.status = Some(status);
                Ok(())
            }
            None => crate::store_err!(DoesNotExist, format!("vehicle '{vehicle}'")),
        }
    }
}

/// Telemetry reported by a vehicle, merged into the stored vehicle over
/// time. Fields are kept as the text the vehicle reported.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VehicleStatus {
    pub truck_name: Option<String>,
    pub engine_temp: Option<String>,
    pub engine_fluid: Option<String>,
    pub inlet_exhaust: Option<String>,
    pub fuel_eco: Option<String>,
    pub cruise_control: Option<String>,
    #[serde(rename = "VehicleID")]
    pub vehicle_id: Option<String>,
    pub electrical_power: Option<String>,
    pub ambient_conditions: Option<String>,
    pub engine_hours: Option<String>,
    pub fan_drive: Option<String>,
    pub engine_fluid2: Option<String>,
    pub idle_operation: Option<String>,
    pub vehicle_distance: Option<String>,
    pub idle_shutdown: Option<String>,
    pub time_date: Option<String>,
    pub vehicle_hours: Option<String>,
    pub fuel_consumption: Option<String>,
    pub water_in_fuel_ind: Option<String>,
}

fn coalesce(current: &mut Option<String>, fresh: &Option<String>) {
    if let Some(value) = fresh {
        if !value.is_empty() {
            *current = Some(value.clone());
        }
    }
}

impl VehicleStatus {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Overwrites each field with the corresponding field of `fresh`, but
    /// only where `fresh` actually reported something.
    pub fn merge_from(&mut self, fresh: &VehicleStatus) {
        coalesce(&mut self.truck_name, &fresh.truck_name);
        coalesce(&mut self.engine_temp, &fresh.engine_temp);
        coalesce(&mut self.engine_fluid, &fresh.engine_fluid);
        coalesce(&mut self.inlet_exhaust, &fresh.inlet_exhaust);
        coalesce(&mut self.fuel_eco, &fresh.fuel_eco);
        coalesce(&mut self.cruise_control, &fresh.cruise_control);
        coalesce(&mut self.vehicle_id, &fresh.vehicle_id);
        coalesce(&mut self.electrical_power, &fresh.electrical_power);
        coalesce(&mut self.ambient_conditions, &fresh.ambient_conditions);
        coalesce(&mut self.engine_hours, &fresh.engine_hours);
        coalesce(&mut self.fan_drive, &fresh.fan_drive);
        coalesce(&mut self.engine_fluid2, &fresh.engine_fluid2);
        coalesce(&mut self.idle_operation, &fresh.idle_operation);
        coalesce(&mut self.vehicle_distance, &fresh.vehicle_distance);
        coalesce(&mut self.idle_shutdown, &fresh.idle_shutdown);
        coalesce(&mut self.time_date, &fresh.time_date);
        coalesce(&mut self.vehicle_hours, &fresh.vehicle_hours);
        coalesce(&mut self.fuel_consumption, &fresh.fuel_consumption);
        coalesce(&mut self.water_in_fuel_ind, &fresh.water_in_fuel_ind);
    }

    /// Field names and values in a fixed order; used by gateways that
    /// store the record column-wise.
    pub fn fields(&self) -> [(&'static str, &Option<String>); 19] {
        [
            ("truck_name", &self.truck_name),
            ("engine_temp", &self.engine_temp),
            ("engine_fluid", &self.engine_fluid),
            ("inlet_exhaust", &self.inlet_exhaust),
            ("fuel_eco", &self.fuel_eco),
            ("cruise_control", &self.cruise_control),
            ("vehicle_id", &self.vehicle_id),
            ("electrical_power", &self.electrical_power),
            ("ambient_conditions", &self.ambient_conditions),
            ("engine_hours", &self.engine_hours),
            ("fan_drive", &self.fan_drive),
            ("engine_fluid2", &self.engine_fluid2),
            ("idle_operation", &self.idle_operation),
            ("vehicle_distance", &self.vehicle_distance),
            ("idle_shutdown", &self.idle_shutdown),
            ("time_date", &self.time_date),
            ("vehicle_hours", &self.vehicle_hours),
            ("fuel_consumption", &self.fuel_consumption),
            ("water_in_fuel_ind", &self.water_in_fuel_ind),
        ]
    }

    /// Builds a status from values in `fields()` order.
    pub fn from_fields(values: [Option<String>; 19]) -> Self {
        let [
            truck_name,
            engine_temp,
            engine_fluid,
            inlet_exhaust,
            fuel_eco,
            cruise_control,
            vehicle_id,
            electrical_power,
            ambient_conditions,
            engine_hours,
            fan_drive,
            engine_fluid2,
            idle_operation,
            vehicle_distance,
            idle_shutdown,
            time_date,
            vehicle_hours,
            fuel_consumption,
            water_in_fuel_ind,
        ] = values;
        VehicleStatus {
            truck_name,
            engine_temp,
            engine_fluid,
            inlet_exhaust,
            fuel_eco,
            cruise_control,
            vehicle_id,
            electrical_power,
            ambient_conditions,
            engine_hours,
            fan_drive,
            engine_fluid2,
            idle_operation,
            vehicle_distance,
            idle_shutdown,
            time_date,
            vehicle_hours,
            fuel_consumption,
            water_in_fuel_ind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_merge_coalesces() {
        let mut stored = VehicleStatus {
            truck_name: Some("AITV-1".to_owned()),
            engine_temp: Some("80".to_owned()),
            fuel_eco: Some("12".to_owned()),
            ..Default::default()
        };
        let fresh = VehicleStatus {
            engine_temp: Some("92".to_owned()),
            fuel_eco: Some("".to_owned()),
            water_in_fuel_ind: Some("0".to_owned()),
            ..Default::default()
        };

        stored.merge_from(&fresh);

        assert_eq!(Some("AITV-1".to_owned()), stored.truck_name);
        assert_eq!(Some("92".to_owned()), stored.engine_temp);
        // an empty report doesn't clobber the stored value
        assert_eq!(Some("12".to_owned()), stored.fuel_eco);
        assert_eq!(Some("0".to_owned()), stored.water_in_fuel_ind);
        assert_eq!(None, stored.idle_shutdown);
    }

    #[test]
    fn test_status_from_json() {
        let json = r#"{
            "TruckName": "AITV-1",
            "EngineTemp": "92",
            "VehicleID": "V-0042",
            "EngineFluid2": "ok",
            "SomethingNew": "ignored"
        }"#;
        let status = VehicleStatus::from_json(json).unwrap();
        assert_eq!(Some("AITV-1".to_owned()), status.truck_name);
        assert_eq!(Some("V-0042".to_owned()), status.vehicle_id);
        assert_eq!(Some("ok".to_owned()), status.engine_fluid2);
        assert_eq!(None, status.fan_drive);

        assert!(VehicleStatus::from_json("{").is_err());
    }

    #[test]
    fn test_status_fields_roundtrip() {
        let status = VehicleStatus {
            truck_name: Some("t".to_owned()),
            vehicle_id: Some("v".to_owned()),
            water_in_fuel_ind: Some("w".to_owned()),
            ..Default::default()
        };
        let values = status.fields().map(|(_, value)| value.clone());
        assert_eq!(status, VehicleStatus::from_fields(values));
    }

    #[test]
    fn test_properties_of() {
        let mut model = Model::new("0.0.2", "plant");
        let key = LocationTypeKey(0);
        model.location_types.push(LocationType {
            id: None,
            name: "Station".to_owned(),
            allowed_operations: vec![],
            properties: vec![Property {
                id: None,
                name: "color".to_owned(),
                value: "red".to_owned(),
                owner: PropertyOwner::LocationType(key),
            }],
        });

        let props = model
            .properties_of(PropertyOwner::LocationType(key))
            .unwrap();
        assert_eq!(1, props.len());
        assert!(
            model
                .properties_of(PropertyOwner::VisualLayout(VisualLayoutKey(0)))
                .is_none()
        );
        assert_eq!(2, model.entity_count());
    }

    #[test]
    fn test_set_vehicle_status() {
        let mut model = Model::new("0.0.2", "plant");
        model.vehicles.push(Vehicle {
            id: None,
            name: "V1".to_owned(),
            length: Some(1000),
            energy_level_critical: Some(30),
            energy_level_good: Some(90),
            max_velocity: None,
            max_reverse_velocity: None,
            kind: None,
            status: None,
        });

        let status = VehicleStatus {
            engine_hours: Some("12".to_owned()),
            ..Default::default()
        };
        model.set_vehicle_status("V1", status.clone()).unwrap();
        assert_eq!(Some(&status), model.get_vehicle("V1").unwrap().status.as_ref());
        assert!(model.set_vehicle_status("V2", status).is_err());
    }
}
