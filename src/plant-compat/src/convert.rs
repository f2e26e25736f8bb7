// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Conversion between the transfer graph and the persisted domain graph.

use plant_core::coerce::{Numeric, format_optional, parse_optional};
use plant_core::common::{ErrorKind, Result};
use plant_core::datamodel::{
    self, BlockKey, LayoutElementKey, LocationKey, LocationTypeKey, PointKey, PropertyOwner,
    VisualLayoutKey,
};
use tracing::debug;

use crate::transfer;

/// Coerces one optional numeric attribute, naming the offending field as
/// `collection[entity].attribute` on failure.
fn coerce<T: Numeric>(
    collection: &str,
    entity: &str,
    attr: &str,
    text: &Option<String>,
) -> Result<Option<T>> {
    parse_optional(attr, text.as_deref()).map_err(|err| {
        err.in_field(format!("{collection}[{entity}].{attr}"))
            .into_error(ErrorKind::Import)
    })
}

fn property_to_domain(prop: &transfer::Property, owner: PropertyOwner) -> datamodel::Property {
    datamodel::Property {
        id: None,
        name: prop.name.clone(),
        value: prop.value.clone(),
        owner,
    }
}

fn point_to_domain(key: PointKey, point: &transfer::Point) -> Result<datamodel::Point> {
    let name = point.name.as_str();
    Ok(datamodel::Point {
        id: None,
        name: point.name.clone(),
        x_position: coerce("points", name, "xPosition", &point.x_position)?,
        y_position: coerce("points", name, "yPosition", &point.y_position)?,
        z_position: coerce("points", name, "zPosition", &point.z_position)?,
        vehicle_orientation_angle: coerce(
            "points",
            name,
            "vehicleOrientationAngle",
            &point.vehicle_orientation_angle,
        )?,
        kind: point.kind.clone(),
        outgoing_paths: point
            .outgoing_paths
            .iter()
            .map(|op| datamodel::OutgoingPath {
                id: None,
                name: op.name.clone(),
                point: key,
            })
            .collect(),
    })
}

fn block_to_domain(key: BlockKey, block: &transfer::Block) -> datamodel::Block {
    datamodel::Block {
        id: None,
        name: block.name.clone(),
        members: block
            .members
            .iter()
            .map(|m| datamodel::Member {
                id: None,
                name: m.name.clone(),
                block: key,
            })
            .collect(),
    }
}

fn location_type_to_domain(
    key: LocationTypeKey,
    lt: &transfer::LocationType,
) -> datamodel::LocationType {
    datamodel::LocationType {
        id: None,
        name: lt.name.clone(),
        allowed_operations: lt
            .allowed_operations
            .iter()
            .map(|op| datamodel::AllowedOperation {
                id: None,
                name: op.name.clone(),
                location_type: key,
            })
            .collect(),
        properties: lt
            .properties
            .iter()
            .map(|p| property_to_domain(p, PropertyOwner::LocationType(key)))
            .collect(),
    }
}

fn location_to_domain(key: LocationKey, location: &transfer::Location) -> Result<datamodel::Location> {
    let name = location.name.as_str();
    Ok(datamodel::Location {
        id: None,
        name: location.name.clone(),
        x_position: coerce("locations", name, "xPosition", &location.x_position)?,
        y_position: coerce("locations", name, "yPosition", &location.y_position)?,
        z_position: coerce("locations", name, "zPosition", &location.z_position)?,
        location_type: location.location_type.clone(),
        links: location
            .links
            .iter()
            .map(|link| datamodel::Link {
                id: None,
                point: link.point.clone(),
                location: key,
            })
            .collect(),
    })
}

fn path_to_domain(path: &transfer::Path) -> Result<datamodel::Path> {
    let name = path.name.as_str();
    Ok(datamodel::Path {
        id: None,
        name: path.name.clone(),
        source_point: path.source_point.clone(),
        destination_point: path.destination_point.clone(),
        length: coerce("paths", name, "length", &path.length)?,
        routing_cost: coerce("paths", name, "routingCost", &path.routing_cost)?,
        max_velocity: coerce("paths", name, "maxVelocity", &path.max_velocity)?,
        max_reverse_velocity: coerce(
            "paths",
            name,
            "maxReverseVelocity",
            &path.max_reverse_velocity,
        )?,
        locked: path.locked,
    })
}

fn vehicle_to_domain(vehicle: &transfer::Vehicle) -> Result<datamodel::Vehicle> {
    let name = vehicle.name.as_str();
    Ok(datamodel::Vehicle {
        id: None,
        name: vehicle.name.clone(),
        length: coerce("vehicles", name, "length", &vehicle.length)?,
        energy_level_critical: coerce(
            "vehicles",
            name,
            "energyLevelCritical",
            &vehicle.energy_level_critical,
        )?,
        energy_level_good: coerce(
            "vehicles",
            name,
            "energyLevelGood",
            &vehicle.energy_level_good,
        )?,
        max_velocity: coerce("vehicles", name, "maxVelocity", &vehicle.max_velocity)?,
        max_reverse_velocity: coerce(
            "vehicles",
            name,
            "maxReverseVelocity",
            &vehicle.max_reverse_velocity,
        )?,
        kind: vehicle.kind.clone(),
        status: None,
    })
}

fn visual_layout_to_domain(
    key: VisualLayoutKey,
    vl: &transfer::VisualLayout,
) -> Result<datamodel::VisualLayout> {
    let name = vl.name.as_str();
    let mut model_layout_elements = Vec::with_capacity(vl.model_layout_elements.len());
    for (i, element) in vl.model_layout_elements.iter().enumerate() {
        let element_key = LayoutElementKey {
            visual_layout: key,
            element: i,
        };
        let element_name = format!("{name}/{i}");
        model_layout_elements.push(datamodel::ModelLayoutElement {
            id: None,
            visualized_object_name: element.visualized_object_name.clone(),
            layer: coerce("modelLayoutElements", &element_name, "layer", &element.layer)?,
            properties: element
                .properties
                .iter()
                .map(|p| property_to_domain(p, PropertyOwner::LayoutElement(element_key)))
                .collect(),
            visual_layout: key,
        });
    }

    Ok(datamodel::VisualLayout {
        id: None,
        name: vl.name.clone(),
        scale_x: coerce("visualLayouts", name, "scaleX", &vl.scale_x)?,
        scale_y: coerce("visualLayouts", name, "scaleY", &vl.scale_y)?,
        model_layout_elements,
        properties: vl
            .properties
            .iter()
            .map(|p| property_to_domain(p, PropertyOwner::VisualLayout(key)))
            .collect(),
    })
}

/// Builds the normalized domain graph for a transfer graph.
///
/// Either the whole graph converts or nothing does: the first malformed
/// number, dangling reference or duplicate name fails the call with an
/// `ErrorKind::Import` error. Path endpoints are copied as they are and
/// only have to be non-empty.
pub fn to_domain(plant: &transfer::PlantModel) -> Result<datamodel::Model> {
    let mut model = datamodel::Model::new(plant.version.clone(), plant.name.clone());

    model.points = plant
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| point_to_domain(PointKey(i), p))
        .collect::<Result<_>>()?;
    model.blocks = plant
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| block_to_domain(BlockKey(i), b))
        .collect();
    model.location_types = plant
        .location_types
        .iter()
        .enumerate()
        .map(|(i, lt)| location_type_to_domain(LocationTypeKey(i), lt))
        .collect();
    model.locations = plant
        .locations
        .iter()
        .enumerate()
        .map(|(i, l)| location_to_domain(LocationKey(i), l))
        .collect::<Result<_>>()?;
    model.paths = plant
        .paths
        .iter()
        .map(path_to_domain)
        .collect::<Result<_>>()?;
    model.vehicles = plant
        .vehicles
        .iter()
        .map(vehicle_to_domain)
        .collect::<Result<_>>()?;
    model.visual_layouts = plant
        .visual_layouts
        .iter()
        .enumerate()
        .map(|(i, vl)| visual_layout_to_domain(VisualLayoutKey(i), vl))
        .collect::<Result<_>>()?;

    model
        .check_integrity()
        .map_err(|violation| violation.into_error(ErrorKind::Import))?;

    debug!(
        model = %model.name,
        entities = model.entity_count(),
        "converted transfer graph to domain graph"
    );

    Ok(model)
}

impl From<&datamodel::Property> for transfer::Property {
    fn from(prop: &datamodel::Property) -> Self {
        transfer::Property {
            name: prop.name.clone(),
            value: prop.value.clone(),
        }
    }
}

impl From<&datamodel::Point> for transfer::Point {
    fn from(point: &datamodel::Point) -> Self {
        transfer::Point {
            name: point.name.clone(),
            x_position: format_optional(point.x_position),
            y_position: format_optional(point.y_position),
            z_position: format_optional(point.z_position),
            vehicle_orientation_angle: format_optional(point.vehicle_orientation_angle),
            kind: point.kind.clone(),
            outgoing_paths: point
                .outgoing_paths
                .iter()
                .map(|op| transfer::OutgoingPath {
                    name: op.name.clone(),
                })
                .collect(),
        }
    }
}

impl From<&datamodel::Path> for transfer::Path {
    fn from(path: &datamodel::Path) -> Self {
        transfer::Path {
            name: path.name.clone(),
            source_point: path.source_point.clone(),
            destination_point: path.destination_point.clone(),
            length: format_optional(path.length),
            routing_cost: format_optional(path.routing_cost),
            max_velocity: format_optional(path.max_velocity),
            max_reverse_velocity: format_optional(path.max_reverse_velocity),
            locked: path.locked,
        }
    }
}

impl From<&datamodel::Vehicle> for transfer::Vehicle {
    fn from(vehicle: &datamodel::Vehicle) -> Self {
        transfer::Vehicle {
            name: vehicle.name.clone(),
            length: format_optional(vehicle.length),
            energy_level_critical: format_optional(vehicle.energy_level_critical),
            energy_level_good: format_optional(vehicle.energy_level_good),
            max_velocity: format_optional(vehicle.max_velocity),
            max_reverse_velocity: format_optional(vehicle.max_reverse_velocity),
            kind: vehicle.kind.clone(),
        }
    }
}

impl From<&datamodel::LocationType> for transfer::LocationType {
    fn from(lt: &datamodel::LocationType) -> Self {
        transfer::LocationType {
            name: lt.name.clone(),
            allowed_operations: lt
                .allowed_operations
                .iter()
                .map(|op| transfer::AllowedOperation {
                    name: op.name.clone(),
                })
                .collect(),
            properties: lt.properties.iter().map(transfer::Property::from).collect(),
        }
    }
}

impl From<&datamodel::Location> for transfer::Location {
    fn from(location: &datamodel::Location) -> Self {
        transfer::Location {
            name: location.name.clone(),
            x_position: format_optional(location.x_position),
            y_position: format_optional(location.y_position),
            z_position: format_optional(location.z_position),
            location_type: location.location_type.clone(),
            links: location
                .links
                .iter()
                .map(|link| transfer::Link {
                    point: link.point.clone(),
                })
                .collect(),
        }
    }
}

impl From<&datamodel::Block> for transfer::Block {
    fn from(block: &datamodel::Block) -> Self {
        transfer::Block {
            name: block.name.clone(),
            members: block
                .members
                .iter()
                .map(|m| transfer::Member {
                    name: m.name.clone(),
                })
                .collect(),
        }
    }
}

impl From<&datamodel::VisualLayout> for transfer::VisualLayout {
    fn from(vl: &datamodel::VisualLayout) -> Self {
        transfer::VisualLayout {
            name: vl.name.clone(),
            scale_x: format_optional(vl.scale_x),
            scale_y: format_optional(vl.scale_y),
            model_layout_elements: vl
                .model_layout_elements
                .iter()
                .map(|el| transfer::ModelLayoutElement {
                    visualized_object_name: el.visualized_object_name.clone(),
                    layer: format_optional(el.layer),
                    properties: el.properties.iter().map(transfer::Property::from).collect(),
                })
                .collect(),
            properties: vl.properties.iter().map(transfer::Property::from).collect(),
        }
    }
}

/// Builds the transfer graph for a domain graph, in stored order.
///
/// A domain graph that violates its own invariants (for example one that
/// was edited by hand after loading) is reported as an
/// `ErrorKind::Integrity` error rather than exported.
pub fn to_transfer(model: &datamodel::Model) -> Result<transfer::PlantModel> {
    model
        .check_integrity()
        .map_err(|violation| violation.into_error(ErrorKind::Integrity))?;

    let plant = transfer::PlantModel {
        version: model.version.clone(),
        name: model.name.clone(),
        points: model.points.iter().map(transfer::Point::from).collect(),
        paths: model.paths.iter().map(transfer::Path::from).collect(),
        vehicles: model.vehicles.iter().map(transfer::Vehicle::from).collect(),
        location_types: model
            .location_types
            .iter()
            .map(transfer::LocationType::from)
            .collect(),
        locations: model.locations.iter().map(transfer::Location::from).collect(),
        blocks: model.blocks.iter().map(transfer::Block::from).collect(),
        visual_layouts: model
            .visual_layouts
            .iter()
            .map(transfer::VisualLayout::from)
            .collect(),
    };

    debug!(model = %plant.name, "converted domain graph to transfer graph");

    Ok(plant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plant_core::common::ErrorCode;

    fn text(s: &str) -> Option<String> {
        Some(s.to_owned())
    }

    fn two_point_plant() -> transfer::PlantModel {
        transfer::PlantModel {
            version: "0.0.2".to_owned(),
            name: "plant".to_owned(),
            points: vec![
                transfer::Point {
                    name: "P1".to_owned(),
                    x_position: text("0"),
                    y_position: text("0"),
                    outgoing_paths: vec![transfer::OutgoingPath {
                        name: "P1-P2".to_owned(),
                    }],
                    ..Default::default()
                },
                transfer::Point {
                    name: "P2".to_owned(),
                    x_position: text("1000"),
                    y_position: text("0"),
                    ..Default::default()
                },
            ],
            paths: vec![transfer::Path {
                name: "P1-P2".to_owned(),
                source_point: "P1".to_owned(),
                destination_point: "P2".to_owned(),
                length: text("1000"),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_two_point_scenario() {
        let plant = two_point_plant();
        let model = to_domain(&plant).unwrap();

        assert_eq!(2, model.points.len());
        let p1 = model.get_point("P1").unwrap();
        assert_eq!(Some(0), p1.x_position);
        assert_eq!(None, p1.z_position);
        assert_eq!(1, p1.outgoing_paths.len());
        assert_eq!(PointKey(0), p1.outgoing_paths[0].point);
        assert!(model.get_point("P2").unwrap().outgoing_paths.is_empty());

        let path = model.get_path("P1-P2").unwrap();
        assert_eq!(Some(1000), path.length);
        assert_eq!(None, path.routing_cost);
        assert!(!path.locked);

        assert_eq!(plant, to_transfer(&model).unwrap());
    }

    #[test]
    fn test_malformed_number_fails_whole_conversion() {
        let mut plant = two_point_plant();
        plant.points[1].y_position = text("abc");

        let err = to_domain(&plant).unwrap_err();
        assert_eq!(ErrorKind::Import, err.kind);
        assert_eq!(ErrorCode::MalformedNumber, err.code);
        let details = err.get_details().unwrap();
        assert!(details.contains("points[P2].yPosition"));
        assert!(details.contains("abc"));
    }

    #[test]
    fn test_presence_is_preserved() {
        let mut plant = two_point_plant();
        plant.points[0].z_position = text("0");
        plant.points[1].z_position = text("");

        let model = to_domain(&plant).unwrap();
        assert_eq!(Some(0), model.points[0].z_position);
        assert_eq!(None, model.points[1].z_position);

        let back = to_transfer(&model).unwrap();
        assert_eq!(text("0"), back.points[0].z_position);
        // empty text reads as unset and is written back as absent
        assert_eq!(None, back.points[1].z_position);
    }

    #[test]
    fn test_non_canonical_numbers() {
        let mut plant = two_point_plant();
        plant.paths[0].length = text("007");
        plant.points[0].vehicle_orientation_angle = text("90.0");

        let back = to_transfer(&to_domain(&plant).unwrap()).unwrap();
        assert_eq!(text("7"), back.paths[0].length);
        assert_eq!(text("90"), back.points[0].vehicle_orientation_angle);
    }

    #[test]
    fn test_single_point_path_scenario() {
        let plant = transfer::PlantModel {
            version: "0.0.2".to_owned(),
            name: "plant".to_owned(),
            points: vec![transfer::Point {
                name: "P1".to_owned(),
                x_position: text("100"),
                y_position: text("200"),
                ..Default::default()
            }],
            paths: vec![transfer::Path {
                name: "P1-P2".to_owned(),
                source_point: "P1".to_owned(),
                destination_point: "P2".to_owned(),
                length: text("1500"),
                ..Default::default()
            }],
            ..Default::default()
        };

        let model = to_domain(&plant).unwrap();
        let path = model.get_path("P1-P2").unwrap();
        assert_eq!("P2", path.destination_point);
        assert_eq!(Some(1500), path.length);
        assert_eq!(None, path.max_velocity);

        let back = to_transfer(&model).unwrap();
        let p1 = &back.points[0];
        assert_eq!("P1", p1.name);
        assert_eq!(text("100"), p1.x_position);
        assert_eq!(text("200"), p1.y_position);
        assert_eq!(None, p1.z_position);
        assert_eq!(None, p1.vehicle_orientation_angle);
        let path = &back.paths[0];
        assert_eq!("P1-P2", path.name);
        assert_eq!(text("1500"), path.length);
        assert_eq!(None, path.max_velocity);
        assert_eq!(plant, back);
    }

    #[test]
    fn test_empty_path_endpoint() {
        let mut plant = two_point_plant();
        plant.paths[0].source_point = String::new();

        let err = to_domain(&plant).unwrap_err();
        assert_eq!(ErrorKind::Import, err.kind);
        assert_eq!(ErrorCode::EmptyReference, err.code);
        assert!(err.get_details().unwrap().contains("P1-P2"));
    }

    #[test]
    fn test_unresolved_link_point() {
        let mut plant = two_point_plant();
        plant.location_types.push(transfer::LocationType {
            name: "Station".to_owned(),
            ..Default::default()
        });
        plant.locations.push(transfer::Location {
            name: "L1".to_owned(),
            location_type: "Station".to_owned(),
            links: vec![transfer::Link {
                point: "P3".to_owned(),
            }],
            ..Default::default()
        });

        let err = to_domain(&plant).unwrap_err();
        assert_eq!(ErrorKind::Import, err.kind);
        assert_eq!(ErrorCode::UnresolvedReference, err.code);
        assert!(err.get_details().unwrap().contains("P3"));
    }

    fn plant_with_layout(layer: &str, scale_x: &str) -> transfer::PlantModel {
        let mut plant = two_point_plant();
        plant.visual_layouts.push(transfer::VisualLayout {
            name: "VLayout-01".to_owned(),
            scale_x: text(scale_x),
            scale_y: text("50.0"),
            model_layout_elements: vec![transfer::ModelLayoutElement {
                visualized_object_name: text("P1"),
                layer: text(layer),
                properties: vec![],
            }],
            properties: vec![],
        });
        plant
    }

    #[test]
    fn test_malformed_layout_numbers_fail_whole_conversion() {
        assert!(to_domain(&plant_with_layout("0", "50.0")).is_ok());

        let err = to_domain(&plant_with_layout("top", "50.0")).unwrap_err();
        assert_eq!(ErrorKind::Import, err.kind);
        assert_eq!(ErrorCode::MalformedNumber, err.code);
        let details = err.get_details().unwrap();
        assert!(details.contains("modelLayoutElements[VLayout-01/0].layer"));
        assert!(details.contains("top"));

        let err = to_domain(&plant_with_layout("0", "wide")).unwrap_err();
        assert_eq!(ErrorCode::MalformedNumber, err.code);
        assert!(err.get_details().unwrap().contains("visualLayouts[VLayout-01].scaleX"));
    }

    #[test]
    fn test_duplicate_point_name() {
        let mut plant = two_point_plant();
        plant.points[1].name = "P1".to_owned();

        let err = to_domain(&plant).unwrap_err();
        assert_eq!(ErrorCode::DuplicateName, err.code);
    }

    #[test]
    fn test_energy_levels_are_independent() {
        let mut plant = two_point_plant();
        plant.vehicles.push(transfer::Vehicle {
            name: "V1".to_owned(),
            length: text("1000"),
            energy_level_critical: text("30"),
            energy_level_good: text("90"),
            max_velocity: text("1500"),
            max_reverse_velocity: text("750"),
            kind: None,
        });

        let model = to_domain(&plant).unwrap();
        let vehicle = model.get_vehicle("V1").unwrap();
        assert_eq!(Some(30), vehicle.energy_level_critical);
        assert_eq!(Some(90), vehicle.energy_level_good);
        assert_eq!(Some(1500), vehicle.max_velocity);
        assert_eq!(plant, to_transfer(&model).unwrap());
    }

    #[test]
    fn test_vehicle_velocity_range() {
        let mut plant = two_point_plant();
        plant.vehicles.push(transfer::Vehicle {
            name: "V1".to_owned(),
            max_velocity: text("3000000000"),
            ..Default::default()
        });

        let err = to_domain(&plant).unwrap_err();
        assert_eq!(ErrorCode::MalformedNumber, err.code);
        assert!(err.get_details().unwrap().contains("vehicles[V1].maxVelocity"));
    }

    #[test]
    fn test_back_references() {
        let plant = transfer::PlantModel {
            location_types: vec![transfer::LocationType {
                name: "Station".to_owned(),
                allowed_operations: vec![transfer::AllowedOperation {
                    name: "LOAD".to_owned(),
                }],
                properties: vec![transfer::Property {
                    name: "color".to_owned(),
                    value: "red".to_owned(),
                }],
            }],
            locations: vec![transfer::Location {
                name: "L1".to_owned(),
                location_type: "Station".to_owned(),
                links: vec![transfer::Link {
                    point: "P1".to_owned(),
                }],
                ..Default::default()
            }],
            blocks: vec![transfer::Block {
                name: "B1".to_owned(),
                members: vec![
                    transfer::Member {
                        name: "P1".to_owned(),
                    },
                    transfer::Member {
                        name: "L1".to_owned(),
                    },
                ],
            }],
            visual_layouts: vec![transfer::VisualLayout {
                name: "VLayout-1".to_owned(),
                scale_x: text("50.0"),
                scale_y: text("50.0"),
                model_layout_elements: vec![transfer::ModelLayoutElement {
                    visualized_object_name: text("L1 --- P1"),
                    layer: text("0"),
                    properties: vec![transfer::Property {
                        name: "LINK_LABEL".to_owned(),
                        value: "".to_owned(),
                    }],
                }],
                properties: vec![],
            }],
            ..two_point_plant()
        };

        let model = to_domain(&plant).unwrap();

        let lt = &model.location_types[0];
        assert_eq!(LocationTypeKey(0), lt.allowed_operations[0].location_type);
        assert_eq!(PropertyOwner::LocationType(LocationTypeKey(0)), lt.properties[0].owner);
        assert_eq!(LocationKey(0), model.locations[0].links[0].location);
        assert!(model.blocks[0].members.iter().all(|m| m.block == BlockKey(0)));

        let element = &model.visual_layouts[0].model_layout_elements[0];
        assert_eq!(VisualLayoutKey(0), element.visual_layout);
        assert_eq!(
            PropertyOwner::LayoutElement(LayoutElementKey {
                visual_layout: VisualLayoutKey(0),
                element: 0,
            }),
            element.properties[0].owner
        );
        assert_eq!(Some(50.0), model.visual_layouts[0].scale_x);
    }

    #[test]
    fn test_export_rejects_broken_graph() {
        let mut model = to_domain(&two_point_plant()).unwrap();
        model.points[0].outgoing_paths[0].point = PointKey(1);

        let err = to_transfer(&model).unwrap_err();
        assert_eq!(ErrorKind::Integrity, err.kind);
        assert_eq!(ErrorCode::BrokenBackReference, err.code);
    }
}
