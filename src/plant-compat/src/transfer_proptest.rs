// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for the transfer graph using proptest.
//!
//! These tests verify that:
//! 1. Well-formed transfer graphs survive transfer -> domain -> transfer unchanged
//! 2. The XML writer and reader roundtrip generated graphs
//! 3. Back references always agree with containment after conversion

use proptest::prelude::*;

use crate::convert::{to_domain, to_transfer};
use crate::transfer::*;

// Numeric text in the canonical form the writer produces

fn long_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(any::<i64>().prop_map(|n| n.to_string()))
}

fn int_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(any::<i32>().prop_map(|n| n.to_string()))
}

fn float_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        (-3600i32..3600).prop_map(|x| (x as f32 / 10.0).to_string()),
        (1i32..200).prop_map(|x| (x as f32 * 0.25).to_string()),
    ])
}

fn kind_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop_oneof![
        Just("HALT_POSITION".to_string()),
        Just("PARK_POSITION".to_string()),
        Just("REPORT_POSITION".to_string()),
    ])
}

fn property_strategy() -> impl Strategy<Value = Property> {
    ("[A-Za-z_]{1,10}", "[A-Za-z0-9 ]{0,12}").prop_map(|(name, value)| Property { name, value })
}

/// Distinct names for `n` entities of one kind.
fn names(prefix: &'static str, n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("{prefix}{i}")).collect()
}

// Whole-graph strategy: names are generated by index so that every
// reference can be drawn from the set of names that actually exist.

prop_compose! {
    fn plant_strategy()(
        n_points in 1usize..6,
        n_locations in 0usize..3,
    )(
        point_attrs in prop::collection::vec(
            (long_text(), long_text(), long_text(), float_text(), kind_strategy()),
            n_points,
        ),
        path_ends in prop::collection::vec((0..n_points, 0..n_points), 0..6),
        path_attrs in prop::collection::vec(
            (long_text(), long_text(), long_text(), long_text(), any::<bool>()),
            6,
        ),
        outgoing in prop::collection::vec(prop::collection::vec(0usize..6, 0..3), n_points),
        location_attrs in prop::collection::vec(
            (long_text(), long_text(), prop::collection::vec(0..n_points, 0..3)),
            n_locations,
        ),
        lt_props in prop::collection::vec(property_strategy(), 0..3),
        vehicles in prop::collection::vec(
            (long_text(), long_text(), long_text(), int_text(), int_text()),
            0..3,
        ),
        members in prop::collection::vec(0..n_points, 0..4),
        scale in (float_text(), float_text()),
        layers in prop::collection::vec((0..n_points, long_text(), prop::collection::vec(property_strategy(), 0..2)), 0..4),
        n_points in Just(n_points),
        n_locations in Just(n_locations),
    ) -> PlantModel {
        let point_names = names("P", n_points);
        let paths: Vec<Path> = path_ends
            .iter()
            .zip(path_attrs.iter())
            .enumerate()
            .map(|(i, ((src, dst), (length, cost, max, max_rev, locked)))| Path {
                name: format!("path{i}"),
                source_point: point_names[*src].clone(),
                destination_point: point_names[*dst].clone(),
                length: length.clone(),
                routing_cost: cost.clone(),
                max_velocity: max.clone(),
                max_reverse_velocity: max_rev.clone(),
                locked: *locked,
            })
            .collect();

        let points = point_attrs
            .into_iter()
            .zip(outgoing)
            .enumerate()
            .map(|(i, ((x, y, z, angle, kind), out))| Point {
                name: point_names[i].clone(),
                x_position: x,
                y_position: y,
                z_position: z,
                vehicle_orientation_angle: angle,
                kind,
                outgoing_paths: out
                    .into_iter()
                    .filter(|&p| p < paths.len())
                    .map(|p| OutgoingPath { name: paths[p].name.clone() })
                    .collect(),
            })
            .collect();

        let location_types = if n_locations > 0 {
            vec![LocationType {
                name: "Station".to_string(),
                allowed_operations: vec![AllowedOperation { name: "LOAD".to_string() }],
                properties: lt_props,
            }]
        } else {
            vec![]
        };

        let locations = location_attrs
            .into_iter()
            .enumerate()
            .map(|(i, (x, y, links))| Location {
                name: format!("L{}", i + 1),
                x_position: x,
                y_position: y,
                z_position: None,
                location_type: "Station".to_string(),
                links: links
                    .into_iter()
                    .map(|p| Link { point: point_names[p].clone() })
                    .collect(),
            })
            .collect();

        let vehicles = vehicles
            .into_iter()
            .enumerate()
            .map(|(i, (length, critical, good, max, max_rev))| Vehicle {
                name: format!("V{}", i + 1),
                length,
                energy_level_critical: critical,
                energy_level_good: good,
                max_velocity: max,
                max_reverse_velocity: max_rev,
                kind: None,
            })
            .collect();

        let blocks = vec![Block {
            name: "B1".to_string(),
            members: members
                .into_iter()
                .map(|p| Member { name: point_names[p].clone() })
                .collect(),
        }];

        let visual_layouts = vec![VisualLayout {
            name: "VLayout-1".to_string(),
            scale_x: scale.0,
            scale_y: scale.1,
            model_layout_elements: layers
                .into_iter()
                .map(|(p, layer, properties)| ModelLayoutElement {
                    visualized_object_name: Some(point_names[p].clone()),
                    layer,
                    properties,
                })
                .collect(),
            properties: vec![],
        }];

        PlantModel {
            version: "0.0.2".to_string(),
            name: "generated".to_string(),
            points,
            paths,
            vehicles,
            location_types,
            locations,
            blocks,
            visual_layouts,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn transfer_domain_roundtrip(plant in plant_strategy()) {
        let model = to_domain(&plant).unwrap();
        prop_assert_eq!(plant, to_transfer(&model).unwrap());
    }

    #[test]
    fn xml_roundtrip(plant in plant_strategy()) {
        let xml = plant_model_to_xml(&plant).unwrap();
        let reread = open_plant_model(&mut xml.as_bytes()).unwrap();
        prop_assert_eq!(plant, reread);
    }

    #[test]
    fn back_references_agree_with_containment(plant in plant_strategy()) {
        let model = to_domain(&plant).unwrap();
        prop_assert!(model.check_back_references().is_ok());
        for (i, point) in model.points.iter().enumerate() {
            prop_assert!(point.outgoing_paths.iter().all(|op| op.point.index() == i));
        }
        for (i, location) in model.locations.iter().enumerate() {
            prop_assert!(location.links.iter().all(|l| l.location.index() == i));
        }
    }
}
