// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Structural checks over a whole `Model`.
//!
//! A graph passes when names are unique per entity kind, location types,
//! link points and layout element names resolve to an entity of the right
//! kind, path endpoints are non-empty, and every back reference points at
//! the collection that actually contains it.

use std::collections::HashSet;
use std::fmt;

use crate::common::{Error, ErrorCode, ErrorKind};
use crate::datamodel::{
    BlockKey, LayoutElementKey, LocationKey, LocationTypeKey, Model, PointKey, PropertyOwner,
    VisualLayoutKey,
};

/// Separator between location and point in the name of a link, as used by
/// layout elements that visualize links.
pub const LINK_NAME_SEPARATOR: &str = " --- ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub code: ErrorCode,
    pub details: String,
}

impl IntegrityViolation {
    fn new(code: ErrorCode, details: String) -> Self {
        IntegrityViolation { code, details }
    }

    pub fn into_error(self, kind: ErrorKind) -> Error {
        Error::new(kind, self.code, Some(self.details))
    }
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.details)
    }
}

type CheckResult = std::result::Result<(), IntegrityViolation>;

fn unique_names<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> CheckResult {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(IntegrityViolation::new(
                ErrorCode::DuplicateName,
                format!("{kind} '{name}' is defined more than once"),
            ));
        }
    }
    Ok(())
}

fn unresolved(from: String, target_kind: &str, target: &str) -> IntegrityViolation {
    IntegrityViolation::new(
        ErrorCode::UnresolvedReference,
        format!("{from} refers to {target_kind} '{target}', which doesn't exist"),
    )
}

fn broken(entity: String, expected: impl fmt::Debug, actual: impl fmt::Debug) -> IntegrityViolation {
    IntegrityViolation::new(
        ErrorCode::BrokenBackReference,
        format!("{entity} has owner {actual:?} but is contained in {expected:?}"),
    )
}

fn check_property_owners(model: &Model, what: &str, owner: PropertyOwner) -> CheckResult {
    let props = model.properties_of(owner).unwrap_or_default();
    for prop in props.iter() {
        if prop.owner != owner {
            return Err(broken(
                format!("property '{}' of {what}", prop.name),
                owner,
                prop.owner,
            ));
        }
    }
    Ok(())
}

/// Name tables for reference resolution.
struct Names<'a> {
    points: HashSet<&'a str>,
    paths: HashSet<&'a str>,
    locations: HashSet<&'a str>,
    location_types: HashSet<&'a str>,
    blocks: HashSet<&'a str>,
    vehicles: HashSet<&'a str>,
    links: HashSet<String>,
}

impl<'a> Names<'a> {
    fn new(model: &'a Model) -> Self {
        Names {
            points: model.points.iter().map(|p| p.name.as_str()).collect(),
            paths: model.paths.iter().map(|p| p.name.as_str()).collect(),
            locations: model.locations.iter().map(|l| l.name.as_str()).collect(),
            location_types: model
                .location_types
                .iter()
                .map(|lt| lt.name.as_str())
                .collect(),
            blocks: model.blocks.iter().map(|b| b.name.as_str()).collect(),
            vehicles: model.vehicles.iter().map(|v| v.name.as_str()).collect(),
            links: model
                .locations
                .iter()
                .flat_map(|l| {
                    l.links
                        .iter()
                        .map(move |link| format!("{}{LINK_NAME_SEPARATOR}{}", l.name, link.point))
                })
                .collect(),
        }
    }

    fn is_visualizable(&self, name: &str) -> bool {
        self.points.contains(name)
            || self.paths.contains(name)
            || self.locations.contains(name)
            || self.location_types.contains(name)
            || self.blocks.contains(name)
            || self.vehicles.contains(name)
            || self.links.contains(name)
    }

}

impl Model {
    /// Verifies the structural invariants of the graph, reporting the
    /// first violation found.
    pub fn check_integrity(&self) -> CheckResult {
        self.check_unique_names()?;
        self.check_back_references()?;
        self.check_references()
    }

    fn check_unique_names(&self) -> CheckResult {
        unique_names("point", self.points.iter().map(|p| p.name.as_str()))?;
        unique_names("path", self.paths.iter().map(|p| p.name.as_str()))?;
        unique_names("vehicle", self.vehicles.iter().map(|v| v.name.as_str()))?;
        unique_names(
            "location type",
            self.location_types.iter().map(|lt| lt.name.as_str()),
        )?;
        unique_names("location", self.locations.iter().map(|l| l.name.as_str()))?;
        unique_names("block", self.blocks.iter().map(|b| b.name.as_str()))?;
        unique_names(
            "visual layout",
            self.visual_layouts.iter().map(|vl| vl.name.as_str()),
        )
    }

    pub fn check_back_references(&self) -> CheckResult {
        for (i, point) in self.points.iter().enumerate() {
            let key = PointKey(i);
            for op in point.outgoing_paths.iter() {
                if op.point != key {
                    return Err(broken(
                        format!("outgoing path '{}' of point '{}'", op.name, point.name),
                        key,
                        op.point,
                    ));
                }
            }
        }

        for (i, block) in self.blocks.iter().enumerate() {
            let key = BlockKey(i);
            for member in block.members.iter() {
                if member.block != key {
                    return Err(broken(
                        format!("member '{}' of block '{}'", member.name, block.name),
                        key,
                        member.block,
                    ));
                }
            }
        }

        for (i, lt) in self.location_types.iter().enumerate() {
            let key = LocationTypeKey(i);
            for op in lt.allowed_operations.iter() {
                if op.location_type != key {
                    return Err(broken(
                        format!("operation '{}' of location type '{}'", op.name, lt.name),
                        key,
                        op.location_type,
                    ));
                }
            }
            check_property_owners(
                self,
                &format!("location type '{}'", lt.name),
                PropertyOwner::LocationType(key),
            )?;
        }

        for (i, location) in self.locations.iter().enumerate() {
            let key = LocationKey(i);
            for link in location.links.iter() {
                if link.location != key {
                    return Err(broken(
                        format!("link to '{}' of location '{}'", link.point, location.name),
                        key,
                        link.location,
                    ));
                }
            }
        }

        for (i, vl) in self.visual_layouts.iter().enumerate() {
            let key = VisualLayoutKey(i);
            check_property_owners(
                self,
                &format!("visual layout '{}'", vl.name),
                PropertyOwner::VisualLayout(key),
            )?;
            for (j, element) in vl.model_layout_elements.iter().enumerate() {
                let what = format!(
                    "layout element {} of visual layout '{}'",
                    j,
                    vl.name
                );
                if element.visual_layout != key {
                    return Err(broken(what, key, element.visual_layout));
                }
                let element_key = LayoutElementKey {
                    visual_layout: key,
                    element: j,
                };
                check_property_owners(self, &what, PropertyOwner::LayoutElement(element_key))?;
            }
        }

        Ok(())
    }

    fn check_references(&self) -> CheckResult {
        let names = Names::new(self);

        for location in self.locations.iter() {
            if location.location_type.is_empty() {
                return Err(IntegrityViolation::new(
                    ErrorCode::EmptyReference,
                    format!("location '{}' has no location type", location.name),
                ));
            }
            if !names.location_types.contains(location.location_type.as_str()) {
                return Err(unresolved(
                    format!("location '{}'", location.name),
                    "location type",
                    &location.location_type,
                ));
            }
            for link in location.links.iter() {
                if !names.points.contains(link.point.as_str()) {
                    return Err(unresolved(
                        format!("link of location '{}'", location.name),
                        "point",
                        &link.point,
                    ));
                }
            }
        }

        for path in self.paths.iter() {
            for (end, point) in [
                ("source", &path.source_point),
                ("destination", &path.destination_point),
            ] {
                // endpoints are resolved by whoever routes over the path
                if point.is_empty() {
                    return Err(IntegrityViolation::new(
                        ErrorCode::EmptyReference,
                        format!("path '{}' has no {end} point", path.name),
                    ));
                }
            }
        }

        for vl in self.visual_layouts.iter() {
            for element in vl.model_layout_elements.iter() {
                match element.visualized_object_name.as_deref() {
                    None | Some("") => {}
                    Some(name) => {
                        if !names.is_visualizable(name) {
                            return Err(unresolved(
                                format!("layout element of visual layout '{}'", vl.name),
                                "model object",
                                name,
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
