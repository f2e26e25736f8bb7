// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! SQLite gateway: one table per entity kind, children pointing at their
//! owner through a foreign key. Numeric attributes are TEXT columns
//! holding the canonical decimal form, so NULL keeps meaning "unset".

use std::collections::HashMap;
use std::path::Path;

use plant_core::coerce::{Numeric, format_optional, parse_optional};
use plant_core::common::{Error, ErrorCode, ErrorKind, Result};
use plant_core::datamodel::{
    AllowedOperation, Block, BlockKey, EntityId, LayoutElementKey, Link, Location, LocationKey,
    LocationType, LocationTypeKey, Member, Model, ModelLayoutElement, OutgoingPath, Point,
    PointKey, Property, PropertyOwner, Vehicle, VehicleStatus, VisualLayout, VisualLayoutKey,
};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use tracing::{debug, info};

use crate::{MODEL_ID, PlantModelStore, check_before_store};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS model (
        id INTEGER PRIMARY KEY,
        version TEXT NOT NULL,
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS point (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL,
        x_position TEXT,
        y_position TEXT,
        z_position TEXT,
        vehicle_orientation_angle TEXT,
        type TEXT
    );

    CREATE TABLE IF NOT EXISTS outgoing_path (
        id INTEGER PRIMARY KEY,
        point_id INTEGER NOT NULL REFERENCES point(id),
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS block (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS member (
        id INTEGER PRIMARY KEY,
        block_id INTEGER NOT NULL REFERENCES block(id),
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS location_type (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS allowed_operation (
        id INTEGER PRIMARY KEY,
        location_type_id INTEGER NOT NULL REFERENCES location_type(id),
        name TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS location (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL,
        x_position TEXT,
        y_position TEXT,
        z_position TEXT,
        type TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS link (
        id INTEGER PRIMARY KEY,
        location_id INTEGER NOT NULL REFERENCES location(id),
        point TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS path (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL,
        source_point TEXT NOT NULL,
        destination_point TEXT NOT NULL,
        length TEXT,
        routing_cost TEXT,
        max_velocity TEXT,
        max_reverse_velocity TEXT,
        locked INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS vehicle (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL,
        length TEXT,
        energy_level_critical TEXT,
        energy_level_good TEXT,
        max_velocity TEXT,
        max_reverse_velocity TEXT,
        type TEXT
    );

    CREATE TABLE IF NOT EXISTS visual_layout (
        id INTEGER PRIMARY KEY,
        model_id INTEGER NOT NULL REFERENCES model(id),
        name TEXT NOT NULL,
        scale_x TEXT,
        scale_y TEXT
    );

    CREATE TABLE IF NOT EXISTS model_layout_element (
        id INTEGER PRIMARY KEY,
        visual_layout_id INTEGER NOT NULL REFERENCES visual_layout(id),
        visualized_object_name TEXT,
        layer TEXT
    );

    CREATE TABLE IF NOT EXISTS property (
        id INTEGER PRIMARY KEY,
        location_type_id INTEGER REFERENCES location_type(id),
        model_layout_element_id INTEGER REFERENCES model_layout_element(id),
        visual_layout_id INTEGER REFERENCES visual_layout(id),
        name TEXT NOT NULL,
        value TEXT NOT NULL,
        CHECK ((location_type_id IS NOT NULL)
             + (model_layout_element_id IS NOT NULL)
             + (visual_layout_id IS NOT NULL) = 1)
    );

    CREATE INDEX IF NOT EXISTS idx_vehicle_name ON vehicle(name);
";

// children before parents, so foreign keys hold at every step
const CLEAR_ORDER: &[&str] = &[
    "vehicle_status",
    "property",
    "model_layout_element",
    "visual_layout",
    "vehicle",
    "path",
    "link",
    "location",
    "allowed_operation",
    "location_type",
    "member",
    "block",
    "outgoing_path",
    "point",
    "model",
];

fn db_error(kind: ErrorKind) -> impl Fn(rusqlite::Error) -> Error {
    move |err| Error::new(kind, ErrorCode::Database, Some(err.to_string()))
}

fn status_columns() -> Vec<&'static str> {
    VehicleStatus::default()
        .fields()
        .iter()
        .map(|(name, _)| *name)
        .collect()
}

fn status_schema() -> String {
    let columns: Vec<String> = status_columns()
        .iter()
        .map(|name| format!("{name} TEXT"))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS vehicle_status (
            vehicle_id INTEGER PRIMARY KEY REFERENCES vehicle(id),
            {}
        );",
        columns.join(",\n            ")
    )
}

/// Parses a TEXT column read back from the database.
fn column<T: Numeric>(table: &str, name: &str, column: &str, text: Option<String>) -> Result<Option<T>> {
    parse_optional(column, text.as_deref())
        .map_err(|err| err.in_field(format!("{table}[{name}].{column}")).into_error(ErrorKind::Load))
}

fn query_rows<T, F>(conn: &Connection, sql: &str, f: F) -> Result<Vec<T>>
where
    F: FnMut(&Row) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(db_error(ErrorKind::Load))?;
    let rows = stmt
        .query_map([], f)
        .map_err(db_error(ErrorKind::Load))?
        .collect::<rusqlite::Result<Vec<T>>>()
        .map_err(db_error(ErrorKind::Load))?;
    Ok(rows)
}

/// Looks up the collection index of the owner a child row points at.
fn owner_key<K: Copy>(ids: &HashMap<EntityId, K>, table: &str, owner_id: EntityId) -> Result<K> {
    match ids.get(&owner_id) {
        Some(key) => Ok(*key),
        None => plant_core::load_err!(
            BrokenBackReference,
            format!("{table} row refers to missing owner {owner_id}")
        ),
    }
}

/// `(id, name)` of an entity owned directly by the model.
fn named_row(row: &Row) -> rusqlite::Result<(EntityId, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

/// `(id, owner id, name)` of a nested entity.
fn child_row(row: &Row) -> rusqlite::Result<(EntityId, EntityId, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn read_status(row: &Row, offset: usize) -> rusqlite::Result<VehicleStatus> {
    let mut values: [Option<String>; 19] = Default::default();
    for (i, value) in values.iter_mut().enumerate() {
        *value = row.get(offset + i)?;
    }
    Ok(VehicleStatus::from_fields(values))
}

fn write_status(tx: &Transaction, vehicle_id: EntityId, status: &VehicleStatus) -> Result<()> {
    let columns = status_columns();
    let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT OR REPLACE INTO vehicle_status (vehicle_id, {}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let fields = status.fields();
    let mut values: Vec<&dyn ToSql> = Vec::with_capacity(fields.len() + 1);
    values.push(&vehicle_id);
    for (_, value) in fields.iter() {
        values.push(*value);
    }

    tx.execute(&sql, values.as_slice())
        .map_err(db_error(ErrorKind::Store))?;
    Ok(())
}

/// A gateway backed by a SQLite database file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path).map_err(db_error(ErrorKind::Store))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error(ErrorKind::Store))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_error(ErrorKind::Store))?;
        conn.execute_batch(&status_schema())
            .map_err(db_error(ErrorKind::Store))?;
        Ok(SqliteStore { conn })
    }

    fn insert_model(tx: &Transaction, model: &Model) -> Result<()> {
        let err = db_error(ErrorKind::Store);

        tx.execute(
            "INSERT INTO model (id, version, name) VALUES (?1, ?2, ?3)",
            params![MODEL_ID, model.version, model.name],
        )
        .map_err(&err)?;

        for point in model.points.iter() {
            tx.execute(
                "INSERT INTO point (model_id, name, x_position, y_position, z_position,
                                    vehicle_orientation_angle, type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    MODEL_ID,
                    point.name,
                    format_optional(point.x_position),
                    format_optional(point.y_position),
                    format_optional(point.z_position),
                    format_optional(point.vehicle_orientation_angle),
                    point.kind,
                ],
            )
            .map_err(&err)?;
            let point_id = tx.last_insert_rowid();
            for op in point.outgoing_paths.iter() {
                tx.execute(
                    "INSERT INTO outgoing_path (point_id, name) VALUES (?1, ?2)",
                    params![point_id, op.name],
                )
                .map_err(&err)?;
            }
        }

        for block in model.blocks.iter() {
            tx.execute(
                "INSERT INTO block (model_id, name) VALUES (?1, ?2)",
                params![MODEL_ID, block.name],
            )
            .map_err(&err)?;
            let block_id = tx.last_insert_rowid();
            for member in block.members.iter() {
                tx.execute(
                    "INSERT INTO member (block_id, name) VALUES (?1, ?2)",
                    params![block_id, member.name],
                )
                .map_err(&err)?;
            }
        }

        for lt in model.location_types.iter() {
            tx.execute(
                "INSERT INTO location_type (model_id, name) VALUES (?1, ?2)",
                params![MODEL_ID, lt.name],
            )
            .map_err(&err)?;
            let lt_id = tx.last_insert_rowid();
            for op in lt.allowed_operations.iter() {
                tx.execute(
                    "INSERT INTO allowed_operation (location_type_id, name) VALUES (?1, ?2)",
                    params![lt_id, op.name],
                )
                .map_err(&err)?;
            }
            for prop in lt.properties.iter() {
                tx.execute(
                    "INSERT INTO property (location_type_id, name, value) VALUES (?1, ?2, ?3)",
                    params![lt_id, prop.name, prop.value],
                )
                .map_err(&err)?;
            }
        }

        for location in model.locations.iter() {
            tx.execute(
                "INSERT INTO location (model_id, name, x_position, y_position, z_position, type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    MODEL_ID,
                    location.name,
                    format_optional(location.x_position),
                    format_optional(location.y_position),
                    format_optional(location.z_position),
                    location.location_type,
                ],
            )
            .map_err(&err)?;
            let location_id = tx.last_insert_rowid();
            for link in location.links.iter() {
                tx.execute(
                    "INSERT INTO link (location_id, point) VALUES (?1, ?2)",
                    params![location_id, link.point],
                )
                .map_err(&err)?;
            }
        }

        for path in model.paths.iter() {
            tx.execute(
                "INSERT INTO path (model_id, name, source_point, destination_point, length,
                                   routing_cost, max_velocity, max_reverse_velocity, locked)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    MODEL_ID,
                    path.name,
                    path.source_point,
                    path.destination_point,
                    format_optional(path.length),
                    format_optional(path.routing_cost),
                    format_optional(path.max_velocity),
                    format_optional(path.max_reverse_velocity),
                    path.locked,
                ],
            )
            .map_err(&err)?;
        }

        for vehicle in model.vehicles.iter() {
            tx.execute(
                "INSERT INTO vehicle (model_id, name, length, energy_level_critical,
                                      energy_level_good, max_velocity, max_reverse_velocity, type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    MODEL_ID,
                    vehicle.name,
                    format_optional(vehicle.length),
                    format_optional(vehicle.energy_level_critical),
                    format_optional(vehicle.energy_level_good),
                    format_optional(vehicle.max_velocity),
                    format_optional(vehicle.max_reverse_velocity),
                    vehicle.kind,
                ],
            )
            .map_err(&err)?;
            if let Some(ref status) = vehicle.status {
                write_status(tx, tx.last_insert_rowid(), status)?;
            }
        }

        for vl in model.visual_layouts.iter() {
            tx.execute(
                "INSERT INTO visual_layout (model_id, name, scale_x, scale_y)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    MODEL_ID,
                    vl.name,
                    format_optional(vl.scale_x),
                    format_optional(vl.scale_y),
                ],
            )
            .map_err(&err)?;
            let vl_id = tx.last_insert_rowid();
            for element in vl.model_layout_elements.iter() {
                tx.execute(
                    "INSERT INTO model_layout_element (visual_layout_id, visualized_object_name, layer)
                     VALUES (?1, ?2, ?3)",
                    params![
                        vl_id,
                        element.visualized_object_name,
                        format_optional(element.layer),
                    ],
                )
                .map_err(&err)?;
                let element_id = tx.last_insert_rowid();
                for prop in element.properties.iter() {
                    tx.execute(
                        "INSERT INTO property (model_layout_element_id, name, value)
                         VALUES (?1, ?2, ?3)",
                        params![element_id, prop.name, prop.value],
                    )
                    .map_err(&err)?;
                }
            }
            for prop in vl.properties.iter() {
                tx.execute(
                    "INSERT INTO property (visual_layout_id, name, value) VALUES (?1, ?2, ?3)",
                    params![vl_id, prop.name, prop.value],
                )
                .map_err(&err)?;
            }
        }

        Ok(())
    }

    fn load_points(&self, model: &mut Model) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, name, x_position, y_position, z_position, vehicle_orientation_angle, type
             FROM point ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?;

        let mut ids = HashMap::new();
        for (i, (id, name, x, y, z, angle, kind)) in rows.into_iter().enumerate() {
            ids.insert(id, PointKey(i));
            model.points.push(Point {
                id: Some(id),
                x_position: column("point", &name, "x_position", x)?,
                y_position: column("point", &name, "y_position", y)?,
                z_position: column("point", &name, "z_position", z)?,
                vehicle_orientation_angle: column("point", &name, "vehicle_orientation_angle", angle)?,
                kind,
                outgoing_paths: vec![],
                name,
            });
        }

        let rows = query_rows(
            &self.conn,
            "SELECT id, point_id, name FROM outgoing_path ORDER BY id",
            child_row,
        )?;
        for (id, point_id, name) in rows {
            let key = owner_key(&ids, "outgoing_path", point_id)?;
            model.points[key.index()].outgoing_paths.push(OutgoingPath {
                id: Some(id),
                name,
                point: key,
            });
        }
        Ok(())
    }

    fn load_blocks(&self, model: &mut Model) -> Result<()> {
        let rows = query_rows(&self.conn, "SELECT id, name FROM block ORDER BY id", named_row)?;
        let mut ids = HashMap::new();
        for (i, (id, name)) in rows.into_iter().enumerate() {
            ids.insert(id, BlockKey(i));
            model.blocks.push(Block {
                id: Some(id),
                name,
                members: vec![],
            });
        }

        let rows = query_rows(
            &self.conn,
            "SELECT id, block_id, name FROM member ORDER BY id",
            child_row,
        )?;
        for (id, block_id, name) in rows {
            let key = owner_key(&ids, "member", block_id)?;
            model.blocks[key.index()].members.push(Member {
                id: Some(id),
                name,
                block: key,
            });
        }
        Ok(())
    }

    fn load_location_types(&self, model: &mut Model) -> Result<HashMap<EntityId, LocationTypeKey>> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, name FROM location_type ORDER BY id",
            named_row,
        )?;
        let mut ids = HashMap::new();
        for (i, (id, name)) in rows.into_iter().enumerate() {
            ids.insert(id, LocationTypeKey(i));
            model.location_types.push(LocationType {
                id: Some(id),
                name,
                allowed_operations: vec![],
                properties: vec![],
            });
        }

        let rows = query_rows(
            &self.conn,
            "SELECT id, location_type_id, name FROM allowed_operation ORDER BY id",
            child_row,
        )?;
        for (id, lt_id, name) in rows {
            let key = owner_key(&ids, "allowed_operation", lt_id)?;
            model.location_types[key.index()]
                .allowed_operations
                .push(AllowedOperation {
                    id: Some(id),
                    name,
                    location_type: key,
                });
        }
        Ok(ids)
    }

    fn load_locations(&self, model: &mut Model) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, name, x_position, y_position, z_position, type FROM location ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )?;
        let mut ids = HashMap::new();
        for (i, (id, name, x, y, z, location_type)) in rows.into_iter().enumerate() {
            ids.insert(id, LocationKey(i));
            model.locations.push(Location {
                id: Some(id),
                x_position: column("location", &name, "x_position", x)?,
                y_position: column("location", &name, "y_position", y)?,
                z_position: column("location", &name, "z_position", z)?,
                name,
                location_type,
                links: vec![],
            });
        }

        let rows = query_rows(
            &self.conn,
            "SELECT id, location_id, point FROM link ORDER BY id",
            child_row,
        )?;
        for (id, location_id, point) in rows {
            let key = owner_key(&ids, "link", location_id)?;
            model.locations[key.index()].links.push(Link {
                id: Some(id),
                point,
                location: key,
            });
        }
        Ok(())
    }

    fn load_paths(&self, model: &mut Model) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, name, source_point, destination_point, length, routing_cost,
                    max_velocity, max_reverse_velocity, locked
             FROM path ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, bool>(8)?,
                ))
            },
        )?;
        for (id, name, source_point, destination_point, length, cost, max, max_rev, locked) in rows
        {
            model.paths.push(plant_core::datamodel::Path {
                id: Some(id),
                length: column("path", &name, "length", length)?,
                routing_cost: column("path", &name, "routing_cost", cost)?,
                max_velocity: column("path", &name, "max_velocity", max)?,
                max_reverse_velocity: column("path", &name, "max_reverse_velocity", max_rev)?,
                name,
                source_point,
                destination_point,
                locked,
            });
        }
        Ok(())
    }

    fn load_vehicles(&self, model: &mut Model) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            &format!("SELECT {} FROM vehicle ORDER BY id", RawVehicle::COLUMNS),
            RawVehicle::from_row,
        )?;
        let mut ids = HashMap::new();
        for (i, raw) in rows.into_iter().enumerate() {
            ids.insert(raw.id, i);
            model.vehicles.push(raw.into_vehicle()?);
        }

        let sql = format!(
            "SELECT vehicle_id, {} FROM vehicle_status ORDER BY vehicle_id",
            status_columns().join(", ")
        );
        let rows = query_rows(&self.conn, &sql, |row| {
            Ok((row.get::<_, EntityId>(0)?, read_status(row, 1)?))
        })?;
        for (vehicle_id, status) in rows {
            let i = owner_key(&ids, "vehicle_status", vehicle_id)?;
            model.vehicles[i].status = Some(status);
        }
        Ok(())
    }

    fn load_visual_layouts(
        &self,
        model: &mut Model,
        location_types: &HashMap<EntityId, LocationTypeKey>,
    ) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, name, scale_x, scale_y FROM visual_layout ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?;
        let mut ids = HashMap::new();
        for (i, (id, name, scale_x, scale_y)) in rows.into_iter().enumerate() {
            ids.insert(id, VisualLayoutKey(i));
            model.visual_layouts.push(VisualLayout {
                id: Some(id),
                scale_x: column("visual_layout", &name, "scale_x", scale_x)?,
                scale_y: column("visual_layout", &name, "scale_y", scale_y)?,
                name,
                model_layout_elements: vec![],
                properties: vec![],
            });
        }

        let rows = query_rows(
            &self.conn,
            "SELECT id, visual_layout_id, visualized_object_name, layer
             FROM model_layout_element ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, EntityId>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )?;
        let mut element_ids = HashMap::new();
        for (id, vl_id, visualized_object_name, layer) in rows {
            let key = owner_key(&ids, "model_layout_element", vl_id)?;
            let elements = &mut model.visual_layouts[key.index()].model_layout_elements;
            element_ids.insert(
                id,
                LayoutElementKey {
                    visual_layout: key,
                    element: elements.len(),
                },
            );
            elements.push(ModelLayoutElement {
                id: Some(id),
                visualized_object_name,
                layer: column("model_layout_element", &id.to_string(), "layer", layer)?,
                properties: vec![],
                visual_layout: key,
            });
        }

        self.load_properties(model, location_types, &element_ids, &ids)
    }

    fn load_properties(
        &self,
        model: &mut Model,
        location_types: &HashMap<EntityId, LocationTypeKey>,
        elements: &HashMap<EntityId, LayoutElementKey>,
        layouts: &HashMap<EntityId, VisualLayoutKey>,
    ) -> Result<()> {
        let rows = query_rows(
            &self.conn,
            "SELECT id, location_type_id, model_layout_element_id, visual_layout_id, name, value
             FROM property ORDER BY id",
            |row| {
                Ok((
                    row.get::<_, EntityId>(0)?,
                    row.get::<_, Option<EntityId>>(1)?,
                    row.get::<_, Option<EntityId>>(2)?,
                    row.get::<_, Option<EntityId>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            },
        )?;

        for (id, lt_id, element_id, vl_id, name, value) in rows {
            let owner = match (lt_id, element_id, vl_id) {
                (Some(lt_id), None, None) => {
                    PropertyOwner::LocationType(owner_key(location_types, "property", lt_id)?)
                }
                (None, Some(element_id), None) => {
                    PropertyOwner::LayoutElement(owner_key(elements, "property", element_id)?)
                }
                (None, None, Some(vl_id)) => {
                    PropertyOwner::VisualLayout(owner_key(layouts, "property", vl_id)?)
                }
                _ => {
                    return plant_core::load_err!(
                        BrokenBackReference,
                        format!("property '{name}' must have exactly one owner")
                    );
                }
            };
            let prop = Property {
                id: Some(id),
                name,
                value,
                owner,
            };
            let props = match owner {
                PropertyOwner::LocationType(key) => {
                    &mut model.location_types[key.index()].properties
                }
                PropertyOwner::LayoutElement(key) => {
                    let layout = &mut model.visual_layouts[key.visual_layout.index()];
                    &mut layout.model_layout_elements[key.element].properties
                }
                PropertyOwner::VisualLayout(key) => &mut model.visual_layouts[key.index()].properties,
            };
            props.push(prop);
        }
        Ok(())
    }
}

struct RawVehicle {
    id: EntityId,
    name: String,
    length: Option<String>,
    energy_level_critical: Option<String>,
    energy_level_good: Option<String>,
    max_velocity: Option<String>,
    max_reverse_velocity: Option<String>,
    kind: Option<String>,
}

impl RawVehicle {
    const COLUMNS: &'static str = "id, name, length, energy_level_critical, energy_level_good,
                                   max_velocity, max_reverse_velocity, type";

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(RawVehicle {
            id: row.get(0)?,
            name: row.get(1)?,
            length: row.get(2)?,
            energy_level_critical: row.get(3)?,
            energy_level_good: row.get(4)?,
            max_velocity: row.get(5)?,
            max_reverse_velocity: row.get(6)?,
            kind: row.get(7)?,
        })
    }

    fn into_vehicle(self) -> Result<Vehicle> {
        let name = self.name.as_str();
        Ok(Vehicle {
            id: Some(self.id),
            length: column("vehicle", name, "length", self.length)?,
            energy_level_critical: column(
                "vehicle",
                name,
                "energy_level_critical",
                self.energy_level_critical,
            )?,
            energy_level_good: column("vehicle", name, "energy_level_good", self.energy_level_good)?,
            max_velocity: column("vehicle", name, "max_velocity", self.max_velocity)?,
            max_reverse_velocity: column(
                "vehicle",
                name,
                "max_reverse_velocity",
                self.max_reverse_velocity,
            )?,
            kind: self.kind,
            status: None,
            name: self.name,
        })
    }
}

impl PlantModelStore for SqliteStore {
    fn store(&mut self, model: &Model) -> Result<()> {
        check_before_store(model)?;

        let tx = self
            .conn
            .transaction()
            .map_err(db_error(ErrorKind::Store))?;
        for table in CLEAR_ORDER.iter() {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .map_err(db_error(ErrorKind::Store))?;
        }
        Self::insert_model(&tx, model)?;
        tx.commit().map_err(db_error(ErrorKind::Store))?;

        info!(
            model = %model.name,
            entities = model.entity_count(),
            "replaced stored plant model"
        );
        Ok(())
    }

    fn load(&self) -> Result<Model> {
        let root = self
            .conn
            .query_row(
                "SELECT id, version, name FROM model WHERE id = ?1",
                [MODEL_ID],
                |row| {
                    Ok((
                        row.get::<_, EntityId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error(ErrorKind::Load))?;
        let (id, version, name) = match root {
            Some(root) => root,
            None => return plant_core::load_err!(DoesNotExist, "no plant model is stored".to_owned()),
        };

        let mut model = Model::new(version, name);
        model.id = Some(id);
        self.load_points(&mut model)?;
        self.load_blocks(&mut model)?;
        let location_types = self.load_location_types(&mut model)?;
        self.load_locations(&mut model)?;
        self.load_paths(&mut model)?;
        self.load_vehicles(&mut model)?;
        self.load_visual_layouts(&mut model, &location_types)?;

        debug!(
            model = %model.name,
            entities = model.entity_count(),
            "loaded plant model"
        );
        Ok(model)
    }

    fn load_vehicle(&self, name: &str) -> Result<Vehicle> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {} FROM vehicle WHERE name = ?1", RawVehicle::COLUMNS),
                [name],
                RawVehicle::from_row,
            )
            .optional()
            .map_err(db_error(ErrorKind::Load))?;
        let raw = match raw {
            Some(raw) => raw,
            None => return plant_core::load_err!(DoesNotExist, format!("vehicle '{name}'")),
        };

        let id = raw.id;
        let mut vehicle = raw.into_vehicle()?;
        let sql = format!(
            "SELECT {} FROM vehicle_status WHERE vehicle_id = ?1",
            status_columns().join(", ")
        );
        vehicle.status = self
            .conn
            .query_row(&sql, [id], |row| read_status(row, 0))
            .optional()
            .map_err(db_error(ErrorKind::Load))?;
        Ok(vehicle)
    }

    fn save_vehicle_status(&mut self, name: &str, status: &VehicleStatus) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(db_error(ErrorKind::Store))?;
        let vehicle_id: Option<EntityId> = tx
            .query_row("SELECT id FROM vehicle WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_error(ErrorKind::Store))?;
        let vehicle_id = match vehicle_id {
            Some(id) => id,
            None => return plant_core::store_err!(DoesNotExist, format!("vehicle '{name}'")),
        };
        write_status(&tx, vehicle_id, status)?;
        tx.commit().map_err(db_error(ErrorKind::Store))?;

        debug!(vehicle = name, "saved vehicle status");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_point_model() -> Model {
        let mut model = Model::new("0.0.2", "plant");
        for (i, name) in ["P1", "P2"].iter().enumerate() {
            model.points.push(Point {
                id: None,
                name: (*name).to_owned(),
                x_position: Some(i as i64 * 1000),
                y_position: Some(0),
                z_position: None,
                vehicle_orientation_angle: if i == 0 { Some(f32::NAN) } else { Some(90.0) },
                kind: None,
                outgoing_paths: vec![],
            });
        }
        model.points[0].outgoing_paths.push(OutgoingPath {
            id: None,
            name: "P1-P2".to_owned(),
            point: PointKey(0),
        });
        model.paths.push(plant_core::datamodel::Path {
            id: None,
            name: "P1-P2".to_owned(),
            source_point: "P1".to_owned(),
            destination_point: "P2".to_owned(),
            length: Some(1000),
            routing_cost: None,
            max_velocity: Some(0),
            max_reverse_velocity: None,
            locked: true,
        });
        model
    }

    #[test]
    fn test_status_schema_columns() {
        let schema = status_schema();
        assert!(schema.contains("truck_name TEXT"));
        assert!(schema.contains("water_in_fuel_ind TEXT"));
        assert_eq!(19, status_columns().len());
    }

    #[test]
    fn test_store_load_in_memory() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.store(&two_point_model()).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(Some(MODEL_ID), loaded.id);
        assert_eq!(2, loaded.points.len());
        assert!(loaded.points[0].vehicle_orientation_angle.unwrap().is_nan());
        assert_eq!(Some(90.0), loaded.points[1].vehicle_orientation_angle);
        assert_eq!(Some(0), loaded.paths[0].max_velocity);
        assert_eq!(None, loaded.paths[0].routing_cost);
        assert!(loaded.paths[0].locked);
        assert_eq!(PointKey(0), loaded.points[0].outgoing_paths[0].point);
        assert!(loaded.check_integrity().is_ok());
    }

    #[test]
    fn test_malformed_column_is_load_error() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.store(&two_point_model()).unwrap();
        store
            .conn
            .execute("UPDATE path SET length = 'long' WHERE name = 'P1-P2'", [])
            .unwrap();

        let err = store.load().unwrap_err();
        assert_eq!(ErrorKind::Load, err.kind);
        assert_eq!(ErrorCode::MalformedNumber, err.code);
        assert!(err.get_details().unwrap().contains("path[P1-P2].length"));
    }
}
