// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The flat, string-typed plant model as it appears in transfer files.
//!
//! Every cross reference is by name and every number is kept as the text
//! found in the file, so "absent" and "present but zero" stay distinct.

use std::io::{BufRead, Cursor, Write};

use plant_core::common::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use serde::Deserialize;

trait ToXml<W: Clone + Write> {
    fn write_xml(&self, writer: &mut Writer<W>) -> Result<()>;
}

type XmlWriter = Cursor<Vec<u8>>;

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename = "model")]
pub struct PlantModel {
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "point", default)]
    pub points: Vec<Point>,
    #[serde(rename = "path", default)]
    pub paths: Vec<Path>,
    #[serde(rename = "vehicle", default)]
    pub vehicles: Vec<Vehicle>,
    #[serde(rename = "locationType", default)]
    pub location_types: Vec<LocationType>,
    #[serde(rename = "location", default)]
    pub locations: Vec<Location>,
    #[serde(rename = "block", default)]
    pub blocks: Vec<Block>,
    #[serde(rename = "visualLayout", default)]
    pub visual_layouts: Vec<VisualLayout>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Point {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@xPosition")]
    pub x_position: Option<String>,
    #[serde(rename = "@yPosition")]
    pub y_position: Option<String>,
    #[serde(rename = "@zPosition")]
    pub z_position: Option<String>,
    #[serde(rename = "@vehicleOrientationAngle")]
    pub vehicle_orientation_angle: Option<String>,
    #[serde(rename = "@type")]
    pub kind: Option<String>,
    #[serde(rename = "outgoingPath", default)]
    pub outgoing_paths: Vec<OutgoingPath>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OutgoingPath {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Path {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@sourcePoint", default)]
    pub source_point: String,
    #[serde(rename = "@destinationPoint", default)]
    pub destination_point: String,
    #[serde(rename = "@length")]
    pub length: Option<String>,
    #[serde(rename = "@routingCost")]
    pub routing_cost: Option<String>,
    #[serde(rename = "@maxVelocity")]
    pub max_velocity: Option<String>,
    #[serde(rename = "@maxReverseVelocity")]
    pub max_reverse_velocity: Option<String>,
    #[serde(rename = "@locked", default)]
    pub locked: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Vehicle {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@length")]
    pub length: Option<String>,
    #[serde(rename = "@energyLevelCritical")]
    pub energy_level_critical: Option<String>,
    #[serde(rename = "@energyLevelGood")]
    pub energy_level_good: Option<String>,
    #[serde(rename = "@maxVelocity")]
    pub max_velocity: Option<String>,
    #[serde(rename = "@maxReverseVelocity")]
    pub max_reverse_velocity: Option<String>,
    #[serde(rename = "@type")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Property {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AllowedOperation {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LocationType {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "allowedOperation", default)]
    pub allowed_operations: Vec<AllowedOperation>,
    #[serde(rename = "property", default)]
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Link {
    #[serde(rename = "@point")]
    pub point: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Location {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@xPosition")]
    pub x_position: Option<String>,
    #[serde(rename = "@yPosition")]
    pub y_position: Option<String>,
    #[serde(rename = "@zPosition")]
    pub z_position: Option<String>,
    #[serde(rename = "@type", default)]
    pub location_type: String,
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Member {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Block {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "member", default)]
    pub members: Vec<Member>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ModelLayoutElement {
    #[serde(rename = "@visualizedObjectName")]
    pub visualized_object_name: Option<String>,
    #[serde(rename = "@layer")]
    pub layer: Option<String>,
    #[serde(rename = "property", default)]
    pub properties: Vec<Property>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct VisualLayout {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@scaleX")]
    pub scale_x: Option<String>,
    #[serde(rename = "@scaleY")]
    pub scale_y: Option<String>,
    #[serde(rename = "modelLayoutElement", default)]
    pub model_layout_elements: Vec<ModelLayoutElement>,
    #[serde(rename = "property", default)]
    pub properties: Vec<Property>,
}

fn xml_error(err: std::io::Error) -> plant_core::common::Error {
    use plant_core::common::{Error, ErrorCode, ErrorKind};

    Error::new(
        ErrorKind::Export,
        ErrorCode::XmlSerialization,
        Some(err.to_string()),
    )
}

/// Attribute list builder that skips unset optional values.
#[derive(Default)]
struct Attrs<'a>(Vec<(&'a str, &'a str)>);

impl<'a> Attrs<'a> {
    fn with(mut self, key: &'a str, value: &'a str) -> Self {
        self.0.push((key, value));
        self
    }

    fn with_opt(mut self, key: &'a str, value: &'a Option<String>) -> Self {
        if let Some(value) = value {
            self.0.push((key, value.as_str()));
        }
        self
    }
}

fn tag_with_attrs<'a>(tag_name: &'a str, attrs: &Attrs) -> BytesStart<'a> {
    let mut elem = BytesStart::new(tag_name);
    for attr in attrs.0.iter() {
        elem.push_attribute(*attr);
    }
    elem
}

fn write_tag_start_with_attrs(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &Attrs,
) -> Result<()> {
    writer
        .write_event(Event::Start(tag_with_attrs(tag_name, attrs)))
        .map_err(xml_error)
}

fn write_tag_end(writer: &mut Writer<XmlWriter>, tag_name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(tag_name)))
        .map_err(xml_error)
}

fn write_empty_tag_with_attrs(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: &Attrs,
) -> Result<()> {
    writer
        .write_event(Event::Empty(tag_with_attrs(tag_name, attrs)))
        .map_err(xml_error)
}

/// Writes `tag_name` as a self-closing element when it has no children.
fn write_element<F>(
    writer: &mut Writer<XmlWriter>,
    tag_name: &str,
    attrs: Attrs,
    has_children: bool,
    children: F,
) -> Result<()>
where
    F: FnOnce(&mut Writer<XmlWriter>) -> Result<()>,
{
    if !has_children {
        return write_empty_tag_with_attrs(writer, tag_name, &attrs);
    }
    write_tag_start_with_attrs(writer, tag_name, &attrs)?;
    children(writer)?;
    write_tag_end(writer, tag_name)
}

fn write_all<T: ToXml<XmlWriter>>(writer: &mut Writer<XmlWriter>, items: &[T]) -> Result<()> {
    for item in items.iter() {
        item.write_xml(writer)?;
    }
    Ok(())
}

impl ToXml<XmlWriter> for PlantModel {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("version", &self.version)
            .with("name", &self.name);
        write_tag_start_with_attrs(writer, "model", &attrs)?;

        write_all(writer, &self.points)?;
        write_all(writer, &self.paths)?;
        write_all(writer, &self.vehicles)?;
        write_all(writer, &self.location_types)?;
        write_all(writer, &self.locations)?;
        write_all(writer, &self.blocks)?;
        write_all(writer, &self.visual_layouts)?;

        write_tag_end(writer, "model")
    }
}

impl ToXml<XmlWriter> for Point {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with_opt("xPosition", &self.x_position)
            .with_opt("yPosition", &self.y_position)
            .with_opt("zPosition", &self.z_position)
            .with_opt("vehicleOrientationAngle", &self.vehicle_orientation_angle)
            .with_opt("type", &self.kind);
        write_element(writer, "point", attrs, !self.outgoing_paths.is_empty(), |w| {
            write_all(w, &self.outgoing_paths)
        })
    }
}

impl ToXml<XmlWriter> for OutgoingPath {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_empty_tag_with_attrs(
            writer,
            "outgoingPath",
            &Attrs::default().with("name", &self.name),
        )
    }
}

impl ToXml<XmlWriter> for Path {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with("sourcePoint", &self.source_point)
            .with("destinationPoint", &self.destination_point)
            .with_opt("length", &self.length)
            .with_opt("routingCost", &self.routing_cost)
            .with_opt("maxVelocity", &self.max_velocity)
            .with_opt("maxReverseVelocity", &self.max_reverse_velocity)
            .with("locked", if self.locked { "true" } else { "false" });
        write_empty_tag_with_attrs(writer, "path", &attrs)
    }
}

impl ToXml<XmlWriter> for Vehicle {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with_opt("length", &self.length)
            .with_opt("energyLevelCritical", &self.energy_level_critical)
            .with_opt("energyLevelGood", &self.energy_level_good)
            .with_opt("maxVelocity", &self.max_velocity)
            .with_opt("maxReverseVelocity", &self.max_reverse_velocity)
            .with_opt("type", &self.kind);
        write_empty_tag_with_attrs(writer, "vehicle", &attrs)
    }
}

impl ToXml<XmlWriter> for Property {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with("value", &self.value);
        write_empty_tag_with_attrs(writer, "property", &attrs)
    }
}

impl ToXml<XmlWriter> for AllowedOperation {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_empty_tag_with_attrs(
            writer,
            "allowedOperation",
            &Attrs::default().with("name", &self.name),
        )
    }
}

impl ToXml<XmlWriter> for LocationType {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default().with("name", &self.name);
        let has_children = !self.allowed_operations.is_empty() || !self.properties.is_empty();
        write_element(writer, "locationType", attrs, has_children, |w| {
            write_all(w, &self.allowed_operations)?;
            write_all(w, &self.properties)
        })
    }
}

impl ToXml<XmlWriter> for Link {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_empty_tag_with_attrs(writer, "link", &Attrs::default().with("point", &self.point))
    }
}

impl ToXml<XmlWriter> for Location {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with_opt("xPosition", &self.x_position)
            .with_opt("yPosition", &self.y_position)
            .with_opt("zPosition", &self.z_position)
            .with("type", &self.location_type);
        write_element(writer, "location", attrs, !self.links.is_empty(), |w| {
            write_all(w, &self.links)
        })
    }
}

impl ToXml<XmlWriter> for Member {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        write_empty_tag_with_attrs(writer, "member", &Attrs::default().with("name", &self.name))
    }
}

impl ToXml<XmlWriter> for Block {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default().with("name", &self.name);
        write_element(writer, "block", attrs, !self.members.is_empty(), |w| {
            write_all(w, &self.members)
        })
    }
}

impl ToXml<XmlWriter> for ModelLayoutElement {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with_opt("visualizedObjectName", &self.visualized_object_name)
            .with_opt("layer", &self.layer);
        write_element(
            writer,
            "modelLayoutElement",
            attrs,
            !self.properties.is_empty(),
            |w| write_all(w, &self.properties),
        )
    }
}

impl ToXml<XmlWriter> for VisualLayout {
    fn write_xml(&self, writer: &mut Writer<XmlWriter>) -> Result<()> {
        let attrs = Attrs::default()
            .with("name", &self.name)
            .with_opt("scaleX", &self.scale_x)
            .with_opt("scaleY", &self.scale_y);
        let has_children = !self.model_layout_elements.is_empty() || !self.properties.is_empty();
        write_element(writer, "visualLayout", attrs, has_children, |w| {
            write_all(w, &self.model_layout_elements)?;
            write_all(w, &self.properties)
        })
    }
}

pub fn plant_model_to_xml(plant: &PlantModel) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 4);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .map_err(xml_error)?;
    plant.write_xml(&mut writer)?;

    let result = writer.into_inner().into_inner();

    use plant_core::common::{Error, ErrorCode, ErrorKind};
    String::from_utf8(result).map_err(|_err| {
        Error::new(
            ErrorKind::Export,
            ErrorCode::XmlSerialization,
            Some("problem converting to UTF-8".to_owned()),
        )
    })
}

pub fn open_plant_model(reader: &mut dyn BufRead) -> Result<PlantModel> {
    use quick_xml::de;
    match de::from_reader(reader) {
        Ok(plant) => Ok(plant),
        Err(err) => plant_core::import_err!(XmlDeserialization, err.to_string()),
    }
}

#[test]
fn test_bad_xml() {
    let input = "<model version=\"0.0.2\" name=\"plant\">
        <point name=\"P1\" xPosition=\"0\">
        <outgoingPath name=\"P1 --- P2\"/>";

    let result = open_plant_model(&mut input.as_bytes());
    let err = result.unwrap_err();
    assert_eq!(plant_core::ErrorCode::XmlDeserialization, err.code);
    assert_eq!(plant_core::ErrorKind::Import, err.kind);
}

#[test]
fn test_xml_point_parsing() {
    let input = "<point name=\"P1\" xPosition=\"-1500\" \
                   vehicleOrientationAngle=\"NaN\" type=\"HALT_POSITION\" future=\"ignored\">
        <outgoingPath name=\"P1 --- P2\"/>
        <outgoingPath name=\"P1 --- P3\"/>
    </point>";

    let expected = Point {
        name: "P1".to_owned(),
        x_position: Some("-1500".to_owned()),
        y_position: None,
        z_position: None,
        vehicle_orientation_angle: Some("NaN".to_owned()),
        kind: Some("HALT_POSITION".to_owned()),
        outgoing_paths: vec![
            OutgoingPath {
                name: "P1 --- P2".to_owned(),
            },
            OutgoingPath {
                name: "P1 --- P3".to_owned(),
            },
        ],
    };

    use quick_xml::de;
    let point: Point = de::from_reader(input.as_bytes()).unwrap();

    assert_eq!(expected, point);
}

#[test]
fn test_xml_path_parsing() {
    let input = "<path name=\"P1 --- P2\" sourcePoint=\"P1\" destinationPoint=\"P2\" \
                   length=\"1000\" maxVelocity=\"1000\" locked=\"true\"/>";

    use quick_xml::de;
    let path: Path = de::from_reader(input.as_bytes()).unwrap();

    assert_eq!("P1", path.source_point);
    assert_eq!("P2", path.destination_point);
    assert_eq!(Some("1000".to_owned()), path.length);
    assert_eq!(None, path.routing_cost);
    assert!(path.locked);
}

#[test]
fn test_interleaved_children() {
    let input = "<model version=\"0.0.2\" name=\"plant\">
        <point name=\"P1\"/>
        <path name=\"P1 --- P2\" sourcePoint=\"P1\" destinationPoint=\"P2\"/>
        <point name=\"P2\"/>
    </model>";

    let plant = open_plant_model(&mut input.as_bytes()).unwrap();
    let names: Vec<&str> = plant.points.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(vec!["P1", "P2"], names);
    assert_eq!(1, plant.paths.len());
    assert!(!plant.paths[0].locked);
}

#[test]
fn test_write_omits_absent() {
    let plant = PlantModel {
        version: "0.0.2".to_owned(),
        name: "plant".to_owned(),
        points: vec![Point {
            name: "P1".to_owned(),
            x_position: Some("0".to_owned()),
            ..Default::default()
        }],
        blocks: vec![Block {
            name: "B1".to_owned(),
            members: vec![Member {
                name: "P1".to_owned(),
            }],
        }],
        ..Default::default()
    };

    let xml = plant_model_to_xml(&plant).unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    assert!(xml.contains("<point name=\"P1\" xPosition=\"0\"/>"));
    assert!(!xml.contains("yPosition"));
    assert!(xml.contains("<member name=\"P1\"/>"));

    let reread = open_plant_model(&mut xml.as_bytes()).unwrap();
    assert_eq!(plant, reread);
}

#[test]
fn test_write_escapes_names() {
    let plant = PlantModel {
        version: "0.0.2".to_owned(),
        name: "a <b> & \"c\"".to_owned(),
        ..Default::default()
    };

    let xml = plant_model_to_xml(&plant).unwrap();
    assert!(!xml.contains("<b>"));
    let reread = open_plant_model(&mut xml.as_bytes()).unwrap();
    assert_eq!(plant.name, reread.name);
}
