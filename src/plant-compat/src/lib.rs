// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

use std::io::BufRead;
use std::path::{Path, PathBuf};

use plant_core::common::{Error, ErrorCode, ErrorKind};
use plant_core::datamodel::Model;
pub use plant_core::Result;
use tracing::info;

pub mod convert;
pub mod transfer;

#[cfg(test)]
mod transfer_proptest;

/// Parses a transfer file and converts it into a domain graph.
pub fn open_model(reader: &mut dyn BufRead) -> Result<Model> {
    let plant = transfer::open_plant_model(reader)?;
    convert::to_domain(&plant)
}

pub fn model_to_xml(model: &Model) -> Result<String> {
    let plant = convert::to_transfer(model)?;
    transfer::plant_model_to_xml(&plant)
}

/// Returns `path` with `.xml` appended, unless it already ends in `.xml`.
pub fn xml_file_path(path: &Path) -> PathBuf {
    if path.to_string_lossy().ends_with(".xml") {
        return path.to_path_buf();
    }
    let mut with_ext = path.as_os_str().to_owned();
    with_ext.push(".xml");
    PathBuf::from(with_ext)
}

/// Writes `model` as a transfer file, normalizing the file name with
/// `xml_file_path`. Returns the path actually written.
pub fn save_model_file(path: &Path, model: &Model) -> Result<PathBuf> {
    let xml = model_to_xml(model)?;
    let path = xml_file_path(path);
    std::fs::write(&path, xml).map_err(|err| {
        Error::new(
            ErrorKind::Export,
            ErrorCode::Io,
            Some(format!("{}: {}", path.display(), err)),
        )
    })?;
    info!(path = %path.display(), "wrote plant model");
    Ok(path)
}

#[test]
fn test_xml_file_path() {
    assert_eq!(
        PathBuf::from("plant.xml"),
        xml_file_path(Path::new("plant"))
    );
    assert_eq!(
        PathBuf::from("plant.xml"),
        xml_file_path(Path::new("plant.xml"))
    );
    assert_eq!(
        PathBuf::from("dir/plant.model.xml"),
        xml_file_path(Path::new("dir/plant.model"))
    );
}
