// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use plant_compat::{model_to_xml, open_model, save_model_file};
use plant_core::datamodel::{Model, VehicleStatus};
use plant_store::{JsonFileSource, PlantModelStore, SqliteStore, refresh_vehicle_status};

#[derive(Parser)]
#[command(name = "plant")]
#[command(about = "Import, export and inspect openTCS plant models")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a plant model XML file and replace the stored model with it
    Import {
        file: PathBuf,

        /// Path to the SQLite database
        #[arg(long, env = "PLANT_DB", default_value = "plant.db")]
        db: PathBuf,
    },

    /// Write the stored model out as plant model XML
    Export {
        /// Output file (".xml" is appended when missing), or "-" for stdout
        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, env = "PLANT_DB", default_value = "plant.db")]
        db: PathBuf,
    },

    /// Parse and convert a plant model file without storing it
    Check { file: PathBuf },

    /// Merge a fresh status report into a stored vehicle's status
    Status {
        vehicle: String,

        /// JSON status report
        #[arg(long = "from")]
        from: PathBuf,

        #[arg(long, env = "PLANT_DB", default_value = "plant.db")]
        db: PathBuf,
    },
}

fn read_model(file: &Path) -> Result<Model> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let model = open_model(&mut BufReader::new(f))
        .with_context(|| format!("reading plant model {}", file.display()))?;
    Ok(model)
}

fn import(file: &Path, store: &mut dyn PlantModelStore) -> Result<Model> {
    let model = read_model(file)?;
    store.store(&model)?;
    Ok(model)
}

fn export(store: &dyn PlantModelStore, output: &Path) -> Result<Option<PathBuf>> {
    let model = store.load()?;
    if output == Path::new("-") {
        let xml = model_to_xml(&model)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(xml.as_bytes())?;
        stdout.flush()?;
        return Ok(None);
    }

    Ok(Some(save_model_file(output, &model)?))
}

fn print_counts(model: &Model) {
    println!("model:          {} (version {})", model.name, model.version);
    println!("points:         {}", model.points.len());
    println!("paths:          {}", model.paths.len());
    println!("vehicles:       {}", model.vehicles.len());
    println!("location types: {}", model.location_types.len());
    println!("locations:      {}", model.locations.len());
    println!("blocks:         {}", model.blocks.len());
    println!("visual layouts: {}", model.visual_layouts.len());
    println!("entities:       {}", model.entity_count());
}

fn print_status(vehicle: &str, status: &VehicleStatus) {
    println!("{vehicle}");
    for (name, value) in status.fields() {
        if let Some(value) = value {
            println!("  {name}: {value}");
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Import { file, db } => {
            let mut store = SqliteStore::open(&db)
                .with_context(|| format!("opening database {}", db.display()))?;
            let model = import(&file, &mut store)?;
            info!(
                model = %model.name,
                db = %db.display(),
                "imported plant model"
            );
        }
        Commands::Export { output, db } => {
            let store = SqliteStore::open(&db)
                .with_context(|| format!("opening database {}", db.display()))?;
            if let Some(path) = export(&store, &output)? {
                info!(path = %path.display(), "exported plant model");
            }
        }
        Commands::Check { file } => {
            let model = read_model(&file)?;
            print_counts(&model);
        }
        Commands::Status { vehicle, from, db } => {
            let mut store = SqliteStore::open(&db)
                .with_context(|| format!("opening database {}", db.display()))?;
            let source = JsonFileSource::new(from);
            let status = refresh_vehicle_status(&mut store, &source, &vehicle)?;
            print_status(&vehicle, &status);
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
