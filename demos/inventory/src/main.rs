//! Command-line front end for the water point routing core.
//!
//! ```text
//! inventory --facilities water_points.csv --roads roads.csv \
//!           --raster population.json --journal repairs.csv \
//!           nearest --lat -13.25 --lon 34.0 -k 5
//! ```
//!
//! Results are printed to stdout as JSON.  Logging goes to stderr and is
//! controlled by `RUST_LOG` (default `info`).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use wp_core::ServiceConfig;
use wp_service::{
    CsvTopologyStore, FacilityServiceBuilder, apply_repair_journal, load_facilities_csv, load_raster_json,
    load_roads_csv, write_roads_csv,
};
use wp_spatial::RoadSegment;

#[derive(Parser)]
#[command(name = "inventory")]
#[command(about = "Nearest water points, road routes, and buffer population")]
struct Cli {
    /// Facilities CSV (`id,name,name_en,amenity,man_made,status,lat,lon,region`)
    #[arg(long)]
    facilities: PathBuf,

    /// Roads CSV (`id,source,target,cost,reverse_cost,oneway,name,fclass,excluded,geometry`)
    #[arg(long)]
    roads: PathBuf,

    /// Population raster JSON; without it buffer population is a facility-count proxy
    #[arg(long)]
    raster: Option<PathBuf>,

    /// Service configuration JSON; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repair journal: replayed at start, appended to by topology repair
    #[arg(long)]
    journal: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// K nearest facilities with road routes
    Nearest {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        #[arg(short)]
        k: Option<usize>,
    },
    /// Facility count and population within a radius
    Buffer {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// Radius in metres
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Run topology repair and report what changed
    Repair {
        /// Also write the full repaired road table here
        #[arg(long)]
        dump: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let t0 = Instant::now();
    let facilities = load_facilities_csv(&cli.facilities)
        .with_context(|| format!("loading facilities from {}", cli.facilities.display()))?;
    let roads = load_roads(&cli.roads, cli.journal.as_deref())?;

    let mut builder = FacilityServiceBuilder::new(config).facilities(facilities).roads(roads);
    if let Some(path) = &cli.raster {
        let grid = load_raster_json(path).with_context(|| format!("loading raster from {}", path.display()))?;
        builder = builder.population(Arc::new(grid));
    }
    if let Some(path) = &cli.journal {
        let store = CsvTopologyStore::open(path).with_context(|| format!("opening journal {}", path.display()))?;
        builder = builder.store(Box::new(store));
    }
    log::info!("inputs loaded in {:.2?}", t0.elapsed());

    let json = match cli.command {
        Command::Nearest { lat, lon, k } => {
            let service = builder.start()?;
            serde_json::to_string_pretty(&service.get_nearest(lat, lon, k)?)?
        }
        Command::Buffer { lat, lon, radius } => {
            let service = builder.build()?;
            serde_json::to_string_pretty(&service.get_population_in_buffer(lat, lon, radius)?)?
        }
        Command::Repair { dump } => {
            let service = builder.build()?;
            let summary = service.repair_topology()?;
            if let Some(path) = dump {
                let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                write_roads_csv(file, &service.segments())?;
                log::info!("repaired road table written to {}", path.display());
            }
            serde_json::to_string_pretty(&summary)?
        }
    };
    println!("{json}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    let Some(path) = path else {
        return Ok(ServiceConfig::default());
    };
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    let config: ServiceConfig =
        serde_json::from_reader(file).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Road table with any journalled repairs applied.
fn load_roads(path: &Path, journal: Option<&Path>) -> Result<Vec<RoadSegment>> {
    let mut roads = load_roads_csv(path).with_context(|| format!("loading roads from {}", path.display()))?;
    if let Some(journal) = journal.filter(|p| p.exists()) {
        let file = File::open(journal)?;
        apply_repair_journal(&mut roads, file).with_context(|| format!("replaying {}", journal.display()))?;
    }
    Ok(roads)
}
