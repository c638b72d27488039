//! hydrorisk CLI - terrain, HAND inundation and soil buffer risk analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use hydrorisk_algorithms::hydrology::SnapParams;
use hydrorisk_algorithms::pipeline::{
    run_delineation, run_preprocessing, run_proportional_buffer, run_soil_intersection, DelineationParams,
    PreprocessOutputs, PreprocessParams,
};
use hydrorisk_algorithms::risk::{ProportionalBufferParams, SoilIntersectionParams, WeightMapping};
use hydrorisk_core::io::{read_geotiff, read_vector};
use hydrorisk_core::{Progress, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hydrorisk")]
#[command(author, version, about = "Terrain, HAND inundation and soil buffer risk analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster (.tif) or vector (.geojson, .zip) file
    Info {
        /// Input file
        input: PathBuf,
    },
    /// Condition a DEM and derive flow, slope, aspect, TWI and drainage network
    Preprocess {
        /// Input DEM (single-band GeoTIFF)
        #[arg(long)]
        dem: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Flow accumulation (cells) above which a cell is drainage
        #[arg(short, long, default_value = "1000")]
        threshold: f64,
    },
    /// Delineate the catchment of an outlet and map HAND inundation
    Delineate {
        /// Input DEM (single-band GeoTIFF)
        #[arg(long)]
        dem: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Flow accumulation (cells) above which a cell is drainage
        #[arg(short, long, default_value = "1000")]
        threshold: f64,
        /// Outlet X in the DEM's CRS
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,
        /// Outlet Y in the DEM's CRS
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,
        /// Channel depth in metres
        #[arg(short, long, default_value = "10")]
        depth: f64,
        /// Reject outlets farther than this from the drainage network
        #[arg(long)]
        max_snap_distance: Option<f64>,
        /// Also write flow_distance.tif
        #[arg(long)]
        flow_distance: bool,
    },
    /// Split a vector layer along the classes of a soil raster
    SoilIntersect {
        /// Soil class raster (single-band GeoTIFF)
        #[arg(long)]
        soil: PathBuf,
        /// Polygon layer (GeoJSON, or a .zip containing one; zipped shapefiles are not read)
        #[arg(long)]
        vector: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Name of the class attribute added to each feature
        #[arg(long, default_value = "soil_class")]
        class_column: String,
        /// Class value to ignore
        #[arg(long, default_value = "-9999", allow_hyphen_values = true)]
        nodata_class: f64,
    },
    /// Grow or shrink features so their area changes by a per-class percentage
    SoilBuffer {
        /// Segmented layer (GeoJSON, or a .zip containing one; zipped shapefiles are not read)
        #[arg(long)]
        vector: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Weights: a JSON file, a JSON object, or class=percent pairs ("1=55,2=35")
        #[arg(short, long)]
        weights: Option<String>,
        /// Attribute holding the soil class
        #[arg(long, default_value = "soil_class")]
        reference_column: String,
        /// Largest offset searched, in metres
        #[arg(long, default_value = "500")]
        max_distance: f64,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Percentage bar fed by a stage's progress callback
fn stage_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_for(pb: &ProgressBar) -> Progress<'_> {
    Progress::new(move |msg, pct| {
        pb.set_message(msg.to_string());
        pb.set_position(u64::from(pct));
    })
}

fn load_weights(arg: Option<&str>) -> Result<WeightMapping> {
    let Some(arg) = arg else {
        return Ok(WeightMapping::default());
    };
    if Path::new(arg).is_file() {
        return WeightMapping::from_json_file(arg).with_context(|| format!("Failed to load weights from {}", arg));
    }
    arg.parse().context("Failed to parse weights")
}

fn print_preprocess(outputs: &PreprocessOutputs) {
    for path in [
        &outputs.flow_direction,
        &outputs.flow_accumulation,
        &outputs.slope,
        &outputs.aspect,
        &outputs.twi,
    ] {
        println!("  {}", path.display());
    }
    match &outputs.drainage_network {
        Some(path) => println!("  {}", path.display()),
        None => println!("  (no drainage network above the threshold)"),
    }
}

fn done(name: &str, elapsed: std::time::Duration) {
    println!("{} finished", name);
    println!("  Processing time: {:.2?}", elapsed);
}

fn info_raster(input: &Path) -> Result<()> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(input).context("Failed to read raster")?;
    pb.finish_and_clear();

    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {} x {}", raster.cell_width(), raster.cell_height());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn info_vector(input: &Path) -> Result<()> {
    let pb = spinner("Reading vector layer...");
    let layer = read_vector(input).context("Failed to read vector layer")?;
    pb.finish_and_clear();

    let mut columns: Vec<&str> = layer
        .iter()
        .flat_map(|f| f.properties.keys().map(String::as_str))
        .collect();
    columns.sort_unstable();
    columns.dedup();

    println!("File: {}", input.display());
    println!("Features: {}", layer.len());
    println!("CRS: {}", layer.crs_or_default());
    println!("Columns: {}", columns.join(", "));
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let ext = input
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();
            match ext.as_str() {
                "geojson" | "json" | "zip" => info_vector(&input)?,
                _ => info_raster(&input)?,
            }
        }

        Commands::Preprocess {
            dem,
            output_dir,
            threshold,
        } => {
            let params = PreprocessParams {
                stream_threshold: threshold,
                ..PreprocessParams::default()
            };
            let start = Instant::now();
            let pb = stage_bar();
            let (_, outputs) = run_preprocessing(&dem, &output_dir, &params, &mut progress_for(&pb))
                .context("Preprocessing failed")?;
            pb.finish_and_clear();
            print_preprocess(&outputs);
            done("Preprocessing", start.elapsed());
        }

        Commands::Delineate {
            dem,
            output_dir,
            threshold,
            x,
            y,
            depth,
            max_snap_distance,
            flow_distance,
        } => {
            let start = Instant::now();
            let pb = stage_bar();
            let pre_params = PreprocessParams {
                stream_threshold: threshold,
                ..PreprocessParams::default()
            };
            let (pre, outputs) = run_preprocessing(&dem, &output_dir, &pre_params, &mut progress_for(&pb))
                .context("Preprocessing failed")?;
            pb.finish_and_clear();
            print_preprocess(&outputs);

            let params = DelineationParams {
                outlet_x: x,
                outlet_y: y,
                channel_depth: depth,
                stream_threshold: threshold,
                snap: SnapParams {
                    max_distance: max_snap_distance,
                },
                flow_distance,
            };
            let pb = stage_bar();
            let (result, files) = run_delineation(&pre, &params, &output_dir, &mut progress_for(&pb))
                .context("Delineation failed")?;
            pb.finish_and_clear();

            info!(
                "Outlet snapped to ({:.3}, {:.3}), {:.2} units from the requested point",
                result.outlet.x, result.outlet.y, result.outlet.distance
            );
            println!("  {}", files.outlet.display());
            println!("  {}", files.catchment.display());
            for path in [&files.stream_network, &files.flow_distance, &files.inundation]
                .into_iter()
                .flatten()
            {
                println!("  {}", path.display());
            }
            println!("  {}", files.inundation_depth.display());
            done("Delineation", start.elapsed());
        }

        Commands::SoilIntersect {
            soil,
            vector,
            output_dir,
            class_column,
            nodata_class,
        } => {
            let params = SoilIntersectionParams {
                class_column,
                nodata_class: Some(nodata_class),
            };
            let start = Instant::now();
            let pb = stage_bar();
            let path = run_soil_intersection(&soil, &vector, &output_dir, &params, &mut progress_for(&pb))
                .context("Soil intersection failed")?;
            pb.finish_and_clear();
            println!("Segmented layer saved to: {}", path.display());
            done("Soil intersection", start.elapsed());
        }

        Commands::SoilBuffer {
            vector,
            output_dir,
            weights,
            reference_column,
            max_distance,
        } => {
            let weights = load_weights(weights.as_deref())?;
            info!("Weights: {}", weights);
            let params = ProportionalBufferParams {
                reference_column,
                max_distance,
                ..ProportionalBufferParams::default()
            };
            let start = Instant::now();
            let pb = stage_bar();
            let (path, summary) =
                run_proportional_buffer(&vector, &weights, &params, &output_dir, &mut progress_for(&pb))
                    .context("Proportional buffer failed")?;
            pb.finish_and_clear();
            println!("Buffered layer saved to: {}", path.display());
            println!(
                "  {} buffered, {} unchanged, {} skipped (no distance found), {} excluded",
                summary.processed, summary.unchanged, summary.skipped, summary.excluded
            );
            done("Proportional buffer", start.elapsed());
        }
    }

    Ok(())
}
