mod beam;
mod config;
mod contour;
mod delaunay;
mod field;
mod grid;
mod streamline;
mod visualisation;

use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use config::{format_reynolds, Config};
use field::{load_scalar, load_velocity, LoadError, ScalarSamples};
use grid::{FieldGrid, Fill};
use visualisation::{ComparisonCase, FlowVisualiser};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    println!("==============================================");
    println!("  CFD flow visualiser");
    println!("  Flow past a rectangular beam");
    println!("==============================================");

    let config = Config::load_or_default(Path::new("beamviz.toml"))?;
    config.print_summary();

    let visualiser = FlowVisualiser::new(
        Path::new(&config.io.output_dir),
        config.visualisation.image_width,
        config.visualisation.image_height,
        (
            config.domain.mesh_columns as f64 * config.domain.mesh_spacing,
            config.domain.mesh_rows as f64 * config.domain.mesh_spacing,
        ),
        config.beam_region(),
    )?;

    // Each Reynolds case owns its sample sets and grids outright, so
    // the cases render in parallel.
    let statuses: Vec<CaseStatus> = config
        .reynolds
        .par_iter()
        .map(|&re| process_case(&config, &visualiser, re))
        .collect();

    let complete: Vec<f64> = statuses
        .iter()
        .filter(|s| s.complete)
        .map(|s| s.reynolds)
        .collect();
    if complete.len() > 1 {
        let tags: Vec<String> = complete.iter().map(|&re| format_reynolds(re)).collect();
        println!("\nBuilding comparison figure for Re = [{}]", tags.join(", "));
        match comparison_cases(&config, &complete) {
            Ok(cases) => {
                if let Err(e) = visualiser.plot_comparison(&cases) {
                    eprintln!("Warning: comparison figure failed: {}", e);
                }
            }
            Err(e) => eprintln!("Warning: comparison figure skipped: {}", e),
        }
    }

    let rendered = statuses.iter().filter(|s| s.charts > 0).count();
    println!("\n==============================================");
    println!("Visualisation summary");
    println!("Cases rendered: {}/{}", rendered, config.reynolds.len());
    println!("Data read from:   {}", config.io.data_dir);
    println!("Plots written to: {}", config.io.output_dir);
    println!("==============================================");
    Ok(())
}

struct CaseStatus {
    reynolds: f64,
    /// Charts actually written for this case.
    charts: usize,
    /// All three field files loaded; eligible for the comparison.
    complete: bool,
}

fn data_path(config: &Config, name: &str) -> PathBuf {
    Path::new(&config.io.data_dir).join(name)
}

fn scalar_view(x: &[f64], y: &[f64], value: &[f64]) -> ScalarSamples {
    ScalarSamples {
        x: x.to_vec(),
        y: y.to_vec(),
        value: value.to_vec(),
    }
}

/// Render every chart whose data file is present. A missing or broken
/// file only disables its own field; the case never aborts the run.
fn process_case(config: &Config, visualiser: &FlowVisualiser, reynolds: f64) -> CaseStatus {
    let tag = format_reynolds(reynolds);
    println!("[Re {}] processing", tag);

    let comment = config.io.comment_marker;
    let nx = config.domain.mesh_columns;
    let ny = config.domain.mesh_rows;
    let hull_fill = Fill::Value(config.visualisation.hull_fill);
    let beam = config.beam_region();

    let mut charts = 0;
    let mut fields_loaded = 0;

    // Streamfunction: interpolated contours plus the indexed 3D surface.
    let psi_path = data_path(config, &format!("streamfunction_Re{}.dat", tag));
    match load_scalar(&psi_path, comment) {
        Ok(samples) if !samples.is_empty() => {
            fields_loaded += 1;
            match FieldGrid::from_scattered(&samples, nx, ny, hull_fill) {
                Ok(grid) => match visualiser.plot_streamfunction(&grid, reynolds) {
                    Ok(()) => charts += 1,
                    Err(e) => eprintln!("[Re {}] Warning: streamline figure failed: {}", tag, e),
                },
                Err(e) => eprintln!("[Re {}] Warning: cannot grid streamfunction: {}", tag, e),
            }
            // The surface wants exact mesh indices; scattered float
            // coordinates simply skip it.
            match FieldGrid::from_indexed(&samples, Fill::Zero) {
                Ok(grid) => match visualiser.plot_surface(&grid, reynolds) {
                    Ok(()) => charts += 1,
                    Err(e) => eprintln!("[Re {}] Warning: surface figure failed: {}", tag, e),
                },
                Err(e) => println!("[Re {}] skipping 3D surface: {}", tag, e),
            }
        }
        Ok(_) => println!("[Re {}] streamfunction file is empty, skipping", tag),
        Err(e @ LoadError::FileNotFound(_)) => println!("[Re {}] {}", tag, e),
        Err(e) => eprintln!("[Re {}] {}", tag, e),
    }

    // Vorticity.
    let omega_path = data_path(config, &format!("vorticity_Re{}.dat", tag));
    match load_scalar(&omega_path, comment) {
        Ok(samples) if !samples.is_empty() => {
            fields_loaded += 1;
            match FieldGrid::from_scattered(&samples, nx, ny, hull_fill) {
                Ok(grid) => match visualiser.plot_vorticity(&grid, reynolds) {
                    Ok(()) => charts += 1,
                    Err(e) => eprintln!("[Re {}] Warning: vorticity figure failed: {}", tag, e),
                },
                Err(e) => eprintln!("[Re {}] Warning: cannot grid vorticity: {}", tag, e),
            }
        }
        Ok(_) => println!("[Re {}] vorticity file is empty, skipping", tag),
        Err(e @ LoadError::FileNotFound(_)) => println!("[Re {}] {}", tag, e),
        Err(e) => eprintln!("[Re {}] {}", tag, e),
    }

    // Velocity: magnitude panel plus traced streamlines.
    let vel_path = data_path(config, &format!("velocity_field_Re{}.dat", tag));
    match load_velocity(&vel_path, comment) {
        Ok(samples) if !samples.is_empty() => {
            fields_loaded += 1;
            let magnitude = FieldGrid::from_scattered(
                &scalar_view(&samples.x, &samples.y, &samples.magnitude),
                nx,
                ny,
                hull_fill,
            );
            // Velocity components always hull-fill with zero; the
            // streamline tracer cannot tolerate holes.
            let vx = FieldGrid::from_scattered(
                &scalar_view(&samples.x, &samples.y, &samples.vx),
                nx,
                ny,
                Fill::Value(0.0),
            );
            let vy = FieldGrid::from_scattered(
                &scalar_view(&samples.x, &samples.y, &samples.vy),
                nx,
                ny,
                Fill::Value(0.0),
            );
            match (magnitude, vx, vy) {
                (Ok(mut magnitude), Ok(mut vx), Ok(mut vy)) => {
                    // Hole marker for the scalar display, zeros for
                    // the tracer. The two are not interchangeable.
                    beam.blank(&mut magnitude);
                    beam.zero(&mut vx);
                    beam.zero(&mut vy);
                    match visualiser.plot_velocity(
                        &magnitude,
                        &vx,
                        &vy,
                        &samples,
                        config.visualisation.quiver_skip,
                        reynolds,
                    ) {
                        Ok(()) => charts += 1,
                        Err(e) => {
                            eprintln!("[Re {}] Warning: velocity figure failed: {}", tag, e)
                        }
                    }
                }
                (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
                    eprintln!("[Re {}] Warning: cannot grid velocity field: {}", tag, e)
                }
            }
        }
        Ok(_) => println!("[Re {}] velocity file is empty, skipping", tag),
        Err(e @ LoadError::FileNotFound(_)) => println!("[Re {}] {}", tag, e),
        Err(e) => eprintln!("[Re {}] {}", tag, e),
    }

    println!("[Re {}] done, {} chart(s)", tag, charts);
    CaseStatus {
        reynolds,
        charts,
        complete: fields_loaded == 3,
    }
}

/// Re-load the complete cases and rebuild their grids with per-point
/// matched placement for the side-by-side figure.
fn comparison_cases(config: &Config, reynolds: &[f64]) -> Result<Vec<ComparisonCase>> {
    let comment = config.io.comment_marker;
    let beam = config.beam_region();
    let mut cases = Vec::with_capacity(reynolds.len());

    for &re in reynolds {
        let tag = format_reynolds(re);
        let psi = load_scalar(&data_path(config, &format!("streamfunction_Re{}.dat", tag)), comment)?;
        let omega = load_scalar(&data_path(config, &format!("vorticity_Re{}.dat", tag)), comment)?;
        let velocity =
            load_velocity(&data_path(config, &format!("velocity_field_Re{}.dat", tag)), comment)?;

        let streamfunction = FieldGrid::from_matching(&psi, Fill::Sentinel)?;
        let vorticity = FieldGrid::from_matching(&omega, Fill::Sentinel)?;
        let mut magnitude = FieldGrid::from_matching(
            &scalar_view(&velocity.x, &velocity.y, &velocity.magnitude),
            Fill::Sentinel,
        )?;
        beam.blank(&mut magnitude);

        cases.push(ComparisonCase {
            reynolds: re,
            streamfunction,
            vorticity,
            magnitude,
        });
    }
    Ok(cases)
}
