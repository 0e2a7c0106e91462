//! Defines command-line interface options using `clap` for the bl_diag
//! application.

use bl_diag::grid::DomainRange;
use clap::Parser;
use std::path::PathBuf;

/// A CLI tool for boundary-layer diagnostics on NetCDF simulation output
#[derive(Parser, Debug)]
#[command(
    version = "0.3.0",
    name = "bl_diag",
    about = "Boundary-layer diagnostics and boundary-height detection from NetCDF simulation output"
)]
pub struct Args {
    /// Path to the NetCDF archive
    #[arg(short, long)]
    pub file: PathBuf,

    /// Quantity to derive: tke, enstrophy or wth
    #[arg(short, long)]
    pub quantity: Option<String>,

    /// Boundary-detection method: th_plus_offset, max_gradient,
    /// threshold_crossing or wth_boundary
    #[arg(short, long)]
    pub method: Option<String>,

    /// Threshold for threshold_crossing, noise floor for wth_boundary
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Offset above surface theta in Kelvin for th_plus_offset
    #[arg(long)]
    pub offset: Option<f32>,

    /// Spatial sub-range, formatted as z0:z1,y0:y1,x0:x1; leave a side empty
    /// for unbounded (e.g. ',,0:64' selects x 0..64 only)
    #[arg(short, long, value_parser = parse_domain_arg)]
    pub domain: Option<DomainRange>,

    /// Variable holding the vertical level coordinate
    #[arg(long, default_value = "zc")]
    pub level_var: String,

    /// Time-step range start:end (end exclusive); defaults to all steps
    #[arg(long, value_parser = parse_time_arg)]
    pub times: Option<(usize, usize)>,

    /// Remove the w'th' perturbation mean over the full horizontal domain
    /// instead of the analysis window
    #[arg(long, default_value_t = false)]
    pub full_domain_reference: bool,

    /// Number of threads to use for parallel processing. Defaults to the
    /// Rayon default.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Path to save results as NetCDF. If not set, prints to terminal.
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Label printed series starting from this local time,
    /// e.g. 2024-01-01T05:00:00
    #[arg(long)]
    pub start_time: Option<String>,

    /// Minutes between consecutive time steps, used for labels
    #[arg(long, default_value_t = 2)]
    pub step_minutes: i64,

    /// List all variables and dimensions in the archive
    #[arg(long)]
    pub list_vars: bool,

    /// Describe a specific variable (shape and attributes)
    #[arg(long)]
    pub describe: Option<String>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

fn parse_domain_arg(s: &str) -> Result<DomainRange, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(
            "Invalid format: Expected 'z0:z1,y0:y1,x0:x1' (leave a side empty for unbounded)"
                .to_string(),
        );
    }

    let mut bounds = [None; 6];
    for (i, part) in parts.iter().enumerate() {
        if part.trim().is_empty() {
            continue;
        }
        let (lo, hi) = part
            .split_once(':')
            .ok_or_else(|| format!("Invalid range '{}': expected 'start:end'", part))?;
        bounds[2 * i] = parse_bound(lo)?;
        bounds[2 * i + 1] = parse_bound(hi)?;
    }

    Ok(DomainRange {
        z0: bounds[0],
        z1: bounds[1],
        y0: bounds[2],
        y1: bounds[3],
        x0: bounds[4],
        x1: bounds[5],
    })
}

fn parse_bound(s: &str) -> Result<Option<usize>, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        trimmed
            .parse::<usize>()
            .map(Some)
            .map_err(|_| format!("Invalid index '{}'", trimmed))
    }
}

fn parse_time_arg(s: &str) -> Result<(usize, usize), String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| "Invalid format: Expected '<start>:<end>'".to_string())?;
    let start = lo
        .parse::<usize>()
        .map_err(|_| format!("Invalid start step '{}'", lo))?;
    let end = hi
        .parse::<usize>()
        .map_err(|_| format!("Invalid end step '{}'", hi))?;
    if start >= end {
        return Err(format!("Empty time range {}:{}", start, end));
    }
    Ok((start, end))
}
