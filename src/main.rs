//! Entry point for the bl_diag application.
//! Handles CLI parsing, archive loading, and dispatches quantity derivation
//! and boundary detection.

use bl_diag::analysis::{compute_quantity, domain_mean_profile, QuantityKind};
use bl_diag::detect::{detect_boundary, BoundaryDetection, BoundaryMethod, BoundarySeries};
use bl_diag::fields::{PerturbationReference, ProfileSeries};
use bl_diag::metadata::{describe_variable, list_variables_and_dimensions, print_metadata};
use bl_diag::netcdf_io::{DiagnosticsWriter, NetcdfFieldSource};
use bl_diag::parallel::{get_parallel_info, ParallelConfig};
use chrono::NaiveDateTime;
use clap::Parser;

mod cli;
use cli::Args;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!(
        r#"
------------------------------------------------------------------
        _     _           _ _
       | |__ | |      __ | (_) __ _  __ _
       | '_ \| |     / _`| | |/ _` |/ _` |
       | |_) | |___ | (_|| | | (_| | (_| |
       |_.__/|_____| \__,_|_|\__,_|\__, |
                                   |___/
            boundary-layer diagnostics for NetCDF output
------------------------------------------------------------------
        "#
    );

    ParallelConfig::new(args.threads).setup_global_pool()?;
    if args.verbose {
        get_parallel_info().print_info();
    }

    let source = NetcdfFieldSource::open(&args.file)?.with_level_variable(&args.level_var);
    println!("Successfully opened NetCDF archive: {}", args.file.display());

    if args.list_vars {
        list_variables_and_dimensions(source.file())?;
        return Ok(());
    }
    if let Some(var) = &args.describe {
        describe_variable(source.file(), var)?;
        return Ok(());
    }

    let domain = args.domain.unwrap_or_default();
    let reference = if args.full_domain_reference {
        PerturbationReference::FullDomain
    } else {
        PerturbationReference::AnalysisDomain
    };

    let num_steps = source
        .file()
        .dimension("time")
        .map(|d| d.len())
        .ok_or("archive has no 'time' dimension")?;
    let (t0, t1) = args.times.unwrap_or((0, num_steps));
    let time_steps: Vec<usize> = (t0..t1).collect();

    if let Some(method_name) = &args.method {
        let method = BoundaryMethod::parse(method_name, args.threshold, args.offset)?;

        // Each strategy consumes a different input series: the theta-based
        // methods a potential-temperature profile, the threshold method a
        // derived quantity (TKE by default), the heat-flux method w'th'.
        let series: ProfileSeries = match method {
            BoundaryMethod::ThetaPlusOffset { .. } | BoundaryMethod::MaxGradient => {
                domain_mean_profile(&source, "th", &time_steps, domain)?
            }
            BoundaryMethod::ThresholdCrossing { .. } => {
                let kind = match &args.quantity {
                    Some(name) => QuantityKind::parse(name)?,
                    None => QuantityKind::Tke,
                };
                compute_quantity(&source, kind, &time_steps, domain, reference)?
            }
            BoundaryMethod::WthBoundary { .. } => compute_quantity(
                &source,
                QuantityKind::HeatFluxCovariance,
                &time_steps,
                domain,
                reference,
            )?,
        };

        let detection = detect_boundary(method, &series)?;
        println!(
            "⚡ Detected boundary heights with method '{}' over {} time steps",
            method.as_str(),
            time_steps.len()
        );

        let labels = time_labels(
            time_steps.len(),
            t0,
            args.start_time.as_deref(),
            args.step_minutes,
        );

        match &detection {
            BoundaryDetection::Single(series) => {
                if let Some(path) = &args.output_netcdf {
                    let writer = DiagnosticsWriter::new(path);
                    writer.write_boundary_series(&format!("blh_{}", method.as_str()), series)?;
                    println!("✅ Saved result to {}", path.display());
                } else {
                    print_boundary(&labels, series);
                }
            }
            BoundaryDetection::Triple(triple) => {
                if let Some(path) = &args.output_netcdf {
                    let writer = DiagnosticsWriter::new(path);
                    writer.write_wth_series(triple)?;
                    println!("✅ Saved result to {}", path.display());
                } else {
                    println!("{:>10} {:>12} {:>12} {:>12}", "time", "lower", "mid", "upper");
                    for i in 0..triple.lower.len() {
                        println!(
                            "{:>10} {:>12} {:>12} {:>12}",
                            labels[i],
                            format_height(&triple.lower, i),
                            format_height(&triple.mid, i),
                            format_height(&triple.upper, i),
                        );
                    }
                }
            }
        }
    } else if let Some(name) = &args.quantity {
        let kind = QuantityKind::parse(name)?;
        let series = compute_quantity(&source, kind, &time_steps, domain, reference)?;
        println!(
            "⚡ Computed {} over {} time steps and {} levels",
            kind.as_str(),
            series.num_steps(),
            series.num_levels()
        );

        if let Some(path) = &args.output_netcdf {
            let writer = DiagnosticsWriter::new(path);
            writer.write_profile_series(kind.as_str(), &series)?;
            println!("✅ Saved result to {}", path.display());
        } else if args.verbose {
            println!("{:?}", series.data);
        } else {
            println!("(use --output-netcdf or --verbose to see the full series)");
        }
    } else {
        print_metadata(source.file())?;
    }

    Ok(())
}

fn time_labels(n: usize, t0: usize, start: Option<&str>, step_minutes: i64) -> Vec<String> {
    let parsed = start.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").ok());
    match parsed {
        Some(base) => (0..n)
            .map(|i| {
                let offset = chrono::Duration::minutes(step_minutes * (t0 + i) as i64);
                (base + offset).format("%H:%M").to_string()
            })
            .collect(),
        None => (0..n).map(|i| (t0 + i).to_string()).collect(),
    }
}

fn format_height(series: &BoundarySeries, index: usize) -> String {
    if series.found[index] {
        format!("{:.3} km", series.heights[index] / 1000.0)
    } else {
        "-".to_string()
    }
}

fn print_boundary(labels: &[String], series: &BoundarySeries) {
    println!("{:>10} {:>12}", "time", "height");
    for i in 0..series.len() {
        println!("{:>10} {:>12}", labels[i], format_height(series, i));
    }
}
