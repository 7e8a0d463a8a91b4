use std::fs;
use std::io::{self};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use clap_complete::{generate, Shell};
use gridform_core::{Diagnostics, Severity};
use gridform_io::{
    convert, read_source_dir, validate_folder, write_csv_folder, ConvertOptions,
};
use gridform_ts::{build_series, write_series_folder, SeriesOptions};
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use gridform_cli::cli::{build_cli_command, Cli, Commands};

fn report(diag: &Diagnostics) {
    for issue in &diag.issues {
        match issue.severity {
            Severity::Warning => warn!("{issue}"),
            Severity::Error => error!("{issue}"),
        }
    }
}

fn run_convert(
    source_dir: &Path,
    out: &Path,
    options: &ConvertOptions,
    series_options: &SeriesOptions,
    no_series: bool,
) -> Result<()> {
    let (source, import_diag) = read_source_dir(source_dir)?;
    for issue in &import_diag.issues {
        warn!("{issue}");
    }
    info!("Read source tables: {}", import_diag.summary());

    let result = convert(&source, options)?;
    report(&result.diagnostics);
    if result.diagnostics.has_errors() {
        bail!(
            "conversion produced errors ({})",
            result.diagnostics.summary()
        );
    }

    write_csv_folder(&result.network, out)
        .with_context(|| format!("writing component tables to '{}'", out.display()))?;

    if no_series {
        info!("Skipping time-series reconstruction (--no-series)");
    } else {
        let mut diag = Diagnostics::new();
        let mut tables = build_series(
            source_dir,
            &source.pointers,
            &result.network,
            series_options,
            &mut diag,
        )?;
        report(&diag);
        if diag.has_errors() {
            bail!("time-series reconstruction failed ({})", diag.summary());
        }
        if tables.is_empty() {
            warn!("no day-ahead series pointers resolved; folder has static tables only");
        } else {
            write_series_folder(&mut tables, out)
                .with_context(|| format!("writing series tables to '{}'", out.display()))?;
            info!("Wrote {} snapshots", tables.snapshots.len());
        }
    }

    info!(
        "Converted '{}' -> '{}': {}",
        source_dir.display(),
        out.display(),
        result.network.stats()
    );
    Ok(())
}

fn run_inspect(source_dir: &Path, json: bool) -> Result<()> {
    let (source, diag) = read_source_dir(source_dir)?;
    for issue in &diag.issues {
        warn!("{issue}");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&diag.stats)?);
        return Ok(());
    }

    println!("Source dataset at {}:", source_dir.display());
    println!("  Buses      : {}", diag.stats.buses);
    println!("  Branches   : {}", diag.stats.branches);
    println!("  Generators : {}", diag.stats.generators);
    println!("  Loads      : {}", diag.stats.loads);
    println!("  Pointers   : {}", diag.stats.pointers);
    if diag.stats.skipped_rows > 0 {
        println!("  Skipped rows: {}", diag.stats.skipped_rows);
    }

    let total_load: f64 = source.buses.iter().map(|b| b.mw_load).sum();
    let capacity: f64 = source.generators.iter().map(|g| g.p_max_mw).sum();
    println!("  Total load : {total_load:.1} MW");
    println!("  Capacity   : {capacity:.1} MW");

    let day_ahead = source
        .pointers
        .iter()
        .filter(|p| p.simulation == gridform_ts::SIMULATION)
        .count();
    println!("  Day-ahead series pointers: {day_ahead}");

    let mut fuels: Vec<&str> = source
        .generators
        .iter()
        .map(|g| g.fuel.as_str())
        .collect();
    fuels.sort_unstable();
    fuels.dedup();
    println!("  Fuels      : {}", fuels.join(", "));
    Ok(())
}

fn run_validate(folder: &Path, json: bool) -> Result<bool> {
    let report_result = validate_folder(folder)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report_result.diagnostics)?
        );
    } else {
        println!(
            "Validated {} ({})",
            folder.display(),
            report_result.stats
        );
        print!("{}", report_result.diagnostics);
    }
    Ok(report_result.is_usable())
}

fn generate_completions(shell: Shell, out: Option<&Path>) -> Result<()> {
    let mut cmd = build_cli_command();
    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        generate(shell, &mut cmd, "gridform", &mut file);
        println!("Wrote {shell:?} completion to {}", path.display());
    } else {
        let stdout = &mut io::stdout();
        generate(shell, &mut cmd, "gridform", stdout);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    match &cli.command {
        Some(Commands::Convert {
            source_dir,
            out,
            snapshots,
            start,
            unit_commitment,
            rating,
            skip_branch,
            no_series,
        }) => {
            let options = ConvertOptions {
                unit_commitment: *unit_commitment,
                rating: (*rating).into(),
                skip_branches: skip_branch.clone(),
            };
            let series_options = SeriesOptions {
                start: *start,
                snapshots: *snapshots,
            };
            match run_convert(source_dir, out, &options, &series_options, *no_series) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Conversion failed: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(Commands::Inspect { source_dir, json }) => {
            match run_inspect(source_dir, *json) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Inspect failed: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
        Some(Commands::Validate { folder, json }) => match run_validate(folder, *json) {
            Ok(true) => ExitCode::SUCCESS,
            Ok(false) => {
                error!("Validation found errors");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("Validation failed: {e:?}");
                ExitCode::FAILURE
            }
        },
        Some(Commands::Completions { shell, out }) => {
            match generate_completions(*shell, out.as_deref()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Completions generation failed: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            let _ = build_cli_command().print_help();
            ExitCode::SUCCESS
        }
    }
}
