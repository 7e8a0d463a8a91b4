//! # gridform-ts: time-series reconstruction
//!
//! The source dataset stores time-varying attributes out-of-line: a pointer
//! table maps (object, parameter) pairs to data files keyed by
//! year/month/day/period. This crate follows the day-ahead pointers, merges
//! the data files into one frame per target attribute, converts the calendar
//! keys into a snapshot index, and distributes area load profiles onto the
//! buses that carry demand.
//!
//! Output tables use the per-attribute naming of the target layout:
//! `generators-p_max_pu.csv`, `generators-p_min_pu.csv`, `loads-p_set.csv`,
//! plus the `snapshots.csv` index they all share.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use gridform_core::{Diagnostics, PypsaNetwork};
use gridform_io::rts::SeriesPointer;
use polars::prelude::*;

/// Pointer rows of other simulation stages (real-time, ...) are ignored.
pub const SIMULATION: &str = "DAY_AHEAD";

const KEY_COLUMNS: [&str; 4] = ["year", "month", "day", "period"];

/// Window selection over the reconstructed series.
#[derive(Debug, Clone, Default)]
pub struct SeriesOptions {
    /// First snapshot to keep (offset into the year)
    pub start: usize,
    /// Number of snapshots to keep; `None` keeps everything from `start`
    pub snapshots: Option<usize>,
}

/// The reconstructed series tables, one frame per target attribute.
#[derive(Debug)]
pub struct SeriesTables {
    /// The shared snapshot index, as `YYYY-MM-DD HH:MM:SS` strings
    pub snapshots: Vec<String>,
    pub generators_p_max_pu: Option<DataFrame>,
    pub generators_p_min_pu: Option<DataFrame>,
    pub loads_p_set: Option<DataFrame>,
}

impl SeriesTables {
    pub fn is_empty(&self) -> bool {
        self.generators_p_max_pu.is_none()
            && self.generators_p_min_pu.is_none()
            && self.loads_p_set.is_none()
    }
}

/// Reconstruct the series tables for a converted network.
///
/// `pointers` is the full pointer table; only day-ahead rows whose object
/// exists in `network` are followed. Pointer rows that cannot be resolved
/// land in `diag` as warnings and the rest of the reconstruction proceeds.
pub fn build_series(
    source_dir: &Path,
    pointers: &[SeriesPointer],
    network: &PypsaNetwork,
    options: &SeriesOptions,
    diag: &mut Diagnostics,
) -> Result<SeriesTables> {
    let generator_names: HashSet<&str> =
        network.generators.iter().map(|g| g.name.as_str()).collect();

    let mut p_max = Vec::new();
    let mut p_min = Vec::new();
    let mut load = Vec::new();
    for pointer in pointers {
        if pointer.simulation != SIMULATION {
            continue;
        }
        match (pointer.category.as_str(), pointer.parameter.as_str()) {
            ("Generator", "PMax MW") | ("Generator", "PMin MW") => {
                if !generator_names.contains(pointer.object.as_str()) {
                    // storage heads and dropped units keep their pointers in
                    // the source table
                    diag.add_warning_with_entity(
                        "series",
                        "pointer names no converted generator, skipping",
                        &format!("Object {}", pointer.object),
                    );
                    continue;
                }
                if pointer.parameter == "PMax MW" {
                    p_max.push(pointer);
                } else {
                    p_min.push(pointer);
                }
            }
            ("Area", "MW Load") => load.push(pointer),
            _ => {}
        }
    }

    let generators_p_max_pu = assemble(source_dir, &p_max, options, diag)?;
    let generators_p_min_pu = assemble(source_dir, &p_min, options, diag)?;
    let area_load = assemble(source_dir, &load, options, diag)?;

    let loads_p_set = match area_load {
        Some(frame) => Some(distribute_load(&frame, network, diag)?),
        None => None,
    };

    let mut snapshots: Vec<String> = Vec::new();
    for frame in [&generators_p_max_pu, &generators_p_min_pu, &loads_p_set]
        .into_iter()
        .flatten()
    {
        let index = snapshot_index(frame)?;
        if snapshots.is_empty() {
            snapshots = index;
        } else if snapshots != index {
            diag.add_error(
                "series",
                "series tables disagree on the snapshot index; source data files cover \
                 different periods",
            );
        }
    }

    Ok(SeriesTables {
        snapshots,
        generators_p_max_pu,
        generators_p_min_pu,
        loads_p_set,
    })
}

/// Merge the data files behind one attribute's pointers into a single
/// windowed frame with a `snapshot` index column.
fn assemble(
    source_dir: &Path,
    pointers: &[&SeriesPointer],
    options: &SeriesOptions,
    diag: &mut Diagnostics,
) -> Result<Option<DataFrame>> {
    if pointers.is_empty() {
        return Ok(None);
    }

    // one read per data file, however many objects point into it
    let mut by_file: BTreeMap<&str, Vec<&SeriesPointer>> = BTreeMap::new();
    for pointer in pointers {
        by_file
            .entry(pointer.data_file.as_str())
            .or_default()
            .push(pointer);
    }

    let mut merged: Option<DataFrame> = None;
    for (data_file, file_pointers) in by_file {
        // groups are never empty; every pointer in one shares the data file
        let path = file_pointers[0].resolve(source_dir);
        let mut df = read_data_frame(&path)
            .with_context(|| format!("reading series data file '{}'", path.display()))?;

        let mut objects = Vec::new();
        for pointer in file_pointers {
            if df.column(&pointer.object).is_err() {
                diag.add_warning_with_entity(
                    "series",
                    &format!("data file '{}' has no such column", data_file),
                    &format!("Object {}", pointer.object),
                );
                continue;
            }
            if pointer.scaling_factor == 0.0 {
                diag.add_error_with_entity(
                    "series",
                    "zero scaling factor",
                    &format!("Object {}", pointer.object),
                );
                continue;
            }
            // integer-typed columns would otherwise divide integrally
            let casted = df.column(&pointer.object)?.cast(&DataType::Float64)?;
            df.replace(&pointer.object, casted)?;
            let scaling = pointer.scaling_factor;
            df.apply(&pointer.object, |s| s / scaling)?;
            objects.push(pointer.object.as_str());
        }
        if objects.is_empty() {
            continue;
        }

        let mut selection: Vec<&str> = KEY_COLUMNS.to_vec();
        selection.extend(objects);
        let df = df.select(selection)?;

        merged = Some(match merged {
            None => df,
            Some(left) => left
                .outer_join(&df, KEY_COLUMNS, KEY_COLUMNS)
                .context("merging series data files on calendar keys")?,
        });
    }

    let Some(frame) = merged else {
        return Ok(None);
    };
    let frame = attach_snapshots(frame)?;
    Ok(Some(window(frame, options, diag)))
}

/// Read one data file; headers are normalized so the calendar keys become
/// `year`/`month`/`day`/`period` regardless of source capitalization.
fn read_data_frame(path: &Path) -> Result<DataFrame> {
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut df = CsvReader::new(&mut file)
        .has_header(true)
        .finish()
        .context("reading CSV data file")?;
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let normalized = gridform_core::normalize_header(&name);
        if normalized != name {
            df.rename(&name, &normalized)?;
        }
    }
    for key in KEY_COLUMNS {
        if df.column(key).is_err() {
            return Err(anyhow!(
                "data file '{}' is missing calendar key column '{}'",
                path.display(),
                key
            ));
        }
    }
    Ok(df)
}

/// Turn the year/month/day/period keys into a sorted `snapshot` string
/// column. Periods count hours within the day starting at 1.
fn attach_snapshots(mut df: DataFrame) -> Result<DataFrame> {
    let years = df.column("year")?.cast(&DataType::Int64)?;
    let months = df.column("month")?.cast(&DataType::Int64)?;
    let days = df.column("day")?.cast(&DataType::Int64)?;
    let periods = df.column("period")?.cast(&DataType::Int64)?;

    let mut snapshots = Vec::with_capacity(df.height());
    for (((year, month), day), period) in years
        .i64()?
        .into_iter()
        .zip(months.i64()?.into_iter())
        .zip(days.i64()?.into_iter())
        .zip(periods.i64()?.into_iter())
    {
        let (Some(year), Some(month), Some(day), Some(period)) = (year, month, day, period) else {
            return Err(anyhow!("null calendar key in series data"));
        };
        let date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .ok_or_else(|| anyhow!("invalid date {year}-{month}-{day} in series data"))?;
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date {year}-{month}-{day} in series data"))?
            + Duration::hours(period - 1);
        snapshots.push(timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
    }

    df.with_column(Series::new("snapshot", snapshots))?;
    for key in KEY_COLUMNS {
        df = df.drop(key)?;
    }

    // snapshot first, value columns after, in time order
    let mut columns = vec!["snapshot".to_string()];
    columns.extend(
        df.get_column_names()
            .iter()
            .filter(|name| **name != "snapshot")
            .map(|name| name.to_string()),
    );
    let df = df.select(columns)?;
    df.lazy()
        .sort("snapshot", SortOptions::default())
        .collect()
        .context("sorting series by snapshot")
}

fn window(df: DataFrame, options: &SeriesOptions, diag: &mut Diagnostics) -> DataFrame {
    let height = df.height();
    let available = height.saturating_sub(options.start);
    let wanted = options.snapshots.unwrap_or(available);
    if wanted > available {
        diag.add_warning(
            "series",
            &format!(
                "requested {} snapshots from offset {} but the source data has {} rows",
                wanted, options.start, height
            ),
        );
    }
    df.slice(options.start as i64, wanted)
}

/// Expand area load profiles into one column per load, weighted by each
/// bus's share of the area demand.
fn distribute_load(
    area_frame: &DataFrame,
    network: &PypsaNetwork,
    diag: &mut Diagnostics,
) -> Result<DataFrame> {
    let mut columns = vec![area_frame.column("snapshot")?.clone()];
    for load in &network.loads {
        let area_series = match area_frame.column(&load.area) {
            Ok(series) => series.cast(&DataType::Float64)?,
            Err(_) => {
                diag.add_warning_with_entity(
                    "series",
                    &format!("no load profile for area '{}'", load.area),
                    &format!("Load {}", load.name),
                );
                continue;
            }
        };
        let mut scaled = &area_series * load.p_base.value();
        scaled.rename(&load.name);
        columns.push(scaled);
    }
    DataFrame::new(columns).context("assembling load series table")
}

fn snapshot_index(df: &DataFrame) -> Result<Vec<String>> {
    Ok(df
        .column("snapshot")?
        .utf8()?
        .into_iter()
        .map(|value| value.unwrap_or_default().to_string())
        .collect())
}

fn round_values(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        if df.column(&name)?.dtype() != &DataType::Float64 {
            continue;
        }
        let rounded: Float64Chunked = df
            .column(&name)?
            .f64()?
            .into_iter()
            .map(|value| value.map(|v| (v * 1e5).round() / 1e5))
            .collect();
        let mut series = rounded.into_series();
        series.rename(&name);
        df.replace(&name, series)?;
    }
    Ok(())
}

fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    round_values(df)?;
    let mut file =
        File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    CsvWriter::new(&mut file)
        .finish(df)
        .with_context(|| format!("writing '{}'", path.display()))
}

/// Write the series tables and their shared snapshot index into an exported
/// folder.
pub fn write_series_folder(tables: &mut SeriesTables, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output folder '{}'", out_dir.display()))?;

    if let Some(df) = tables.generators_p_max_pu.as_mut() {
        write_frame(df, &out_dir.join("generators-p_max_pu.csv"))?;
    }
    if let Some(df) = tables.generators_p_min_pu.as_mut() {
        write_frame(df, &out_dir.join("generators-p_min_pu.csv"))?;
    }
    if let Some(df) = tables.loads_p_set.as_mut() {
        write_frame(df, &out_dir.join("loads-p_set.csv"))?;
    }

    let mut index = DataFrame::new(vec![Series::new("snapshot", tables.snapshots.clone())])?;
    let mut file = File::create(out_dir.join("snapshots.csv"))
        .context("creating snapshot index table")?;
    CsvWriter::new(&mut file)
        .finish(&mut index)
        .context("writing snapshot index table")
}
