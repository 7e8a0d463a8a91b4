//! Validation of an exported CSV folder
//!
//! Reads a folder back from disk and checks the things that make the
//! downstream model fail late and cryptically: dangling component
//! references, missing or duplicated slack, electrical islands, and series
//! files that disagree with the snapshot index or name unknown components.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use gridform_core::topology::BusGraph;
use gridform_core::{Diagnostics, NetworkStats};
use tracing::debug;

use crate::pypsa::read_csv_folder;

/// Series tables checked against the component list that owns their columns.
const SERIES_TABLES: &[(&str, Component)] = &[
    ("generators-p_max_pu.csv", Component::Generator),
    ("generators-p_min_pu.csv", Component::Generator),
    ("loads-p_set.csv", Component::Load),
];

#[derive(Debug, Clone, Copy)]
enum Component {
    Generator,
    Load,
}

impl Component {
    fn noun(&self) -> &'static str {
        match self {
            Component::Generator => "generator",
            Component::Load => "load",
        }
    }
}

/// What `validate` reports: the issues found plus the size of the network
/// they were found in.
#[derive(Debug)]
pub struct ValidationReport {
    pub diagnostics: Diagnostics,
    pub stats: NetworkStats,
}

impl ValidationReport {
    pub fn is_usable(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Validate an exported folder. Fails only when the folder itself is
/// unreadable; every finding about its content lands in the report.
pub fn validate_folder(dir: &Path) -> Result<ValidationReport> {
    let mut diag = Diagnostics::new();
    let network = read_csv_folder(dir, &mut diag)?;

    network.validate_into(&mut diag);

    let graph = BusGraph::from_network(&network);
    if !graph.is_connected() {
        let sizes: Vec<String> = graph
            .islands()
            .iter()
            .map(|island| island.buses.len().to_string())
            .collect();
        diag.add_warning(
            "topology",
            &format!(
                "network splits into {} electrical islands (sizes: {})",
                sizes.len(),
                sizes.join(", ")
            ),
        );
    }

    let snapshots = read_snapshots(dir, &mut diag)?;

    let generator_names: HashSet<&str> =
        network.generators.iter().map(|g| g.name.as_str()).collect();
    let load_names: HashSet<&str> = network.loads.iter().map(|l| l.name.as_str()).collect();

    let mut p_max_columns: Option<Vec<String>> = None;
    for (file, component) in SERIES_TABLES {
        let path = dir.join(file);
        if !path.exists() {
            continue;
        }
        let known = match component {
            Component::Generator => &generator_names,
            Component::Load => &load_names,
        };
        let columns =
            check_series_table(&path, file, component, known, snapshots.as_deref(), &mut diag)?;
        if *file == "generators-p_max_pu.csv" {
            p_max_columns = Some(columns);
        }
    }

    let p_set_path = dir.join("loads-p_set.csv");
    if p_set_path.exists() {
        if let Some(peak) = peak_series_load(&p_set_path)? {
            let capacity = network.total_capacity_mw();
            if peak > capacity {
                diag.add_warning(
                    "capacity",
                    &format!(
                        "peak series load ({peak:.1} MW) exceeds total generation \
                         capacity ({capacity:.1} MW)"
                    ),
                );
            }
        }
    }

    // a variable unit without an availability series dispatches at its static
    // ceiling, which is almost never intended
    if let Some(columns) = &p_max_columns {
        for gen in &network.generators {
            if matches!(gen.carrier.as_str(), "Solar" | "Wind")
                && !columns.iter().any(|c| c == &gen.name)
            {
                diag.add_warning_with_entity(
                    "series",
                    "variable generator has no availability series",
                    &format!("Generator {}", gen.name),
                );
            }
        }
    }

    Ok(ValidationReport {
        stats: network.stats(),
        diagnostics: diag,
    })
}

/// Read the snapshot index if the folder has one. Its absence is only a
/// warning when series tables exist, checked by the caller per table.
fn read_snapshots(dir: &Path, diag: &mut Diagnostics) -> Result<Option<Vec<String>>> {
    let path = dir.join("snapshots.csv");
    if !path.exists() {
        return Ok(None);
    }
    let file =
        File::open(&path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut snapshots = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading '{}'", path.display()))?;
        match record.get(0) {
            Some(value) if !value.is_empty() => snapshots.push(value.to_string()),
            _ => diag.add_error("snapshots.csv", "empty snapshot value"),
        }
    }
    debug!(snapshots = snapshots.len(), "read snapshot index");
    Ok(Some(snapshots))
}

/// Highest total load across the series snapshots. The static capacity check
/// in the component model only sees the base load, which understates peak
/// demand when the profiles swing above it.
fn peak_series_load(path: &Path) -> Result<Option<f64>> {
    let file = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut peak: Option<f64> = None;
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading '{}'", path.display()))?;
        let total: f64 = record
            .iter()
            .skip(1)
            .filter_map(|v| v.parse::<f64>().ok())
            .sum();
        peak = Some(peak.map_or(total, |p: f64| p.max(total)));
    }
    Ok(peak)
}

fn check_series_table(
    path: &Path,
    file: &str,
    component: &Component,
    known: &HashSet<&str>,
    snapshots: Option<&[String]>,
    diag: &mut Diagnostics,
) -> Result<Vec<String>> {
    let reader = File::open(path).with_context(|| format!("opening '{}'", path.display()))?;
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr
        .headers()
        .with_context(|| format!("reading headers of '{}'", path.display()))?
        .clone();
    let mut columns = headers.iter();
    match columns.next() {
        Some("snapshot") => {}
        Some(other) => diag.add_error(
            file,
            &format!("first column must be 'snapshot', found '{other}'"),
        ),
        None => {
            diag.add_error(file, "table has no columns");
            return Ok(Vec::new());
        }
    }
    let value_columns: Vec<String> = columns.map(str::to_string).collect();
    for column in &value_columns {
        if !known.contains(column.as_str()) {
            diag.add_warning(
                file,
                &format!("column '{}' names no known {}", column, component.noun()),
            );
        }
    }

    let mut index = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("reading '{}'", path.display()))?;
        index.push(record.get(0).unwrap_or_default().to_string());
    }

    match snapshots {
        None => diag.add_warning(
            file,
            "series table present but folder has no snapshots.csv",
        ),
        Some(snapshots) => {
            if index.len() != snapshots.len() {
                diag.add_error(
                    file,
                    &format!(
                        "{} rows but the snapshot index has {}",
                        index.len(),
                        snapshots.len()
                    ),
                );
            } else if let Some(pos) = index.iter().zip(snapshots).position(|(a, b)| a != b) {
                diag.add_error(
                    file,
                    &format!(
                        "snapshot mismatch at row {}: '{}' vs '{}'",
                        pos + 1,
                        index[pos],
                        snapshots[pos]
                    ),
                );
            }
        }
    }
    Ok(value_columns)
}
