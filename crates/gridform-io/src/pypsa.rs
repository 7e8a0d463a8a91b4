//! PyPSA CSV folder export and read-back
//!
//! The target layout is a directory of component tables named after the
//! component list (`buses.csv`, `lines.csv`, `generators.csv`, `loads.csv`)
//! plus per-attribute series files written by the time-series crate. Values
//! are rounded to five decimals and booleans use the Python spelling, so the
//! output diffs cleanly against folders written by pandas.

use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use gridform_core::{
    Control, Diagnostics, Kilometers, Kilovolts, Megawatts, MegavoltAmperes, PerUnit, PypsaBus,
    PypsaGenerator, PypsaLine, PypsaLoad, PypsaNetwork,
};
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// Decimal places kept in the output tables.
pub const DIGITS: i32 = 5;

fn round(value: f64) -> f64 {
    let factor = 10f64.powi(DIGITS);
    (value * factor).round() / factor
}

fn round_opt(value: Option<f64>) -> Option<f64> {
    value.map(round)
}

/// pandas spells booleans `True`/`False`; matching it keeps the folder
/// byte-comparable with the upstream tooling's output.
fn python_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

#[derive(Debug, Serialize)]
struct BusRecord {
    name: String,
    v_nom: f64,
    #[serde(rename = "type")]
    type_: &'static str,
    x: f64,
    y: f64,
    v_mag_pu_set: f64,
    carrier: String,
    area: String,
}

impl From<&PypsaBus> for BusRecord {
    fn from(bus: &PypsaBus) -> Self {
        BusRecord {
            name: bus.name.clone(),
            v_nom: round(bus.v_nom.value()),
            type_: bus.control.as_str(),
            x: round(bus.x),
            y: round(bus.y),
            v_mag_pu_set: round(bus.v_mag_pu_set.value()),
            carrier: bus.carrier.clone(),
            area: bus.area.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct LineRecord {
    name: String,
    bus0: String,
    bus1: String,
    x: f64,
    r: f64,
    b: f64,
    s_nom: f64,
    length: f64,
    v_nom0: f64,
    v_nom1: f64,
}

impl From<&PypsaLine> for LineRecord {
    fn from(line: &PypsaLine) -> Self {
        LineRecord {
            name: line.name.clone(),
            bus0: line.bus0.clone(),
            bus1: line.bus1.clone(),
            x: round(line.x),
            r: round(line.r),
            b: round(line.b),
            s_nom: round(line.s_nom.value()),
            length: round(line.length.value()),
            v_nom0: round(line.v_nom0.value()),
            v_nom1: round(line.v_nom1.value()),
        }
    }
}

#[derive(Debug, Serialize)]
struct GeneratorRecord {
    name: String,
    bus: String,
    control: &'static str,
    #[serde(rename = "type")]
    type_: String,
    p_nom: f64,
    carrier: String,
    marginal_cost: f64,
    #[serde(serialize_with = "python_bool")]
    committable: bool,
    start_up_cost: f64,
    shut_down_cost: f64,
    min_up_time: f64,
    min_down_time: f64,
    up_time_before: f64,
    ramp_limit_up: Option<f64>,
    p_max_pu: f64,
    p_min_pu: f64,
}

impl From<&PypsaGenerator> for GeneratorRecord {
    fn from(gen: &PypsaGenerator) -> Self {
        GeneratorRecord {
            name: gen.name.clone(),
            bus: gen.bus.clone(),
            control: gen.control.as_str(),
            type_: gen.type_.clone(),
            p_nom: round(gen.p_nom.value()),
            carrier: gen.carrier.clone(),
            marginal_cost: round(gen.marginal_cost),
            committable: gen.committable,
            start_up_cost: round(gen.start_up_cost),
            shut_down_cost: round(gen.shut_down_cost),
            min_up_time: gen.min_up_time,
            min_down_time: gen.min_down_time,
            up_time_before: gen.up_time_before,
            ramp_limit_up: round_opt(gen.ramp_limit_up),
            p_max_pu: round(gen.p_max_pu.value()),
            p_min_pu: round(gen.p_min_pu.value()),
        }
    }
}

#[derive(Debug, Serialize)]
struct LoadRecord {
    name: String,
    bus: String,
    carrier: String,
    area: String,
    mwload: f64,
}

impl From<&PypsaLoad> for LoadRecord {
    fn from(load: &PypsaLoad) -> Self {
        LoadRecord {
            name: load.name.clone(),
            bus: load.bus.clone(),
            carrier: load.carrier.clone(),
            area: load.area.clone(),
            mwload: round(load.p_base.value()),
        }
    }
}

fn write_table<T: Serialize>(out_dir: &Path, file: &str, records: Vec<T>) -> Result<()> {
    let path = out_dir.join(file);
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("creating output table '{}'", path.display()))?;
    let count = records.len();
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing '{}'", path.display()))?;
    debug!(file, rows = count, "wrote component table");
    Ok(())
}

/// Write the static component tables of `network` into `out_dir`, creating
/// the directory if needed.
pub fn write_csv_folder(network: &PypsaNetwork, out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output folder '{}'", out_dir.display()))?;

    write_table(
        out_dir,
        "buses.csv",
        network.buses.iter().map(BusRecord::from).collect(),
    )?;
    write_table(
        out_dir,
        "lines.csv",
        network.lines.iter().map(LineRecord::from).collect(),
    )?;
    write_table(
        out_dir,
        "generators.csv",
        network.generators.iter().map(GeneratorRecord::from).collect(),
    )?;
    write_table(
        out_dir,
        "loads.csv",
        network.loads.iter().map(LoadRecord::from).collect(),
    )?;
    Ok(())
}

// Read-back structs mirror the writers; `validate` works from the folder on
// disk, never from in-memory state, so problems introduced after export are
// caught too.

#[derive(Debug, Deserialize)]
struct BusRow {
    name: String,
    v_nom: f64,
    #[serde(rename = "type")]
    type_: String,
    x: f64,
    y: f64,
    v_mag_pu_set: f64,
    carrier: String,
    #[serde(default)]
    area: String,
}

#[derive(Debug, Deserialize)]
struct LineRow {
    name: String,
    bus0: String,
    bus1: String,
    x: f64,
    r: f64,
    b: f64,
    s_nom: f64,
    length: f64,
    #[serde(default)]
    v_nom0: f64,
    #[serde(default)]
    v_nom1: f64,
}

#[derive(Debug, Deserialize)]
struct GeneratorRow {
    name: String,
    bus: String,
    control: String,
    #[serde(rename = "type", default)]
    type_: String,
    p_nom: f64,
    #[serde(default)]
    carrier: String,
    #[serde(default)]
    marginal_cost: f64,
    #[serde(default)]
    committable: String,
    #[serde(default)]
    start_up_cost: f64,
    #[serde(default)]
    shut_down_cost: f64,
    #[serde(default)]
    min_up_time: f64,
    #[serde(default)]
    min_down_time: f64,
    #[serde(default)]
    up_time_before: f64,
    #[serde(default)]
    ramp_limit_up: Option<f64>,
    #[serde(default = "one")]
    p_max_pu: f64,
    #[serde(default)]
    p_min_pu: f64,
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct LoadRow {
    name: String,
    bus: String,
    #[serde(default)]
    carrier: String,
    #[serde(default)]
    area: String,
    #[serde(default)]
    mwload: f64,
}

fn read_rows<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &str,
    diag: &mut Diagnostics,
) -> Result<Vec<T>> {
    let path = dir.join(file);
    let reader = File::open(&path)
        .with_context(|| format!("opening component table '{}'", path.display()))?;
    let mut rdr = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) => diag.add_error(file, &format!("row {}: {err}", i + 2)),
        }
    }
    Ok(rows)
}

fn parse_control(s: &str, entity: &str, diag: &mut Diagnostics) -> Control {
    match s.parse() {
        Ok(control) => control,
        Err(_) => {
            diag.add_error_with_entity("schema", &format!("unknown control '{s}'"), entity);
            Control::PQ
        }
    }
}

/// Read the static component tables of a folder back into a
/// [`PypsaNetwork`]. Malformed rows become diagnostics, not failures; only a
/// missing or unreadable table aborts.
pub fn read_csv_folder(dir: &Path, diag: &mut Diagnostics) -> Result<PypsaNetwork> {
    let buses: Vec<BusRow> = read_rows(dir, "buses.csv", diag)?;
    let lines: Vec<LineRow> = read_rows(dir, "lines.csv", diag)?;
    let generators: Vec<GeneratorRow> = read_rows(dir, "generators.csv", diag)?;
    let loads: Vec<LoadRow> = read_rows(dir, "loads.csv", diag)?;

    Ok(PypsaNetwork {
        buses: buses
            .into_iter()
            .map(|row| {
                let control = parse_control(&row.type_, &format!("Bus {}", row.name), diag);
                PypsaBus {
                    name: row.name,
                    v_nom: Kilovolts(row.v_nom),
                    control,
                    x: row.x,
                    y: row.y,
                    v_mag_pu_set: PerUnit(row.v_mag_pu_set),
                    area: row.area,
                    carrier: row.carrier,
                }
            })
            .collect(),
        lines: lines
            .into_iter()
            .map(|row| PypsaLine {
                name: row.name,
                bus0: row.bus0,
                bus1: row.bus1,
                r: row.r,
                x: row.x,
                b: row.b,
                s_nom: MegavoltAmperes(row.s_nom),
                length: Kilometers(row.length),
                v_nom0: Kilovolts(row.v_nom0),
                v_nom1: Kilovolts(row.v_nom1),
            })
            .collect(),
        generators: generators
            .into_iter()
            .map(|row| {
                let control =
                    parse_control(&row.control, &format!("Generator {}", row.name), diag);
                PypsaGenerator {
                    name: row.name,
                    bus: row.bus,
                    control,
                    type_: row.type_,
                    carrier: row.carrier,
                    p_nom: Megawatts(row.p_nom),
                    p_max_pu: PerUnit(row.p_max_pu),
                    p_min_pu: PerUnit(row.p_min_pu),
                    marginal_cost: row.marginal_cost,
                    committable: row.committable == "True",
                    start_up_cost: row.start_up_cost,
                    shut_down_cost: row.shut_down_cost,
                    min_up_time: row.min_up_time,
                    min_down_time: row.min_down_time,
                    up_time_before: row.up_time_before,
                    ramp_limit_up: row.ramp_limit_up,
                }
            })
            .collect(),
        loads: loads
            .into_iter()
            .map(|row| PypsaLoad {
                name: row.name,
                bus: row.bus,
                carrier: row.carrier,
                area: row.area,
                p_base: Megawatts(row.mwload),
            })
            .collect(),
    })
}
