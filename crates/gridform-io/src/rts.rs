//! RTS-GMLC source table readers
//!
//! The source dataset is a directory of CSVs (`bus.csv`, `branch.csv`,
//! `gen.csv`, `timeseries_pointers.csv`). Headers are human-oriented
//! (`"Fuel Price $/MMBTU"`, `"Ramp Rate MW/Min"`); we normalize them the way
//! the dataset's own tooling does before deserializing, so the serde renames
//! below are the lowercased, space-stripped forms.
//!
//! Reference: <https://github.com/GridMod/RTS-GMLC>

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use gridform_core::{normalize_header, ImportDiagnostics};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

/// A row of `bus.csv`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBus {
    #[serde(rename = "busid")]
    pub bus_id: u32,
    #[serde(rename = "busname", default)]
    pub bus_name: Option<String>,
    #[serde(rename = "basekv")]
    pub base_kv: f64,
    #[serde(rename = "bustype")]
    pub bus_type: String,
    #[serde(rename = "mwload")]
    pub mw_load: f64,
    #[serde(rename = "vmag")]
    pub v_mag: f64,
    pub area: u32,
    #[serde(rename = "lat")]
    pub lat: f64,
    #[serde(rename = "lng")]
    pub lng: f64,
}

/// A row of `branch.csv`. Covers both lines and transformers; a non-zero
/// `Tr Ratio` marks a transformer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBranch {
    pub uid: String,
    #[serde(rename = "frombus")]
    pub from_bus: u32,
    #[serde(rename = "tobus")]
    pub to_bus: u32,
    /// Series resistance (per-unit on system base)
    pub r: f64,
    /// Series reactance (per-unit on system base)
    pub x: f64,
    /// Shunt susceptance (per-unit on system base)
    pub b: f64,
    #[serde(rename = "contrating")]
    pub cont_rating: f64,
    #[serde(rename = "lterating", default)]
    pub lte_rating: Option<f64>,
    #[serde(rename = "sterating", default)]
    pub ste_rating: Option<f64>,
    #[serde(rename = "trratio", default)]
    pub tr_ratio: Option<f64>,
    /// Length in miles
    pub length: f64,
}

/// A row of `gen.csv`. Thermal-cost and commitment columns are blank for
/// renewables, hence the Options.
#[derive(Debug, Clone, Deserialize)]
pub struct RawGen {
    #[serde(rename = "genuid")]
    pub gen_uid: String,
    #[serde(rename = "busid")]
    pub bus_id: u32,
    #[serde(rename = "unittype")]
    pub unit_type: String,
    pub fuel: String,
    /// Active power injection at the source operating point (MW)
    #[serde(rename = "mwinj", default)]
    pub mw_inj: Option<f64>,
    #[serde(rename = "pmaxmw")]
    pub p_max_mw: f64,
    #[serde(rename = "pminmw", default)]
    pub p_min_mw: Option<f64>,
    #[serde(rename = "minuptimehr", default)]
    pub min_up_time_hr: Option<f64>,
    #[serde(rename = "mindowntimehr", default)]
    pub min_down_time_hr: Option<f64>,
    #[serde(rename = "rampratemw/min", default)]
    pub ramp_rate_mw_per_min: Option<f64>,
    #[serde(rename = "startheatwarmmbtu", default)]
    pub start_heat_warm_mbtu: Option<f64>,
    #[serde(rename = "nonfuelstartcost$", default)]
    pub non_fuel_start_cost: Option<f64>,
    #[serde(rename = "nonfuelshutdowncost$", default)]
    pub non_fuel_shutdown_cost: Option<f64>,
    #[serde(rename = "fuelprice$/mmbtu", default)]
    pub fuel_price_per_mmbtu: Option<f64>,
    #[serde(rename = "hr_avg_0", default)]
    pub hr_avg_0: Option<f64>,
    #[serde(rename = "hr_incr_2", default)]
    pub hr_incr_2: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// A row of `timeseries_pointers.csv`: which data file holds the series for
/// which object/parameter, and the factor its columns are scaled by.
#[derive(Debug, Clone, Deserialize)]
pub struct SeriesPointer {
    pub simulation: String,
    pub category: String,
    pub object: String,
    pub parameter: String,
    #[serde(rename = "scalingfactor")]
    pub scaling_factor: f64,
    #[serde(rename = "datafile")]
    pub data_file: String,
}

impl SeriesPointer {
    /// Resolve the pointed-to data file relative to the source directory.
    pub fn resolve(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.data_file)
    }
}

/// All static source tables read from one dataset directory.
#[derive(Debug, Clone)]
pub struct RtsSource {
    pub buses: Vec<RawBus>,
    pub branches: Vec<RawBranch>,
    pub generators: Vec<RawGen>,
    pub pointers: Vec<SeriesPointer>,
}

/// Read one CSV table with normalized headers, collecting per-row failures
/// into `diag` instead of aborting the whole import.
pub fn read_table<T: DeserializeOwned>(
    path: &Path,
    table: &str,
    diag: &mut ImportDiagnostics,
) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("opening {} table '{}'", table, path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let normalized: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading headers of '{}'", path.display()))?
        .iter()
        .map(normalize_header)
        .collect();
    rdr.set_headers(StringRecord::from(normalized));

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize::<T>().enumerate() {
        // line 1 is the header
        let line = i + 2;
        match result {
            Ok(row) => rows.push(row),
            Err(err) => diag.add_error_at_line(table, &format!("{err}"), line),
        }
    }
    debug!(table, rows = rows.len(), "read source table");
    Ok(rows)
}

/// Read the four static tables of an RTS-GMLC `SourceData` directory.
pub fn read_source_dir(source_dir: &Path) -> Result<(RtsSource, ImportDiagnostics)> {
    let mut diag = ImportDiagnostics::new();

    let buses: Vec<RawBus> = read_table(&source_dir.join("bus.csv"), "bus", &mut diag)?;
    let branches: Vec<RawBranch> = read_table(&source_dir.join("branch.csv"), "branch", &mut diag)?;
    let generators: Vec<RawGen> = read_table(&source_dir.join("gen.csv"), "gen", &mut diag)?;
    let pointers: Vec<SeriesPointer> = read_table(
        &source_dir.join("timeseries_pointers.csv"),
        "timeseries_pointers",
        &mut diag,
    )?;

    diag.stats.buses = buses.len();
    diag.stats.loads = buses.iter().filter(|b| b.mw_load > 0.0).count();
    diag.stats.branches = branches.len();
    diag.stats.generators = generators.len();
    diag.stats.pointers = pointers.len();

    Ok((
        RtsSource {
            buses,
            branches,
            generators,
            pointers,
        },
        diag,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    const BUS_CSV: &str = "\
Bus ID,Bus Name,BaseKV,Bus Type,MW Load,MVAR Load,V Mag,V Angle,Area,Sub Area,Zone,lat,lng
101,Abel,138,PV,108,22,1.0398,-14.45,1,11,1,34.02,-116.97
113,Arne,230,Ref,265,54,1.04,-6.68,1,11,1,34.39,-117.66
";

    const BRANCH_CSV: &str = "\
UID,From Bus,To Bus,R,X,B,Cont Rating,LTE Rating,STE Rating,Perm OutRate,Duration,Tran OutRate,Tr Ratio,Length
A1,101,102,0.003,0.014,0.461,175,193,200,0.24,16,0.0,0,3
A3,101,113,0.0023,0.0839,0,400,510,600,0.02,768,0.0,1.03,0
";

    const GEN_CSV: &str = "\
GEN UID,Bus ID,Gen ID,Unit Group,Unit Type,Fuel,MW Inj,MVAR Inj,V Setpoint p.u.,PMax MW,PMin MW,QMax MVAR,QMin MVAR,Min Down Time Hr,Min Up Time Hr,Ramp Rate MW/Min,Start Heat Warm MBTU,Non Fuel Start Cost $,Non Fuel Shutdown Cost $,Fuel Price $/MMBTU,HR_avg_0,HR_incr_2,Category
101_CT_1,101,1,U20,CT,Oil,8,4.96,1.0398,20,8,10,0,1,1,3,0.001,393.28,0,13.1,14499,10828,Thermal
122_WIND_1,122,1,U714,WIND,Wind,713.64,0,1.05,713.5,0,0,0,0,0,,,,,,,,Wind
";

    const POINTERS_CSV: &str = "\
Simulation,Category,Object,Parameter,Scaling Factor,Data File
DAY_AHEAD,Generator,122_WIND_1,PMax MW,1,timeseries_data_files/WIND/DAY_AHEAD_wind.csv
REAL_TIME,Generator,122_WIND_1,PMax MW,1,timeseries_data_files/WIND/REAL_TIME_wind.csv
DAY_AHEAD,Area,1,MW Load,1775,timeseries_data_files/Load/DAY_AHEAD_regional_Load.csv
";

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "bus.csv", BUS_CSV);
        write_file(dir.path(), "branch.csv", BRANCH_CSV);
        write_file(dir.path(), "gen.csv", GEN_CSV);
        write_file(dir.path(), "timeseries_pointers.csv", POINTERS_CSV);
        dir
    }

    #[test]
    fn test_read_source_dir() {
        let dir = fixture();
        let (source, diag) = read_source_dir(dir.path()).unwrap();

        assert_eq!(diag.stats.buses, 2);
        assert_eq!(diag.stats.loads, 2);
        assert_eq!(diag.stats.branches, 2);
        assert_eq!(diag.stats.generators, 2);
        assert_eq!(diag.stats.pointers, 3);
        assert!(!diag.has_errors(), "{:?}", diag.issues);

        let bus = &source.buses[0];
        assert_eq!(bus.bus_id, 101);
        assert_eq!(bus.bus_name.as_deref(), Some("Abel"));
        assert_eq!(bus.base_kv, 138.0);
        assert_eq!(bus.bus_type, "PV");
        assert_eq!(bus.mw_load, 108.0);
        assert_eq!(source.buses[1].bus_type, "Ref");

        let branch = &source.branches[0];
        assert_eq!(branch.uid, "A1");
        assert_eq!(branch.from_bus, 101);
        assert_eq!(branch.cont_rating, 175.0);
        assert_eq!(branch.tr_ratio, Some(0.0));
        assert_eq!(source.branches[1].tr_ratio, Some(1.03));
    }

    #[test]
    fn test_gen_blank_thermal_columns() {
        let dir = fixture();
        let (source, _) = read_source_dir(dir.path()).unwrap();

        let ct = &source.generators[0];
        assert_eq!(ct.gen_uid, "101_CT_1");
        assert_eq!(ct.fuel, "Oil");
        assert_eq!(ct.ramp_rate_mw_per_min, Some(3.0));
        assert_eq!(ct.fuel_price_per_mmbtu, Some(13.1));
        assert_eq!(ct.hr_avg_0, Some(14499.0));

        let wind = &source.generators[1];
        assert_eq!(wind.fuel, "Wind");
        assert_eq!(wind.ramp_rate_mw_per_min, None);
        assert_eq!(wind.fuel_price_per_mmbtu, None);
        assert_eq!(wind.category.as_deref(), Some("Wind"));
    }

    #[test]
    fn test_bad_row_is_collected_not_fatal() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "bus.csv",
            "Bus ID,Bus Name,BaseKV,Bus Type,MW Load,MVAR Load,V Mag,V Angle,Area,Sub Area,Zone,lat,lng\n\
             101,Abel,138,PV,108,22,1.04,-14,1,11,1,34.0,-116.9\n\
             oops,Bad,138,PV,0,0,1.0,0,1,11,1,34.0,-116.9\n",
        );

        let mut diag = ImportDiagnostics::new();
        let buses: Vec<RawBus> = read_table(&dir.path().join("bus.csv"), "bus", &mut diag).unwrap();
        assert_eq!(buses.len(), 1);
        assert_eq!(diag.stats.skipped_rows, 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        assert!(read_source_dir(dir.path()).is_err());
    }

    #[test]
    fn test_pointer_resolve() {
        let p = SeriesPointer {
            simulation: "DAY_AHEAD".to_string(),
            category: "Generator".to_string(),
            object: "122_WIND_1".to_string(),
            parameter: "PMax MW".to_string(),
            scaling_factor: 1.0,
            data_file: "timeseries_data_files/WIND/DAY_AHEAD_wind.csv".to_string(),
        };
        let resolved = p.resolve(Path::new("/data/SourceData"));
        assert!(resolved.ends_with("timeseries_data_files/WIND/DAY_AHEAD_wind.csv"));
    }
}
