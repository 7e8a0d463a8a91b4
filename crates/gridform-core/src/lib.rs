//! # gridform-core: target-schema model for RTS-GMLC conversion
//!
//! The component tables a converted network is made of, in the shape the
//! PyPSA CSV folder expects: buses, lines, generators, and loads, each a
//! plain record struct with unit newtypes where quantities have physical
//! dimension. [`PypsaNetwork`] is the container the io crate fills from
//! RTS-GMLC source data and drains into the output folder.
//!
//! ## Modules
//!
//! - [`units`] - unit newtypes and the per-unit/imperial conversions
//! - [`error`] - unified [`GridformError`] type
//! - [`diagnostics`] - warning/error collection for imports and validation
//! - [`topology`] - petgraph view for connectivity checks

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod topology;
pub mod units;

pub use diagnostics::{
    DiagnosticIssue, Diagnostics, ImportDiagnostics, ImportStats, Severity,
};
pub use error::{GridformError, GridformResult};
pub use units::{Kilometers, Kilovolts, Megawatts, MegavoltAmperes, Miles, PerUnit};

/// Normalize a source CSV header the way the upstream dataset tooling does:
/// lowercased with spaces removed, so `"Fuel Price $/MMBTU"` becomes
/// `"fuelprice$/mmbtu"`.
pub fn normalize_header(header: &str) -> String {
    header.to_lowercase().replace(' ', "")
}

/// Control mode of a bus or of the generator inheriting it from its bus.
///
/// The source dataset marks the reference bus `Ref`; the target schema calls
/// it `Slack`, so parsing accepts both spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    PQ,
    PV,
    Slack,
}

impl Control {
    pub fn as_str(&self) -> &'static str {
        match self {
            Control::PQ => "PQ",
            Control::PV => "PV",
            Control::Slack => "Slack",
        }
    }
}

impl std::str::FromStr for Control {
    type Err = GridformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PQ" => Ok(Control::PQ),
            "PV" => Ok(Control::PV),
            "Ref" | "Slack" => Ok(Control::Slack),
            other => Err(GridformError::Parse(format!(
                "unknown bus control type '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bus row of the target schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PypsaBus {
    pub name: String,
    /// Nominal voltage (kV)
    pub v_nom: Kilovolts,
    pub control: Control,
    /// Longitude
    pub x: f64,
    /// Latitude
    pub y: f64,
    /// Voltage magnitude set-point (per-unit)
    pub v_mag_pu_set: PerUnit,
    /// Load area the bus belongs to (used for clustering and load series)
    pub area: String,
    pub carrier: String,
}

/// A line row of the target schema. Impedances are physical (ohms/siemens),
/// de-normalized from the source per-unit values on the from-side voltage
/// base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PypsaLine {
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    /// Series resistance (ohm)
    pub r: f64,
    /// Series reactance (ohm)
    pub x: f64,
    /// Shunt susceptance (siemens)
    pub b: f64,
    /// Thermal rating (MVA)
    pub s_nom: MegavoltAmperes,
    pub length: Kilometers,
    /// Nominal voltage at bus0 (kV), kept for transformer detection downstream
    pub v_nom0: Kilovolts,
    /// Nominal voltage at bus1 (kV)
    pub v_nom1: Kilovolts,
}

impl PypsaLine {
    /// True when the endpoints sit at different voltage levels, i.e. the
    /// source branch models a transformer.
    pub fn spans_voltage_levels(&self) -> bool {
        (self.v_nom0.value() - self.v_nom1.value()).abs() > 1e-9
    }
}

/// A generator row of the target schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PypsaGenerator {
    pub name: String,
    pub bus: String,
    /// Control mode inherited from the owning bus
    pub control: Control,
    /// Unit type (CT, STEAM, WIND, PV, HYDRO, ...)
    pub type_: String,
    /// Fuel, which PyPSA calls the carrier
    pub carrier: String,
    /// Nominal active power, the dispatch set-point of the source case (MW)
    pub p_nom: Megawatts,
    /// Static output ceiling relative to p_nom; overridden per-snapshot when
    /// a time series exists for the unit
    pub p_max_pu: PerUnit,
    /// Static output floor relative to p_nom
    pub p_min_pu: PerUnit,
    /// Constant marginal cost ($/MWh)
    pub marginal_cost: f64,
    /// Whether the unit participates in unit-commitment decisions
    pub committable: bool,
    /// Warm-start cost ($): non-fuel start cost plus warm start heat at fuel price
    pub start_up_cost: f64,
    pub shut_down_cost: f64,
    /// Minimum up time (h)
    pub min_up_time: f64,
    /// Minimum down time (h)
    pub min_down_time: f64,
    /// Hours the unit is assumed to have been up before the horizon
    pub up_time_before: f64,
    /// Per-unit-per-hour upward ramp limit; absent for zero-rated machines
    pub ramp_limit_up: Option<f64>,
}

/// A load row of the target schema. One per bus carrying demand; the base
/// power is the distribution weight applied to its area's load series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PypsaLoad {
    pub name: String,
    pub bus: String,
    pub carrier: String,
    pub area: String,
    /// Bus share of the area load (MW at the source case's operating point)
    pub p_base: Megawatts,
}

/// A converted network: the four component tables the output folder is
/// written from.
#[derive(Debug, Clone, Default)]
pub struct PypsaNetwork {
    pub buses: Vec<PypsaBus>,
    pub lines: Vec<PypsaLine>,
    pub generators: Vec<PypsaGenerator>,
    pub loads: Vec<PypsaLoad>,
}

impl PypsaNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bus by name.
    pub fn bus(&self, name: &str) -> Option<&PypsaBus> {
        self.buses.iter().find(|b| b.name == name)
    }

    /// Generators attached to a bus.
    pub fn generators_at_bus(&self, bus: &str) -> Vec<&PypsaGenerator> {
        self.generators.iter().filter(|g| g.bus == bus).collect()
    }

    /// Total nominal generation capacity (MW).
    pub fn total_capacity_mw(&self) -> f64 {
        self.generators.iter().map(|g| g.p_nom.value()).sum()
    }

    /// Total base load (MW) at the source operating point.
    pub fn total_load_mw(&self) -> f64 {
        self.loads.iter().map(|l| l.p_base.value()).sum()
    }

    /// Compute basic statistics about the network.
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.buses.len(),
            num_lines: self.lines.len(),
            num_generators: self.generators.len(),
            num_loads: self.loads.len(),
            num_slack_buses: self
                .buses
                .iter()
                .filter(|b| b.control == Control::Slack)
                .count(),
            total_load_mw: self.total_load_mw(),
            total_gen_capacity_mw: self.total_capacity_mw(),
        }
    }

    /// Validate the converted tables for issues that make the downstream
    /// model unsolvable or meaningless. Populates `diag`; structural
    /// problems are errors, suspicious-but-usable data are warnings.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();

        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }

        match stats.num_slack_buses {
            0 => diag.add_error("structure", "Network has no slack bus"),
            1 => {}
            n => diag.add_warning(
                "structure",
                &format!("Network has {n} slack buses; downstream models expect one"),
            ),
        }

        if stats.num_generators == 0 {
            diag.add_error("structure", "Network has no generators");
        }

        if stats.num_loads == 0 {
            diag.add_warning("structure", "Network has no loads");
        }

        if stats.num_lines == 0 && stats.num_buses > 1 {
            diag.add_error("structure", "Network has multiple buses but no lines");
        }

        if stats.total_gen_capacity_mw < stats.total_load_mw {
            diag.add_warning(
                "capacity",
                &format!(
                    "Total generation capacity ({:.1} MW) is less than base load ({:.1} MW)",
                    stats.total_gen_capacity_mw, stats.total_load_mw
                ),
            );
        }

        for line in &self.lines {
            for end in [&line.bus0, &line.bus1] {
                if self.bus(end).is_none() {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("endpoint bus '{end}' does not exist"),
                        &format!("Line {}", line.name),
                    );
                }
            }
        }

        for gen in &self.generators {
            if self.bus(&gen.bus).is_none() {
                diag.add_error_with_entity(
                    "reference",
                    &format!("bus '{}' does not exist", gen.bus),
                    &format!("Generator {}", gen.name),
                );
            }
            if gen.p_min_pu.value() > gen.p_max_pu.value() {
                diag.add_warning_with_entity(
                    "physical",
                    &format!(
                        "p_min_pu {:.4} exceeds p_max_pu {:.4}",
                        gen.p_min_pu.value(),
                        gen.p_max_pu.value()
                    ),
                    &format!("Generator {}", gen.name),
                );
            }
        }

        for load in &self.loads {
            if self.bus(&load.bus).is_none() {
                diag.add_error_with_entity(
                    "reference",
                    &format!("bus '{}' does not exist", load.bus),
                    &format!("Load {}", load.name),
                );
            }
        }
    }
}

/// Statistics about a converted network's size and capacity
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_generators: usize,
    pub num_loads: usize,
    pub num_slack_buses: usize,
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} gens ({:.0} MW), {} loads ({:.0} MW)",
            self.num_buses,
            self.num_lines,
            self.num_generators,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.total_load_mw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus(name: &str, control: Control) -> PypsaBus {
        PypsaBus {
            name: name.to_string(),
            v_nom: Kilovolts(138.0),
            control,
            x: -104.0,
            y: 39.0,
            v_mag_pu_set: PerUnit(1.0),
            area: "1".to_string(),
            carrier: "AC".to_string(),
        }
    }

    fn line(name: &str, bus0: &str, bus1: &str) -> PypsaLine {
        PypsaLine {
            name: name.to_string(),
            bus0: bus0.to_string(),
            bus1: bus1.to_string(),
            r: 0.5,
            x: 5.0,
            b: 1e-4,
            s_nom: MegavoltAmperes(175.0),
            length: Kilometers(10.0),
            v_nom0: Kilovolts(138.0),
            v_nom1: Kilovolts(138.0),
        }
    }

    fn gen(name: &str, bus: &str, p_nom: f64) -> PypsaGenerator {
        PypsaGenerator {
            name: name.to_string(),
            bus: bus.to_string(),
            control: Control::PV,
            type_: "CT".to_string(),
            carrier: "Oil".to_string(),
            p_nom: Megawatts(p_nom),
            p_max_pu: PerUnit(1.0),
            p_min_pu: PerUnit(0.3),
            marginal_cost: 25.0,
            committable: true,
            start_up_cost: 100.0,
            shut_down_cost: 0.0,
            min_up_time: 1.0,
            min_down_time: 1.0,
            up_time_before: 0.0,
            ramp_limit_up: Some(1.0),
        }
    }

    fn load(bus: &str, p: f64) -> PypsaLoad {
        PypsaLoad {
            name: bus.to_string(),
            bus: bus.to_string(),
            carrier: "AC".to_string(),
            area: "1".to_string(),
            p_base: Megawatts(p),
        }
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Bus ID"), "busid");
        assert_eq!(normalize_header("Fuel Price $/MMBTU"), "fuelprice$/mmbtu");
        assert_eq!(normalize_header("Ramp Rate MW/Min"), "rampratemw/min");
        assert_eq!(normalize_header("HR_avg_0"), "hr_avg_0");
    }

    #[test]
    fn test_control_parsing() {
        assert_eq!("PQ".parse::<Control>().unwrap(), Control::PQ);
        assert_eq!("PV".parse::<Control>().unwrap(), Control::PV);
        assert_eq!("Ref".parse::<Control>().unwrap(), Control::Slack);
        assert_eq!("Slack".parse::<Control>().unwrap(), Control::Slack);
        assert!("XX".parse::<Control>().is_err());
    }

    #[test]
    fn test_stats() {
        let network = PypsaNetwork {
            buses: vec![bus("101", Control::Slack), bus("102", Control::PV)],
            lines: vec![line("A1", "101", "102")],
            generators: vec![gen("101_CT_1", "101", 55.0)],
            loads: vec![load("102", 40.0)],
        };

        let stats = network.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_lines, 1);
        assert_eq!(stats.num_slack_buses, 1);
        assert!((stats.total_gen_capacity_mw - 55.0).abs() < 1e-9);
        assert!((stats.total_load_mw - 40.0).abs() < 1e-9);

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(!diag.has_errors(), "{diag}");
    }

    #[test]
    fn test_validation_empty() {
        let network = PypsaNetwork::new();
        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("no buses")));
    }

    #[test]
    fn test_validation_dangling_references() {
        let network = PypsaNetwork {
            buses: vec![bus("101", Control::Slack)],
            lines: vec![line("A1", "101", "999")],
            generators: vec![gen("G1", "998", 10.0)],
            loads: vec![load("101", 5.0)],
        };

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.has_errors());
        assert!(diag.errors().any(|i| i.message.contains("'999'")));
        assert!(diag.errors().any(|i| i.message.contains("'998'")));
    }

    #[test]
    fn test_validation_missing_slack() {
        let network = PypsaNetwork {
            buses: vec![bus("101", Control::PV)],
            lines: vec![],
            generators: vec![gen("G1", "101", 10.0)],
            loads: vec![],
        };

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.errors().any(|i| i.message.contains("no slack")));
    }

    #[test]
    fn test_validation_capacity_warning() {
        let network = PypsaNetwork {
            buses: vec![bus("101", Control::Slack)],
            lines: vec![],
            generators: vec![gen("G1", "101", 10.0)],
            loads: vec![load("101", 50.0)],
        };

        let mut diag = Diagnostics::new();
        network.validate_into(&mut diag);
        assert!(diag.warnings().any(|i| i.category == "capacity"));
    }

    #[test]
    fn test_spans_voltage_levels() {
        let mut l = line("A1", "101", "102");
        assert!(!l.spans_voltage_levels());
        l.v_nom1 = Kilovolts(230.0);
        assert!(l.spans_voltage_levels());
    }
}
