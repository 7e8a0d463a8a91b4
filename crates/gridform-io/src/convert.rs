//! RTS-GMLC → PyPSA schema mapping
//!
//! Turns the raw source tables into the target component tables: buses with
//! their control types, branches de-normalized from per-unit to physical
//! impedances, generators with commitment and cost parameters derived from
//! the thermal columns, and one load per bus carrying demand.

use std::collections::HashMap;

use anyhow::Result;
use gridform_core::units::{
    fuel_cost_per_mwh, impedance_pu_to_ohms, ramp_per_hour_pu, susceptance_pu_to_siemens,
};
use gridform_core::{
    Control, Diagnostics, Kilovolts, Megawatts, MegavoltAmperes, Miles, PerUnit, PypsaBus,
    PypsaGenerator, PypsaLine, PypsaLoad, PypsaNetwork,
};
use tracing::debug;

use crate::rts::{RawBranch, RawBus, RawGen, RtsSource};

/// Fuels carried over to the target model. Everything else (storage heads,
/// synchronous condensers) has no generator representation there.
pub const KEEP_FUELS: &[&str] = &["NG", "Oil", "Coal", "Nuclear", "Hydro", "Solar", "Wind"];

/// Generator categories dropped outright even when the fuel is kept.
/// Concentrated solar enters the source as a storage pair the target schema
/// cannot express.
pub const DROP_CATEGORIES: &[&str] = &["CSP"];

/// Which branch thermal rating becomes `s_nom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rating {
    /// Continuous rating
    #[default]
    Cont,
    /// Long-term emergency rating
    Lte,
    /// Short-term emergency rating
    Ste,
}

impl std::str::FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cont" => Ok(Rating::Cont),
            "lte" => Ok(Rating::Lte),
            "ste" => Ok(Rating::Ste),
            other => Err(format!("unknown rating '{other}' (expected cont, lte, ste)")),
        }
    }
}

/// Knobs for the schema mapping.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Mark thermal units committable (renewables never are)
    pub unit_commitment: bool,
    /// Which thermal rating to export as `s_nom`
    pub rating: Rating,
    /// Branch UIDs to leave out of the output
    pub skip_branches: Vec<String>,
}

/// A converted network plus everything noteworthy that happened along the way.
#[derive(Debug)]
pub struct ConvertResult {
    pub network: PypsaNetwork,
    pub diagnostics: Diagnostics,
}

/// Map the raw source tables onto the target schema.
pub fn convert(source: &RtsSource, options: &ConvertOptions) -> Result<ConvertResult> {
    let mut diag = Diagnostics::new();
    let mut network = PypsaNetwork::new();

    // Bus voltage and control lookups drive both branch de-normalization and
    // generator control inheritance.
    let mut bus_kv: HashMap<u32, Kilovolts> = HashMap::with_capacity(source.buses.len());
    let mut bus_control: HashMap<u32, Control> = HashMap::with_capacity(source.buses.len());

    for raw in &source.buses {
        match convert_bus(raw) {
            Ok(bus) => {
                bus_kv.insert(raw.bus_id, bus.v_nom);
                bus_control.insert(raw.bus_id, bus.control);
                if raw.mw_load > 0.0 {
                    network.loads.push(PypsaLoad {
                        name: bus.name.clone(),
                        bus: bus.name.clone(),
                        carrier: "AC".to_string(),
                        area: bus.area.clone(),
                        p_base: Megawatts(raw.mw_load),
                    });
                }
                network.buses.push(bus);
            }
            Err(message) => {
                diag.add_error_with_entity("bus", &message, &format!("Bus {}", raw.bus_id));
            }
        }
    }

    let mut transformers_as_lines = 0usize;
    for raw in &source.branches {
        if options.skip_branches.iter().any(|uid| uid == &raw.uid) {
            diag.add_warning_with_entity(
                "branch",
                "skipped by request",
                &format!("Branch {}", raw.uid),
            );
            continue;
        }
        let v_nom0 = match bus_kv.get(&raw.from_bus) {
            Some(kv) => *kv,
            None => {
                diag.add_error_with_entity(
                    "branch",
                    &format!("from-bus {} not in bus table", raw.from_bus),
                    &format!("Branch {}", raw.uid),
                );
                continue;
            }
        };
        let v_nom1 = match bus_kv.get(&raw.to_bus) {
            Some(kv) => *kv,
            None => {
                diag.add_error_with_entity(
                    "branch",
                    &format!("to-bus {} not in bus table", raw.to_bus),
                    &format!("Branch {}", raw.uid),
                );
                continue;
            }
        };
        if raw.tr_ratio.unwrap_or(0.0) != 0.0 {
            transformers_as_lines += 1;
        }
        network
            .lines
            .push(convert_branch(raw, v_nom0, v_nom1, options, &mut diag));
    }
    if transformers_as_lines > 0 {
        diag.add_warning(
            "branch",
            &format!(
                "{transformers_as_lines} branch(es) with a non-zero tap ratio exported as lines; \
                 the target schema gets no transformer table"
            ),
        );
    }

    for raw in &source.generators {
        if !KEEP_FUELS.contains(&raw.fuel.as_str()) {
            debug!(gen = %raw.gen_uid, fuel = %raw.fuel, "dropping generator with unmapped fuel");
            continue;
        }
        if raw
            .category
            .as_deref()
            .is_some_and(|c| DROP_CATEGORIES.contains(&c))
        {
            continue;
        }
        let control = match bus_control.get(&raw.bus_id) {
            Some(control) => *control,
            None => {
                diag.add_error_with_entity(
                    "generator",
                    &format!("bus {} not in bus table", raw.bus_id),
                    &format!("Generator {}", raw.gen_uid),
                );
                continue;
            }
        };
        network.generators.push(convert_gen(raw, control, options));
    }

    Ok(ConvertResult {
        network,
        diagnostics: diag,
    })
}

fn convert_bus(raw: &RawBus) -> Result<PypsaBus, String> {
    let control: Control = raw
        .bus_type
        .parse()
        .map_err(|e: gridform_core::GridformError| e.to_string())?;
    Ok(PypsaBus {
        name: raw.bus_id.to_string(),
        v_nom: Kilovolts(raw.base_kv),
        control,
        // geographic x/y means longitude/latitude
        x: raw.lng,
        y: raw.lat,
        v_mag_pu_set: PerUnit(raw.v_mag),
        area: raw.area.to_string(),
        carrier: "AC".to_string(),
    })
}

fn convert_branch(
    raw: &RawBranch,
    v_nom0: Kilovolts,
    v_nom1: Kilovolts,
    options: &ConvertOptions,
    diag: &mut Diagnostics,
) -> PypsaLine {
    // Source impedances are per-unit on the system base; the target wants
    // ohms/siemens, de-normalized on the from-side voltage.
    let s_nom = match options.rating {
        Rating::Cont => raw.cont_rating,
        Rating::Lte => raw.lte_rating.unwrap_or_else(|| {
            diag.add_warning_with_entity(
                "branch",
                "no LTE rating, falling back to continuous",
                &format!("Branch {}", raw.uid),
            );
            raw.cont_rating
        }),
        Rating::Ste => raw.ste_rating.unwrap_or_else(|| {
            diag.add_warning_with_entity(
                "branch",
                "no STE rating, falling back to continuous",
                &format!("Branch {}", raw.uid),
            );
            raw.cont_rating
        }),
    };
    PypsaLine {
        name: raw.uid.clone(),
        bus0: raw.from_bus.to_string(),
        bus1: raw.to_bus.to_string(),
        r: impedance_pu_to_ohms(raw.r, v_nom0),
        x: impedance_pu_to_ohms(raw.x, v_nom0),
        b: susceptance_pu_to_siemens(raw.b, v_nom0),
        s_nom: MegavoltAmperes(s_nom),
        length: Miles(raw.length).to_km(),
        v_nom0,
        v_nom1,
    }
}

fn convert_gen(raw: &RawGen, control: Control, options: &ConvertOptions) -> PypsaGenerator {
    // The source dispatch point becomes the nominal power; limits and ramps
    // are re-expressed relative to it.
    let p_nom = Megawatts(raw.mw_inj.unwrap_or(0.0));
    let (p_max_pu, p_min_pu) = if p_nom.value() > 0.0 {
        (
            PerUnit(raw.p_max_mw / p_nom.value()),
            PerUnit(raw.p_min_mw.unwrap_or(0.0) / p_nom.value()),
        )
    } else {
        (PerUnit(1.0), PerUnit(0.0))
    };

    let is_variable = matches!(raw.fuel.as_str(), "Solar" | "Wind");
    let fuel_price = raw.fuel_price_per_mmbtu.unwrap_or(0.0);

    // Warm-start assumption: every start is costed at the warm start heat.
    let start_up_cost = raw.non_fuel_start_cost.unwrap_or(0.0)
        + raw.start_heat_warm_mbtu.unwrap_or(0.0) * fuel_price;

    let heat_rate = raw.hr_avg_0.unwrap_or(0.0) + raw.hr_incr_2.unwrap_or(0.0);
    let min_up_time = raw.min_up_time_hr.unwrap_or(0.0);

    PypsaGenerator {
        name: raw.gen_uid.clone(),
        bus: raw.bus_id.to_string(),
        control,
        type_: raw.unit_type.clone(),
        carrier: raw.fuel.clone(),
        p_nom,
        p_max_pu,
        p_min_pu,
        marginal_cost: fuel_cost_per_mwh(fuel_price, heat_rate),
        committable: options.unit_commitment && !is_variable,
        start_up_cost,
        shut_down_cost: raw.non_fuel_shutdown_cost.unwrap_or(0.0),
        min_up_time,
        min_down_time: raw.min_down_time_hr.unwrap_or(0.0),
        // Nuclear runs through the horizon start; everything else starts cold
        up_time_before: if raw.fuel == "Nuclear" { min_up_time } else { 0.0 },
        ramp_limit_up: raw
            .ramp_rate_mw_per_min
            .and_then(|ramp| ramp_per_hour_pu(ramp, p_nom)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rts::SeriesPointer;

    fn raw_bus(id: u32, kv: f64, bus_type: &str, mw_load: f64) -> RawBus {
        RawBus {
            bus_id: id,
            bus_name: Some(format!("Bus{id}")),
            base_kv: kv,
            bus_type: bus_type.to_string(),
            mw_load,
            v_mag: 1.02,
            area: 1,
            lat: 34.0,
            lng: -117.0,
        }
    }

    fn raw_branch(uid: &str, from: u32, to: u32, tr_ratio: f64) -> RawBranch {
        RawBranch {
            uid: uid.to_string(),
            from_bus: from,
            to_bus: to,
            r: 0.003,
            x: 0.014,
            b: 0.461,
            cont_rating: 175.0,
            lte_rating: Some(193.0),
            ste_rating: Some(200.0),
            tr_ratio: Some(tr_ratio),
            length: 3.0,
        }
    }

    fn raw_thermal(uid: &str, bus: u32, fuel: &str) -> RawGen {
        RawGen {
            gen_uid: uid.to_string(),
            bus_id: bus,
            unit_type: "CT".to_string(),
            fuel: fuel.to_string(),
            mw_inj: Some(8.0),
            p_max_mw: 20.0,
            p_min_mw: Some(8.0),
            min_up_time_hr: Some(1.0),
            min_down_time_hr: Some(1.0),
            ramp_rate_mw_per_min: Some(3.0),
            start_heat_warm_mbtu: Some(0.001),
            non_fuel_start_cost: Some(393.28),
            non_fuel_shutdown_cost: Some(0.0),
            fuel_price_per_mmbtu: Some(13.1),
            hr_avg_0: Some(14499.0),
            hr_incr_2: Some(10828.0),
            category: Some("Thermal".to_string()),
        }
    }

    fn raw_wind(uid: &str, bus: u32) -> RawGen {
        RawGen {
            gen_uid: uid.to_string(),
            bus_id: bus,
            unit_type: "WIND".to_string(),
            fuel: "Wind".to_string(),
            mw_inj: Some(713.64),
            p_max_mw: 713.5,
            p_min_mw: Some(0.0),
            min_up_time_hr: Some(0.0),
            min_down_time_hr: Some(0.0),
            ramp_rate_mw_per_min: None,
            start_heat_warm_mbtu: None,
            non_fuel_start_cost: None,
            non_fuel_shutdown_cost: None,
            fuel_price_per_mmbtu: None,
            hr_avg_0: None,
            hr_incr_2: None,
            category: Some("Wind".to_string()),
        }
    }

    fn source() -> RtsSource {
        RtsSource {
            buses: vec![
                raw_bus(101, 138.0, "PV", 108.0),
                raw_bus(113, 230.0, "Ref", 265.0),
                raw_bus(114, 230.0, "PQ", 0.0),
            ],
            branches: vec![
                raw_branch("A1", 101, 113, 0.0),
                raw_branch("A2", 113, 114, 1.03),
            ],
            generators: vec![
                raw_thermal("101_CT_1", 101, "Oil"),
                raw_wind("114_WIND_1", 114),
            ],
            pointers: Vec::<SeriesPointer>::new(),
        }
    }

    #[test]
    fn test_bus_mapping() {
        let result = convert(&source(), &ConvertOptions::default()).unwrap();
        let network = &result.network;

        assert_eq!(network.buses.len(), 3);
        let bus = network.bus("113").unwrap();
        assert_eq!(bus.control, Control::Slack);
        assert_eq!(bus.v_nom, Kilovolts(230.0));
        assert_eq!(bus.x, -117.0);
        assert_eq!(bus.y, 34.0);
        assert_eq!(bus.carrier, "AC");
    }

    #[test]
    fn test_zero_load_bus_gets_no_load() {
        let result = convert(&source(), &ConvertOptions::default()).unwrap();
        let loads = &result.network.loads;
        assert_eq!(loads.len(), 2);
        assert!(loads.iter().all(|l| l.bus != "114"));
        assert_eq!(loads[0].p_base, Megawatts(108.0));
    }

    #[test]
    fn test_branch_denormalization() {
        let result = convert(&source(), &ConvertOptions::default()).unwrap();
        let line = &result.network.lines[0];

        // from-side base: 138^2 / 100
        let z_base = 138.0 * 138.0 / 100.0;
        assert!((line.r - 0.003 * z_base).abs() < 1e-9);
        assert!((line.x - 0.014 * z_base).abs() < 1e-9);
        assert!((line.b - 0.461 / (138.0 * 138.0)).abs() < 1e-12);
        assert_eq!(line.s_nom, MegavoltAmperes(175.0));
        assert!((line.length.value() - 3.0 * 1.60934).abs() < 1e-9);
    }

    #[test]
    fn test_transformer_exported_as_line_with_warning() {
        let result = convert(&source(), &ConvertOptions::default()).unwrap();
        assert_eq!(result.network.lines.len(), 2);
        assert!(result
            .diagnostics
            .warnings()
            .any(|i| i.message.contains("non-zero tap ratio")));
    }

    #[test]
    fn test_rating_selection() {
        let opts = ConvertOptions {
            rating: Rating::Lte,
            ..Default::default()
        };
        let result = convert(&source(), &opts).unwrap();
        assert_eq!(result.network.lines[0].s_nom, MegavoltAmperes(193.0));

        let mut src = source();
        src.branches[0].ste_rating = None;
        let opts = ConvertOptions {
            rating: Rating::Ste,
            ..Default::default()
        };
        let result = convert(&src, &opts).unwrap();
        assert_eq!(result.network.lines[0].s_nom, MegavoltAmperes(175.0));
        assert!(result
            .diagnostics
            .warnings()
            .any(|i| i.message.contains("no STE rating")));
    }

    #[test]
    fn test_skip_branch() {
        let opts = ConvertOptions {
            skip_branches: vec!["A1".to_string()],
            ..Default::default()
        };
        let result = convert(&source(), &opts).unwrap();
        assert_eq!(result.network.lines.len(), 1);
        assert_eq!(result.network.lines[0].name, "A2");
    }

    #[test]
    fn test_thermal_generator_mapping() {
        let opts = ConvertOptions {
            unit_commitment: true,
            ..Default::default()
        };
        let result = convert(&source(), &opts).unwrap();
        let gen = &result.network.generators[0];

        assert_eq!(gen.name, "101_CT_1");
        assert_eq!(gen.bus, "101");
        assert_eq!(gen.control, Control::PV);
        assert_eq!(gen.carrier, "Oil");
        assert_eq!(gen.p_nom, Megawatts(8.0));
        assert!((gen.p_max_pu.value() - 20.0 / 8.0).abs() < 1e-9);
        assert!((gen.p_min_pu.value() - 1.0).abs() < 1e-9);
        assert!(gen.committable);
        assert!((gen.start_up_cost - (393.28 + 0.001 * 13.1)).abs() < 1e-9);
        assert!((gen.marginal_cost - 13.1 * 1e-6 * (14499.0 + 10828.0) * 1e3).abs() < 1e-9);
        assert_eq!(gen.ramp_limit_up, Some(3.0 * 60.0 / 8.0));
        assert_eq!(gen.up_time_before, 0.0);
    }

    #[test]
    fn test_wind_never_committable() {
        let opts = ConvertOptions {
            unit_commitment: true,
            ..Default::default()
        };
        let result = convert(&source(), &opts).unwrap();
        let wind = &result.network.generators[1];
        assert!(!wind.committable);
        assert_eq!(wind.marginal_cost, 0.0);
        assert_eq!(wind.ramp_limit_up, None);
    }

    #[test]
    fn test_nuclear_up_time_before() {
        let mut src = source();
        let mut nuke = raw_thermal("121_NUCLEAR_1", 101, "Nuclear");
        nuke.min_up_time_hr = Some(24.0);
        src.generators.push(nuke);

        let result = convert(&src, &ConvertOptions::default()).unwrap();
        let gen = result
            .network
            .generators
            .iter()
            .find(|g| g.name == "121_NUCLEAR_1")
            .unwrap();
        assert_eq!(gen.up_time_before, 24.0);
    }

    #[test]
    fn test_unmapped_fuel_and_csp_dropped() {
        let mut src = source();
        let mut sync = raw_thermal("114_SYNC_COND_1", 114, "Sync_Cond");
        sync.category = Some("Thermal".to_string());
        src.generators.push(sync);
        let mut csp = raw_thermal("212_CSP_1", 101, "Solar");
        csp.category = Some("CSP".to_string());
        src.generators.push(csp);

        let result = convert(&src, &ConvertOptions::default()).unwrap();
        assert!(result
            .network
            .generators
            .iter()
            .all(|g| g.name != "114_SYNC_COND_1" && g.name != "212_CSP_1"));
    }

    #[test]
    fn test_zero_rated_generator_limits() {
        let mut src = source();
        let mut idle = raw_thermal("101_CT_2", 101, "Oil");
        idle.mw_inj = Some(0.0);
        src.generators.push(idle);

        let result = convert(&src, &ConvertOptions::default()).unwrap();
        let gen = result
            .network
            .generators
            .iter()
            .find(|g| g.name == "101_CT_2")
            .unwrap();
        assert_eq!(gen.p_max_pu, PerUnit(1.0));
        assert_eq!(gen.p_min_pu, PerUnit(0.0));
        assert_eq!(gen.ramp_limit_up, None);
    }

    #[test]
    fn test_dangling_branch_reported() {
        let mut src = source();
        src.branches.push(raw_branch("BAD", 101, 999, 0.0));

        let result = convert(&src, &ConvertOptions::default()).unwrap();
        assert_eq!(result.network.lines.len(), 2);
        assert!(result
            .diagnostics
            .errors()
            .any(|i| i.message.contains("999")));
    }
}
