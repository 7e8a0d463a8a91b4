//! Unit newtypes for the quantities that cross the RTS-GMLC → PyPSA boundary.
//!
//! The source dataset mixes per-unit electrical values (on a 100 MVA system
//! base), imperial lengths, and fuel prices in $/MMBtu; the target schema
//! wants physical ohms/siemens, kilometres, and $/MWh. Wrapping the raw
//! `f64`s keeps the two sides from being confused mid-conversion.
//!
//! All types are `#[repr(transparent)]`, so there is no runtime overhead.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// System power base used by RTS-GMLC per-unit quantities (MVA).
pub const BASE_MVA: f64 = 100.0;

/// Exact statute-mile to kilometre factor used by the source dataset.
pub const MILES_TO_KM: f64 = 1.60934;

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Active power in megawatts (MW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Megawatts(pub f64);

impl_unit_ops!(Megawatts, "MW");

/// Apparent power in megavolt-amperes (MVA), used for line thermal ratings
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct MegavoltAmperes(pub f64);

impl_unit_ops!(MegavoltAmperes, "MVA");

/// Voltage in kilovolts (kV)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Kilovolts(pub f64);

impl_unit_ops!(Kilovolts, "kV");

/// Dimensionless per-unit quantity (voltage set-points, output envelopes)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct PerUnit(pub f64);

impl_unit_ops!(PerUnit, "pu");

impl PerUnit {
    /// One per unit (nominal)
    pub const ONE: Self = Self(1.0);

    /// Zero per unit
    pub const ZERO: Self = Self(0.0);
}

/// Length in statute miles, as published by RTS-GMLC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Miles(pub f64);

impl_unit_ops!(Miles, "mi");

/// Length in kilometres, as expected by the target schema
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Kilometers(pub f64);

impl_unit_ops!(Kilometers, "km");

impl Miles {
    /// Convert to kilometres
    #[inline]
    pub fn to_km(self) -> Kilometers {
        Kilometers(self.0 * MILES_TO_KM)
    }
}

impl Kilovolts {
    /// Base impedance for this voltage level on the system base:
    /// `Z_base = V² / S_base` (ohms).
    #[inline]
    pub fn base_impedance_ohms(self) -> f64 {
        self.0 * self.0 / BASE_MVA
    }
}

/// De-normalize a per-unit series impedance (R or X) to ohms on the given
/// voltage base.
#[inline]
pub fn impedance_pu_to_ohms(z_pu: f64, v_nom: Kilovolts) -> f64 {
    z_pu * v_nom.base_impedance_ohms()
}

/// De-normalize a per-unit shunt susceptance to siemens on the given voltage
/// base. The inverse scaling of the impedance case: `B = B_pu / V²`.
#[inline]
pub fn susceptance_pu_to_siemens(b_pu: f64, v_nom: Kilovolts) -> f64 {
    if v_nom.value().abs() < 1e-12 {
        0.0
    } else {
        b_pu / (v_nom.value() * v_nom.value())
    }
}

/// Convert a fuel price in $/MMBtu and a heat rate in BTU/kWh to a marginal
/// cost in $/MWh: `$/MMBtu × 1e-6 MMBtu/BTU × BTU/kWh × 1e3 kWh/MWh`.
#[inline]
pub fn fuel_cost_per_mwh(price_per_mmbtu: f64, heat_rate_btu_per_kwh: f64) -> f64 {
    price_per_mmbtu * 1e-6 * heat_rate_btu_per_kwh * 1e3
}

/// Convert a MW/min ramp rate to a per-unit-per-hour limit on the given
/// nominal power. Returns `None` for machines without a nominal rating.
#[inline]
pub fn ramp_per_hour_pu(ramp_mw_per_min: f64, p_nom: Megawatts) -> Option<f64> {
    if p_nom.value() == 0.0 {
        None
    } else {
        Some(ramp_mw_per_min * 60.0 / p_nom.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_megawatts_arithmetic() {
        let p1 = Megawatts(100.0);
        let p2 = Megawatts(50.0);

        assert_eq!((p1 + p2).value(), 150.0);
        assert_eq!((p1 - p2).value(), 50.0);
        assert_eq!((-p1).value(), -100.0);
        assert_eq!((p1 * 2.0).value(), 200.0);
        assert_eq!((p1 / 2.0).value(), 50.0);
        assert_eq!(p1 / p2, 2.0);
    }

    #[test]
    fn test_miles_to_km() {
        let l = Miles(100.0);
        assert!((l.to_km().value() - 160.934).abs() < 1e-9);
    }

    #[test]
    fn test_base_impedance() {
        // 230 kV on 100 MVA: Z_base = 230^2 / 100 = 529 ohm
        assert!((Kilovolts(230.0).base_impedance_ohms() - 529.0).abs() < 1e-9);
    }

    #[test]
    fn test_impedance_denormalization() {
        let x_ohm = impedance_pu_to_ohms(0.1, Kilovolts(138.0));
        assert!((x_ohm - 0.1 * 138.0 * 138.0 / 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_susceptance_denormalization() {
        let b = susceptance_pu_to_siemens(0.2, Kilovolts(138.0));
        assert!((b - 0.2 / (138.0 * 138.0)).abs() < 1e-12);

        // degenerate voltage base collapses to zero rather than dividing by it
        assert_eq!(susceptance_pu_to_siemens(0.2, Kilovolts(0.0)), 0.0);
    }

    #[test]
    fn test_fuel_cost_per_mwh() {
        // $3/MMBtu at 10,000 BTU/kWh is $30/MWh
        assert!((fuel_cost_per_mwh(3.0, 10_000.0) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_ramp_per_hour() {
        // 2 MW/min on a 120 MW machine: full range every hour
        let r = ramp_per_hour_pu(2.0, Megawatts(120.0)).unwrap();
        assert!((r - 1.0).abs() < 1e-9);

        assert!(ramp_per_hour_pu(2.0, Megawatts(0.0)).is_none());
    }

    #[test]
    fn test_sum_iterator() {
        let powers = vec![Megawatts(10.0), Megawatts(20.0), Megawatts(30.0)];
        let total: Megawatts = powers.into_iter().sum();
        assert_eq!(total.value(), 60.0);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Megawatts(100.0)), "100.0000 MW");
        assert_eq!(format!("{}", Kilometers(12.5)), "12.5000 km");
    }
}
