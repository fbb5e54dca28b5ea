//! Closed-form beam deflection model.
//!
//! This is the single source of truth for structural adequacy: the analyzer,
//! the optimizer constraint, the historical comparison and the ledger status
//! all evaluate the same formulas. Everything here is deterministic and free
//! of side effects.
//!
//! Formulas for a simply-supported span (Roark's Table 8.1):
//! centred point load `δ = P·L³ / (48·E·I)`, uniform load
//! `δ = 5·w·L⁴ / (384·E·I)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::materials::{Material, SectionTable};
use crate::spec::BeamSpecification;

/// Load configurations supported by the deflection model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// Concentrated load at midspan, in N.
    #[default]
    Point,
    /// Uniformly distributed load, in N/mm.
    Distributed,
}

/// Adequacy status of an evaluated design.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DesignStatus {
    /// Deflection within the allowable limit.
    Pass,
    /// Deflection exceeds the allowable limit.
    Fail,
    /// Optimizer-produced design; adequate by construction and treated as
    /// already optimal.
    Opt,
}

impl DesignStatus {
    /// Whether this status marks a structurally adequate design.
    #[must_use]
    pub const fn is_adequate(self) -> bool {
        matches!(self, DesignStatus::Pass | DesignStatus::Opt)
    }
}

impl fmt::Display for DesignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            DesignStatus::Pass => "PASS",
            DesignStatus::Fail => "FAIL",
            DesignStatus::Opt => "OPT",
        };
        f.write_str(tag)
    }
}

/// Error returned when a status tag is not `PASS`, `FAIL` or `OPT`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown design status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DesignStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "PASS" => Ok(DesignStatus::Pass),
            "FAIL" => Ok(DesignStatus::Fail),
            "OPT" => Ok(DesignStatus::Opt),
            other => Err(UnknownStatus(other.to_owned())),
        }
    }
}

/// Allowable midspan deflection for a span, fixed at `span / 240`.
#[must_use]
pub fn allowable_deflection(span_mm: f64) -> f64 {
    span_mm / 240.0
}

/// Compute midspan deflection in mm.
///
/// The second moment of area is taken from the steel section table for
/// [`Material::Steel`] (nearest profile by height, rectangular fallback when
/// the table is empty); other materials use the rectangular formula
/// `(w · h³) / 12` directly.
#[must_use]
pub fn deflect(
    load: f64,
    material: Material,
    span_mm: f64,
    width_mm: f64,
    height_mm: f64,
    load_type: LoadType,
    table: &SectionTable,
) -> f64 {
    let modulus = material.elastic_modulus();
    let inertia = match material {
        Material::Steel => table.moment_of_inertia_for_height(height_mm),
        Material::Wood | Material::Concrete => (width_mm * height_mm.powi(3)) / 12.0,
    };
    match load_type {
        LoadType::Point => (load * span_mm.powi(3)) / (48.0 * modulus * inertia),
        LoadType::Distributed => (5.0 * load * span_mm.powi(4)) / (384.0 * modulus * inertia),
    }
}

/// Full numeric outcome of analyzing one complete specification.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamAnalysis {
    /// Computed midspan deflection in mm.
    pub deflection_mm: f64,
    /// Allowable deflection (`span / 240`) in mm.
    pub allowable_mm: f64,
    /// Material volume `L · h · w` in mm³.
    pub volume_mm3: f64,
    /// Deflection as a percentage of the allowable limit.
    pub ratio_percent: f64,
    /// PASS / FAIL verdict.
    pub status: DesignStatus,
}

/// Analyze a complete specification under a centred point load.
#[must_use]
pub fn analyze(spec: &BeamSpecification, table: &SectionTable) -> BeamAnalysis {
    let deflection_mm = deflect(
        spec.load_n,
        spec.material,
        spec.length_mm,
        spec.width_mm,
        spec.height_mm,
        LoadType::Point,
        table,
    );
    let allowable_mm = allowable_deflection(spec.length_mm);
    let status = if deflection_mm <= allowable_mm {
        DesignStatus::Pass
    } else {
        DesignStatus::Fail
    };
    BeamAnalysis {
        deflection_mm,
        allowable_mm,
        volume_mm3: spec.volume_mm3(),
        ratio_percent: if allowable_mm > 0.0 {
            (deflection_mm / allowable_mm) * 100.0
        } else {
            0.0
        },
        status,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn wood_deflection(load: f64, span: f64, width: f64, height: f64) -> f64 {
        let table = SectionTable::default();
        deflect(load, Material::Wood, span, width, height, LoadType::Point, &table)
    }

    #[test]
    fn allowable_is_span_over_240() {
        assert_relative_eq!(allowable_deflection(6_000.0), 25.0);
        assert_relative_eq!(allowable_deflection(240.0), 1.0);
    }

    #[test]
    fn wood_point_load_matches_closed_form() {
        // Rectangular section, E = 11000 N/mm²: δ = P·L³ / (48·E·(w·h³/12)).
        let load: f64 = 12_000.0;
        let span: f64 = 4_000.0;
        let width: f64 = 150.0;
        let height: f64 = 200.0;
        let inertia = width * height.powi(3) / 12.0;
        let expected = load * span.powi(3) / (48.0 * 11_000.0 * inertia);
        assert_eq!(wood_deflection(load, span, width, height), expected);
    }

    #[test]
    fn steel_uses_nearest_table_profile() {
        let table = SectionTable::default();
        let deflection = deflect(
            20_000.0,
            Material::Steel,
            6_000.0,
            100.0,
            200.0,
            LoadType::Point,
            &table,
        );
        let inertia = 19_430_000.0; // IPE200
        let expected = 20_000.0 * 6_000.0_f64.powi(3) / (48.0 * 200_000.0 * inertia);
        assert_relative_eq!(deflection, expected);
        // Width does not enter the steel calculation.
        let wide = deflect(
            20_000.0,
            Material::Steel,
            6_000.0,
            400.0,
            200.0,
            LoadType::Point,
            &table,
        );
        assert_eq!(deflection, wide);
    }

    #[test]
    fn distributed_load_uses_fourth_power_of_span() {
        let table = SectionTable::empty();
        let deflection = deflect(
            2.0,
            Material::Concrete,
            3_000.0,
            100.0,
            300.0,
            LoadType::Distributed,
            &table,
        );
        let inertia = 100.0 * 300.0_f64.powi(3) / 12.0;
        let expected = 5.0 * 2.0 * 3_000.0_f64.powi(4) / (384.0 * 30_000.0 * inertia);
        assert_relative_eq!(deflection, expected);
    }

    #[test]
    fn deflection_monotone_in_load_and_span() {
        let base = wood_deflection(10_000.0, 4_000.0, 150.0, 200.0);
        assert!(wood_deflection(12_000.0, 4_000.0, 150.0, 200.0) > base);
        assert!(wood_deflection(10_000.0, 5_000.0, 150.0, 200.0) > base);
    }

    #[test]
    fn deflection_monotone_decreasing_in_section_dimensions() {
        let base = wood_deflection(10_000.0, 4_000.0, 150.0, 200.0);
        assert!(wood_deflection(10_000.0, 4_000.0, 180.0, 200.0) < base);
        assert!(wood_deflection(10_000.0, 4_000.0, 150.0, 240.0) < base);
        assert!(base > 0.0);
    }

    #[test]
    fn analyze_flags_excessive_deflection() {
        let table = SectionTable::default();
        let slender = BeamSpecification {
            material: Material::Wood,
            length_mm: 6_000.0,
            load_n: 30_000.0,
            height_mm: 120.0,
            width_mm: 60.0,
        };
        let analysis = analyze(&slender, &table);
        assert_eq!(analysis.status, DesignStatus::Fail);
        assert!(analysis.ratio_percent > 100.0);

        let stocky = BeamSpecification {
            height_mm: 400.0,
            width_mm: 250.0,
            ..slender
        };
        let analysis = analyze(&stocky, &table);
        assert_eq!(analysis.status, DesignStatus::Pass);
        assert_relative_eq!(analysis.volume_mm3, 6_000.0 * 400.0 * 250.0);
    }

    #[test]
    fn analysis_is_idempotent() {
        let table = SectionTable::default();
        let spec = BeamSpecification {
            material: Material::Steel,
            length_mm: 6_000.0,
            load_n: 20_000.0,
            height_mm: 200.0,
            width_mm: 100.0,
        };
        assert_eq!(analyze(&spec, &table), analyze(&spec, &table));
    }
}
