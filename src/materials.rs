//! Material properties and the standard steel section table.
//!
//! The elastic moduli and the IPE profile dimensions are the fixed reference
//! data every other component leans on. Profiles carry European IPE section
//! properties (height, flange width, area, strong-axis second moment of area)
//! in millimetre units.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Beam material.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    /// Structural steel; cross-sections are matched against the IPE table.
    Steel,
    /// Timber; rectangular cross-sections.
    Wood,
    /// Reinforced concrete; rectangular cross-sections.
    Concrete,
}

impl Material {
    /// All materials, for iteration and prompts.
    pub const ALL: [Material; 3] = [Material::Steel, Material::Wood, Material::Concrete];

    /// Elastic modulus in N/mm².
    #[must_use]
    pub const fn elastic_modulus(self) -> f64 {
        match self {
            Material::Steel => 200_000.0,
            Material::Wood => 11_000.0,
            Material::Concrete => 30_000.0,
        }
    }

    /// Cross-section family recorded in the ledger's Shape column.
    #[must_use]
    pub const fn section_shape(self) -> &'static str {
        match self {
            Material::Steel => "IPE",
            Material::Wood | Material::Concrete => "Rectangular",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Material::Steel => "Steel",
            Material::Wood => "Wood",
            Material::Concrete => "Concrete",
        };
        f.write_str(name)
    }
}

impl FromStr for Material {
    type Err = UnknownMaterial;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "steel" => Ok(Material::Steel),
            "wood" | "timber" => Ok(Material::Wood),
            "concrete" => Ok(Material::Concrete),
            other => Err(UnknownMaterial(other.to_owned())),
        }
    }
}

/// Error returned when a material name is not one of the supported set.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown material: {0}")]
pub struct UnknownMaterial(pub String);

/// One standard IPE profile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionRow {
    /// Profile designation, e.g. `IPE200`.
    pub name: &'static str,
    /// Section height in mm.
    pub height_mm: f64,
    /// Flange width in mm.
    pub width_mm: f64,
    /// Cross-sectional area in mm².
    pub area_mm2: f64,
    /// Strong-axis second moment of area in mm⁴.
    pub moment_of_inertia_mm4: f64,
}

/// IPE profile dimensions per EN 10365, strong axis.
const IPE_PROFILES: [SectionRow; 18] = [
    row("IPE80", 80.0, 46.0, 764.0, 801_000.0),
    row("IPE100", 100.0, 55.0, 1_030.0, 1_710_000.0),
    row("IPE120", 120.0, 64.0, 1_320.0, 3_180_000.0),
    row("IPE140", 140.0, 73.0, 1_640.0, 5_410_000.0),
    row("IPE160", 160.0, 82.0, 2_010.0, 8_690_000.0),
    row("IPE180", 180.0, 91.0, 2_390.0, 13_170_000.0),
    row("IPE200", 200.0, 100.0, 2_850.0, 19_430_000.0),
    row("IPE220", 220.0, 110.0, 3_340.0, 27_720_000.0),
    row("IPE240", 240.0, 120.0, 3_910.0, 38_920_000.0),
    row("IPE270", 270.0, 135.0, 4_590.0, 57_900_000.0),
    row("IPE300", 300.0, 150.0, 5_380.0, 83_560_000.0),
    row("IPE330", 330.0, 160.0, 6_260.0, 117_700_000.0),
    row("IPE360", 360.0, 170.0, 7_270.0, 162_700_000.0),
    row("IPE400", 400.0, 180.0, 8_450.0, 231_300_000.0),
    row("IPE450", 450.0, 190.0, 9_880.0, 337_400_000.0),
    row("IPE500", 500.0, 200.0, 11_550.0, 482_000_000.0),
    row("IPE550", 550.0, 210.0, 13_440.0, 671_200_000.0),
    row("IPE600", 600.0, 220.0, 15_600.0, 920_800_000.0),
];

/// Shorthand for the const table above.
const fn row(
    name: &'static str,
    height_mm: f64,
    width_mm: f64,
    area_mm2: f64,
    moment_of_inertia_mm4: f64,
) -> SectionRow {
    SectionRow {
        name,
        height_mm,
        width_mm,
        area_mm2,
        moment_of_inertia_mm4,
    }
}

/// Lookup table of standard steel cross-sections.
///
/// Defaults to the built-in IPE range; an external semicolon-separated file
/// with columns `h (mm);b (mm);A (mm^2);I (mm^4)` can replace it. An empty
/// table is a valid state and makes lookups fall back to a rectangular
/// approximation.
#[derive(Clone, Debug)]
pub struct SectionTable {
    /// Profile rows in table order.
    rows: Vec<SectionRow>,
}

impl Default for SectionTable {
    fn default() -> Self {
        Self {
            rows: IPE_PROFILES.to_vec(),
        }
    }
}

impl SectionTable {
    /// Table with no rows; every inertia lookup uses the fallback formula.
    #[must_use]
    pub fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// Load a section table from a semicolon-separated file.
    ///
    /// Rows that fail to parse are skipped with a warning. A missing or
    /// unreadable file yields the built-in table so the deflection model stays
    /// usable; the caller is told via the log.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn!(path = %path.display(), %error, "section table unavailable, using built-in profiles");
                return Self::default();
            }
        };
        let mut rows = Vec::new();
        for line in BufReader::new(file).lines().skip(1) {
            let Ok(line) = line else { break };
            let fields: Vec<&str> = line.split(';').map(str::trim).collect();
            if fields.len() < 4 {
                continue;
            }
            let parsed = (
                fields[0].parse::<f64>(),
                fields[1].parse::<f64>(),
                fields[2].parse::<f64>(),
                fields[3].parse::<f64>(),
            );
            if let (Ok(height), Ok(width), Ok(area), Ok(inertia)) = parsed {
                rows.push(SectionRow {
                    name: "custom",
                    height_mm: height,
                    width_mm: width,
                    area_mm2: area,
                    moment_of_inertia_mm4: inertia,
                });
            } else {
                warn!(path = %path.display(), line, "skipping malformed section row");
            }
        }
        if rows.is_empty() {
            warn!(path = %path.display(), "section table file held no usable rows, using built-in profiles");
            return Self::default();
        }
        Self { rows }
    }

    /// Whether the table holds any profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the profiles in table order.
    pub fn rows(&self) -> impl Iterator<Item = &SectionRow> {
        self.rows.iter()
    }

    /// Find the profile whose height is closest to `height_mm`.
    ///
    /// Ties are broken by table order (the earlier row wins). Returns `None`
    /// for an empty table.
    #[must_use]
    pub fn nearest_by_height(&self, height_mm: f64) -> Option<&SectionRow> {
        let mut best: Option<&SectionRow> = None;
        let mut best_diff = f64::INFINITY;
        for row in &self.rows {
            let diff = (row.height_mm - height_mm).abs();
            if diff < best_diff {
                best_diff = diff;
                best = Some(row);
            }
        }
        best
    }

    /// Tabulated second moment of area for the nearest profile, or the
    /// rectangular approximation `(100 · h³) / 12` when the table is empty.
    #[must_use]
    pub fn moment_of_inertia_for_height(&self, height_mm: f64) -> f64 {
        match self.nearest_by_height(height_mm) {
            Some(row) => row.moment_of_inertia_mm4,
            None => (100.0 * height_mm.powi(3)) / 12.0,
        }
    }
}
