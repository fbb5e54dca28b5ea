//! Beam specification accumulation and validation.
//!
//! During the gathering phase the extraction adapter produces partial
//! specifications which are merged field by field; a field is known only when
//! it is present and strictly positive. The missing-field list is always
//! recomputed from the current values, never stored on its own.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::IncompleteSpecification;
use crate::materials::Material;

/// Height assumed for volume comparisons when the user has not supplied one.
pub const DEFAULT_COMPARISON_HEIGHT_MM: f64 = 100.0;

/// The five required specification fields, in canonical order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecField {
    /// Beam material.
    Material,
    /// Span length in mm.
    Length,
    /// Applied load in N.
    Load,
    /// Cross-section height in mm.
    Height,
    /// Cross-section width in mm.
    Width,
}

impl SpecField {
    /// Canonical field order used for missing-field reporting.
    pub const ALL: [SpecField; 5] = [
        SpecField::Material,
        SpecField::Length,
        SpecField::Load,
        SpecField::Height,
        SpecField::Width,
    ];
}

impl fmt::Display for SpecField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecField::Material => "material",
            SpecField::Length => "length_mm",
            SpecField::Load => "load_n",
            SpecField::Height => "height_mm",
            SpecField::Width => "width_mm",
        };
        f.write_str(name)
    }
}

/// A fully specified beam, ready for analysis and optimization.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeamSpecification {
    /// Beam material.
    pub material: Material,
    /// Span length in mm, > 0.
    pub length_mm: f64,
    /// Applied load in N, > 0.
    pub load_n: f64,
    /// Cross-section height in mm, > 0.
    pub height_mm: f64,
    /// Cross-section width in mm, > 0.
    pub width_mm: f64,
}

impl BeamSpecification {
    /// Material volume `L · h · w` in mm³.
    #[must_use]
    pub fn volume_mm3(&self) -> f64 {
        self.length_mm * self.height_mm * self.width_mm
    }
}

/// A partially specified beam accumulated across gathering-phase inputs.
///
/// This is the typed replacement for the free-form key/value updates the
/// extraction step produces: each field is optional and merging overrides
/// field by field, later values winning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialBeamSpec {
    /// Beam material, when recognized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
    /// Span length in mm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_mm: Option<f64>,
    /// Applied load in N.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_n: Option<f64>,
    /// Cross-section height in mm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_mm: Option<f64>,
    /// Cross-section width in mm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_mm: Option<f64>,
}

/// A numeric field counts as known only when present and strictly positive.
fn known(value: Option<f64>) -> bool {
    value.is_some_and(|v| v > 0.0)
}

impl PartialBeamSpec {
    /// Whether no field at all has been recognized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == PartialBeamSpec::default()
    }

    /// Merge newly extracted fields into this specification.
    ///
    /// Later values override earlier ones; absent fields never erase known
    /// values.
    pub fn merge(&mut self, updates: PartialBeamSpec) {
        if updates.material.is_some() {
            self.material = updates.material;
        }
        if known(updates.length_mm) {
            self.length_mm = updates.length_mm;
        }
        if known(updates.load_n) {
            self.load_n = updates.load_n;
        }
        if known(updates.height_mm) {
            self.height_mm = updates.height_mm;
        }
        if known(updates.width_mm) {
            self.width_mm = updates.width_mm;
        }
    }

    /// Required fields that are still unknown, in canonical order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<SpecField> {
        SpecField::ALL
            .into_iter()
            .filter(|field| match field {
                SpecField::Material => self.material.is_none(),
                SpecField::Length => !known(self.length_mm),
                SpecField::Load => !known(self.load_n),
                SpecField::Height => !known(self.height_mm),
                SpecField::Width => !known(self.width_mm),
            })
            .collect()
    }

    /// Whether all five required fields are known.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Promote to a complete specification.
    ///
    /// # Errors
    ///
    /// Returns [`IncompleteSpecification`] naming the unresolved fields when
    /// any required field is still unknown.
    pub fn complete(&self) -> Result<BeamSpecification, IncompleteSpecification> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(IncompleteSpecification { missing });
        }
        Ok(BeamSpecification {
            material: self.material.unwrap_or(Material::Steel),
            length_mm: self.length_mm.unwrap_or_default(),
            load_n: self.load_n.unwrap_or_default(),
            height_mm: self.height_mm.unwrap_or_default(),
            width_mm: self.width_mm.unwrap_or_default(),
        })
    }

    /// Volume used for historical comparison, substituting a 100 mm height
    /// when none has been supplied. `None` until length and width are known.
    #[must_use]
    pub fn comparison_volume_mm3(&self) -> Option<f64> {
        let length = self.length_mm.filter(|v| *v > 0.0)?;
        let width = self.width_mm.filter(|v| *v > 0.0)?;
        let height = self
            .height_mm
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_COMPARISON_HEIGHT_MM);
        Some(length * height * width)
    }
}
