//! Append-only ledger of previously evaluated and optimized beam designs.
//!
//! The backing store is a semicolon-separated flat table. Rows are never
//! edited or deleted; multiple processes may append concurrently, so every
//! query reloads the file first and each append lands in a single `write_all`
//! on an `O_APPEND` handle (row-level atomicity, no cross-process ordering
//! guarantee — queries select by minimum volume, not recency).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::deflection::DesignStatus;
use crate::errors::LedgerError;
use crate::materials::Material;

/// Number of reserved empty trailing columns kept for forward compatibility.
const RESERVED_COLUMNS: usize = 16;

/// Column headers of the backing table, in order.
const HEADERS: [&str; 14] = [
    "Design file Name",
    "L (mm)",
    "Type",
    "Material",
    "Shape",
    "h (mm)",
    "w (mm)",
    "F (N)",
    "V (mm^3)",
    "Deflection (mm)",
    "Allowable_Def (mm) L/240",
    "Def_Ratio %",
    "Status",
    "Reason",
];

/// Length tolerance applied when matching historical designs, as a fraction.
const LENGTH_TOLERANCE: f64 = 0.05;

/// A design about to be appended to the ledger.
///
/// The display name and reason text are synthesized at append time; dimensions
/// are persisted rounded to whole millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LedgerEntry {
    /// Beam material.
    pub material: Material,
    /// Span length in mm.
    pub length_mm: f64,
    /// Cross-section height in mm.
    pub height_mm: f64,
    /// Cross-section width in mm.
    pub width_mm: f64,
    /// Applied load in N.
    pub load_n: f64,
    /// Material volume in mm³.
    pub volume_mm3: f64,
    /// Computed deflection in mm.
    pub deflection_mm: f64,
    /// Allowable deflection in mm.
    pub allowable_mm: f64,
    /// PASS / FAIL / OPT tag.
    pub status: DesignStatus,
}

/// Best prior design returned by a ledger query.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatch {
    /// Cross-section height in mm.
    pub height_mm: f64,
    /// Cross-section width in mm.
    pub width_mm: f64,
    /// Material volume in mm³.
    pub volume_mm3: f64,
    /// Recorded deflection in mm.
    pub deflection_mm: f64,
    /// Recorded allowable deflection in mm.
    pub allowable_mm: f64,
    /// Recorded status tag.
    pub status: DesignStatus,
    /// Volume saving relative to the querying design, in percent. `None` when
    /// the querying design's volume is unknown.
    pub efficiency_improvement_percent: Option<f64>,
}

/// File-backed historical design index.
#[derive(Clone, Debug)]
pub struct DesignLedger {
    /// Path of the backing table; the file need not exist yet.
    path: PathBuf,
}

impl DesignLedger {
    /// Create a ledger over the given backing file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one design as a single row.
    ///
    /// Writes the header first when the file is new or empty. The header plus
    /// row (or the row alone) goes out in one `write_all` so a concurrent
    /// reader never observes a half-written row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the file cannot be opened or written.
    pub fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        let empty = file
            .metadata()
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let mut buffer = String::new();
        if empty {
            buffer.push_str(&header_line());
            buffer.push('\n');
        }
        buffer.push_str(&render_row(entry));
        buffer.push('\n');
        file.write_all(buffer.as_bytes())
            .map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), status = %entry.status, "appended design record");
        Ok(())
    }

    /// Find the minimum-volume PASS/OPT design matching the given material and
    /// span (±5% length tolerance). Ties are broken by first occurrence.
    ///
    /// The file is reloaded on every call; a missing or unreadable backing
    /// file is treated as "no historical data". `querying_volume_mm3` is the
    /// caller's own volume, used to report the efficiency improvement.
    #[must_use]
    pub fn best_match(
        &self,
        material: Material,
        length_mm: f64,
        querying_volume_mm3: Option<f64>,
    ) -> Option<HistoricalMatch> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(error) => {
                debug!(path = %self.path.display(), %error, "no historical data available");
                return None;
            }
        };

        let tolerance = length_mm * LENGTH_TOLERANCE;
        let mut best: Option<HistoricalMatch> = None;
        for line in BufReader::new(file).lines().skip(1) {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            let Some(row) = parse_row(&line) else {
                warn!(path = %self.path.display(), "skipping malformed ledger row");
                continue;
            };
            if row.material != material
                || !row.status.is_adequate()
                || (row.length_mm - length_mm).abs() > tolerance
            {
                continue;
            }
            // Strict comparison keeps the first occurrence on ties.
            if best.map_or(true, |current| row.volume_mm3 < current.volume_mm3) {
                best = Some(HistoricalMatch {
                    height_mm: row.height_mm,
                    width_mm: row.width_mm,
                    volume_mm3: row.volume_mm3,
                    deflection_mm: row.deflection_mm,
                    allowable_mm: row.allowable_mm,
                    status: row.status,
                    efficiency_improvement_percent: None,
                });
            }
        }

        best.map(|mut found| {
            found.efficiency_improvement_percent = querying_volume_mm3
                .filter(|v| *v > 0.0)
                .map(|own| ((own - found.volume_mm3) / own) * 100.0);
            found
        })
    }

    /// Wrap an I/O error with the ledger path.
    fn io_error(&self, source: std::io::Error) -> LedgerError {
        LedgerError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Fields of one parsed ledger row used by queries.
#[derive(Clone, Copy, Debug)]
struct ParsedRow {
    /// Recorded material.
    material: Material,
    /// Recorded span length in mm.
    length_mm: f64,
    /// Recorded height in mm.
    height_mm: f64,
    /// Recorded width in mm.
    width_mm: f64,
    /// Recorded volume in mm³.
    volume_mm3: f64,
    /// Recorded deflection in mm.
    deflection_mm: f64,
    /// Recorded allowable deflection in mm.
    allowable_mm: f64,
    /// Recorded status tag.
    status: DesignStatus,
}

/// Render the header line, including reserved trailing columns.
fn header_line() -> String {
    let mut columns: Vec<String> = HEADERS.iter().map(|h| (*h).to_owned()).collect();
    for index in 0..RESERVED_COLUMNS {
        columns.push(format!("Unnamed: {}", HEADERS.len() + index));
    }
    columns.join(";")
}

/// Render one entry as a row matching the header layout.
fn render_row(entry: &LedgerEntry) -> String {
    let height = entry.height_mm.round();
    let width = entry.width_mm.round();
    let ratio = if entry.allowable_mm > 0.0 {
        (entry.deflection_mm / entry.allowable_mm) * 100.0
    } else {
        0.0
    };
    let reason = if entry.status.is_adequate() {
        format!(
            "Deflection: {:.1} mm < Allowable Deflection = {:.1} mm",
            entry.deflection_mm, entry.allowable_mm
        )
    } else {
        format!(
            "Excessive Deflection: {:.1} mm and Allowable Deflection = {:.1} mm",
            entry.deflection_mm, entry.allowable_mm
        )
    };
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let shape = entry.material.section_shape();
    let name = format!(
        "{}_Beam_{}_{}_{}_{}_{}_{timestamp}.json",
        entry.length_mm, entry.material, shape, height, width, entry.load_n
    );

    let mut columns = vec![
        name,
        format!("{}", entry.length_mm),
        "Beam".to_owned(),
        entry.material.to_string(),
        shape.to_owned(),
        format!("{height}"),
        format!("{width}"),
        format!("{}", entry.load_n),
        format!("{}", entry.volume_mm3),
        format!("{}", entry.deflection_mm),
        format!("{}", entry.allowable_mm),
        format!("{ratio:.1}"),
        entry.status.to_string(),
        reason,
    ];
    columns.extend(std::iter::repeat(String::new()).take(RESERVED_COLUMNS));
    columns.join(";")
}

/// Parse the queried fields out of one row; `None` when the row is malformed.
fn parse_row(line: &str) -> Option<ParsedRow> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < HEADERS.len() {
        return None;
    }
    Some(ParsedRow {
        material: fields[3].parse().ok()?,
        length_mm: fields[1].trim().parse().ok()?,
        height_mm: fields[5].trim().parse().ok()?,
        width_mm: fields[6].trim().parse().ok()?,
        volume_mm3: fields[8].trim().parse().ok()?,
        deflection_mm: fields[9].trim().parse().ok()?,
        allowable_mm: fields[10].trim().parse().ok()?,
        status: fields[12].trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    use super::*;

    fn entry(material: Material, length: f64, height: f64, width: f64, status: DesignStatus) -> LedgerEntry {
        LedgerEntry {
            material,
            length_mm: length,
            height_mm: height,
            width_mm: width,
            load_n: 20_000.0,
            volume_mm3: length * height * width,
            deflection_mm: 12.0,
            allowable_mm: length / 240.0,
            status,
        }
    }

    #[test]
    fn missing_file_means_no_historical_data() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("absent.csv"));
        assert!(ledger.best_match(Material::Steel, 6_000.0, None).is_none());
    }

    #[test]
    fn append_then_query_round_trips() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("history.csv"));
        ledger
            .append(&entry(Material::Steel, 6_000.0, 200.0, 100.0, DesignStatus::Pass))
            .expect("append succeeds");

        let found = ledger
            .best_match(Material::Steel, 6_000.0, Some(200_000_000.0))
            .expect("record matches");
        assert_relative_eq!(found.height_mm, 200.0);
        assert_relative_eq!(found.volume_mm3, 6_000.0 * 200.0 * 100.0);
        assert_eq!(found.status, DesignStatus::Pass);
        let saving = found.efficiency_improvement_percent.expect("volume known");
        assert_relative_eq!(saving, 40.0);
    }

    #[test]
    fn query_selects_minimum_volume_and_keeps_first_tie() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("history.csv"));
        ledger
            .append(&entry(Material::Wood, 4_000.0, 220.0, 160.0, DesignStatus::Pass))
            .expect("append");
        ledger
            .append(&entry(Material::Wood, 4_000.0, 200.0, 150.0, DesignStatus::Opt))
            .expect("append");
        // Same volume as the previous row; the earlier one must win.
        ledger
            .append(&entry(Material::Wood, 4_000.0, 150.0, 200.0, DesignStatus::Pass))
            .expect("append");

        let found = ledger
            .best_match(Material::Wood, 4_000.0, None)
            .expect("records match");
        assert_eq!(found.status, DesignStatus::Opt);
        assert_relative_eq!(found.height_mm, 200.0);
    }

    #[test]
    fn failed_designs_are_never_returned() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("history.csv"));
        ledger
            .append(&entry(Material::Concrete, 5_000.0, 150.0, 100.0, DesignStatus::Fail))
            .expect("append");
        assert!(ledger.best_match(Material::Concrete, 5_000.0, None).is_none());
    }

    #[test]
    fn length_tolerance_is_inclusive_at_five_percent() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("history.csv"));
        ledger
            .append(&entry(Material::Steel, 6_300.0, 200.0, 100.0, DesignStatus::Pass))
            .expect("append");

        // 6300 == 6000 * 1.05 exactly: included.
        assert!(ledger.best_match(Material::Steel, 6_000.0, None).is_some());
        // For a 5994 mm query the band reaches 6293.7 mm; 6300 is outside.
        assert!(ledger.best_match(Material::Steel, 5_994.0, None).is_none());
    }

    #[test]
    fn material_must_match_exactly() {
        let dir = tempdir().expect("temp dir");
        let ledger = DesignLedger::new(dir.path().join("history.csv"));
        ledger
            .append(&entry(Material::Steel, 6_000.0, 200.0, 100.0, DesignStatus::Pass))
            .expect("append");
        assert!(ledger.best_match(Material::Wood, 6_000.0, None).is_none());
    }

    #[test]
    fn appends_from_two_handles_accumulate() {
        // Two ledger values over the same path model concurrent appenders.
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("history.csv");
        let writer_a = DesignLedger::new(&path);
        let writer_b = DesignLedger::new(&path);
        writer_a
            .append(&entry(Material::Steel, 6_000.0, 300.0, 150.0, DesignStatus::Pass))
            .expect("append");
        writer_b
            .append(&entry(Material::Steel, 6_000.0, 200.0, 100.0, DesignStatus::Opt))
            .expect("append");

        let found = writer_a
            .best_match(Material::Steel, 6_000.0, None)
            .expect("both rows visible after reload");
        assert_relative_eq!(found.volume_mm3, 6_000.0 * 200.0 * 100.0);
    }
}
