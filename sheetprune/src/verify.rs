//! Post-removal verification
//!
//! Re-opens a processed package and checks it against the original: every
//! surviving sheet must still resolve, keep its tab order, keep its worksheet
//! bytes, and keep the same [`FormatSignature`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::graph::{LoadedWorkbook, ResolvedSheet};
use crate::opc::resolve_target;
use crate::package::Package;
use crate::parts::relationships::REL_TYPE_STYLES;
use crate::parts::{StyleSheet, WorksheetSummary};

/// Structural formatting summary of one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatSignature {
    /// Merged ranges, sorted
    pub merge_ranges: Vec<String>,
    /// Distinct border definitions referenced by the sheet
    pub borders: BTreeSet<String>,
    pub fonts: BTreeSet<String>,
    pub fills: BTreeSet<String>,
}

impl FormatSignature {
    pub fn compute(summary: &WorksheetSummary, styles: &StyleSheet) -> Self {
        let mut merge_ranges = summary.merge_ranges.clone();
        merge_ranges.sort();

        let mut signature = FormatSignature {
            merge_ranges,
            ..Default::default()
        };
        for xf in summary.style_ids.iter().filter_map(|id| styles.cell_xf(*id)) {
            if let Some(font) = styles.fonts.get(xf.font_id) {
                signature.fonts.insert(font.clone());
            }
            if let Some(fill) = styles.fills.get(xf.fill_id) {
                signature.fills.insert(fill.clone());
            }
            if let Some(border) = styles.borders.get(xf.border_id) {
                signature.borders.insert(border.clone());
            }
        }
        signature
    }

    pub fn has_merges(&self) -> bool {
        !self.merge_ranges.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Critical,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => f.write_str("CRITICAL"),
            Severity::Warning => f.write_str("WARN"),
        }
    }
}

/// One finding of the comparator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Difference {
    pub severity: Severity,
    /// Sheet the finding is about, `None` for package-level findings
    pub sheet: Option<String>,
    pub kind: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl Difference {
    fn new(severity: Severity, sheet: Option<&str>, kind: impl Into<String>) -> Self {
        Self {
            severity,
            sheet: sheet.map(str::to_string),
            kind: kind.into(),
            expected: None,
            actual: None,
        }
    }

    fn values(mut self, expected: impl fmt::Debug, actual: impl fmt::Debug) -> Self {
        self.expected = Some(format!("{:?}", expected));
        self.actual = Some(format!("{:?}", actual));
        self
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity)?;
        if let Some(sheet) = &self.sheet {
            write!(f, "sheet '{}': ", sheet)?;
        }
        f.write_str(&self.kind)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {}", expected)?;
            if let Some(actual) = &self.actual {
                write!(f, ", got {}", actual)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    /// Sheets of the original that the processed package no longer has
    pub removed_sheets: Vec<String>,
    /// Signatures of the surviving sheets, taken from the processed package
    pub signatures: BTreeMap<String, FormatSignature>,
    pub differences: Vec<Difference>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn critical_count(&self) -> usize {
        self.differences
            .iter()
            .filter(|d| d.severity == Severity::Critical)
            .count()
    }
}

struct OpenedPackage {
    package: Package,
    loaded: LoadedWorkbook,
    styles: StyleSheet,
}

impl OpenedPackage {
    fn open(bytes: &[u8]) -> Result<Self> {
        let mut package = Package::from_bytes(bytes)?;
        let loaded = LoadedWorkbook::load(&mut package)?;

        let styles = match loaded.rels.find_by_type(REL_TYPE_STYLES) {
            Some(rel) => {
                let path = resolve_target(loaded.workbook.part_name(), &rel.target);
                if package.contains(&path) {
                    StyleSheet::parse(&path, &package.read_part(&path)?)?
                } else {
                    StyleSheet::default()
                }
            }
            None => StyleSheet::default(),
        };

        Ok(Self {
            package,
            loaded,
            styles,
        })
    }

    fn sheet_bytes(&mut self, sheet: &ResolvedSheet) -> Result<Vec<u8>> {
        self.package.read_part(&sheet.part_path)
    }

    fn signature(&mut self, sheet: &ResolvedSheet) -> Result<FormatSignature> {
        let bytes = self.sheet_bytes(sheet)?;
        let summary = WorksheetSummary::parse(&sheet.part_path, &bytes)?;
        Ok(FormatSignature::compute(&summary, &self.styles))
    }
}

/// Format signatures of every sheet in a package, in tab order.
pub fn format_signatures(bytes: &[u8]) -> Result<Vec<(String, FormatSignature)>> {
    let mut opened = OpenedPackage::open(bytes)?;
    let sheets = opened.loaded.graph.sheets().to_vec();
    sheets
        .iter()
        .map(|sheet| Ok((sheet.name.clone(), opened.signature(sheet)?)))
        .collect()
}

/// Compare a processed package against the original it was produced from.
///
/// Fails only when the original cannot be read; problems with the processed
/// package are reported as differences.
pub fn verify_preservation(original: &[u8], processed: &[u8]) -> Result<VerificationReport> {
    let mut before = OpenedPackage::open(original)?;
    let mut report = VerificationReport::default();

    let mut after = match OpenedPackage::open(processed) {
        Ok(opened) => opened,
        Err(err) => {
            report.differences.push(
                Difference::new(Severity::Critical, None, "processed package does not open")
                    .values("a readable package", err.to_string()),
            );
            return Ok(report);
        }
    };

    let before_sheets = before.loaded.graph.sheets().to_vec();
    let after_sheets = after.loaded.graph.sheets().to_vec();

    if after_sheets.is_empty() {
        report.differences.push(Difference::new(
            Severity::Critical,
            None,
            "processed workbook has no sheets",
        ));
    }

    report.removed_sheets = before_sheets
        .iter()
        .filter(|s| !after_sheets.iter().any(|a| a.name == s.name))
        .map(|s| s.name.clone())
        .collect();
    if report.removed_sheets.len() > 1 {
        report.differences.push(
            Difference::new(Severity::Warning, None, "more than one sheet was removed")
                .values(1, report.removed_sheets.len()),
        );
    }

    let expected_order: Vec<&str> = before_sheets
        .iter()
        .filter(|s| after_sheets.iter().any(|a| a.name == s.name))
        .map(|s| s.name.as_str())
        .collect();
    let actual_order: Vec<&str> = after_sheets
        .iter()
        .filter(|s| before_sheets.iter().any(|b| b.name == s.name))
        .map(|s| s.name.as_str())
        .collect();
    if expected_order != actual_order {
        report.differences.push(
            Difference::new(Severity::Critical, None, "sheet order changed")
                .values(&expected_order, &actual_order),
        );
    }

    for sheet in &after_sheets {
        let Some(original) = before_sheets.iter().find(|b| b.name == sheet.name) else {
            report.differences.push(Difference::new(
                Severity::Critical,
                Some(&sheet.name),
                "sheet does not exist in the original package",
            ));
            continue;
        };

        if before.sheet_bytes(original)? != after.sheet_bytes(sheet)? {
            report.differences.push(Difference::new(
                Severity::Critical,
                Some(&sheet.name),
                "worksheet bytes changed",
            ));
        }

        let expected = before.signature(original)?;
        let actual = match after.signature(sheet) {
            Ok(signature) => signature,
            Err(err) => {
                report.differences.push(
                    Difference::new(Severity::Critical, Some(&sheet.name), "worksheet unreadable")
                        .values("a readable worksheet", err.to_string()),
                );
                continue;
            }
        };
        compare_signatures(&sheet.name, &expected, &actual, &mut report.differences);
        report.signatures.insert(sheet.name.clone(), actual);
    }

    Ok(report)
}

fn compare_signatures(
    sheet: &str,
    expected: &FormatSignature,
    actual: &FormatSignature,
    differences: &mut Vec<Difference>,
) {
    if expected.merge_ranges != actual.merge_ranges {
        differences.push(
            Difference::new(Severity::Critical, Some(sheet), "merged ranges differ")
                .values(&expected.merge_ranges, &actual.merge_ranges),
        );
    }

    let style_sets = [
        ("border", &expected.borders, &actual.borders),
        ("font", &expected.fonts, &actual.fonts),
        ("fill", &expected.fills, &actual.fills),
    ];
    for (label, before, after) in style_sets {
        if before.len() != after.len() {
            differences.push(
                Difference::new(Severity::Critical, Some(sheet), format!("{} count differs", label))
                    .values(before.len(), after.len()),
            );
        } else if before != after {
            differences.push(Difference::new(
                Severity::Critical,
                Some(sheet),
                format!("{} definitions differ", label),
            ));
        }
    }
}
