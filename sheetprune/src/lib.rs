//! sheetprune: remove one worksheet from an XLSX/XLSM package
//!
//! The engine works at the container level. It edits the workbook part and
//! the workbook relationships, deletes the worksheet part (and its own
//! relationships), and copies every other ZIP entry through untouched, so the
//! remaining sheets keep their formatting byte-for-byte.
//!
//! ```no_run
//! let input = std::fs::read("order.xlsx")?;
//! let outcome = sheetprune::remove_sheet(&input, "Input")?;
//! assert!(!outcome.report.remaining_sheet_names.contains(&"Input".to_string()));
//! std::fs::write("order-clean.xlsx", &outcome.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod opc;
pub mod package;
pub mod parts;
pub mod removal;
pub mod strategy;
pub mod verify;
mod xml;

pub use config::{DEFAULT_SHEET_NAME, EngineConfig, StrategyKind};
pub use error::{EngineError, Result};
pub use graph::{LoadedWorkbook, ResolvedSheet, SheetGraph};
pub use package::Package;
pub use removal::{RemovalOptions, RemovalOutcome, RemovalReport, Stage};
pub use strategy::{ExternalCommand, PackageEditor, SheetRemovalStrategy, strategy_from_config};
pub use verify::{
    Difference, FormatSignature, Severity, VerificationReport, format_signatures,
    verify_preservation,
};

/// Remove `sheet_name` with the default in-process editor.
///
/// A sheet that is not in the workbook is not an error: the input comes back
/// unchanged and `report.removed` is `false`.
pub fn remove_sheet(input: &[u8], sheet_name: &str) -> Result<RemovalOutcome> {
    PackageEditor::default().remove_sheet(input, sheet_name)
}

/// Sheets of a package in tab order, resolved to their parts.
pub fn list_sheets(input: &[u8]) -> Result<Vec<ResolvedSheet>> {
    let mut package = Package::from_bytes(input)?;
    let loaded = LoadedWorkbook::load(&mut package)?;
    Ok(loaded.graph.sheets().to_vec())
}
