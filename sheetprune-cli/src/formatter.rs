//! Output formatters for removal, listing and verification results

use crate::FileResult;
use anyhow::Result;
use colored::*;
use serde::Serialize;
use sheetprune::{Difference, ResolvedSheet, Severity, VerificationReport};
use std::path::Path;

/// Print removal results in human-readable format with colors
pub fn print_removals(sheet_name: &str, results: &[FileResult]) {
    for result in results {
        println!("{}", format!("Processing: {}", result.file.display()).bold());

        if let Some(error) = &result.error {
            println!("  {} {}", "✗".red().bold(), error.red());
            println!();
            continue;
        }

        let Some(report) = &result.report else {
            continue;
        };
        let prefix = if result.dry_run { "[DRY RUN] " } else { "" };
        if report.removed {
            let verb = if result.dry_run { "Would remove" } else { "Removed" };
            println!(
                "  {}{} {} sheet '{}'",
                prefix,
                "✓".green().bold(),
                verb,
                sheet_name.cyan()
            );
            for part in &report.removed_parts {
                println!("    - {}", part.bright_black());
            }
        } else {
            println!(
                "  {}{} Sheet '{}' not found, package left unchanged",
                prefix,
                "-".yellow().bold(),
                sheet_name.cyan()
            );
        }
        println!("  {} {}", "Remaining:".bold(), report.remaining_sheet_names.join(", "));
        if let Some(output) = &result.output {
            let label = if result.dry_run { "Output would be:" } else { "Output:" };
            println!("  {} {}", label.bold(), output.display());
        } else if report.removed {
            println!("  {} {}", "Output:".bold(), "not written".red());
        }
        if let Some(verification) = &result.verification {
            print_differences(verification, 2);
        }
        println!();
    }

    let failed = results.iter().filter(|r| r.failed()).count();
    println!("{}", "Summary:".bold().underline());
    println!("  {} {}", "Files:".bold(), results.len());
    if failed > 0 {
        println!("  {} {}", "Failed:".red().bold(), failed);
    } else {
        println!("  {}", "✓ All files processed".green().bold());
    }
}

/// Print the sheets of one workbook in tab order
pub fn print_sheets(file_path: &Path, sheets: &[ResolvedSheet]) {
    println!("{}", format!("Sheets in: {}", file_path.display()).bold());
    for (index, sheet) in sheets.iter().enumerate() {
        let state = match sheet.state.as_deref() {
            Some(state) => format!(" [{}]", state).yellow().to_string(),
            None => String::new(),
        };
        println!(
            "  {}. {} ({}) -> {}{}",
            index + 1,
            sheet.name.cyan().bold(),
            sheet.relationship_id.bright_black(),
            sheet.part_path,
            state
        );
    }
}

pub fn print_verification(file_path: &Path, report: &VerificationReport) {
    println!("{}", format!("Verifying: {}", file_path.display()).bold());
    if !report.removed_sheets.is_empty() {
        println!("  {} {}", "Removed:".bold(), report.removed_sheets.join(", "));
    }
    for (sheet, signature) in &report.signatures {
        println!(
            "  {} {}: {} merged range(s), {} border(s), {} font(s), {} fill(s)",
            "Sheet:".bold(),
            sheet.cyan(),
            signature.merge_ranges.len(),
            signature.borders.len(),
            signature.fonts.len(),
            signature.fills.len()
        );
    }
    print_differences(report, 1);
}

fn print_differences(report: &VerificationReport, indent: usize) {
    let indent_str = "  ".repeat(indent);
    if report.is_clean() {
        println!("{}{}", indent_str, "✓ Formatting preserved".green().bold());
        return;
    }
    for difference in &report.differences {
        print_difference(difference, &indent_str);
    }
}

fn print_difference(difference: &Difference, indent_str: &str) {
    let severity_str = match difference.severity {
        Severity::Critical => "CRITICAL".red().bold(),
        Severity::Warning => "WARN".yellow().bold(),
    };
    let mut line = String::new();
    if let Some(sheet) = &difference.sheet {
        line.push_str(&format!("sheet '{}': ", sheet));
    }
    line.push_str(&difference.kind);
    if let (Some(expected), Some(actual)) = (&difference.expected, &difference.actual) {
        line.push_str(&format!(" (expected {}, got {})", expected, actual));
    }
    println!("{}{} {}", indent_str, severity_str, line);
}

/// Print any result as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
