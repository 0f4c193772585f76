//! Sheet removal pipeline
//!
//! A removal runs through a fixed sequence of checkpoints:
//!
//! `Loaded -> Resolved -> TargetLocated -> WorkbookPatched ->
//! RelationshipsPatched -> WorksheetPartsRemoved -> Serialized`
//!
//! Any step may abort with an [`EngineError`]; no output bytes exist until the
//! last step has succeeded. A sheet that is not in the workbook ends the run
//! right after `Resolved` with the input returned untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::graph::LoadedWorkbook;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::opc::{CONTENT_TYPES, canonical_part_name, resolve_target};
use crate::package::Package;
use crate::parts::RelationshipsPart;
use crate::parts::relationships::REL_TYPE_CALC_CHAIN;
use crate::verify::verify_preservation;
use crate::xml::{decode, scan_children, splice};

/// Pipeline checkpoints, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Loaded,
    Resolved,
    TargetLocated,
    WorkbookPatched,
    RelationshipsPatched,
    WorksheetPartsRemoved,
    Serialized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::Resolved => "resolved",
            Stage::TargetLocated => "target-located",
            Stage::WorkbookPatched => "workbook-patched",
            Stage::RelationshipsPatched => "relationships-patched",
            Stage::WorksheetPartsRemoved => "worksheet-parts-removed",
            Stage::Serialized => "serialized",
        };
        f.write_str(name)
    }
}

/// Knobs for the in-process removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalOptions {
    pub reindex_sheet_references: bool,
    pub prune_content_types: bool,
    /// Delete the calculation chain when it lists cells of the removed sheet
    pub drop_stale_calc_chain: bool,
    pub verify: bool,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            reindex_sheet_references: true,
            prune_content_types: false,
            drop_stale_calc_chain: true,
            verify: false,
        }
    }
}

/// What a removal did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    /// `false` when the sheet was not present and the input came back as-is
    pub removed: bool,
    pub remaining_sheet_names: Vec<String>,
    /// Parts deleted from the package
    pub removed_parts: Vec<String>,
}

/// Output bytes plus the report describing them.
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    pub bytes: Vec<u8>,
    pub report: RemovalReport,
}

impl RemovalOutcome {
    pub(crate) fn unchanged(input: &[u8], remaining_sheet_names: Vec<String>) -> Self {
        Self {
            bytes: input.to_vec(),
            report: RemovalReport {
                removed: false,
                remaining_sheet_names,
                removed_parts: Vec::new(),
            },
        }
    }
}

fn checkpoint(stage: Stage, sheet_name: &str) {
    log::debug!("[{}] {}", sheet_name, stage);
}

/// Remove `sheet_name` from the package in `input`.
pub fn remove_sheet_with(
    input: &[u8],
    sheet_name: &str,
    options: &RemovalOptions,
) -> Result<RemovalOutcome> {
    let mut package = Package::from_bytes(input)?;
    checkpoint(Stage::Loaded, sheet_name);

    let LoadedWorkbook {
        mut workbook,
        mut rels,
        graph,
    } = LoadedWorkbook::load(&mut package)?;
    checkpoint(Stage::Resolved, sheet_name);

    let Some(target) = graph.get(sheet_name).cloned() else {
        log::warn!(
            "sheet '{}' not found among {:?}; package left unchanged",
            sheet_name,
            graph.names()
        );
        return Ok(RemovalOutcome::unchanged(input, graph.names()));
    };
    checkpoint(Stage::TargetLocated, sheet_name);

    let (index, _) = workbook.remove_sheet(&target.name).ok_or_else(|| {
        EngineError::malformed(workbook.part_name(), format!("sheet '{}' vanished", target.name))
    })?;
    if workbook.sheets().is_empty() {
        return Err(EngineError::EmptyResultPackage {
            sheet: target.name.clone(),
        });
    }
    if workbook.sheets().iter().all(|s| {
        s.state
            .as_deref()
            .is_some_and(|state| state != "visible")
    }) {
        log::warn!(
            "removing sheet '{}' leaves only hidden sheets; Excel will repair the workbook on open",
            target.name
        );
    }
    if options.reindex_sheet_references {
        let edited = workbook.reindex_after_removal(index)?;
        log::debug!("reindexed {} sheet reference(s)", edited);
    }
    checkpoint(Stage::WorkbookPatched, sheet_name);

    // Another sheet pointing at the same relationship or part keeps both alive
    let shared = graph.sheets().iter().any(|s| {
        s.name != target.name
            && (s.relationship_id == target.relationship_id || s.part_path == target.part_path)
    });
    if shared {
        log::warn!(
            "relationship {} of sheet '{}' is shared; keeping it and its part",
            target.relationship_id,
            target.name
        );
    } else if rels.remove(&target.relationship_id).is_none() {
        return Err(EngineError::malformed(
            rels.part_name(),
            format!("relationship {} vanished", target.relationship_id),
        ));
    }
    checkpoint(Stage::RelationshipsPatched, sheet_name);

    let mut removed_parts = Vec::new();
    if !shared {
        package.delete_part(&target.part_path)?;
        removed_parts.push(target.part_path.clone());
        if let Some(sheet_rels) = &target.rels_part {
            package.delete_part(sheet_rels)?;
            removed_parts.push(sheet_rels.clone());
        }
    }

    let mut stale_overrides = Vec::new();
    if options.drop_stale_calc_chain
        && let Some((rel_id, calc_chain)) =
            stale_calc_chain(&mut package, &rels, workbook.part_name(), target.sheet_id)?
    {
        log::debug!("dropping {} with entries for sheet id {}", calc_chain, target.sheet_id);
        rels.remove(&rel_id);
        package.delete_part(&calc_chain)?;
        stale_overrides.push(calc_chain.clone());
        removed_parts.push(calc_chain);
    }
    checkpoint(Stage::WorksheetPartsRemoved, sheet_name);

    if options.prune_content_types {
        prune_content_types(&mut package, &removed_parts)?;
    } else {
        prune_content_types(&mut package, &stale_overrides)?;
    }
    package.write_part(workbook.part_name(), workbook.serialize());
    package.write_part(rels.part_name(), rels.serialize());
    let bytes = package.serialize()?;
    checkpoint(Stage::Serialized, sheet_name);

    if options.verify {
        ensure_preserved(input, &bytes)?;
    }

    log::info!(
        "removed sheet '{}' ({}), {} sheet(s) remain",
        target.name,
        target.part_path,
        workbook.sheets().len()
    );
    Ok(RemovalOutcome {
        bytes,
        report: RemovalReport {
            removed: true,
            remaining_sheet_names: workbook.sheet_names(),
            removed_parts,
        },
    })
}

/// Run the comparator and fail on critical differences. Findings are logged.
pub(crate) fn ensure_preserved(original: &[u8], processed: &[u8]) -> Result<()> {
    let verification = verify_preservation(original, processed)?;
    for difference in &verification.differences {
        log::warn!("{}", difference);
    }
    let critical = verification.critical_count();
    if critical > 0 {
        return Err(EngineError::VerificationFailed(critical));
    }
    Ok(())
}

/// The workbook's calcChain relationship id and part, when the chain has a
/// cell on `sheet_id`.
fn stale_calc_chain(
    package: &mut Package,
    rels: &RelationshipsPart,
    workbook_part: &str,
    sheet_id: u32,
) -> Result<Option<(String, String)>> {
    let Some(rel) = rels.find_by_type(REL_TYPE_CALC_CHAIN) else {
        return Ok(None);
    };
    let path = resolve_target(workbook_part, &rel.target);
    if !package.contains(&path) {
        return Ok(None);
    }

    let bytes = package.read_part(&path)?;
    if calc_chain_mentions(&path, &bytes, sheet_id)? {
        Ok(Some((rel.id.clone(), path)))
    } else {
        Ok(None)
    }
}

/// Whether any `<c>` of a calcChain part belongs to `sheet_id`. A `<c>`
/// without `i` continues the sheet of the previous one.
fn calc_chain_mentions(part_name: &str, bytes: &[u8], sheet_id: u32) -> Result<bool> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut current: Option<u32> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"i" {
                        current = std::str::from_utf8(&attr.value)
                            .ok()
                            .and_then(|v| v.parse().ok());
                    }
                }
                if current == Some(sheet_id) {
                    return Ok(true);
                }
            }
            Ok(Event::Eof) => return Ok(false),
            Err(e) => {
                return Err(EngineError::malformed(
                    part_name,
                    format!("error at position {}: {}", reader.error_position(), e),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Drop `<Override>` entries that name deleted parts.
fn prune_content_types(package: &mut Package, removed_parts: &[String]) -> Result<()> {
    if removed_parts.is_empty() || !package.contains(CONTENT_TYPES) {
        return Ok(());
    }

    let bytes = package.read_part(CONTENT_TYPES)?;
    let text = decode(&bytes).map_err(|reason| EngineError::malformed(CONTENT_TYPES, reason))?;
    let Some(scan) = scan_children(text, b"Types", b"Override", false)
        .map_err(|reason| EngineError::malformed(CONTENT_TYPES, reason))?
    else {
        return Ok(());
    };

    let edits: Vec<_> = scan
        .children
        .iter()
        .filter(|span| {
            span.attr("PartName")
                .map(canonical_part_name)
                .is_some_and(|name| removed_parts.contains(&name))
        })
        .map(|span| (text[..span.start].trim_end().len()..span.end, String::new()))
        .collect();
    if edits.is_empty() {
        return Ok(());
    }

    log::debug!("pruning {} content type override(s)", edits.len());
    let updated = splice(text, edits);
    package.write_part(CONTENT_TYPES, updated.into_bytes());
    Ok(())
}
