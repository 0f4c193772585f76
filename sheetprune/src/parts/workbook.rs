//! Workbook part (`xl/workbook.xml`)

use serde::Serialize;

use super::{Segment, join_segments, split_children};
use crate::error::{EngineError, Result};
use crate::xml::{decode, rewrite_start_tag, scan_children, splice};

/// A `<sheet>` element of the workbook, in tab order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetEntry {
    pub name: String,
    pub sheet_id: u32,
    pub relationship_id: String,
    /// `hidden` / `veryHidden`, absent for visible sheets
    pub state: Option<String>,
    #[serde(skip)]
    segment: Segment,
}

/// Parsed workbook part.
///
/// Everything up to the first `<sheet>` is the head, everything after the last
/// one is the raw tail (`</sheets>`, defined names, calculation properties,
/// extension lists). Both are kept verbatim.
#[derive(Debug, Clone)]
pub struct WorkbookPart {
    part_name: String,
    head: String,
    sheets: Vec<SheetEntry>,
    raw_tail: String,
}

impl WorkbookPart {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let text = decode(bytes).map_err(|reason| EngineError::malformed(part_name, reason))?;
        let scan = scan_children(text, b"sheets", b"sheet", false)
            .map_err(|reason| EngineError::malformed(part_name, reason))?
            .ok_or_else(|| EngineError::malformed(part_name, "missing <sheets> element"))?;

        let (head, segments, raw_tail) = split_children(text, &scan);
        let mut sheets: Vec<SheetEntry> = Vec::with_capacity(segments.len());
        for (segment, span) in segments {
            let name = span
                .attr("name")
                .ok_or_else(|| EngineError::malformed(part_name, "<sheet> without name"))?
                .to_string();
            let sheet_id = span
                .attr("sheetId")
                .and_then(|v| v.parse::<u32>().ok())
                .ok_or_else(|| {
                    EngineError::malformed(
                        part_name,
                        format!("sheet '{}' has a missing or invalid sheetId", name),
                    )
                })?;
            let relationship_id = span
                .prefixed_attr("id")
                .ok_or_else(|| {
                    EngineError::malformed(
                        part_name,
                        format!("sheet '{}' has no relationship id", name),
                    )
                })?
                .to_string();

            if sheets.iter().any(|s| s.name == name) {
                return Err(EngineError::malformed(
                    part_name,
                    format!("duplicate sheet name '{}'", name),
                ));
            }

            sheets.push(SheetEntry {
                name,
                sheet_id,
                relationship_id,
                state: span.attr("state").map(str::to_string),
                segment,
            });
        }

        Ok(Self {
            part_name: part_name.to_string(),
            head,
            sheets,
            raw_tail,
        })
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn raw_tail(&self) -> &str {
        &self.raw_tail
    }

    /// Tab index of a sheet, by exact name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    /// Take a sheet out of the list, keeping the others in order.
    pub fn remove_sheet(&mut self, name: &str) -> Option<(usize, SheetEntry)> {
        let index = self.position(name)?;
        Some((index, self.sheets.remove(index)))
    }

    /// Fix the sheet-index references that a removal at `removed` shifts:
    /// sheet-scoped defined names (`localSheetId`) and the workbook views'
    /// `activeTab`/`firstSheet`.
    ///
    /// Call after [`Self::remove_sheet`]. Returns the number of elements edited.
    pub fn reindex_after_removal(&mut self, removed: usize) -> Result<usize> {
        let remaining = self.sheets.len();
        let mut touched = 0;

        let scan = scan_children(&self.raw_tail, b"definedNames", b"definedName", true)
            .map_err(|reason| EngineError::malformed(&self.part_name, reason))?;
        if let Some(scan) = scan {
            let mut edits = Vec::new();
            for span in &scan.children {
                let Some(local) = span.attr("localSheetId").and_then(|v| v.parse::<usize>().ok())
                else {
                    continue;
                };
                if local == removed {
                    let start = self.raw_tail[..span.start].trim_end().len();
                    edits.push((start..span.end, String::new()));
                } else if local > removed {
                    let tag = &self.raw_tail[span.start..span.tag_end];
                    let rewritten =
                        rewrite_start_tag(tag, &[("localSheetId", (local - 1).to_string())])
                            .map_err(|reason| EngineError::malformed(&self.part_name, reason))?;
                    edits.push((span.start..span.tag_end, rewritten));
                }
            }
            touched += edits.len();
            self.raw_tail = splice(&self.raw_tail, edits);
        }

        let scan = scan_children(&self.head, b"bookViews", b"workbookView", true)
            .map_err(|reason| EngineError::malformed(&self.part_name, reason))?;
        if let Some(scan) = scan {
            let mut edits = Vec::new();
            for span in &scan.children {
                let mut updates = Vec::new();
                for key in ["activeTab", "firstSheet"] {
                    let Some(value) = span.attr(key).and_then(|v| v.parse::<usize>().ok()) else {
                        continue;
                    };
                    let shifted = if value > removed { value - 1 } else { value };
                    let clamped = shifted.min(remaining.saturating_sub(1));
                    if clamped != value {
                        updates.push((key, clamped.to_string()));
                    }
                }
                if !updates.is_empty() {
                    let tag = &self.head[span.start..span.tag_end];
                    let rewritten = rewrite_start_tag(tag, &updates)
                        .map_err(|reason| EngineError::malformed(&self.part_name, reason))?;
                    edits.push((span.start..span.tag_end, rewritten));
                }
            }
            touched += edits.len();
            self.head = splice(&self.head, edits);
        }

        Ok(touched)
    }

    pub fn serialize(&self) -> Vec<u8> {
        join_segments(
            &self.head,
            self.sheets.iter().map(|s| &s.segment),
            &self.raw_tail,
        )
    }
}
