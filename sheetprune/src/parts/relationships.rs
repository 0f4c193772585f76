//! Relationships parts (`*/_rels/*.rels`)

use serde::Serialize;

use super::{Segment, join_segments, split_children};
use crate::error::{EngineError, Result};
use crate::xml::{decode, scan_children};

pub const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
pub const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_TYPE_CALC_CHAIN: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
    #[serde(skip)]
    segment: Segment,
}

impl Relationship {
    /// External targets (hyperlinks, linked files) never name a package part.
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("External"))
    }
}

/// Parsed relationships part; same head/list/tail layout as the workbook.
#[derive(Debug, Clone)]
pub struct RelationshipsPart {
    part_name: String,
    head: String,
    relationships: Vec<Relationship>,
    raw_tail: String,
}

impl RelationshipsPart {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let text = decode(bytes).map_err(|reason| EngineError::malformed(part_name, reason))?;
        let scan = scan_children(text, b"Relationships", b"Relationship", false)
            .map_err(|reason| EngineError::malformed(part_name, reason))?
            .ok_or_else(|| EngineError::malformed(part_name, "missing <Relationships> element"))?;

        let (head, segments, raw_tail) = split_children(text, &scan);
        let mut relationships = Vec::with_capacity(segments.len());
        for (segment, span) in segments {
            let id = span
                .attr("Id")
                .ok_or_else(|| EngineError::malformed(part_name, "<Relationship> without Id"))?
                .to_string();
            let target = span
                .attr("Target")
                .ok_or_else(|| {
                    EngineError::malformed(
                        part_name,
                        format!("relationship {} has no Target", id),
                    )
                })?
                .to_string();

            relationships.push(Relationship {
                id,
                rel_type: span.attr("Type").unwrap_or_default().to_string(),
                target,
                target_mode: span.attr("TargetMode").map(str::to_string),
                segment,
            });
        }

        Ok(Self {
            part_name: part_name.to_string(),
            head,
            relationships,
            raw_tail,
        })
    }

    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// First relationship of the given type.
    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.rel_type == rel_type)
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let index = self.relationships.iter().position(|r| r.id == id)?;
        Some(self.relationships.remove(index))
    }

    pub fn serialize(&self) -> Vec<u8> {
        join_segments(
            &self.head,
            self.relationships.iter().map(|r| &r.segment),
            &self.raw_tail,
        )
    }
}
