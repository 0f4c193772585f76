//! Typed views over the package parts the engine understands
//!
//! Workbook and relationships parts are parsed into a head, an ordered list of
//! child elements (each keeping its raw text), and a raw tail. Serializing
//! concatenates those pieces again, so an unmodified part comes back
//! byte-identical and a modified one differs only where an element was taken
//! out. Worksheet and styles parts are only ever read.

pub mod relationships;
pub mod styles;
pub mod workbook;
pub mod worksheet;

pub use relationships::{Relationship, RelationshipsPart};
pub use styles::{CellXf, StyleSheet};
pub use workbook::{SheetEntry, WorkbookPart};
pub use worksheet::WorksheetSummary;

use crate::xml::{ChildScan, ElementSpan};

/// Raw text of a child element and the whitespace (or comments) that came
/// right before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub leading: String,
    pub raw: String,
}

/// Cut `text` into head, child segments and tail around a scanned container.
pub(crate) fn split_children<'s>(
    text: &str,
    scan: &'s ChildScan,
) -> (String, Vec<(Segment, &'s ElementSpan)>, String) {
    let head = text[..scan.content_start].to_string();
    let mut cursor = scan.content_start;
    let mut segments = Vec::with_capacity(scan.children.len());

    for span in &scan.children {
        segments.push((
            Segment {
                leading: text[cursor..span.start].to_string(),
                raw: text[span.range()].to_string(),
            },
            span,
        ));
        cursor = span.end;
    }

    let tail = text[cursor..].to_string();
    (head, segments, tail)
}

/// Reassemble a part from its pieces.
pub(crate) fn join_segments<'a>(
    head: &str,
    segments: impl Iterator<Item = &'a Segment>,
    tail: &str,
) -> Vec<u8> {
    let mut out = String::with_capacity(head.len() + tail.len());
    out.push_str(head);
    for segment in segments {
        out.push_str(&segment.leading);
        out.push_str(&segment.raw);
    }
    out.push_str(tail);
    out.into_bytes()
}
