//! Read-only view of a worksheet part
//!
//! Worksheet bytes are never rewritten by the engine. This summary exists so
//! the verifier can compare formatting before and after a removal.

use std::collections::BTreeSet;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorksheetSummary {
    /// `mergeCell/@ref` values in document order
    pub merge_ranges: Vec<String>,
    /// `cellXfs` indices referenced by cells, formatted rows and columns
    pub style_ids: BTreeSet<u32>,
}

impl WorksheetSummary {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut summary = WorksheetSummary::default();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(s) = attr_u32(&e, b"s") {
                            summary.style_ids.insert(s);
                        }
                    }
                    b"row" => {
                        let custom = attr_value(&e, b"customFormat")
                            .is_some_and(|v| v == "1" || v == "true");
                        if custom && let Some(s) = attr_u32(&e, b"s") {
                            summary.style_ids.insert(s);
                        }
                    }
                    b"col" => {
                        if let Some(s) = attr_u32(&e, b"style") {
                            summary.style_ids.insert(s);
                        }
                    }
                    b"mergeCell" => {
                        if let Some(range) = attr_value(&e, b"ref") {
                            summary.merge_ranges.push(range);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
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

        Ok(summary)
    }
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn attr_u32(e: &BytesStart<'_>, key: &[u8]) -> Option<u32> {
    attr_value(e, key).and_then(|v| v.parse().ok())
}
