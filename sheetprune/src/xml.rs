//! Span-preserving scanning of XML parts
//!
//! The part parsers never rebuild a document from a tree. They locate the byte
//! ranges of the elements they care about and splice the original text around
//! them, so every byte they do not edit is written back exactly as read.

use std::ops::Range;

use quick_xml::Writer;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// One element located inside a container element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementSpan {
    /// Byte offset of the opening `<`
    pub start: usize,
    /// Byte offset just past the start tag (equal to `end` for empty elements)
    pub tag_end: usize,
    /// Byte offset just past the element
    pub end: usize,
    /// Qualified attribute names with unescaped values, in document order
    pub attributes: Vec<(String, String)>,
}

impl ElementSpan {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of a namespace-prefixed attribute by local name, whatever the
    /// prefix is (`r:id`, `ns1:id`, ...).
    pub fn prefixed_attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| matches!(k.split_once(':'), Some((_, l)) if l == local))
            .map(|(_, v)| v.as_str())
    }
}

/// Direct children of a container element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildScan {
    /// Offset just past the container's start tag
    pub content_start: usize,
    /// Offset of the container's end tag (equal to `content_start` when the
    /// container is self-closing)
    pub content_end: usize,
    pub children: Vec<ElementSpan>,
}

/// Locate the first `container` element (by local name) and the spans of its
/// direct `child` elements.
///
/// Returns `Ok(None)` when the container does not occur. With `fragment` set,
/// unmatched end tags are tolerated so a slice cut out of a larger document
/// can be scanned on its own.
pub(crate) fn scan_children(
    xml: &str,
    container: &[u8],
    child: &[u8],
    fragment: bool,
) -> Result<Option<ChildScan>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().allow_unmatched_ends = fragment;

    let mut depth = 0usize;
    let mut container_depth: Option<usize> = None;
    let mut content_start = 0usize;
    let mut children = Vec::new();
    let mut open_child: Option<ElementSpan> = None;

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("error at position {}: {}", reader.error_position(), e))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(e) => {
                depth += 1;
                let local = e.local_name();
                if container_depth.is_none() && local.as_ref() == container {
                    container_depth = Some(depth);
                    content_start = after;
                } else if container_depth == Some(depth - 1)
                    && open_child.is_none()
                    && local.as_ref() == child
                {
                    open_child = Some(ElementSpan {
                        start: before,
                        tag_end: after,
                        end: after,
                        attributes: collect_attributes(&e)?,
                    });
                }
            }
            Event::Empty(e) => {
                let local = e.local_name();
                if container_depth.is_none() && local.as_ref() == container {
                    return Ok(Some(ChildScan {
                        content_start: after,
                        content_end: after,
                        children,
                    }));
                }
                if container_depth == Some(depth) && local.as_ref() == child {
                    children.push(ElementSpan {
                        start: before,
                        tag_end: after,
                        end: after,
                        attributes: collect_attributes(&e)?,
                    });
                }
            }
            Event::End(_) => {
                if container_depth.is_some() && depth == container_depth.unwrap_or(0) + 1 {
                    if let Some(mut span) = open_child.take() {
                        span.end = after;
                        children.push(span);
                    }
                }
                if container_depth == Some(depth) {
                    return Ok(Some(ChildScan {
                        content_start,
                        content_end: before,
                        children,
                    }));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => {
                return match container_depth {
                    Some(_) => Err(format!(
                        "unterminated <{}> element",
                        String::from_utf8_lossy(container)
                    )),
                    None => Ok(None),
                };
            }
            _ => {}
        }
    }
}

fn collect_attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, String> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute: {}", e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| format!("bad attribute value for {}: {}", key, e))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Rewrite selected attribute values of a single start (or empty) tag.
///
/// Attributes keep their order; only the named ones get new values.
pub(crate) fn rewrite_start_tag(raw_tag: &str, updates: &[(&str, String)]) -> Result<String, String> {
    let mut reader = Reader::from_str(raw_tag);
    let (start, is_empty) = loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => break (e, false),
            Ok(Event::Empty(e)) => break (e, true),
            Ok(Event::Eof) => return Err("no start tag to rewrite".to_string()),
            Ok(_) => {}
            Err(e) => return Err(e.to_string()),
        }
    };

    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut rebuilt = BytesStart::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match updates.iter().find(|(k, _)| *k == key) {
            Some((k, value)) => rebuilt.push_attribute((*k, value.as_str())),
            None => rebuilt.push_attribute(attr),
        }
    }

    let mut writer = Writer::new(Vec::new());
    let event = if is_empty {
        Event::Empty(rebuilt)
    } else {
        Event::Start(rebuilt)
    };
    writer.write_event(event).map_err(|e| e.to_string())?;
    String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())
}

/// Apply non-overlapping replacements to `text`.
pub(crate) fn splice(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| std::cmp::Reverse(range.start));
    let mut out = text.to_string();
    for (range, replacement) in edits {
        out.replace_range(range, &replacement);
    }
    out
}

/// Decode a part as UTF-8 text, mapping failures to a reason string.
pub(crate) fn decode(bytes: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(bytes).map_err(|e| format!("part is not valid UTF-8: {}", e))
}
