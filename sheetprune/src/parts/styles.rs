//! Read-only view of the styles part (`xl/styles.xml`)

use crate::error::{EngineError, Result};
use crate::xml::{decode, scan_children};

/// Font, fill and border indices of one `cellXfs/xf` record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellXf {
    pub font_id: usize,
    pub fill_id: usize,
    pub border_id: usize,
}

/// Style definitions as raw XML, indexed the way `cellXfs` refers to them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    pub fonts: Vec<String>,
    pub fills: Vec<String>,
    pub borders: Vec<String>,
    pub cell_xfs: Vec<CellXf>,
}

impl StyleSheet {
    pub fn parse(part_name: &str, bytes: &[u8]) -> Result<Self> {
        let text = decode(bytes).map_err(|reason| EngineError::malformed(part_name, reason))?;
        let raw_children = |container: &[u8], child: &[u8]| -> Result<Vec<String>> {
            let scan = scan_children(text, container, child, false)
                .map_err(|reason| EngineError::malformed(part_name, reason))?;
            Ok(scan
                .map(|scan| {
                    scan.children
                        .iter()
                        .map(|span| text[span.range()].to_string())
                        .collect()
                })
                .unwrap_or_default())
        };

        let fonts = raw_children(b"fonts", b"font")?;
        let fills = raw_children(b"fills", b"fill")?;
        let borders = raw_children(b"borders", b"border")?;

        let cell_xfs = scan_children(text, b"cellXfs", b"xf", false)
            .map_err(|reason| EngineError::malformed(part_name, reason))?
            .map(|scan| {
                scan.children
                    .iter()
                    .map(|span| {
                        let index = |key: &str| {
                            span.attr(key)
                                .and_then(|v| v.parse::<usize>().ok())
                                .unwrap_or(0)
                        };
                        CellXf {
                            font_id: index("fontId"),
                            fill_id: index("fillId"),
                            border_id: index("borderId"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            fonts,
            fills,
            borders,
            cell_xfs,
        })
    }

    pub fn cell_xf(&self, style_id: u32) -> Option<&CellXf> {
        self.cell_xfs.get(style_id as usize)
    }
}
