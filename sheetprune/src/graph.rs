//! Sheet name -> relationship -> part resolution

use serde::Serialize;

use crate::error::{EngineError, Result};
use crate::opc::{
    DEFAULT_WORKBOOK, PACKAGE_RELS, REL_TYPE_OFFICE_DOCUMENT, REL_TYPE_OFFICE_DOCUMENT_STRICT,
    rels_part_for, resolve_target,
};
use crate::package::Package;
use crate::parts::{RelationshipsPart, WorkbookPart};

/// A sheet entry resolved to the physical parts backing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSheet {
    pub name: String,
    pub sheet_id: u32,
    pub relationship_id: String,
    pub state: Option<String>,
    /// Canonical name of the worksheet (or chartsheet) part
    pub part_path: String,
    /// The sheet's own relationships part, when the package has one
    pub rels_part: Option<String>,
}

/// Every sheet of a workbook, in tab order, resolved against the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGraph {
    sheets: Vec<ResolvedSheet>,
}

impl SheetGraph {
    /// Resolve each sheet's relationship id to an existing part.
    ///
    /// Fails with `MalformedXml` when a sheet names an unknown or external
    /// relationship, and with `PartNotFound` when the target part is absent.
    pub fn resolve(
        workbook: &WorkbookPart,
        rels: &RelationshipsPart,
        package: &Package,
    ) -> Result<Self> {
        let mut sheets = Vec::with_capacity(workbook.sheets().len());

        for entry in workbook.sheets() {
            let rel = rels.get(&entry.relationship_id).ok_or_else(|| {
                EngineError::malformed(
                    rels.part_name(),
                    format!(
                        "sheet '{}' references missing relationship {}",
                        entry.name, entry.relationship_id
                    ),
                )
            })?;
            if rel.is_external() {
                return Err(EngineError::malformed(
                    rels.part_name(),
                    format!(
                        "sheet '{}' points at external target {}",
                        entry.name, rel.target
                    ),
                ));
            }

            let part_path = resolve_target(workbook.part_name(), &rel.target);
            if !package.contains(&part_path) {
                return Err(EngineError::PartNotFound(part_path));
            }

            let sheet_rels = rels_part_for(&part_path);
            let rels_part = package.contains(&sheet_rels).then_some(sheet_rels);

            sheets.push(ResolvedSheet {
                name: entry.name.clone(),
                sheet_id: entry.sheet_id,
                relationship_id: entry.relationship_id.clone(),
                state: entry.state.clone(),
                part_path,
                rels_part,
            });
        }

        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[ResolvedSheet] {
        &self.sheets
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }
}

/// Workbook part, its relationships and the resolved graph of one package.
#[derive(Debug, Clone)]
pub struct LoadedWorkbook {
    pub workbook: WorkbookPart,
    pub rels: RelationshipsPart,
    pub graph: SheetGraph,
}

impl LoadedWorkbook {
    pub fn load(package: &mut Package) -> Result<Self> {
        let workbook_path = locate_workbook(package)?;
        let rels_path = rels_part_for(&workbook_path);

        let workbook_bytes = read_required(package, &workbook_path, "workbook part is missing")?;
        let workbook = WorkbookPart::parse(&workbook_path, &workbook_bytes)?;

        let rels_bytes = read_required(package, &rels_path, "workbook relationships are missing")?;
        let rels = RelationshipsPart::parse(&rels_path, &rels_bytes)?;

        let graph = SheetGraph::resolve(&workbook, &rels, package)?;
        log::debug!(
            "resolved {} sheet(s) from {}",
            graph.sheets().len(),
            workbook_path
        );
        Ok(Self {
            workbook,
            rels,
            graph,
        })
    }
}

/// Find the workbook part through the package relationships, falling back to
/// the conventional location.
pub fn locate_workbook(package: &mut Package) -> Result<String> {
    if package.contains(PACKAGE_RELS) {
        let bytes = package.read_part(PACKAGE_RELS)?;
        let rels = RelationshipsPart::parse(PACKAGE_RELS, &bytes)?;
        let office_document = rels
            .find_by_type(REL_TYPE_OFFICE_DOCUMENT)
            .or_else(|| rels.find_by_type(REL_TYPE_OFFICE_DOCUMENT_STRICT));
        if let Some(rel) = office_document {
            let path = resolve_target("", &rel.target);
            if package.contains(&path) {
                return Ok(path);
            }
            log::warn!(
                "package relationships point at missing workbook {}, trying {}",
                path,
                DEFAULT_WORKBOOK
            );
        }
    }
    Ok(DEFAULT_WORKBOOK.to_string())
}

fn read_required(package: &mut Package, path: &str, reason: &str) -> Result<Vec<u8>> {
    if !package.contains(path) {
        return Err(EngineError::malformed(path, reason));
    }
    package.read_part(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKBOOK: &str = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="One" sheetId="1" r:id="rId1"/><sheet name="Two" sheetId="2" r:id="rId2"/></sheets></workbook>"#;
    const RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/></Relationships>"#;

    fn package_with(parts: &[&str]) -> Package {
        use std::io::{Cursor, Write};
        use zip::ZipWriter;
        use zip::write::SimpleFileOptions;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in parts {
            writer
                .start_file(*part, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<x/>").unwrap();
        }
        Package::from_bytes(&writer.finish().unwrap().into_inner()).unwrap()
    }

    #[test]
    fn test_resolves_relative_and_absolute_targets() {
        let package = package_with(&[
            "xl/worksheets/sheet1.xml",
            "xl/worksheets/sheet2.xml",
            "xl/worksheets/_rels/sheet2.xml.rels",
        ]);
        let workbook = WorkbookPart::parse("xl/workbook.xml", WORKBOOK.as_bytes()).unwrap();
        let rels = RelationshipsPart::parse("xl/_rels/workbook.xml.rels", RELS.as_bytes()).unwrap();
        let graph = SheetGraph::resolve(&workbook, &rels, &package).unwrap();

        assert_eq!(graph.names(), vec!["One", "Two"]);
        let one = graph.get("One").unwrap();
        assert_eq!(one.part_path, "xl/worksheets/sheet1.xml");
        assert_eq!(one.rels_part, None);
        let two = graph.get("Two").unwrap();
        assert_eq!(two.part_path, "xl/worksheets/sheet2.xml");
        assert_eq!(
            two.rels_part.as_deref(),
            Some("xl/worksheets/_rels/sheet2.xml.rels")
        );
    }

    #[test]
    fn test_missing_target_part() {
        let package = package_with(&["xl/worksheets/sheet1.xml"]);
        let workbook = WorkbookPart::parse("xl/workbook.xml", WORKBOOK.as_bytes()).unwrap();
        let rels = RelationshipsPart::parse("xl/_rels/workbook.xml.rels", RELS.as_bytes()).unwrap();
        let err = SheetGraph::resolve(&workbook, &rels, &package).unwrap_err();
        assert!(matches!(err, EngineError::PartNotFound(p) if p == "xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn test_unknown_relationship_id() {
        let package = package_with(&["xl/worksheets/sheet1.xml"]);
        let workbook = WorkbookPart::parse("xl/workbook.xml", WORKBOOK.as_bytes()).unwrap();
        let rels = RelationshipsPart::parse(
            "xl/_rels/workbook.xml.rels",
            br#"<Relationships><Relationship Id="rId1" Type="t" Target="worksheets/sheet1.xml"/></Relationships>"#,
        )
        .unwrap();
        let err = SheetGraph::resolve(&workbook, &rels, &package).unwrap_err();
        assert!(matches!(err, EngineError::MalformedXml { .. }));
    }

    #[test]
    fn test_locate_workbook_through_package_rels() {
        use std::io::{Cursor, Write};
        use zip::ZipWriter;
        use zip::write::SimpleFileOptions;

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("_rels/.rels", SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(br#"<Relationships><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/book/main.xml"/></Relationships>"#)
            .unwrap();
        writer
            .start_file("book/main.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        let mut package = Package::from_bytes(&writer.finish().unwrap().into_inner()).unwrap();

        assert_eq!(locate_workbook(&mut package).unwrap(), "book/main.xml");
    }

    #[test]
    fn test_load_without_workbook_is_malformed() {
        let mut package = package_with(&["docProps/core.xml"]);
        let err = LoadedWorkbook::load(&mut package).unwrap_err();
        assert!(matches!(err, EngineError::MalformedXml { ref part, .. } if part == "xl/workbook.xml"));
    }
}
