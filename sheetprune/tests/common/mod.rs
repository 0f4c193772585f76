// Helpers to build small but realistic XLSX packages in memory

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct MockSheet<'a> {
    pub name: &'a str,
    pub merges: &'a [&'a str],
    /// Cells use the bold / bordered / filled style
    pub styled: bool,
    /// Sheet carries its own _rels part pointing at a drawing and a hyperlink
    pub with_drawing: bool,
}

impl<'a> MockSheet<'a> {
    pub fn plain(name: &'a str) -> Self {
        Self {
            name,
            merges: &[],
            styled: false,
            with_drawing: false,
        }
    }

    pub fn formatted(name: &'a str, merges: &'a [&'a str]) -> Self {
        Self {
            name,
            merges,
            styled: true,
            with_drawing: false,
        }
    }
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="12"/><name val="Malgun Gothic"/></font></fonts>
<fills count="3"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFDDEBF7"/></patternFill></fill></fills>
<borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border><border><left style="thin"><color indexed="64"/></left><right style="thin"><color indexed="64"/></right><top style="thin"><color indexed="64"/></top><bottom style="thin"><color indexed="64"/></bottom><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1"/></cellXfs>
</styleSheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2"><si><t>품목</t></si><si><t>수량</t></si></sst>"#;

fn worksheet_xml(sheet: &MockSheet<'_>) -> String {
    let style = if sheet.styled { r#" s="1""# } else { "" };
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheetData><row r="1"><c r="A1"{style} t="s"><v>0</v></c><c r="B1"{style} t="s"><v>1</v></c></row><row r="2"><c r="A2"><v>42</v></c></row></sheetData>"#
    );
    if !sheet.merges.is_empty() {
        xml.push_str(&format!(r#"<mergeCells count="{}">"#, sheet.merges.len()));
        for range in sheet.merges {
            xml.push_str(&format!(r#"<mergeCell ref="{}"/>"#, range));
        }
        xml.push_str("</mergeCells>");
    }
    if sheet.with_drawing {
        xml.push_str(r#"<hyperlinks><hyperlink ref="A2" r:id="rId2"/></hyperlinks><drawing r:id="rId1"/>"#);
    }
    xml.push_str("</worksheet>");
    xml
}

/// Build a package; returns the bytes. Sheet `i` lives in `sheet{i+1}.xml`.
pub fn build_package(sheets: &[MockSheet<'_>], defined_names: &[(&str, Option<usize>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    // [Content_Types].xml
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        content_types.push_str(&format!(
            "<Override PartName=\"/xl/worksheets/sheet{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml\"/>\n",
            i + 1
        ));
        if sheet.with_drawing {
            content_types.push_str(&format!(
                "<Override PartName=\"/xl/drawings/drawing{}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.drawing+xml\"/>\n",
                i + 1
            ));
        }
    }
    content_types.push_str(
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#,
    );
    zip.start_file("[Content_Types].xml", deflated).unwrap();
    zip.write_all(content_types.as_bytes()).unwrap();

    // _rels/.rels
    zip.start_file("_rels/.rels", deflated).unwrap();
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.as_bytes()).unwrap();

    // xl/workbook.xml
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<bookViews><workbookView xWindow="0" yWindow="0" windowWidth="28800" windowHeight="12300"/></bookViews>
<sheets>
"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        workbook.push_str(&format!(
            "<sheet name=\"{}\" sheetId=\"{}\" r:id=\"rId{}\"/>\n",
            sheet.name,
            i + 1,
            i + 1
        ));
    }
    workbook.push_str("</sheets>\n");
    if !defined_names.is_empty() {
        workbook.push_str("<definedNames>");
        for (name, local) in defined_names {
            match local {
                Some(idx) => workbook.push_str(&format!(
                    r#"<definedName name="{}" localSheetId="{}">$A$1</definedName>"#,
                    name, idx
                )),
                None => workbook.push_str(&format!(
                    r#"<definedName name="{}">$A$1</definedName>"#,
                    name
                )),
            }
        }
        workbook.push_str("</definedNames>\n");
    }
    workbook.push_str(r#"<calcPr calcId="191029"/></workbook>"#);
    zip.start_file("xl/workbook.xml", deflated).unwrap();
    zip.write_all(workbook.as_bytes()).unwrap();

    // xl/_rels/workbook.xml.rels
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }
    let n = sheets.len();
    rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
        n + 1,
        n + 2
    ));
    zip.start_file("xl/_rels/workbook.xml.rels", deflated).unwrap();
    zip.write_all(rels.as_bytes()).unwrap();

    // Worksheets and their relationships
    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), deflated)
            .unwrap();
        zip.write_all(worksheet_xml(sheet).as_bytes()).unwrap();

        if sheet.with_drawing {
            zip.start_file(format!("xl/worksheets/_rels/sheet{}.xml.rels", i + 1), deflated)
                .unwrap();
            zip.write_all(format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing{}.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/orders" TargetMode="External"/></Relationships>"#,
                i + 1
            ).as_bytes()).unwrap();

            zip.start_file(format!("xl/drawings/drawing{}.xml", i + 1), deflated)
                .unwrap();
            zip.write_all(br#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing"/>"#)
                .unwrap();
        }
    }

    // Styles stored uncompressed so compression preservation can be checked
    zip.start_file("xl/styles.xml", stored).unwrap();
    zip.write_all(STYLES.as_bytes()).unwrap();
    zip.start_file("xl/sharedStrings.xml", deflated).unwrap();
    zip.write_all(SHARED_STRINGS.as_bytes()).unwrap();

    zip.finish().unwrap().into_inner()
}

/// The three-sheet purchase order workbook: two formatted sheets and a plain
/// "Input" sheet.
pub fn purchase_order_package() -> Vec<u8> {
    build_package(
        &[
            MockSheet::formatted("발주 정보", &["A1:D1", "B3:C4"]),
            MockSheet::formatted("발주 품목", &["A1:F1"]),
            MockSheet::plain("Input"),
        ],
        &[],
    )
}

pub fn open(bytes: &[u8]) -> ZipArchive<Cursor<Vec<u8>>> {
    ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap()
}

pub fn read_entry(bytes: &[u8], name: &str) -> Option<String> {
    let mut archive = open(bytes);
    let mut file = archive.by_name(name).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    Some(content)
}

/// Compressed bytes and compression method of an entry, straight from the archive.
pub fn raw_entry(bytes: &[u8], name: &str) -> Option<(Vec<u8>, CompressionMethod)> {
    let mut archive = open(bytes);
    let index = archive.index_for_name(name)?;
    let mut file = archive.by_index_raw(index).unwrap();
    let method = file.compression();
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).unwrap();
    Some((raw, method))
}

pub fn entry_names(bytes: &[u8]) -> Vec<String> {
    let mut archive = open(bytes);
    (0..archive.len())
        .map(|i| archive.by_index_raw(i).unwrap().name().to_string())
        .collect()
}

/// Rewrite one part of a package as text.
pub fn edit_part(bytes: &[u8], name: &str, edit: impl FnOnce(String) -> String) -> Vec<u8> {
    let mut package = sheetprune::Package::from_bytes(bytes).unwrap();
    let text = String::from_utf8(package.read_part(name).unwrap()).unwrap();
    package.write_part(name, edit(text).into_bytes());
    package.serialize().unwrap()
}

/// Add `xl/calcChain.xml` with its workbook relationship and content type.
pub fn with_calc_chain(bytes: &[u8], chain: &str) -> Vec<u8> {
    let bytes = edit_part(bytes, "xl/_rels/workbook.xml.rels", |rels| {
        rels.replace(
            "</Relationships>",
            r#"<Relationship Id="rId99" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#,
        )
    });
    let bytes = edit_part(&bytes, "[Content_Types].xml", |types| {
        types.replace(
            "</Types>",
            r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#,
        )
    });
    let mut package = sheetprune::Package::from_bytes(&bytes).unwrap();
    package.write_part("xl/calcChain.xml", chain.as_bytes().to_vec());
    package.serialize().unwrap()
}
