//! Multi-format text extraction (Word, spreadsheet, PDF, markdown source).
//!
//! The loader hands over file bytes plus a [`DocumentFormat`]; this module
//! returns UTF-8 text in the flattened shape the rest of the crate expects:
//!
//! - Word: non-empty paragraphs in document order, one per line.
//! - Spreadsheet: one line per row, non-empty cell values joined by `" | "`,
//!   worksheets in workbook order.
//! - PDF: whatever text `pdf-extract` recovers.

use std::collections::HashMap;
use std::io::Read;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::models::DocumentFormat;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Separator placed between non-empty cells of a spreadsheet row.
pub const CELL_SEPARATOR: &str = " | ";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("file exceeds size limit ({size} > {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },
}

type ZipCursor<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

/// Extracts plain text from file content of the given format.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Markdown => Ok(std::str::from_utf8(bytes)?.to_string()),
        DocumentFormat::Word => extract_docx(bytes),
        DocumentFormat::Spreadsheet => extract_xlsx(bytes),
        DocumentFormat::Pdf => extract_pdf(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();
    Ok(lines.join("\n"))
}

fn open_archive(bytes: &[u8]) -> Result<ZipCursor<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn has_entry(archive: &ZipCursor<'_>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

fn read_zip_entry_bounded(
    archive: &mut ZipCursor<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn xml_error(e: quick_xml::Error) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    if !has_entry(&archive, "word/document.xml") {
        return Err(ExtractError::Ooxml(
            "word/document.xml not found".to_string(),
        ));
    }
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// Collects the text of every non-blank `<w:p>` in order.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"tab" {
                    current.push('\t');
                }
            }
            Event::Text(te) if in_text => {
                current.push_str(te.unescape().map_err(xml_error)?.as_ref());
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                // Leading indentation is kept; schedules use it for detail lines.
                b"p" => {
                    let text = current.trim_end();
                    if !text.trim_start().is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = list_worksheet_names(&mut archive)?;
    if sheet_names.is_empty() {
        return Err(ExtractError::Ooxml("workbook has no worksheets".to_string()));
    }
    let mut lines: Vec<String> = Vec::new();
    for name in sheet_names.into_iter().take(XLSX_MAX_SHEETS) {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        for row in sheet_rows(&sheet_xml, &shared_strings)? {
            lines.push(row.join(CELL_SEPARATOR));
        }
    }
    Ok(lines.join("\n"))
}

/// Reads `xl/sharedStrings.xml`. Workbooks that only use inline strings
/// have no shared-string table.
fn read_shared_strings(archive: &mut ZipCursor<'_>) -> Result<Vec<String>, ExtractError> {
    if !has_entry(archive, "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            // Rich-text entries split one string across several <r><t> runs.
            Event::Text(te) if in_t => {
                current.push_str(te.unescape().map_err(xml_error)?.as_ref());
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Worksheet parts in workbook order: the `<sheets>` list of
/// `xl/workbook.xml` resolved through its relationships. Archives without
/// that metadata fall back to `sheetN.xml` numbering.
fn list_worksheet_names(archive: &mut ZipCursor<'_>) -> Result<Vec<String>, ExtractError> {
    let ordered = workbook_sheet_parts(archive)?;
    if !ordered.is_empty() {
        return Ok(ordered);
    }
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    Ok(names)
}

fn workbook_sheet_parts(archive: &mut ZipCursor<'_>) -> Result<Vec<String>, ExtractError> {
    const WORKBOOK: &str = "xl/workbook.xml";
    const WORKBOOK_RELS: &str = "xl/_rels/workbook.xml.rels";
    if !has_entry(archive, WORKBOOK) || !has_entry(archive, WORKBOOK_RELS) {
        return Ok(Vec::new());
    }
    let workbook = read_zip_entry_bounded(archive, WORKBOOK, MAX_XML_ENTRY_BYTES)?;
    let rels = read_zip_entry_bounded(archive, WORKBOOK_RELS, MAX_XML_ENTRY_BYTES)?;

    let targets: HashMap<String, String> = xml_elements_with(&rels, b"Relationship", |key| {
        matches!(key, b"Id" | b"Target")
    })?
    .into_iter()
    .filter_map(|mut attrs| Some((attrs.remove("Id")?, attrs.remove("Target")?)))
    .collect();

    let parts = xml_elements_with(&workbook, b"sheet", |key| key == b"id")?
        .into_iter()
        .filter_map(|mut attrs| attrs.remove("id"))
        .filter_map(|id| targets.get(&id))
        .map(|target| workbook_part_name(target))
        .filter(|name| has_entry(archive, name))
        .collect();
    Ok(parts)
}

/// Collects the wanted attributes (by local name) of every `element`.
fn xml_elements_with(
    xml: &[u8],
    element: &[u8],
    wanted: impl Fn(&[u8]) -> bool,
) -> Result<Vec<HashMap<String, String>>, ExtractError> {
    let mut found = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == element => {
                let mut attrs = HashMap::new();
                for attr in e.attributes().flatten() {
                    let key = attr.key.local_name();
                    if wanted(key.as_ref()) {
                        let value = attr.unescape_value().map_err(xml_error)?;
                        attrs.insert(
                            String::from_utf8_lossy(key.as_ref()).into_owned(),
                            value.into_owned(),
                        );
                    }
                }
                found.push(attrs);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(found)
}

/// Relationship targets are relative to `xl/` unless absolute.
fn workbook_part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Value,
}

/// Returns each row's non-empty cell values; rows without any are dropped.
fn sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut kind = CellKind::Value;
    let mut cell = String::new();
    let mut in_value = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell.clear();
                    kind = CellKind::Value;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            kind = match attr.value.as_ref() {
                                b"s" => CellKind::Shared,
                                b"inlineStr" => CellKind::Inline,
                                _ => CellKind::Value,
                            };
                        }
                    }
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_value = true,
                _ => {}
            },
            Event::Text(te) if in_value => {
                cell.push_str(te.unescape().map_err(xml_error)?.as_ref());
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    cell_count += 1;
                    let value = match kind {
                        CellKind::Shared => cell
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default(),
                        CellKind::Inline | CellKind::Value => cell.clone(),
                    };
                    let value = value.trim();
                    if !value.is_empty() {
                        row.push(value.to_string());
                    }
                }
                b"row" => {
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}
