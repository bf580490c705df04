//! Multi-format text extraction for uploaded documents.
//!
//! Dispatch is by case-insensitive file extension. Paginated formats (PDF
//! pages, XLSX sheets) yield one [`DocumentSection`] per logical unit so
//! provenance metadata can carry the page or sheet number; everything else
//! yields a single section. Unrecognized extensions fall back to a strict
//! UTF-8 decode — binary files that fail the decode are reported as errors
//! and skipped by the upload batch, never fatal to it.

use std::io::Read;

use crate::models::DocumentSection;

/// Maximum sheets to process in an xlsx upload.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet (avoids unbounded memory).
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Per-file extraction error. The upload pipeline logs these and moves on
/// to the next file in the batch.
#[derive(Debug)]
pub enum ExtractError {
    Pdf(String),
    Ooxml(String),
    Json(String),
    Decode(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "OOXML extraction failed: {}", e),
            ExtractError::Json(e) => write!(f, "JSON extraction failed: {}", e),
            ExtractError::Decode(e) => write!(f, "text decoding failed: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Lowercased extension of a filename, `""` when absent.
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extract plain-text sections (with provenance) from raw uploaded bytes.
///
/// Whitespace-only units are discarded; an upload whose every unit is
/// blank legitimately returns an empty vec.
pub fn extract_sections(filename: &str, bytes: &[u8]) -> Result<Vec<DocumentSection>, ExtractError> {
    let ext = file_extension(filename);

    let sections = match ext.as_str() {
        "pdf" => extract_pdf(filename, bytes)?,
        "txt" => vec![plain_section(filename, "txt", decode_utf8(bytes)?)],
        "docx" => vec![plain_section(filename, "docx", extract_docx(bytes)?)],
        "xlsx" => extract_xlsx(filename, bytes)?,
        "csv" => vec![plain_section(filename, "csv", decode_utf8(bytes)?)],
        "json" => vec![plain_section(filename, "json", extract_json(bytes)?)],
        "html" => vec![plain_section(filename, "html", extract_html(bytes)?)],
        other => {
            // Best-effort fallback: treat the upload as plain text.
            let file_type = if other.is_empty() {
                "unknown".to_string()
            } else {
                format!("unsupported_{}", other)
            };
            vec![plain_section(filename, &file_type, decode_utf8(bytes)?)]
        }
    };

    Ok(sections
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .collect())
}

fn plain_section(filename: &str, file_type: &str, text: String) -> DocumentSection {
    DocumentSection {
        text,
        source: filename.to_string(),
        file_type: file_type.to_string(),
        page: None,
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, ExtractError> {
    String::from_utf8(bytes.to_vec()).map_err(|e| ExtractError::Decode(e.to_string()))
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> Result<Vec<DocumentSection>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentSection {
            text,
            source: filename.to_string(),
            file_type: "pdf".to_string(),
            page: Some(i as i64 + 1),
        })
        .collect())
}

fn extract_json(bytes: &[u8]) -> Result<String, ExtractError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| ExtractError::Json(e.to_string()))?;
    serde_json::to_string_pretty(&value).map_err(|e| ExtractError::Json(e.to_string()))
}

fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let html = decode_utf8(bytes)?;
    let document = scraper::Html::parse_document(&html);

    // Skip script/style subtrees; join remaining text nodes line-wise.
    let skip = scraper::Selector::parse("script, style").unwrap();
    let skipped: Vec<_> = document.select(&skip).map(|n| n.id()).collect();

    let mut lines: Vec<String> = Vec::new();
    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let in_skipped = node
                .ancestors()
                .any(|a| skipped.contains(&a.id()));
            if in_skipped {
                continue;
            }
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
    Ok(lines.join("\n"))
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
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

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_docx_paragraphs(&doc_xml)
}

/// Collect `w:t` runs from document.xml, one line per `w:p` paragraph.
fn extract_docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                } else if e.local_name().as_ref() == b"p" {
                    paragraphs.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}

/// One section per worksheet so provenance can carry the sheet index.
fn extract_xlsx(filename: &str, bytes: &[u8]) -> Result<Vec<DocumentSection>, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheet_names = list_worksheet_names(&mut archive)?;

    let mut sections = Vec::new();
    for (idx, name) in sheet_names.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let text = extract_xlsx_sheet_cells(&sheet_xml, &shared_strings)?;
        sections.push(DocumentSection {
            text,
            source: filename.to_string(),
            file_type: "xlsx".to_string(),
            page: Some(idx as i64 + 1),
        });
    }
    Ok(sections)
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    // sharedStrings.xml is optional; a workbook of pure numbers lacks it.
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut current = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"si" {
                    in_si = true;
                    current.clear();
                } else if in_si && e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_si && in_t => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = false;
                } else if e.local_name().as_ref() == b"si" {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn list_worksheet_names(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
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

/// Flatten one worksheet: cells joined by tabs within a row, rows by
/// newlines. Shared-string cells resolve through the table; inline numeric
/// values are kept verbatim.
fn extract_xlsx_sheet_cells(xml: &[u8], shared_strings: &[String]) -> Result<String, ExtractError> {
    let mut rows: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_v = false;
    let mut cell_is_shared_str = false;
    let mut cell_count = 0usize;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                } else if e.local_name().as_ref() == b"v" {
                    in_v = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_v => {
                let v = te.unescape().unwrap_or_default();
                let s = v.trim();
                if !s.is_empty() {
                    if cell_is_shared_str {
                        if let Ok(i) = s.parse::<usize>() {
                            if i < shared_strings.len() {
                                row_cells.push(shared_strings[i].clone());
                                cell_count += 1;
                            }
                        }
                    } else {
                        row_cells.push(s.to_string());
                        cell_count += 1;
                    }
                }
                in_v = false;
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"v" {
                    in_v = false;
                } else if e.local_name().as_ref() == b"c" {
                    cell_is_shared_str = false;
                } else if e.local_name().as_ref() == b"row" {
                    if !row_cells.is_empty() {
                        rows.push(row_cells.join("\t"));
                        row_cells.clear();
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row_cells.is_empty() {
        rows.push(row_cells.join("\t"));
    }
    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(file_extension("Report.PDF"), "pdf");
        assert_eq!(file_extension("notes.Txt"), "txt");
        assert_eq!(file_extension("no_extension"), "");
    }

    #[test]
    fn txt_decodes_as_single_section() {
        let sections = extract_sections("notes.txt", b"Hello there.").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].text, "Hello there.");
        assert_eq!(sections[0].file_type, "txt");
        assert_eq!(sections[0].page, None);
    }

    #[test]
    fn blank_txt_yields_no_sections() {
        let sections = extract_sections("blank.txt", b"   \n  ").unwrap();
        assert!(sections.is_empty());
    }

    #[test]
    fn json_is_pretty_printed() {
        let sections = extract_sections("data.json", br#"{"a":1,"b":[2,3]}"#).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("\"a\": 1"));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = extract_sections("data.json", b"{not json").unwrap_err();
        assert!(matches!(err, ExtractError::Json(_)));
    }

    #[test]
    fn html_text_is_extracted_without_markup() {
        let html = b"<html><head><style>p{color:red}</style></head>\
            <body><h1>Title</h1><p>Body text here.</p><script>var x=1;</script></body></html>";
        let sections = extract_sections("page.html", html).unwrap();
        assert_eq!(sections.len(), 1);
        assert!(sections[0].text.contains("Title"));
        assert!(sections[0].text.contains("Body text here."));
        assert!(!sections[0].text.contains("color:red"));
        assert!(!sections[0].text.contains("var x"));
    }

    #[test]
    fn unknown_extension_falls_back_to_utf8() {
        let sections = extract_sections("notes.log", b"plain log line").unwrap();
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].file_type, "unsupported_log");
    }

    #[test]
    fn undecodable_fallback_is_an_error() {
        let err = extract_sections("blob.bin", &[0xff, 0xfe, 0x00, 0x80]).unwrap_err();
        assert!(matches!(err, ExtractError::Decode(_)));
    }

    #[test]
    fn invalid_pdf_is_an_error() {
        let err = extract_sections("doc.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_is_an_error_for_docx() {
        let err = extract_sections("doc.docx", b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_paragraphs_join_with_newlines() {
        let xml = br#"<w:document xmlns:w="x"><w:body>
            <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
            <w:p><w:r><w:t>Second paragraph.</w:t></w:r></w:p>
        </w:body></w:document>"#;
        let text = extract_docx_paragraphs(xml).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn xlsx_sheet_resolves_shared_strings_and_rows() {
        let shared = vec!["name".to_string(), "qty".to_string(), "apples".to_string()];
        let xml = br#"<worksheet><sheetData>
            <row><c t="s"><v>0</v></c><c t="s"><v>1</v></c></row>
            <row><c t="s"><v>2</v></c><c><v>42</v></c></row>
        </sheetData></worksheet>"#;
        let text = extract_xlsx_sheet_cells(xml, &shared).unwrap();
        assert_eq!(text, "name\tqty\napples\t42");
    }
}
