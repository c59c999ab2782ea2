//! Plain-text extraction for workspace files.
//!
//! Formats are picked by extension: plain text, HTML, PDF, Office Open XML
//! (`docx`, `xlsx`, `pptx`) and OpenDocument (`odt`, `ods`, `odp`). The office
//! formats are zip containers whose XML parts are flattened to lines.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;
use zip::ZipArchive;

/// Extensions that may be decoded lossily when extraction fails.
pub const SAFE_TEXT_EXTENSIONS: &[&str] =
    &["txt", "md", "py", "js", "html", "css", "json", "log", "csv"];

const PLAIN_TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "py", "js", "ts", "css", "json", "log", "csv", "tsv", "rs", "toml",
    "yaml", "yml", "xml", "ini", "cfg", "sh", "sql",
];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is not valid UTF-8 text")]
    Encoding,

    #[error("cannot read PDF: {0}")]
    Pdf(String),

    #[error("cannot open document container: {0}")]
    Archive(String),

    #[error("no text extractor for {0}")]
    Unsupported(String),
}

/// Lower-cased extension of a path, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Whether files with this extension are converted rather than decoded as text.
pub fn is_converted(ext: &str) -> bool {
    matches!(
        ext,
        "html" | "htm" | "pdf" | "docx" | "xlsx" | "pptx" | "odt" | "ods" | "odp"
    )
}

/// Convert a file to plain text according to its extension.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let ext = extension_of(path);
    let bytes = std::fs::read(path)?;

    match ext.as_str() {
        "html" | "htm" => Ok(html_to_text(&decode_utf8(bytes)?)),
        "pdf" => pdf_to_text(&bytes),
        "docx" => docx_to_text(bytes),
        "xlsx" => xlsx_to_text(bytes),
        "pptx" => pptx_to_text(bytes),
        "odt" | "ods" | "odp" => odf_to_text(bytes),
        e if PLAIN_TEXT_EXTENSIONS.contains(&e) => decode_utf8(bytes),
        _ => decode_utf8(bytes).map_err(|_| {
            if ext.is_empty() {
                ExtractError::Unsupported("binary files without an extension".to_string())
            } else {
                ExtractError::Unsupported(format!(".{} files", ext))
            }
        }),
    }
}

fn decode_utf8(bytes: Vec<u8>) -> Result<String, ExtractError> {
    String::from_utf8(bytes).map_err(|_| ExtractError::Encoding)
}

fn cached(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"<[^>]*>")
}

fn entity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    cached(&RE, r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")
}

fn decode_entities(text: &str) -> String {
    entity_re()
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = name.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match name {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Strip tags from an XML fragment, turning the given closing markers into
/// line breaks and the given markers into tabs.
fn xml_to_text(xml: &str, line_breaks: &[&str], tabs: &[&str]) -> String {
    let mut text = xml.to_string();
    for marker in line_breaks {
        text = text.replace(marker, &format!("{}\n", marker));
    }
    for marker in tabs {
        text = text.replace(marker, &format!("{}\t", marker));
    }
    let stripped = tag_re().replace_all(&text, "");
    tidy_lines(&decode_entities(&stripped))
}

/// Trim trailing whitespace and squeeze runs of blank lines.
fn tidy_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim_end) {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last() == Some(&"") {
        out.pop();
    }
    out.join("\n")
}

fn html_to_text(html: &str) -> String {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    static STYLE: OnceLock<Regex> = OnceLock::new();
    static BLOCK: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let text = cached(&SCRIPT, r"(?is)<script\b.*?</script\s*>").replace_all(html, "");
    let text = cached(&STYLE, r"(?is)<style\b.*?</style\s*>").replace_all(&text, "");
    let text = cached(
        &BLOCK,
        r"(?i)</?(p|div|br|li|tr|h[1-6]|table|ul|ol|section|article|header|footer|title)\b[^>]*>",
    )
    .replace_all(&text, "\n");
    let text = tag_re().replace_all(&text, "");
    let text = decode_entities(&text);

    let spaces = cached(&SPACES, r"[ \t\u{a0}]+");
    text.lines()
        .map(|line| spaces.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn pdf_to_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(tidy_lines(&text))
}

fn open_archive(bytes: Vec<u8>) -> Result<ZipArchive<Cursor<Vec<u8>>>, ExtractError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Archive(e.to_string()))
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::Archive(e.to_string())),
    };
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|e| ExtractError::Archive(format!("{}: {}", name, e)))?;
    Ok(Some(content))
}

fn require_entry(
    archive: &mut ZipArchive<Cursor<Vec<u8>>>,
    name: &str,
) -> Result<String, ExtractError> {
    read_entry(archive, name)?
        .ok_or_else(|| ExtractError::Archive(format!("missing part {}", name)))
}

/// Entry names matching `prefix<N>.xml`, ordered by N.
fn numbered_entries(archive: &ZipArchive<Cursor<Vec<u8>>>, prefix: &str) -> Vec<String> {
    let mut entries: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix(prefix)?.strip_suffix(".xml")?.parse().ok()?;
            Some((n, name.to_string()))
        })
        .collect();
    entries.sort();
    entries.into_iter().map(|(_, name)| name).collect()
}

fn docx_to_text(bytes: Vec<u8>) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = require_entry(&mut archive, "word/document.xml")?;
    Ok(xml_to_text(&xml, &["</w:p>", "<w:br/>"], &["<w:tab/>"]))
}

fn pptx_to_text(bytes: Vec<u8>) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slides = Vec::new();
    for (i, name) in numbered_entries(&archive, "ppt/slides/slide")
        .into_iter()
        .enumerate()
    {
        let xml = require_entry(&mut archive, &name)?;
        let text = xml_to_text(&xml, &["</a:p>"], &[]);
        slides.push(format!("## Slide {}\n{}", i + 1, text));
    }
    Ok(slides.join("\n\n"))
}

fn xlsx_to_text(bytes: Vec<u8>) -> Result<String, ExtractError> {
    static SHARED: OnceLock<Regex> = OnceLock::new();
    static ROW: OnceLock<Regex> = OnceLock::new();
    static CELL: OnceLock<Regex> = OnceLock::new();
    static TYPE: OnceLock<Regex> = OnceLock::new();
    static VALUE: OnceLock<Regex> = OnceLock::new();

    let mut archive = open_archive(bytes)?;

    let shared: Vec<String> = read_entry(&mut archive, "xl/sharedStrings.xml")?
        .map(|xml| {
            cached(&SHARED, r"(?s)<si>(.*?)</si>")
                .captures_iter(&xml)
                .map(|c| decode_entities(&tag_re().replace_all(&c[1], "")))
                .collect()
        })
        .unwrap_or_default();

    let row_re = cached(&ROW, r"(?s)<row\b[^>]*>(.*?)</row>");
    let cell_re = cached(&CELL, r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)");
    let type_re = cached(&TYPE, r#"\bt="([^"]*)""#);
    let value_re = cached(&VALUE, r"(?s)<v>(.*?)</v>");

    let mut sheets = Vec::new();
    for (i, name) in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .enumerate()
    {
        let xml = require_entry(&mut archive, &name)?;
        let mut rows = Vec::new();
        for row in row_re.captures_iter(&xml) {
            let cells: Vec<String> = cell_re
                .captures_iter(&row[1])
                .map(|cell| {
                    let kind = type_re
                        .captures(&cell[1])
                        .map(|t| t[1].to_string())
                        .unwrap_or_default();
                    let body = cell.get(2).map_or("", |m| m.as_str());
                    match kind.as_str() {
                        "inlineStr" => decode_entities(&tag_re().replace_all(body, "")),
                        "s" => value_re
                            .captures(body)
                            .and_then(|v| v[1].trim().parse::<usize>().ok())
                            .and_then(|idx| shared.get(idx).cloned())
                            .unwrap_or_default(),
                        _ => value_re
                            .captures(body)
                            .map(|v| decode_entities(&v[1]))
                            .unwrap_or_default(),
                    }
                })
                .collect();
            if cells.iter().any(|c| !c.is_empty()) {
                rows.push(cells.join("\t"));
            }
        }
        sheets.push(format!("## Sheet {}\n{}", i + 1, rows.join("\n")));
    }
    Ok(sheets.join("\n\n"))
}

fn odf_to_text(bytes: Vec<u8>) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = require_entry(&mut archive, "content.xml")?;
    Ok(xml_to_text(
        &xml,
        &["</text:p>", "</text:h>", "<text:line-break/>", "</table:table-row>"],
        &["<text:tab/>", "</table:table-cell>"],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let bytes = zip_with(&[(
            "word/document.xml",
            r#"<w:document><w:body><w:p><w:r><w:t>Revenue &amp; costs</w:t></w:r></w:p><w:p><w:r><w:t>Q1</w:t><w:tab/><w:t>42</w:t></w:r></w:p></w:body></w:document>"#,
        )]);
        assert_eq!(docx_to_text(bytes).unwrap(), "Revenue & costs\nQ1\t42");
    }

    #[test]
    fn docx_without_body_part_is_an_archive_error() {
        let bytes = zip_with(&[("other.xml", "<x/>")]);
        assert!(matches!(
            docx_to_text(bytes),
            Err(ExtractError::Archive(_))
        ));
    }

    #[test]
    fn xlsx_resolves_shared_and_inline_strings() {
        let bytes = zip_with(&[
            (
                "xl/sharedStrings.xml",
                "<sst><si><t>Name</t></si><si><t>Total</t></si><si><t>Alice</t></si></sst>",
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row><row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>12.5</v></c></row><row r="3"><c r="A3" t="inlineStr"><is><t>Bob</t></is></c><c r="B3"/></row></sheetData></worksheet>"#,
            ),
        ]);
        assert_eq!(
            xlsx_to_text(bytes).unwrap(),
            "## Sheet 1\nName\tTotal\nAlice\t12.5\nBob\t"
        );
    }

    #[test]
    fn pptx_slides_are_ordered_numerically() {
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", "<p:sld><a:p><a:t>ten</a:t></a:p></p:sld>"),
            ("ppt/slides/slide2.xml", "<p:sld><a:p><a:t>two</a:t></a:p></p:sld>"),
        ]);
        assert_eq!(
            pptx_to_text(bytes).unwrap(),
            "## Slide 1\ntwo\n\n## Slide 2\nten"
        );
    }

    #[test]
    fn odt_paragraphs_become_lines() {
        let bytes = zip_with(&[(
            "content.xml",
            "<office:text><text:h>Title</text:h><text:p>first<text:tab/>second</text:p></office:text>",
        )]);
        assert_eq!(odf_to_text(bytes).unwrap(), "Title\nfirst\tsecond");
    }

    #[test]
    fn html_drops_markup_scripts_and_styles() {
        let html = "<html><head><title>Report</title><style>p{color:red}</style><script>alert(1)</script></head><body><p>Hello&nbsp;  <b>world</b></p><div>5 &lt; 6</div></body></html>";
        assert_eq!(html_to_text(html), "Report\nHello world\n5 < 6");
    }

    #[test]
    fn numeric_entities_decode() {
        assert_eq!(decode_entities("&#65;&#x42;&unknown;"), "AB&unknown;");
    }

    #[test]
    fn unknown_binary_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.bin");
        std::fs::write(&path, [0x25, 0x50, 0x44, 0x46, 0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            extract_text(&path),
            Err(ExtractError::Unsupported(_))
        ));
    }

    /// Single-page PDF showing `text` in Helvetica, with a valid xref table.
    fn pdf_with(text: &str) -> Vec<u8> {
        let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text);
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>".to_string(),
            format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
        ];

        let mut pdf = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref = pdf.len();
        let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
        for offset in offsets {
            table.push_str(&format!("{:010} 00000 n \n", offset));
        }
        table.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        pdf.extend_from_slice(table.as_bytes());
        pdf
    }

    #[test]
    fn pdf_text_is_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Report.PDF");
        std::fs::write(&path, pdf_with("Quarterly revenue")).unwrap();

        let text = extract_text(&path).unwrap();

        assert!(text.contains("Quarterly"), "got {:?}", text);
        assert!(text.contains("revenue"), "got {:?}", text);
    }

    #[test]
    fn corrupt_pdf_is_a_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(extract_text(&path), Err(ExtractError::Pdf(_))));
    }

    #[test]
    fn converted_formats() {
        assert!(is_converted("pdf"));
        assert!(is_converted("docx"));
        assert!(!is_converted("txt"));
        assert!(!is_converted(""));
    }

    #[test]
    fn invalid_utf8_text_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"caf\xe9").unwrap();
        assert!(matches!(extract_text(&path), Err(ExtractError::Encoding)));
    }
}
