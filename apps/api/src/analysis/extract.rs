use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

/// Lines that mark the parts of a resume worth sending to the model.
const KEY_SECTION_MARKERS: &[&str] = &[
    "skill",
    "experience",
    "work",
    "project",
    "education",
    "technical",
];
/// A matched marker line plus the three lines after it.
const SECTION_SPAN: usize = 4;
const MAX_SECTION_LINES: usize = 50;
const FALLBACK_CHARS: usize = 1500;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Unsupported file type for extraction: {0}")]
    Unsupported(String),

    #[error("Could not extract text from PDF: {0}")]
    Pdf(String),

    #[error("Could not extract text from DOCX: {0}")]
    Docx(String),
}

/// Storage extension for an upload, from its MIME type and file name.
pub fn extension_for(content_type: &str, file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    if content_type.contains("application/pdf") || name.ends_with(".pdf") {
        "pdf"
    } else if content_type
        .contains("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        || name.ends_with(".docx")
    {
        "docx"
    } else if content_type.contains("application/msword") || name.ends_with(".doc") {
        "doc"
    } else {
        "txt"
    }
}

/// Extracts plain text from a stored resume. CPU bound; call from `spawn_blocking`.
pub fn extract_text(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension.trim_start_matches('.').to_lowercase().as_str() {
        "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string())),
        "docx" => docx_text(bytes),
        "txt" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

/// Paragraph text from `word/document.xml`, one line per `<w:p>`.
fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(docx_error)?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(docx_error)?
        .read_to_string(&mut xml)
        .map_err(docx_error)?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event().map_err(docx_error)? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                current.push_str(&t.unescape().map_err(docx_error)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs.join("\n"))
}

fn docx_error(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Docx(e.to_string())
}

/// Keeps the key resume sections so the prompt stays small: every line that
/// mentions a section marker plus the lines right after it, capped at 50
/// lines. Without any marker the first 1500 characters are used.
pub fn focus_key_sections(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept: Vec<&str> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if KEY_SECTION_MARKERS.iter().any(|m| lower.contains(m)) {
            let end = (i + SECTION_SPAN).min(lines.len());
            kept.extend_from_slice(&lines[i..end]);
        }
    }

    if kept.is_empty() {
        text.chars().take(FALLBACK_CHARS).collect()
    } else {
        kept.truncate(MAX_SECTION_LINES);
        kept.join("\n")
    }
}

/// Minimal `.docx` holding one `<w:p>` per paragraph.
#[cfg(test)]
pub(crate) fn docx_fixture(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    docx_from_xml(&format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    ))
}

#[cfg(test)]
fn docx_from_xml(xml: &str) -> Vec<u8> {
    use std::io::Write;

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", zip::write::FileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for_upload() {
        assert_eq!(extension_for("application/pdf", "cv"), "pdf");
        assert_eq!(extension_for("application/octet-stream", "CV.PDF"), "pdf");
        assert_eq!(
            extension_for(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "cv"
            ),
            "docx"
        );
        assert_eq!(extension_for("application/msword", "cv.doc"), "doc");
        assert_eq!(extension_for("text/plain", "cv.txt"), "txt");
    }

    #[test]
    fn test_plain_text_is_decoded_lossily() {
        let text = extract_text(b"Skills: SQL\xff", "txt").unwrap();
        assert!(text.starts_with("Skills: SQL"));
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let docx = docx_fixture(&["Maria Santos", "Skills", "SQL &amp; Excel"]);
        let text = extract_text(&docx, "docx").unwrap();
        assert_eq!(text, "Maria Santos\nSkills\nSQL & Excel");
    }

    #[test]
    fn test_docx_joins_runs_and_keeps_empty_paragraphs() {
        let xml = r#"<w:document xmlns:w="w"><w:body>
            <w:p><w:r><w:t>Work</w:t></w:r><w:r><w:tab/><w:t>Experience</w:t></w:r></w:p>
            <w:p/>
            <w:p><w:r><w:t>Team lead</w:t></w:r></w:p>
            </w:body></w:document>"#;
        let text = extract_text(&docx_from_xml(xml), "docx").unwrap();
        assert_eq!(text, "Work\tExperience\n\nTeam lead");
    }

    #[test]
    fn test_broken_docx_is_an_error() {
        assert!(matches!(
            extract_text(b"PK\x03\x04", "docx"),
            Err(ExtractError::Docx(_))
        ));
    }

    #[test]
    fn test_legacy_word_documents_are_unsupported() {
        assert!(matches!(
            extract_text(b"\xd0\xcf\x11\xe0", "doc"),
            Err(ExtractError::Unsupported(ext)) if ext == "doc"
        ));
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        assert!(matches!(
            extract_text(b"definitely not a pdf", "pdf"),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn test_focus_keeps_marker_and_following_lines() {
        let text = "Maria Santos\nManila\nSkills\nSQL\nExcel\nZendesk\nHobbies\nKaraoke";
        let focused = focus_key_sections(text);
        assert_eq!(focused, "Skills\nSQL\nExcel\nZendesk");
    }

    #[test]
    fn test_focus_caps_line_count() {
        let text = (0..100)
            .map(|i| format!("work item {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(focus_key_sections(&text).lines().count(), MAX_SECTION_LINES);
    }

    #[test]
    fn test_focus_falls_back_to_prefix() {
        let text = "x".repeat(4000);
        assert_eq!(focus_key_sections(&text).len(), FALLBACK_CHARS);
    }

    #[test]
    fn test_marker_near_end_does_not_overflow() {
        let text = "Intro\nTechnical";
        assert_eq!(focus_key_sections(text), "Technical");
    }
}
