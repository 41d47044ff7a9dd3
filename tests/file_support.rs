//! Integration tests for multi-format uploads: PDF pages, DOCX, plain text,
//! mislabeled text, and files that must be rejected.

mod common;

use std::fs;
use std::io::Write;

use common::open_session;
use docqa::error::RagError;
use docqa::extract;
use docqa::models::{Document, DocumentKind};
use tempfile::TempDir;

/// Minimal DOCX (ZIP) whose `word/document.xml` holds one paragraph per item.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let xml = format!(
        "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
        body
    );

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

/// Minimal PDF with one Helvetica text line per page. Object offsets in
/// the xref table and stream lengths are computed so pdf-extract can parse it.
fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let font_id = 3 + 2 * pages.len();
    let kids = (0..pages.len())
        .map(|i| format!("{} 0 R", 3 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids, pages.len()),
    ];
    for (i, text) in pages.iter().enumerate() {
        let content_id = 4 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 {} 0 R >> >> >>",
            content_id, font_id
        ));
        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }
    objects.push(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    );

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

#[test]
fn pdf_yields_one_segment_per_page() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.pdf");
    fs::write(
        &path,
        minimal_pdf(&["Founded in Oslo by two engineers", "Revenue grew twelve percent"]),
    )
    .unwrap();

    let segments = extract::extract(&Document::new(&path)).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].page, Some(1));
    assert_eq!(segments[1].page, Some(2));
    assert_eq!(segments[0].index, 0);
    assert_eq!(segments[1].index, 1);
    assert!(segments[0].text.contains("Oslo"), "{:?}", segments[0].text);
    assert!(!segments[0].text.contains("Revenue"));
    assert!(segments[1].text.contains("Revenue grew"), "{:?}", segments[1].text);
    assert!(!segments[1].text.contains("Oslo"));
}

#[tokio::test]
async fn pdf_answer_cites_the_matching_page() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("annual.pdf");
    fs::write(
        &path,
        minimal_pdf(&[
            "The company was founded in Oslo",
            "Quarterly revenue grew in the northern region",
        ]),
    )
    .unwrap();
    let (mut session, _) = open_session(tmp.path()).await;

    assert_eq!(session.add_document(&path).await.unwrap(), 2);
    let outcome = session
        .ask("How did quarterly revenue grow in the northern region?")
        .await;
    assert!(outcome.is_answered());
    assert_eq!(outcome.sources()[0].source, "annual.pdf");
    assert_eq!(outcome.sources()[0].page, Some(2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_uploads_extract_off_the_runtime() {
    let tmp = TempDir::new().unwrap();
    let pdf = tmp.path().join("minutes.pdf");
    let docx = tmp.path().join("policy.docx");
    let txt = tmp.path().join("faq.txt");
    fs::write(&pdf, minimal_pdf(&["Board met in March", "Budget approved in April"])).unwrap();
    fs::write(&docx, minimal_docx(&["Expenses need receipts."])).unwrap();
    fs::write(&txt, "Support hours are nine to five.").unwrap();
    let (session, _) = open_session(tmp.path()).await;

    let (a, b, c) = tokio::join!(
        session.add_document(&pdf),
        session.add_document(&docx),
        session.add_document(&txt),
    );
    assert_eq!(a.unwrap() + b.unwrap() + c.unwrap(), 4);
    assert_eq!(session.index().stats().await.unwrap().documents, 3);
}

#[tokio::test]
async fn docx_upload_is_searchable() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("handbook.docx");
    fs::write(
        &file,
        minimal_docx(&["Vacation requests need two weeks notice.", "Remote work is allowed on Fridays."]),
    )
    .unwrap();
    let (mut session, generator) = open_session(tmp.path()).await;

    assert_eq!(session.add_document(&file).await.unwrap(), 1);
    let outcome = session.ask("How much notice for vacation requests?").await;
    assert!(outcome.is_answered());
    assert_eq!(outcome.sources()[0].source, "handbook.docx");
    assert_eq!(outcome.sources()[0].page, None);

    let prompt = generator.last_prompt().unwrap();
    assert!(prompt.contains("Vacation requests need two weeks notice.\n\nRemote work"));
}

#[tokio::test]
async fn docx_paragraphs_are_separated() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("memo.docx");
    fs::write(&path, minimal_docx(&["First &amp; foremost", "Second"])).unwrap();

    let segments = extract::extract(&Document::new(&path)).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "First & foremost\n\nSecond");
}

#[tokio::test]
async fn markdown_and_text_are_plain_text() {
    let tmp = TempDir::new().unwrap();
    let md = tmp.path().join("README.MD");
    let txt = tmp.path().join("notes.txt");
    fs::write(&md, "# Title\n\nBody text.").unwrap();
    fs::write(&txt, "Line one.\nLine two.").unwrap();
    let (session, _) = open_session(tmp.path()).await;

    assert_eq!(Document::new(&md).kind, DocumentKind::Text);
    let report = session.add_documents(&[md, txt]).await;
    assert!(report.is_clean());
    assert_eq!(report.processed, 2);
}

#[tokio::test]
async fn unrecognized_extension_with_text_is_accepted() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("server.log");
    fs::write(&file, "2024-01-01 disk usage at 91 percent").unwrap();
    let (session, _) = open_session(tmp.path()).await;

    assert_eq!(session.add_document(&file).await.unwrap(), 1);
    let hits = session.index().search("disk usage", 1).await.unwrap();
    assert_eq!(hits[0].chunk.source, "server.log");
}

#[tokio::test]
async fn unrecognized_binary_is_unsupported() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("image.bin");
    fs::write(&file, [0xffu8, 0xfe, 0x00, 0x80, 0x81]).unwrap();
    let (session, _) = open_session(tmp.path()).await;

    let err = session.add_document(&file).await.unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));
    assert!(!session.index().is_ready().await);
}

#[tokio::test]
async fn corrupt_pdf_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let bad = tmp.path().join("bad.pdf");
    let good = tmp.path().join("good.md");
    fs::write(&bad, b"not a valid pdf").unwrap();
    fs::write(&good, "# Good\n\nThis is good.").unwrap();
    let (session, _) = open_session(tmp.path()).await;

    let report = session.add_documents(&[&bad, &good]).await;
    assert_eq!(report.processed, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].1.contains("bad.pdf"));
}

#[tokio::test]
async fn corrupt_docx_is_extraction_error() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("broken.docx");
    fs::write(&file, b"PK but not really a zip").unwrap();
    let (session, _) = open_session(tmp.path()).await;

    assert!(matches!(
        session.add_document(&file).await,
        Err(RagError::Extraction { .. })
    ));
}
