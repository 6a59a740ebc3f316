//! services/api/src/adapters/catalog.rs
//!
//! Loads the static document catalog from disk.
//!
//! The layout under the documents root is:
//!
//! ```text
//! metadata.json                 {"documents": [{"name": ..., "date": ..., ...}]}
//! content/{name}_{date}.html    (or .pdf)
//! ```
//!
//! Every entry that resolves to a file is registered in the database so comments
//! can reference a stable document id. Title, author and page count embedded in
//! the file fill whatever the entry leaves out.

use document_browser_core::domain::{Document, DocumentKind};
use document_browser_core::ports::{DatabaseService, PortResult};
use document_browser_core::registry::DocumentRegistry;
use lopdf::Object;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const METADATA_FILE: &str = "metadata.json";
pub const CONTENT_DIR: &str = "content";

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    documents: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    name: String,
    date: String,
    #[serde(default)]
    file_path: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    page_count: Option<u32>,
}

/// Reads the catalog under `root`, registers each document and returns the registry.
pub async fn load_registry(root: &Path, db: &dyn DatabaseService) -> PortResult<DocumentRegistry> {
    let entries = read_entries(root).await;
    let mut documents = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some((path, kind)) = resolve_content(root, &entry).await else {
            warn!(name = %entry.name, date = %entry.date, "No content file for catalog entry, skipping");
            continue;
        };

        // Catalog values win over what the file says about itself.
        let embedded = read_embedded(&path, kind).await;
        let description = entry.description.or(embedded.description);

        let id = db
            .get_or_create_document(
                &entry.name,
                &entry.date,
                &path.to_string_lossy(),
                kind,
                description.as_deref(),
            )
            .await?;

        documents.push(Document {
            id,
            name: entry.name,
            date: entry.date,
            path,
            kind,
            description,
            title: entry.title.or(embedded.title),
            author: entry.author.or(embedded.author),
            page_count: entry.page_count.or(embedded.page_count),
        });
    }

    let registry = DocumentRegistry::new(documents);
    info!(documents = registry.len(), root = %root.display(), "Document catalog loaded");
    Ok(registry)
}

/// Reads the raw bytes of a document.
pub async fn read_content(document: &Document) -> std::io::Result<Vec<u8>> {
    tokio::fs::read(&document.path).await
}

async fn read_entries(root: &Path) -> Vec<CatalogEntry> {
    let metadata_path = root.join(METADATA_FILE);
    let raw = match tokio::fs::read_to_string(&metadata_path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %metadata_path.display(), "Catalog file not found, starting with no documents");
            return Vec::new();
        }
        Err(e) => {
            warn!(path = %metadata_path.display(), "Failed to read catalog file: {}", e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<CatalogFile>(&raw) {
        Ok(file) => file.documents,
        Err(e) => {
            warn!(path = %metadata_path.display(), "Catalog file is not valid JSON: {}", e);
            Vec::new()
        }
    }
}

/// Picks the file backing an entry: the explicit `file_path` if given, otherwise
/// `content/{name}_{date}.html` and then `.pdf`.
async fn resolve_content(root: &Path, entry: &CatalogEntry) -> Option<(PathBuf, DocumentKind)> {
    if let Some(file_path) = entry.file_path.as_deref() {
        let path = root.join(file_path);
        let kind = entry
            .kind
            .as_deref()
            .and_then(DocumentKind::parse)
            .or_else(|| kind_from_extension(&path))?;
        return is_file(&path).await.then_some((path, kind));
    }

    let content_dir = root.join(CONTENT_DIR);
    let candidates = [DocumentKind::Html, DocumentKind::Pdf]
        .into_iter()
        .filter(|kind| {
            entry
                .kind
                .as_deref()
                .and_then(DocumentKind::parse)
                .map_or(true, |wanted| wanted == *kind)
        });
    for kind in candidates {
        let path = content_dir.join(format!("{}_{}.{}", entry.name, entry.date, kind.as_str()));
        if is_file(&path).await {
            return Some((path, kind));
        }
    }
    None
}

fn kind_from_extension(path: &Path) -> Option<DocumentKind> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentKind::parse)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

//=========================================================================================
// Embedded Metadata
//=========================================================================================

#[derive(Debug, Default)]
struct Embedded {
    title: Option<String>,
    author: Option<String>,
    description: Option<String>,
    page_count: Option<u32>,
}

async fn read_embedded(path: &Path, kind: DocumentKind) -> Embedded {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), "Failed to read content file for metadata: {}", e);
            return Embedded::default();
        }
    };

    match kind {
        DocumentKind::Pdf => pdf_metadata(&bytes).unwrap_or_else(|e| {
            warn!(path = %path.display(), "Could not read PDF metadata: {}", e);
            Embedded::default()
        }),
        DocumentKind::Html => html_metadata(&String::from_utf8_lossy(&bytes)),
    }
}

fn pdf_metadata(bytes: &[u8]) -> Result<Embedded, lopdf::Error> {
    let pdf = lopdf::Document::load_mem(bytes)?;

    let info = pdf
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|info| deref(&pdf, info))
        .and_then(|info| info.as_dict().ok());
    let text = |key: &str| {
        info.and_then(|dict| dict.get(key.as_bytes()).ok())
            .and_then(|value| deref(&pdf, value))
            .and_then(|value| value.as_str().ok())
            .map(decode_pdf_text)
            .filter(|value| !value.is_empty())
    };

    Ok(Embedded {
        title: text("Title"),
        author: text("Author"),
        description: None,
        page_count: u32::try_from(pdf.get_pages().len()).ok().filter(|n| *n > 0),
    })
}

fn deref<'a>(pdf: &'a lopdf::Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

/// PDF text strings are UTF-16BE behind a byte order mark, otherwise PDFDocEncoding,
/// which agrees with Latin-1 for printable characters.
fn decode_pdf_text(raw: &[u8]) -> String {
    let text = match raw {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => raw.iter().map(|&b| char::from(b)).collect(),
    };
    text.trim().to_string()
}

fn html_metadata(html: &str) -> Embedded {
    let document = Html::parse_document(html);

    let mut meta: HashMap<String, String> = HashMap::new();
    if let Ok(selector) = Selector::parse("meta[name]") {
        for element in document.select(&selector) {
            let (Some(name), Some(content)) =
                (element.value().attr("name"), element.value().attr("content"))
            else {
                continue;
            };
            let content = content.trim();
            if !content.is_empty() {
                meta.entry(name.trim().to_ascii_lowercase())
                    .or_insert_with(|| content.to_string());
            }
        }
    }

    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .map(|element| element.text().collect::<String>().trim().to_string())
                .find(|text| !text.is_empty())
        })
        .or_else(|| meta.remove("document-title"));

    Embedded {
        title,
        author: meta
            .remove("document-author")
            .or_else(|| meta.remove("author")),
        description: meta.remove("document-description"),
        page_count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DbAdapter;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::fs;

    async fn db() -> DbAdapter {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = DbAdapter::new(pool);
        db.run_migrations().await.unwrap();
        db
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn missing_catalog_yields_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = load_registry(dir.path(), &db().await).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn invalid_json_yields_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), METADATA_FILE, b"{ not json");
        let registry = load_registry(dir.path(), &db().await).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn content_files_are_resolved_by_name_and_date() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            METADATA_FILE,
            br#"{"documents": [
                {"name": "Report", "date": "2024-01-15", "description": "Quarterly"},
                {"name": "Manual", "date": "2024-02-01"},
                {"name": "Ghost", "date": "2024-03-01"}
            ]}"#,
        );
        write(dir.path(), "content/Report_2024-01-15.html", b"<html><body>Q1</body></html>");
        write(dir.path(), "content/Manual_2024-02-01.pdf", b"%PDF-1.4");

        let registry = load_registry(dir.path(), &db().await).await.unwrap();

        // Ghost has no content file and is skipped.
        assert_eq!(registry.len(), 2);
        let report = registry.get("Report", "2024-01-15").unwrap();
        assert_eq!(report.kind, DocumentKind::Html);
        assert_eq!(report.description.as_deref(), Some("Quarterly"));
        let manual = registry.get("Manual", "2024-02-01").unwrap();
        assert_eq!(manual.kind, DocumentKind::Pdf);
        // Not a parsable PDF, so nothing is extracted.
        assert_eq!(manual.page_count, None);
        assert_eq!(manual.title, None);

        let bytes = read_content(report).await.unwrap();
        assert_eq!(bytes, b"<html><body>Q1</body></html>");
    }

    #[tokio::test]
    async fn explicit_file_path_and_type_are_honoured() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            METADATA_FILE,
            br#"{"documents": [
                {"name": "Charter", "date": "2023-12-01", "file_path": "archive/charter.bin", "type": "PDF", "page_count": 12}
            ]}"#,
        );
        write(dir.path(), "archive/charter.bin", b"%PDF-1.7");

        let registry = load_registry(dir.path(), &db().await).await.unwrap();
        let doc = registry.get("Charter", "2023-12-01").unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.page_count, Some(12));
        assert!(doc.path.ends_with("archive/charter.bin"));
    }

    #[tokio::test]
    async fn document_ids_are_stable_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), METADATA_FILE, br#"{"documents": [{"name": "Report", "date": "2024-01-15"}]}"#);
        write(dir.path(), "content/Report_2024-01-15.html", b"<p>hi</p>");
        let db = db().await;

        let first = load_registry(dir.path(), &db).await.unwrap();
        let second = load_registry(dir.path(), &db).await.unwrap();

        assert_eq!(
            first.get("Report", "2024-01-15").unwrap().id,
            second.get("Report", "2024-01-15").unwrap().id
        );
    }

    /// A minimal PDF with `pages` blank pages and an `/Info` dictionary.
    fn pdf_with_info(pages: i64, title: &str, author: Vec<u8>) -> Vec<u8> {
        use lopdf::{Dictionary, StringFormat};

        let mut pdf = lopdf::Document::with_version("1.5");
        let pages_id = pdf.new_object_id();
        let kids: Vec<Object> = (0..pages)
            .map(|_| {
                let mut page = Dictionary::new();
                page.set("Type", Object::Name(b"Page".to_vec()));
                page.set("Parent", Object::Reference(pages_id));
                page.set(
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(595),
                        Object::Integer(842),
                    ]),
                );
                Object::Reference(pdf.add_object(page))
            })
            .collect();

        let mut tree = Dictionary::new();
        tree.set("Type", Object::Name(b"Pages".to_vec()));
        tree.set("Kids", Object::Array(kids));
        tree.set("Count", Object::Integer(pages));
        pdf.objects.insert(pages_id, Object::Dictionary(tree));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = pdf.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Title", Object::String(title.as_bytes().to_vec(), StringFormat::Literal));
        info.set("Author", Object::String(author, StringFormat::Hexadecimal));
        let info_id = pdf.add_object(info);

        pdf.trailer.set("Root", Object::Reference(catalog_id));
        pdf.trailer.set("Info", Object::Reference(info_id));

        let mut bytes = Vec::new();
        pdf.save_to(&mut bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn pdf_info_and_page_count_fill_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            METADATA_FILE,
            br#"{"documents": [
                {"name": "Review", "date": "2024-04-01"},
                {"name": "Audit", "date": "2024-04-02", "title": "Audit 2024", "page_count": 40}
            ]}"#,
        );
        // "Zoë" as UTF-16BE behind a byte order mark.
        let author = vec![0xFE, 0xFF, 0x00, b'Z', 0x00, b'o', 0x00, 0xEB];
        write(
            dir.path(),
            "content/Review_2024-04-01.pdf",
            &pdf_with_info(3, "Quarterly Review", author.clone()),
        );
        write(
            dir.path(),
            "content/Audit_2024-04-02.pdf",
            &pdf_with_info(2, "Draft", author),
        );

        let registry = load_registry(dir.path(), &db().await).await.unwrap();

        let review = registry.get("Review", "2024-04-01").unwrap();
        assert_eq!(review.title.as_deref(), Some("Quarterly Review"));
        assert_eq!(review.author.as_deref(), Some("Zo\u{eb}"));
        assert_eq!(review.page_count, Some(3));

        let audit = registry.get("Audit", "2024-04-02").unwrap();
        assert_eq!(audit.title.as_deref(), Some("Audit 2024"));
        assert_eq!(audit.page_count, Some(40));
        assert_eq!(audit.author.as_deref(), Some("Zo\u{eb}"));
    }

    #[tokio::test]
    async fn html_title_and_document_meta_tags_fill_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            METADATA_FILE,
            br#"{"documents": [
                {"name": "Guide", "date": "2024-06-01"},
                {"name": "Notes", "date": "2024-06-02", "description": "From the catalog"}
            ]}"#,
        );
        write(
            dir.path(),
            "content/Guide_2024-06-01.html",
            br#"<html><head>
                <title>
                  Onboarding Guide
                </title>
                <meta name="Document-Author" content="People Ops">
                <meta name="document-description" content="First week checklist">
                <meta name="viewport" content="width=device-width">
            </head><body><h1>Hi</h1></body></html>"#,
        );
        write(
            dir.path(),
            "content/Notes_2024-06-02.html",
            br#"<html><head>
                <meta name="document-title" content="Meeting Notes">
                <meta name="author" content="Grace">
                <meta name="document-description" content="From the file">
            </head><body></body></html>"#,
        );

        let registry = load_registry(dir.path(), &db().await).await.unwrap();

        let guide = registry.get("Guide", "2024-06-01").unwrap();
        assert_eq!(guide.title.as_deref(), Some("Onboarding Guide"));
        assert_eq!(guide.author.as_deref(), Some("People Ops"));
        assert_eq!(guide.description.as_deref(), Some("First week checklist"));
        assert_eq!(guide.page_count, None);

        let notes = registry.get("Notes", "2024-06-02").unwrap();
        assert_eq!(notes.title.as_deref(), Some("Meeting Notes"));
        assert_eq!(notes.author.as_deref(), Some("Grace"));
        assert_eq!(notes.description.as_deref(), Some("From the catalog"));
    }

    #[test]
    fn pdf_text_strings_are_decoded() {
        assert_eq!(decode_pdf_text(b"  Plain title "), "Plain title");
        assert_eq!(decode_pdf_text(&[b'C', b'a', b'f', 0xE9]), "Caf\u{e9}");
        assert_eq!(decode_pdf_text(&[0xFE, 0xFF, 0x00, b'O', 0x00, b'K']), "OK");
    }
}
