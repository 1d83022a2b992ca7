//! Loading source documents from disk.
//!
//! Text extraction is a collaborator seam: the core only consumes the
//! [`TextExtractor`] trait. The bundled [`PlainTextExtractor`] handles `.txt`
//! files (UTF-8 with a Latin-1 fallback) and rejects PDF/DOCX with a typed
//! error; richer extractors plug in through the trait without touching the
//! rest of the pipeline.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::ExtractError;

/// File extensions the ingest pipeline recognizes.
pub const SUPPORTED_FILE_TYPES: &[&str] = &["txt", "pdf", "docx"];

/// Declared type of a source file, parsed from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Txt,
    Pdf,
    Docx,
}

impl FileKind {
    /// Recognize a supported file type from a path's extension, case
    /// insensitively. Returns `None` for anything unsupported.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(FileKind::Txt),
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Txt => "txt",
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
        }
    }
}

/// A source file reduced to its identifier and extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Identifier carried into chunk metadata (the file name).
    pub source_id: String,
    /// Extracted plain text, possibly empty.
    pub content: String,
}

/// Turns a file of a declared type into plain text.
pub trait TextExtractor {
    fn extract(&self, path: &Path, kind: FileKind) -> Result<String, ExtractError>;
}

/// Extractor for plain `.txt` files.
///
/// PDF and DOCX are recognized kinds but produce
/// [`ExtractError::UnsupportedFileType`] here; parsing those formats belongs
/// to an external extractor supplied through [`TextExtractor`].
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, kind: FileKind) -> Result<String, ExtractError> {
        match kind {
            FileKind::Txt => read_text_file(path),
            other => Err(ExtractError::UnsupportedFileType(other.as_str().to_string())),
        }
    }
}

/// Read a text file as UTF-8, falling back to Latin-1 when decoding fails.
fn read_text_file(path: &Path) -> Result<String, ExtractError> {
    let bytes = fs::read(path).map_err(|source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        // Latin-1: every byte maps to the code point of the same value.
        Err(err) => Ok(err.into_bytes().into_iter().map(|b| b as char).collect()),
    }
}

/// Read every supported file in `folder` into a [`SourceDocument`] batch.
///
/// Per-file failures are logged and skipped so one bad file never aborts the
/// batch. A missing folder or a folder with no supported files yields an
/// empty batch with a warning, not an error.
pub fn read_documents_from_folder(
    folder: &Path,
    extractor: &dyn TextExtractor,
) -> Vec<SourceDocument> {
    let mut documents = Vec::new();

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(folder = %folder.display(), error = %err, "document folder is not readable");
            return documents;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(kind) = FileKind::from_path(&path) else {
            continue;
        };
        let source_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown")
            .to_string();

        match extractor.extract(&path, kind) {
            Ok(content) if !content.trim().is_empty() => {
                documents.push(SourceDocument { source_id, content });
            }
            Ok(_) => warn!(file = %source_id, "file extracted to empty text, skipping"),
            Err(err) => warn!(file = %source_id, error = %err, "extraction failed, skipping"),
        }
    }

    if documents.is_empty() {
        warn!(folder = %folder.display(), "no supported files found");
    }

    documents
}
