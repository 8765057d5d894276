//! Turning a file on disk into classification input.

use std::path::Path;

use chrono::NaiveDate;
use tracing::debug;

use dealdesk_classifier::{ClassificationInput, ImagePayload};
use dealdesk_shared::{DealDeskError, DealDocument, Result};

pub const UNSUPPORTED_FORMAT_MESSAGE: &str =
    "Unsupported format. Provide an image (PNG/JPG) or a text file (.txt/.md).";

const IMAGE_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    ("heic", "image/heic"),
];

const TEXT_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("md", "text/markdown"),
    ("markdown", "text/markdown"),
    ("csv", "text/csv"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentBody {
    Image(ImagePayload),
    Text(String),
}

/// A file accepted for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub body: AttachmentBody,
}

impl Attachment {
    /// Combine with optional typed text. A text file's content is appended
    /// after the typed text.
    pub fn into_input(self, typed: Option<String>) -> ClassificationInput {
        let typed = typed.filter(|t| !t.trim().is_empty());
        match self.body {
            AttachmentBody::Image(image) => ClassificationInput {
                text: typed,
                image: Some(image),
            },
            AttachmentBody::Text(content) => {
                let text = match typed {
                    Some(typed) => format!("{typed}\n\n{content}"),
                    None => content,
                };
                ClassificationInput {
                    text: Some(text),
                    image: None,
                }
            }
        }
    }

    /// Metadata recorded on a deal when the file is attached to it.
    pub fn document(&self, uploaded: NaiveDate) -> DealDocument {
        DealDocument {
            name: self.name.clone(),
            size: human_size(self.size),
            kind: self.mime_type.clone(),
            upload_date: uploaded,
        }
    }
}

/// Read `path` as an image or text attachment.
pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let lookup = |table: &[(&str, &'static str)]| {
        table
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| *mime)
    };

    if let Some(mime) = lookup(IMAGE_TYPES) {
        let bytes = std::fs::read(path).map_err(|e| DealDeskError::io(path, e))?;
        debug!(%name, mime, bytes = bytes.len(), "image attachment loaded");
        return Ok(Attachment {
            name,
            mime_type: mime.to_string(),
            size: bytes.len() as u64,
            body: AttachmentBody::Image(ImagePayload::from_bytes(mime, &bytes)),
        });
    }

    if let Some(mime) = lookup(TEXT_TYPES) {
        let text = std::fs::read_to_string(path).map_err(|e| DealDeskError::io(path, e))?;
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
        debug!(%name, mime, chars = text.len(), "text attachment loaded");
        return Ok(Attachment {
            name,
            mime_type: mime.to_string(),
            size: text.len() as u64,
            body: AttachmentBody::Text(text),
        });
    }

    Err(DealDeskError::validation(UNSUPPORTED_FORMAT_MESSAGE))
}

/// `512 B`, `1.2 KB`, `3.4 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_file(ext: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("dd_intake_{}.{ext}", Uuid::now_v7()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn image_becomes_base64_payload() {
        let path = temp_file("PNG", b"\x89PNG fake");
        let attachment = load_attachment(&path).unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        match &attachment.body {
            AttachmentBody::Image(image) => {
                assert_eq!(image.mime_type, "image/png");
                assert!(!image.data.is_empty());
            }
            other => panic!("expected image, got {other:?}"),
        }
        let input = attachment.into_input(Some("see screenshot".into()));
        assert_eq!(input.text.as_deref(), Some("see screenshot"));
        assert!(input.image.is_some());
    }

    #[test]
    fn text_file_is_read_and_merged() {
        let path = temp_file("md", "Warehouse in Turin, 4000 sqm".as_bytes());
        let attachment = load_attachment(&path).unwrap();
        assert_eq!(attachment.mime_type, "text/markdown");
        let input = attachment.into_input(None);
        assert_eq!(input.text.as_deref(), Some("Warehouse in Turin, 4000 sqm"));
        assert!(input.image.is_none());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let path = temp_file("pdf", b"%PDF-1.7");
        let err = load_attachment(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported format"));
    }

    #[test]
    fn document_metadata() {
        let path = temp_file("txt", &[b'a'; 2048]);
        let attachment = load_attachment(&path).unwrap();
        let doc = attachment.document(NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(doc.size, "2.0 KB");
        assert_eq!(doc.kind, "text/plain");
    }

    #[test]
    fn sizes() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(1536), "1.5 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }
}
