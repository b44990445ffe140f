//! Uploaded document metadata
//!
//! File content lives in object storage; the platform only keeps this row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest accepted upload (10 MiB)
pub const MAX_DOCUMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Category used when the uploader does not pick one
pub const DEFAULT_DOCUMENT_CATEGORY: &str = "general";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub category: String,
    pub uploaded_by: Uuid,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

impl DocumentMeta {
    /// Object path for a new upload: `{uploader}/{id}-{file name}`
    pub fn storage_path_for(uploaded_by: Uuid, id: Uuid, file_name: &str) -> String {
        let safe: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}/{}-{}", uploaded_by, id, safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_sanitizes_name() {
        let uploader = Uuid::nil();
        let id = Uuid::nil();
        let path = DocumentMeta::storage_path_for(uploader, id, "../march report.pdf");
        assert!(path.ends_with("-.._march_report.pdf"));
        assert!(!path.contains(' '));
        assert_eq!(path.matches('/').count(), 1);
    }
}
