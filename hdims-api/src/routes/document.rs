//! Document upload function

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use hdims_core::{DocumentMeta, Permission, DEFAULT_DOCUMENT_CATEGORY, MAX_DOCUMENT_BYTES};
use hdims_db::UploadOptions;

use crate::auth::BearerToken;
use crate::dto::{Envelope, UploadMeta, UploadResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, SIGNED_URL_TTL_SECS};

/// Parts read from the multipart body
struct Upload {
    meta: UploadMeta,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<Upload> {
    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut category: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable file part: {}", e)))?;
                file = Some((name, mime, bytes.to_vec()));
            }
            Some("category") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("unreadable category: {}", e)))?;
                let text = text.trim();
                if !text.is_empty() {
                    category = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let (file_name, mime_type, bytes) =
        file.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let size = bytes.len() as u64;
    if size > MAX_DOCUMENT_BYTES {
        return Err(ApiError::PayloadTooLarge {
            size,
            max: MAX_DOCUMENT_BYTES,
        });
    }

    let meta = UploadMeta {
        file_name,
        mime_type,
        category: category.unwrap_or_else(|| DEFAULT_DOCUMENT_CATEGORY.to_string()),
    };
    meta.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(Upload { meta, bytes })
}

/// Store a supporting document and return a short-lived link to it
pub async fn upload_document(
    State(state): State<AppState>,
    token: BearerToken,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<Envelope<UploadResponse>>> {
    let multipart = multipart
        .map_err(|e| ApiError::bad_request(format!("expected multipart/form-data: {}", e.body_text())))?;
    let upload = read_upload(multipart).await?;

    let user = state.authenticate(token.require()?).await?;
    user.require(Permission::UploadDocuments)?;

    let id = Uuid::new_v4();
    let uploaded_by = user.profile.id;
    let path = DocumentMeta::storage_path_for(uploaded_by, id, &upload.meta.file_name);
    let size_bytes = upload.bytes.len() as u64;

    let options = UploadOptions {
        content_type: upload.meta.mime_type.clone(),
        ..Default::default()
    };
    let storage_path = state
        .platform
        .storage
        .upload(&path, upload.bytes, &options)
        .await?;

    let document = DocumentMeta {
        id,
        name: upload.meta.file_name,
        mime_type: upload.meta.mime_type,
        size_bytes,
        category: upload.meta.category,
        uploaded_by,
        storage_path,
        uploaded_at: Utc::now(),
    };
    if let Err(e) = state.insert_document(&document).await {
        // metadata is the only handle on the object
        if let Err(cleanup) = state.platform.storage.remove(&document.storage_path).await {
            warn!(path = %document.storage_path, error = %cleanup, "Orphaned upload not removed");
        }
        return Err(e);
    }

    let signed_url = state
        .platform
        .storage
        .signed_url(&document.storage_path, SIGNED_URL_TTL_SECS)
        .await?;
    info!(
        document_id = %document.id,
        size_bytes = document.size_bytes,
        user_id = %uploaded_by,
        "Document uploaded"
    );

    Ok(Envelope::ok(
        UploadResponse {
            document,
            signed_url,
            expires_in: SIGNED_URL_TTL_SECS,
        },
        "Document uploaded successfully",
    ))
}
