//! Page handlers.
//!
//! Every handler is a thin adapter: read the form or path, call one
//! [`StorageService`](crate::service::StorageService) operation, then
//! render a page or redirect back to the listing (POST/redirect/GET).
//! Blank required inputs are ignored rather than rejected.

pub mod blobs;
pub mod customers;
pub mod files;
pub mod queue;

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::Html;
use bytes::Bytes;
use serde::Deserialize;
use tera::Context;

use crate::errors::AppError;
use crate::templates;
use crate::AppState;

/// `POST .../delete` body for blobs and files.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NameForm {
    pub name: String,
}

/// `GET .../rename?name=` query.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameQuery {
    pub name: String,
}

/// `POST .../rename` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameForm {
    pub old_name: String,
    pub new_name: String,
}

/// A file received through a multipart upload form.
#[derive(Debug)]
pub struct Upload {
    pub name: String,
    pub data: Bytes,
}

/// Render `template` into an HTML response.
pub(crate) fn page(template: &str, context: &Context) -> Result<Html<String>, AppError> {
    Ok(Html(templates::render(template, context)?))
}

/// Reduce a client-supplied file name to its final path component.
/// Browsers on Windows may send `C:\fakepath\name.ext`.
pub fn upload_file_name(raw: &str) -> String {
    raw.rsplit(['/', '\\']).next().unwrap_or_default().trim().to_string()
}

/// Read the `file` field of a multipart form.  `None` when the field is
/// missing, has no usable file name, or is empty.
pub(crate) async fn read_upload(mut multipart: Multipart) -> Result<Option<Upload>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = upload_file_name(field.file_name().unwrap_or_default());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        if name.is_empty() || data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(Upload { name, data }));
    }
    Ok(None)
}

/// `GET /` -- landing page.
pub async fn home(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let mut context = Context::new();
    let names = state.storage.names();
    context.insert(
        "names",
        &serde_json::json!({
            "table": names.table,
            "blob_container": names.blob_container,
            "file_share": names.file_share,
            "queue": names.queue,
        }),
    );
    page("index.html", &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_file_name_strips_directories() {
        assert_eq!(upload_file_name("photo.png"), "photo.png");
        assert_eq!(upload_file_name("a/b/photo.png"), "photo.png");
        assert_eq!(upload_file_name(r"C:\fakepath\lease 2024.pdf"), "lease 2024.pdf");
        assert_eq!(upload_file_name("dir/"), "");
        assert_eq!(upload_file_name(""), "");
    }
}
