//! Product image pages, backed by the blob container.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::response::{Html, Redirect};
use axum::Form;
use tera::Context;
use tracing::debug;

use super::{page, read_upload, NameForm, RenameForm, RenameQuery};
use crate::errors::AppError;
use crate::AppState;

/// `GET /blobs`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let names = state.storage.list_blobs().await?;
    let mut context = Context::new();
    context.insert("section", "blobs");
    context.insert("heading", "Product images");
    context.insert("resource", &state.storage.names().blob_container);
    context.insert("names", &names);
    page("objects.html", &context)
}

/// `POST /blobs/upload` -- overwrites a blob with the same name.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    match read_upload(multipart).await? {
        Some(upload) => state.storage.upload_blob(&upload.name, upload.data).await?,
        None => debug!("blob upload without a file ignored"),
    }
    Ok(Redirect::to("/blobs"))
}

/// `POST /blobs/delete`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NameForm>,
) -> Result<Redirect, AppError> {
    if !form.name.trim().is_empty() {
        state.storage.delete_blob(&form.name).await?;
    }
    Ok(Redirect::to("/blobs"))
}

/// `GET /blobs/rename?name=`
pub async fn rename_page(Query(query): Query<RenameQuery>) -> Result<Html<String>, AppError> {
    if query.name.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    let mut context = Context::new();
    context.insert("section", "blobs");
    context.insert("old_name", &query.name);
    context.insert("non_atomic", &true);
    page("rename.html", &context)
}

/// `POST /blobs/rename` -- copy then delete; see
/// [`StorageService::rename_blob_non_atomic`](crate::service::StorageService::rename_blob_non_atomic).
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RenameForm>,
) -> Result<Redirect, AppError> {
    if !form.old_name.trim().is_empty() && !form.new_name.trim().is_empty() {
        state
            .storage
            .rename_blob_non_atomic(&form.old_name, &form.new_name)
            .await?;
    }
    Ok(Redirect::to("/blobs"))
}
