//! Contract pages, backed by the root of the file share.

use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::response::{Html, Redirect};
use axum::Form;
use tera::Context;
use tracing::debug;

use super::{page, read_upload, NameForm, RenameForm, RenameQuery};
use crate::errors::AppError;
use crate::AppState;

/// `GET /files`
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let names = state.storage.list_files().await?;
    let mut context = Context::new();
    context.insert("section", "files");
    context.insert("heading", "Contracts");
    context.insert("resource", &state.storage.names().file_share);
    context.insert("names", &names);
    page("objects.html", &context)
}

/// `POST /files/upload`
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    match read_upload(multipart).await? {
        Some(upload) => state.storage.upload_file(&upload.name, upload.data).await?,
        None => debug!("file upload without a file ignored"),
    }
    Ok(Redirect::to("/files"))
}

/// `POST /files/delete`
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Form(form): Form<NameForm>,
) -> Result<Redirect, AppError> {
    if !form.name.trim().is_empty() {
        state.storage.delete_file(&form.name).await?;
    }
    Ok(Redirect::to("/files"))
}

/// `GET /files/rename?name=`
pub async fn rename_page(Query(query): Query<RenameQuery>) -> Result<Html<String>, AppError> {
    if query.name.trim().is_empty() {
        return Err(AppError::NotFound);
    }
    let mut context = Context::new();
    context.insert("section", "files");
    context.insert("old_name", &query.name);
    context.insert("non_atomic", &false);
    page("rename.html", &context)
}

/// `POST /files/rename`
pub async fn rename(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RenameForm>,
) -> Result<Redirect, AppError> {
    if !form.old_name.trim().is_empty() && !form.new_name.trim().is_empty() {
        state
            .storage
            .rename_file(&form.old_name, &form.new_name)
            .await?;
    }
    Ok(Redirect::to("/files"))
}
