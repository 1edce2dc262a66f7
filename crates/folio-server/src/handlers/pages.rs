//! Page endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use folio_tree::{NewPage, Page, PageEdit};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Editor;
use crate::error::ServerError;
use crate::handlers::{ApiJson, DocumentationIdRequest, IdRequest, success};
use crate::state::AppState;

#[derive(Deserialize)]
pub(crate) struct EditPageRequest {
    id: i64,
    #[serde(flatten)]
    edit: PageEdit,
}

/// POST /api/docs/pages
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<DocumentationIdRequest>,
) -> Result<Json<Vec<Page>>, ServerError> {
    Ok(Json(state.store.list_pages(req.documentation_id).await?))
}

/// POST /api/docs/page
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Page>, ServerError> {
    Ok(Json(state.store.get_page(req.id).await?))
}

/// POST /api/docs/page/create
pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(new): ApiJson<NewPage>,
) -> Result<Json<Value>, ServerError> {
    let page = state.store.create_page(new, user.id).await?;
    Ok(success("page_created", Some(page.id)))
}

/// POST /api/docs/page/edit
pub(crate) async fn edit(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(req): ApiJson<EditPageRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.edit_page(req.id, req.edit, user.id).await?;
    Ok(success("page_updated", Some(req.id)))
}

/// POST /api/docs/page/delete
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Editor(_user): Editor,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.delete_page(req.id).await?;
    Ok(success("page_deleted", Some(req.id)))
}
