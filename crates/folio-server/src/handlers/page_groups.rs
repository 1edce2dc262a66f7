//! Page group endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use folio_tree::{NewPageGroup, Page, PageGroup, PageGroupEdit};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Editor;
use crate::error::ServerError;
use crate::handlers::{ApiJson, DocumentationIdRequest, IdRequest, success};
use crate::state::AppState;

#[derive(Deserialize)]
pub(crate) struct EditPageGroupRequest {
    id: i64,
    #[serde(flatten)]
    edit: PageGroupEdit,
}

/// POST /api/docs/page-groups
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<DocumentationIdRequest>,
) -> Result<Json<Vec<PageGroup>>, ServerError> {
    Ok(Json(state.store.list_page_groups(req.documentation_id).await?))
}

/// POST /api/docs/page-group
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<PageGroup>, ServerError> {
    Ok(Json(state.store.get_page_group(req.id).await?))
}

/// POST /api/docs/page-group/pages
pub(crate) async fn pages(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Vec<Page>>, ServerError> {
    Ok(Json(state.store.get_pages_of_group(req.id).await?))
}

/// POST /api/docs/page-group/create
pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(new): ApiJson<NewPageGroup>,
) -> Result<Json<Value>, ServerError> {
    let group = state.store.create_page_group(new, user.id).await?;
    Ok(success("page_group_created", Some(group.id)))
}

/// POST /api/docs/page-group/edit
pub(crate) async fn edit(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(req): ApiJson<EditPageGroupRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.edit_page_group(req.id, req.edit, user.id).await?;
    Ok(success("page_group_updated", Some(req.id)))
}

/// POST /api/docs/page-group/delete
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Editor(_user): Editor,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.delete_page_group(req.id).await?;
    Ok(success("page_group_deleted", Some(req.id)))
}
