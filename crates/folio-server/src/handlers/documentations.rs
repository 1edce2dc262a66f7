//! Documentation endpoints: CRUD, versions and bulk reorder.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use folio_tree::{Documentation, DocumentationFields, ReorderItem};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::auth::Editor;
use crate::error::ServerError;
use crate::handlers::{ApiJson, IdRequest, success};
use crate::state::AppState;

#[derive(Deserialize)]
pub(crate) struct EditDocumentationRequest {
    id: i64,
    #[serde(flatten)]
    fields: DocumentationFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateVersionRequest {
    #[serde(alias = "originalDocID")]
    original_doc_id: i64,
    version: String,
}

#[derive(Deserialize)]
pub(crate) struct BulkReorderRequest {
    order: Vec<ReorderItem>,
}

/// GET /api/docs/documentations
pub(crate) async fn list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Documentation>>, ServerError> {
    Ok(Json(state.store.list_documentations().await?))
}

/// POST /api/docs/documentation
pub(crate) async fn get(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Documentation>, ServerError> {
    Ok(Json(state.store.get_documentation(req.id).await?))
}

/// POST /api/docs/documentation/create
pub(crate) async fn create(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(fields): ApiJson<DocumentationFields>,
) -> Result<Json<Value>, ServerError> {
    let doc = state.store.create_documentation(fields, user.id).await?;
    Ok(success("documentation_created", Some(doc.id)))
}

/// POST /api/docs/documentation/edit
pub(crate) async fn edit(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(req): ApiJson<EditDocumentationRequest>,
) -> Result<Json<Value>, ServerError> {
    state
        .store
        .edit_documentation(req.id, req.fields, user.id)
        .await?;
    Ok(success("documentation_updated", Some(req.id)))
}

/// POST /api/docs/documentation/delete
pub(crate) async fn delete(
    State(state): State<Arc<AppState>>,
    Editor(_user): Editor,
    ApiJson(req): ApiJson<IdRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.delete_documentation(req.id).await?;
    Ok(success("documentation_deleted", Some(req.id)))
}

/// POST /api/docs/documentation/version
pub(crate) async fn create_version(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(req): ApiJson<CreateVersionRequest>,
) -> Result<Json<Value>, ServerError> {
    let version = state
        .store
        .create_version(req.original_doc_id, &req.version, user.id)
        .await?;
    Ok(success("version_created", Some(version.id)))
}

/// POST /api/docs/documentation/reorder-bulk
pub(crate) async fn bulk_reorder(
    State(state): State<Arc<AppState>>,
    Editor(user): Editor,
    ApiJson(req): ApiJson<BulkReorderRequest>,
) -> Result<Json<Value>, ServerError> {
    state.store.bulk_reorder(req.order, user.id).await?;
    Ok(success("pages_and_page_groups_reordered", None))
}

/// GET /api/docs/documentation/root-parent-id?id=
///
/// `rootParentId` is `0` for documentations that are not versions.
pub(crate) async fn root_parent_id(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IdRequest>, QueryRejection>,
) -> Result<Json<Value>, ServerError> {
    let Query(req) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let root = state.store.root_parent_id(req.id).await?.unwrap_or(0);
    Ok(Json(json!({"rootParentId": root})))
}
