//! Build status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use folio_build::BuildStatus;
use folio_tree::{BuildState, DocumentationId};
use serde::Serialize;

use crate::error::ServerError;
use crate::handlers::IdRequest;
use crate::state::AppState;

/// Response for GET /api/build/status.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BuildStatusResponse {
    documentation_id: DocumentationId,
    /// Project whose build covers this documentation.
    project_id: DocumentationId,
    /// Live scheduler state of the project.
    scheduler: BuildStatus,
    /// Outcome recorded on the documentation by the last build.
    build_status: BuildState,
    last_built_at: Option<DateTime<Utc>>,
}

/// GET /api/build/status?id=
pub(crate) async fn status(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IdRequest>, QueryRejection>,
) -> Result<Json<BuildStatusResponse>, ServerError> {
    let Query(req) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let documentation = state.store.get_documentation(req.id).await?;
    let project_id = documentation.project_id();
    let scheduler = state
        .scheduler
        .status(project_id)
        .unwrap_or_else(|| BuildStatus::unknown(project_id));

    Ok(Json(BuildStatusResponse {
        documentation_id: documentation.id,
        project_id,
        scheduler,
        build_status: documentation.build_status,
        last_built_at: documentation.last_built_at,
    }))
}
