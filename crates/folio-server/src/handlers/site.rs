//! Serving of published documentation sites.
//!
//! Any request that no API route matched is resolved by the site router
//! against the cached documentation table. The resolved file is served by
//! [`ServeFile`], which streams the body and answers conditional and range
//! requests. Requests no site can serve are redirected to the admin
//! interface.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use folio_site::RouteError;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::ServerError;
use crate::state::AppState;

pub(crate) async fn serve(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Result<Response, ServerError> {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }
    let path = req.uri().path().to_owned();

    let documentations = state.sites.documentations(&state.store).await?;
    let router = state.router.clone();
    let lookup_path = path.clone();
    // Resolution stats candidate files.
    let resolved =
        tokio::task::spawn_blocking(move || router.resolve(&documentations, &lookup_path)).await;
    let route = match resolved {
        Ok(Ok(route)) => route,
        Ok(Err(RouteError::NotFound(_))) => return Ok(miss(&state.admin_path, &path)),
        Err(e) => {
            tracing::error!(path = %path, error = %e, "Site resolution task failed");
            return Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    let response = match ServeFile::new(&route.file).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        // Site was swapped out between resolve and open.
        tracing::debug!(file = %route.file.display(), "Routed file vanished");
        return Ok(miss(&state.admin_path, &path));
    }
    Ok(response.into_response())
}

fn miss(admin_path: &str, path: &str) -> Response {
    if path.starts_with(admin_path) {
        return StatusCode::NOT_FOUND.into_response();
    }
    Redirect::temporary(admin_path).into_response()
}
