//! HTTP request handlers.

pub(crate) mod build;
pub(crate) mod documentations;
pub(crate) mod page_groups;
pub(crate) mod pages;
pub(crate) mod site;

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::error::ServerError;

/// JSON body whose rejections use the API error envelope.
pub(crate) struct ApiJson<T>(pub(crate) T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Body of endpoints addressing one entity.
#[derive(Deserialize)]
pub(crate) struct IdRequest {
    pub(crate) id: i64,
}

/// Body of endpoints listing the children of a documentation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentationIdRequest {
    #[serde(alias = "documentationID")]
    pub(crate) documentation_id: i64,
}

/// Success envelope of mutating endpoints.
pub(crate) fn success(message: &str, id: Option<i64>) -> Json<Value> {
    let mut body = json!({"status": "success", "message": message});
    if let Some(id) = id {
        body["id"] = json!(id);
    }
    Json(body)
}
