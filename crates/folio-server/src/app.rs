//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::handlers::{build, documentations, page_groups, pages, site};
use crate::middleware::security;
use crate::state::AppState;

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let documentation_routes = Router::new()
        .route("/api/docs/documentations", get(documentations::list))
        .route("/api/docs/documentation", post(documentations::get))
        .route("/api/docs/documentation/create", post(documentations::create))
        .route("/api/docs/documentation/edit", post(documentations::edit))
        .route("/api/docs/documentation/delete", post(documentations::delete))
        .route(
            "/api/docs/documentation/version",
            post(documentations::create_version),
        )
        .route(
            "/api/docs/documentation/reorder-bulk",
            post(documentations::bulk_reorder),
        )
        .route(
            "/api/docs/documentation/root-parent-id",
            get(documentations::root_parent_id),
        );

    let page_group_routes = Router::new()
        .route("/api/docs/page-groups", post(page_groups::list))
        .route("/api/docs/page-group", post(page_groups::get))
        .route("/api/docs/page-group/pages", post(page_groups::pages))
        .route("/api/docs/page-group/create", post(page_groups::create))
        .route("/api/docs/page-group/edit", post(page_groups::edit))
        .route("/api/docs/page-group/delete", post(page_groups::delete));

    let page_routes = Router::new()
        .route("/api/docs/pages", post(pages::list))
        .route("/api/docs/page", post(pages::get))
        .route("/api/docs/page/create", post(pages::create))
        .route("/api/docs/page/edit", post(pages::edit))
        .route("/api/docs/page/delete", post(pages::delete));

    Router::new()
        .merge(documentation_routes)
        .merge(page_group_routes)
        .merge(page_routes)
        .route("/api/build/status", get(build::status))
        .fallback(site::serve)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(security::content_security_policy())
                .layer(security::no_sniff())
                .layer(security::deny_framing()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use folio_build::{BuildScheduler, GeneratorCommand, ProjectBuilder, SchedulerConfig};
    use folio_config::EditorToken;
    use folio_site::{SiteLayout, SiteRouter};
    use folio_tree::{NullSink, RecordingSink, TreeStore};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::StaticTokens;
    use crate::sites::SiteIndex;

    const TOKEN: &str = "secret-token";

    struct Harness {
        app: Router,
        sink: Arc<RecordingSink>,
        layout: SiteLayout,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let layout = SiteLayout::new(dir.path());
        let sink = Arc::new(RecordingSink::new());
        let sites = Arc::new(SiteIndex::default());
        let store = TreeStore::in_memory(Arc::new(NullSink))
            .await
            .unwrap()
            .with_sink(sites.sink(Arc::clone(&sink) as Arc<dyn folio_tree::TriggerSink>));
        let builder = ProjectBuilder::new(
            store.clone(),
            layout.clone(),
            GeneratorCommand::new("true", Vec::new()),
        );
        let scheduler = BuildScheduler::new(Arc::new(builder), SchedulerConfig::default());

        let state = Arc::new(AppState {
            store,
            scheduler,
            router: SiteRouter::new(layout.clone()),
            sites,
            auth: Arc::new(StaticTokens::new(&[EditorToken {
                token: TOKEN.to_owned(),
                user_id: 1,
                username: "admin".to_owned(),
            }])),
            admin_path: "/admin/".to_owned(),
        });

        Harness {
            app: create_router(state),
            sink,
            layout,
            _dir: dir,
        }
    }

    impl Harness {
        async fn call(&self, req: Request<Body>) -> (StatusCode, Value) {
            let response = self.app.clone().oneshot(req).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Request::get(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn create_doc(&self, name: &str, base: &str) -> i64 {
            let (status, body) = self
                .post(
                    "/api/docs/documentation/create",
                    json!({"name": name, "version": "1.0", "baseURL": base}),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{body}");
            body["id"].as_i64().unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_and_get_documentation() {
        let h = harness().await;

        let id = h.create_doc("Guide", "/guide").await;
        let (status, body) = h.post("/api/docs/documentation", json!({"id": id})).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Guide");
        assert_eq!(body["baseURL"], "/guide/");
        assert_eq!(h.sink.keys(), vec![(id, false)]);
    }

    #[tokio::test]
    async fn test_mutation_requires_token() {
        let h = harness().await;

        let (status, body) = h
            .call(
                Request::post("/api/docs/documentation/create")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"name":"x"}"#))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"status": "error", "message": "unauthorized"}));

        let (status, body) = h
            .call(
                Request::post("/api/docs/documentation/create")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::from(r#"{"name":"x"}"#))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "invalid_token");
        assert!(h.sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let h = harness().await;
        let id = h.create_doc("Guide", "/guide").await;

        let (status, body) = h.post("/api/docs/page", json!({"id": 404})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "page_not_found");

        let (status, _) = h
            .post(
                "/api/docs/documentation/create",
                json!({"name": "Other", "baseURL": "/guide/"}),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = h
            .post(
                "/api/docs/page-group/create",
                json!({"name": "A", "documentationId": id, "order": -1}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid_structure");

        let (status, body) = h.post("/api/docs/page", json!({"nope": true})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid_request");
    }

    #[tokio::test]
    async fn test_tree_endpoints_and_reorder() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;

        let (_, group) = h
            .post(
                "/api/docs/page-group/create",
                json!({"name": "Basics", "documentationId": doc}),
            )
            .await;
        let group = group["id"].as_i64().unwrap();
        let (_, page) = h
            .post(
                "/api/docs/page/create",
                json!({
                    "title": "Intro",
                    "slug": "intro",
                    "content": "hi",
                    "documentationId": doc,
                    "pageGroupId": group,
                }),
            )
            .await;
        let page = page["id"].as_i64().unwrap();

        let (_, pages) = h.post("/api/docs/page-group/pages", json!({"id": group})).await;
        assert_eq!(pages[0]["slug"], "intro");

        h.sink.take();
        let (status, body) = h
            .post(
                "/api/docs/documentation/reorder-bulk",
                json!({"order": [
                    {"id": page, "isPageGroup": false, "order": 3, "parentId": null},
                    {"id": group, "isPageGroup": true, "order": 1},
                ]}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(h.sink.keys(), vec![(doc, false)]);

        let (_, moved) = h.post("/api/docs/page", json!({"id": page})).await;
        assert_eq!(moved["pageGroupId"], Value::Null);
        assert_eq!(moved["order"], 3);

        let (_, listed) = h
            .post("/api/docs/pages", json!({"documentationId": doc}))
            .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_version_and_root_parent_id() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;
        h.sink.take();

        let (status, body) = h
            .post(
                "/api/docs/documentation/version",
                json!({"originalDocId": doc, "version": "2.0"}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let version = body["id"].as_i64().unwrap();
        assert_eq!(h.sink.keys(), vec![(doc, true)]);

        let (_, root) = h
            .get(&format!("/api/docs/documentation/root-parent-id?id={version}"))
            .await;
        assert_eq!(root, json!({"rootParentId": doc}));
        let (_, root) = h
            .get(&format!("/api/docs/documentation/root-parent-id?id={doc}"))
            .await;
        assert_eq!(root, json!({"rootParentId": 0}));

        let (status, _) = h.get("/api/docs/documentation/root-parent-id?id=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_build_status_unknown_project() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;

        let (status, body) = h.get(&format!("/api/build/status?id={doc}")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["projectId"], doc);
        assert_eq!(body["scheduler"]["phase"], "idle");
        assert_eq!(body["buildStatus"], "never");
    }

    #[tokio::test]
    async fn test_serves_published_site() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;
        let site = h.layout.site_dir(doc);
        std::fs::create_dir_all(site.join("intro")).unwrap();
        std::fs::write(site.join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(site.join("intro/index.html"), "<h1>intro</h1>").unwrap();

        let response = h
            .app
            .clone()
            .oneshot(Request::get("/guide/intro/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
            "text/html"
        );
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        let policy = response.headers()[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap();
        assert!(policy.starts_with("default-src 'self'"), "{policy}");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"<h1>intro</h1>");
    }

    #[tokio::test]
    async fn test_site_follows_base_url_edit() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;
        let site = h.layout.site_dir(doc);
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("index.html"), "<h1>home</h1>").unwrap();

        let status = |uri: &'static str| {
            let app = h.app.clone();
            async move {
                app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
                    .await
                    .unwrap()
                    .status()
            }
        };
        assert_eq!(status("/guide/").await, StatusCode::OK);

        let (code, body) = h
            .post(
                "/api/docs/documentation/edit",
                json!({"id": doc, "name": "Guide", "version": "1.0", "baseURL": "/manual"}),
            )
            .await;
        assert_eq!(code, StatusCode::OK, "{body}");

        assert_eq!(status("/manual/").await, StatusCode::OK);
        assert_eq!(status("/guide/").await, StatusCode::TEMPORARY_REDIRECT);
    }

    #[tokio::test]
    async fn test_site_answers_conditional_request() {
        let h = harness().await;
        let doc = h.create_doc("Guide", "/guide").await;
        let site = h.layout.site_dir(doc);
        std::fs::create_dir_all(&site).unwrap();
        std::fs::write(site.join("style.css"), "body {}").unwrap();

        let first = h
            .app
            .clone()
            .oneshot(Request::get("/guide/style.css").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[header::CONTENT_TYPE], "text/css");
        let modified = first.headers()[header::LAST_MODIFIED].clone();

        let second = h
            .app
            .clone()
            .oneshot(
                Request::get("/guide/style.css")
                    .header(header::IF_MODIFIED_SINCE, modified)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    }

    #[tokio::test]
    async fn test_unrouted_request_redirects_to_admin() {
        let h = harness().await;
        h.create_doc("Guide", "/guide").await;

        let response = h
            .app
            .clone()
            .oneshot(Request::get("/guide/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/admin/");
    }
}
