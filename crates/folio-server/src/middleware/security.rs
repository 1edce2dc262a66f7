//! Hardening headers for API and site responses.
//!
//! API responses are JSON and never load subresources, so they get a
//! deny-all content policy. Anything else is generator output from a
//! published site and may load its own scripts and styles. Neither may be
//! framed.

use axum::body::Body;
use axum::http::header::{
    CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderValue, Response};
use tower_http::set_header::SetResponseHeaderLayer;

const API_POLICY: &str = "default-src 'none'; frame-ancestors 'none'";

const SITE_POLICY: &str = "default-src 'self'; \
                           script-src 'self'; \
                           style-src 'self' 'unsafe-inline'; \
                           font-src 'self' data:; \
                           img-src 'self' data: https:; \
                           connect-src 'self'; \
                           frame-ancestors 'none'";

type MakePolicy = fn(&Response<Body>) -> Option<HeaderValue>;

/// Content-Security-Policy chosen from the response's content type.
pub(crate) fn content_security_policy() -> SetResponseHeaderLayer<MakePolicy> {
    SetResponseHeaderLayer::overriding(CONTENT_SECURITY_POLICY, policy_for as MakePolicy)
}

pub(crate) fn no_sniff() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"))
}

pub(crate) fn deny_framing() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"))
}

fn policy_for(response: &Response<Body>) -> Option<HeaderValue> {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    let policy = if is_json { API_POLICY } else { SITE_POLICY };
    Some(HeaderValue::from_static(policy))
}
