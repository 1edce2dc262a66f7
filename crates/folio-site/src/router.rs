//! Request path to built file resolution.
//!
//! Every documentation owns a base URL prefix. A request is routed to the
//! documentation with the longest prefix of the request path; ties go to the
//! most recently created one. The remainder of the path is looked up in that
//! documentation's output directory.
//!
//! Lookup order for the remainder `rest`:
//!
//! 1. `<output>/<rest>` if it is a file
//! 2. `<output>/<rest>/index.html` if `rest` is a directory
//! 3. `<output>/<rest>.html` (clean URLs)
//! 4. `<output>/index.html` (single-page fallback)

use std::path::{Component, Path, PathBuf};

use folio_tree::{Documentation, DocumentationId};
use percent_encoding::percent_decode_str;

use crate::layout::SiteLayout;

/// Routing failure.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// No documentation serves this path, or it has nothing built.
    #[error("no site serves {0}")]
    NotFound(String),
}

/// Resolved request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// Documentation that owns the request path.
    pub documentation_id: DocumentationId,
    /// Matched prefix.
    pub base_url: String,
    /// File to serve.
    pub file: PathBuf,
}

/// Maps request paths to files of published sites.
#[derive(Clone, Debug)]
pub struct SiteRouter {
    layout: SiteLayout,
}

impl SiteRouter {
    #[must_use]
    pub fn new(layout: SiteLayout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    /// Resolve a request path against the given documentations.
    pub fn resolve(
        &self,
        documentations: &[Documentation],
        request_path: &str,
    ) -> Result<Route, RouteError> {
        let not_found = || RouteError::NotFound(request_path.to_owned());

        let documentation = select(documentations, request_path).ok_or_else(not_found)?;
        let rest = strip_base(request_path, &documentation.base_url).ok_or_else(not_found)?;
        let relative = decode_relative(rest).ok_or_else(|| {
            tracing::debug!(path = %request_path, "Rejected request path");
            not_found()
        })?;

        let output = self.layout.output_dir(documentation);
        let file = lookup(&output, &relative).ok_or_else(|| {
            tracing::debug!(
                path = %request_path,
                documentation_id = documentation.id,
                "Nothing built for request"
            );
            not_found()
        })?;

        Ok(Route {
            documentation_id: documentation.id,
            base_url: documentation.base_url.clone(),
            file,
        })
    }
}

/// Documentation with the longest base URL matching `path`.
fn select<'a>(documentations: &'a [Documentation], path: &str) -> Option<&'a Documentation> {
    documentations
        .iter()
        .filter(|d| strip_base(path, &d.base_url).is_some())
        .max_by(|a, b| {
            a.base_url
                .len()
                .cmp(&b.base_url.len())
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        })
}

/// Remainder of `path` after `base`, if `base` is a prefix.
///
/// `/docs` matches the base `/docs/` with an empty remainder.
fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if let Some(rest) = path.strip_prefix(base) {
        return Some(rest);
    }
    (path == base.trim_end_matches('/') && !path.is_empty()).then_some("")
}

/// Percent-decode and split into normal path components.
///
/// Returns `None` for parent-directory segments, absolute components, NUL
/// bytes or invalid UTF-8.
fn decode_relative(rest: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(rest).decode_utf8().ok()?;
    if decoded.contains('\0') || decoded.contains('\\') {
        return None;
    }

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => relative.push(name),
            _ => return None,
        }
    }
    Some(relative)
}

fn lookup(output: &Path, relative: &Path) -> Option<PathBuf> {
    let candidate = output.join(relative);
    if candidate.is_file() {
        return Some(candidate);
    }

    if !relative.as_os_str().is_empty() {
        let index = candidate.join("index.html");
        if index.is_file() {
            return Some(index);
        }

        let mut html = candidate.into_os_string();
        html.push(".html");
        let html = PathBuf::from(html);
        if html.is_file() {
            return Some(html);
        }
    }

    let fallback = output.join("index.html");
    fallback.is_file().then_some(fallback)
}
