//! Tree entities and the inputs used to create or edit them.
//!
//! Entities are plain rows: parents are referenced by id, never by pointer.
//! Editor sets are loaded separately from their join tables and attached
//! after the row is fetched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Documentation identifier.
pub type DocumentationId = i64;
/// Page group identifier.
pub type PageGroupId = i64;
/// Page identifier.
pub type PageId = i64;
/// User identifier, issued by the authentication collaborator.
pub type UserId = i64;

/// Acting user, as returned by the authentication collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub username: String,
}

/// Outcome of the most recent build of a documentation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum BuildState {
    /// Never built.
    #[default]
    Never,
    /// Last build published a site.
    Succeeded,
    /// Last build failed; the previous site (if any) is still served.
    Failed,
}

/// A documentation project or one of its versions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Documentation {
    pub id: DocumentationId,
    pub name: String,
    pub description: String,
    /// Version label (e.g. "1.0", "v2").
    pub version: String,
    /// Routing prefix in `/prefix/` form.
    #[serde(rename = "baseURL")]
    pub base_url: String,
    /// Root documentation this version was cloned from. `None` for originals.
    pub version_origin: Option<DocumentationId>,
    pub favicon: String,
    pub meta_image: String,
    pub nav_image: String,
    pub custom_css: String,
    pub copyright_text: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub site: SiteDetails,
    pub author_id: UserId,
    pub last_editor_id: Option<UserId>,
    #[sqlx(skip)]
    pub editors: Vec<UserId>,
    pub build_status: BuildState,
    pub last_built_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Documentation {
    /// Id of the project this documentation is built with.
    ///
    /// Versions are built as part of their root project.
    #[must_use]
    pub fn project_id(&self) -> DocumentationId {
        self.version_origin.unwrap_or(self.id)
    }

    /// True if this documentation was produced by cloning another one.
    #[must_use]
    pub fn is_version(&self) -> bool {
        self.version_origin.is_some()
    }
}

/// Presentation settings of a documentation site. Stored as given and
/// handed to the generator in the project manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteDetails {
    /// Public URL of the site.
    pub url: String,
    pub organization_name: String,
    pub project_name: String,
    /// Landing page content, as the client encodes it.
    pub lander_details: String,
    pub nav_image_dark: String,
    /// Footer link groups, as the client encodes them.
    pub footer_label_links: String,
    /// Navbar "more" links, as the client encodes them.
    pub more_label_links: String,
    /// Ask the generator to put the site behind a login.
    pub require_auth: bool,
}

/// Folder-like node grouping pages and sub-groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PageGroup {
    pub id: PageGroupId,
    pub name: String,
    pub documentation_id: DocumentationId,
    /// Parent group, `None` for top-level groups.
    pub parent_id: Option<PageGroupId>,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    /// Sibling tie-breaker assigned by bulk reorders (higher wins).
    #[serde(skip)]
    pub revision: i64,
    pub author_id: UserId,
    pub last_editor_id: Option<UserId>,
    #[sqlx(skip)]
    pub editors: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single page of content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub title: String,
    /// Unique among the pages of the same group (or top level).
    pub slug: String,
    pub content: String,
    pub documentation_id: DocumentationId,
    pub page_group_id: Option<PageGroupId>,
    #[sqlx(rename = "sort_order")]
    pub order: i64,
    #[serde(skip)]
    pub revision: i64,
    /// Landing page of its group.
    pub is_intro_page: bool,
    pub is_page: bool,
    pub author_id: UserId,
    pub last_editor_id: Option<UserId>,
    #[sqlx(skip)]
    pub editors: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a documentation supplied on create and edit.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentationFields {
    pub name: String,
    pub description: String,
    pub version: String,
    #[serde(rename = "baseURL", alias = "baseUrl")]
    pub base_url: String,
    pub favicon: String,
    pub meta_image: String,
    pub nav_image: String,
    #[serde(rename = "customCSS", alias = "customCss")]
    pub custom_css: String,
    pub copyright_text: String,
    #[serde(flatten)]
    pub site: SiteDetails,
}

/// Input for creating a page group.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPageGroup {
    pub name: String,
    pub documentation_id: DocumentationId,
    #[serde(default)]
    pub parent_id: Option<PageGroupId>,
    /// Sibling position; appended after the last sibling when absent.
    #[serde(default)]
    pub order: Option<i64>,
}

/// Input for editing a page group. `None` leaves a field unchanged.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGroupEdit {
    pub name: String,
    /// Must match the group's current documentation.
    pub documentation_id: DocumentationId,
    #[serde(default)]
    pub parent_id: Option<PageGroupId>,
    #[serde(default)]
    pub order: Option<i64>,
}

/// Input for creating a page.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPage {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub documentation_id: DocumentationId,
    #[serde(default)]
    pub page_group_id: Option<PageGroupId>,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub is_intro_page: bool,
    #[serde(default)]
    pub is_page: bool,
}

/// Input for editing a page.
///
/// Empty `content` keeps the stored content. `None` for `order` or
/// `page_group_id` leaves them unchanged; moving a page to the top level
/// goes through a bulk reorder.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEdit {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: Option<i64>,
    #[serde(default)]
    pub page_group_id: Option<PageGroupId>,
}
