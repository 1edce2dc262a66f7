//! SQLite-backed tree store.
//!
//! Every mutation runs in its own transaction. The build trigger for the
//! affected project is emitted only after the transaction commits; a failed
//! mutation rolls back and emits nothing.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::db::{self, EditorLinks};
use crate::error::TreeError;
use crate::hierarchy::DocumentationTree;
use crate::model::{
    BuildState, Documentation, DocumentationFields, DocumentationId, NewPage, NewPageGroup, Page,
    PageEdit, PageGroup, PageGroupEdit, PageGroupId, PageId, UserId,
};
use crate::schema;
use crate::trigger::{BuildTrigger, TriggerSink};
use crate::version::{ensure_version_segment_free, slugify};

/// Documentation tree store.
///
/// Cheap to clone: clones share the connection pool.
#[derive(Clone)]
pub struct TreeStore {
    pool: SqlitePool,
    sink: Arc<dyn TriggerSink>,
}

impl TreeStore {
    /// Open (or create) a database file.
    pub async fn open(path: &Path, sink: Arc<dyn TriggerSink>) -> Result<Self, TreeError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        tracing::debug!(path = %path.display(), "Opened tree database");
        Self::from_pool(pool, sink).await
    }

    /// Open a private in-memory database.
    ///
    /// The pool holds a single connection that never expires, so the database
    /// lives as long as the store.
    pub async fn in_memory(sink: Arc<dyn TriggerSink>) -> Result<Self, TreeError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(pool, sink).await
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub async fn from_pool(pool: SqlitePool, sink: Arc<dyn TriggerSink>) -> Result<Self, TreeError> {
        schema::migrate(&pool).await?;
        Ok(Self { pool, sink })
    }

    /// Same database, different trigger sink.
    #[must_use]
    pub fn with_sink(&self, sink: Arc<dyn TriggerSink>) -> Self {
        Self {
            pool: self.pool.clone(),
            sink,
        }
    }

    /// Underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) fn emit(&self, trigger: BuildTrigger) {
        tracing::debug!(
            documentation_id = trigger.documentation_id,
            project_id = trigger.project_id,
            force = trigger.force,
            "Build trigger emitted"
        );
        self.sink.enqueue(trigger);
    }

    // Documentation

    /// Create a root documentation.
    pub async fn create_documentation(
        &self,
        fields: DocumentationFields,
        actor: UserId,
    ) -> Result<Documentation, TreeError> {
        let name = required(&fields.name, "documentation name")?;
        let base_url = normalize_base_url(&fields.base_url)?;

        let mut tx = self.pool.begin().await?;
        db::ensure_base_url_free(&mut tx, &base_url, None).await?;

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO documentations (name, description, version, base_url, favicon, \
             meta_image, nav_image, custom_css, copyright_text, url, organization_name, \
             project_name, lander_details, nav_image_dark, footer_label_links, more_label_links, \
             require_auth, author_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(&fields.description)
        .bind(fields.version.trim())
        .bind(&base_url)
        .bind(&fields.favicon)
        .bind(&fields.meta_image)
        .bind(&fields.nav_image)
        .bind(&fields.custom_css)
        .bind(&fields.copyright_text)
        .bind(&fields.site.url)
        .bind(&fields.site.organization_name)
        .bind(&fields.site.project_name)
        .bind(&fields.site.lander_details)
        .bind(&fields.site.nav_image_dark)
        .bind(&fields.site.footer_label_links)
        .bind(&fields.site.more_label_links)
        .bind(fields.site.require_auth)
        .bind(actor)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        db::add_editor(&mut tx, EditorLinks::Documentation, id, actor).await?;
        let documentation = db::fetch_documentation(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(documentation_id = id, base_url = %base_url, "Documentation created");
        self.emit(BuildTrigger::debounced(id));
        Ok(documentation)
    }

    /// Replace the metadata of a documentation.
    pub async fn edit_documentation(
        &self,
        id: DocumentationId,
        fields: DocumentationFields,
        actor: UserId,
    ) -> Result<Documentation, TreeError> {
        let name = required(&fields.name, "documentation name")?;
        let base_url = normalize_base_url(&fields.base_url)?;

        let mut tx = self.pool.begin().await?;
        let current = db::fetch_documentation(&mut tx, id).await?;
        db::ensure_base_url_free(&mut tx, &base_url, Some(id)).await?;
        if let Some(root) = current.version_origin {
            let segment = slugify(&fields.version);
            if segment.is_empty() {
                return Err(TreeError::invalid(format!(
                    "invalid version label '{}'",
                    fields.version.trim()
                )));
            }
            ensure_version_segment_free(&mut tx, root, &segment, Some(id)).await?;
        }

        sqlx::query(
            "UPDATE documentations SET name = ?, description = ?, version = ?, base_url = ?, \
             favicon = ?, meta_image = ?, nav_image = ?, custom_css = ?, copyright_text = ?, \
             url = ?, organization_name = ?, project_name = ?, lander_details = ?, \
             nav_image_dark = ?, footer_label_links = ?, more_label_links = ?, require_auth = ?, \
             last_editor_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(&fields.description)
        .bind(fields.version.trim())
        .bind(&base_url)
        .bind(&fields.favicon)
        .bind(&fields.meta_image)
        .bind(&fields.nav_image)
        .bind(&fields.custom_css)
        .bind(&fields.copyright_text)
        .bind(&fields.site.url)
        .bind(&fields.site.organization_name)
        .bind(&fields.site.project_name)
        .bind(&fields.site.lander_details)
        .bind(&fields.site.nav_image_dark)
        .bind(&fields.site.footer_label_links)
        .bind(&fields.site.more_label_links)
        .bind(fields.site.require_auth)
        .bind(actor)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        db::add_editor(&mut tx, EditorLinks::Documentation, id, actor).await?;
        let key = db::build_key(&mut tx, id).await?;
        let documentation = db::fetch_documentation(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(documentation_id = id, "Documentation edited");
        self.emit(BuildTrigger::debounced(key));
        Ok(documentation)
    }

    /// Delete a documentation with all its content.
    ///
    /// Deleting a root also deletes its versions. The emitted trigger is keyed
    /// by the project the documentation belonged to, so the builder can purge
    /// the project (root deleted) or rebuild it (version deleted).
    pub async fn delete_documentation(&self, id: DocumentationId) -> Result<(), TreeError> {
        let mut tx = self.pool.begin().await?;
        db::fetch_documentation(&mut tx, id).await?;
        let key = db::build_key(&mut tx, id).await?;

        let versions = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM documentations WHERE version_origin = ?",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for version in &versions {
            db::purge_documentation(&mut tx, *version).await?;
        }
        db::purge_documentation(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(
            documentation_id = id,
            versions = versions.len(),
            "Documentation deleted"
        );
        self.emit(BuildTrigger::debounced(key));
        Ok(())
    }

    pub async fn get_documentation(&self, id: DocumentationId) -> Result<Documentation, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::fetch_documentation(&mut conn, id).await
    }

    /// All documentations, oldest first.
    pub async fn list_documentations(&self) -> Result<Vec<Documentation>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        let ids = sqlx::query_scalar::<_, i64>("SELECT id FROM documentations ORDER BY id")
            .fetch_all(&mut *conn)
            .await?;

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            docs.push(db::fetch_documentation(&mut conn, id).await?);
        }
        Ok(docs)
    }

    /// Versions cloned from a root documentation, oldest first.
    pub async fn list_versions(&self, root: DocumentationId) -> Result<Vec<Documentation>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::list_versions(&mut conn, root).await
    }

    /// Earliest ancestor on the version-origin chain, `None` for originals.
    pub async fn root_parent_id(
        &self,
        id: DocumentationId,
    ) -> Result<Option<DocumentationId>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::resolve_root(&mut conn, id).await
    }

    /// Scheduling key of a documentation: the root when present, else itself.
    pub async fn build_key(&self, id: DocumentationId) -> Result<DocumentationId, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::build_key(&mut conn, id).await
    }

    /// Record the outcome of a build. Does not emit a trigger.
    pub async fn record_build(
        &self,
        id: DocumentationId,
        state: BuildState,
        at: DateTime<Utc>,
    ) -> Result<(), TreeError> {
        let updated = sqlx::query(
            "UPDATE documentations SET build_status = ?, last_built_at = ? WHERE id = ?",
        )
        .bind(state)
        .bind(at)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(TreeError::not_found(crate::error::Entity::Documentation, id));
        }
        Ok(())
    }

    /// Consistent snapshot of a documentation's content tree.
    pub async fn load_tree(&self, id: DocumentationId) -> Result<DocumentationTree, TreeError> {
        let mut tx = self.pool.begin().await?;
        let documentation = db::fetch_documentation(&mut tx, id).await?;
        let groups = db::list_page_groups(&mut tx, id).await?;
        let pages = db::list_pages(&mut tx, id).await?;
        tx.commit().await?;

        Ok(DocumentationTree::new(documentation, groups, pages))
    }

    // Page groups

    pub async fn create_page_group(
        &self,
        new: NewPageGroup,
        actor: UserId,
    ) -> Result<PageGroup, TreeError> {
        let name = required(&new.name, "page group name")?;
        check_order(new.order)?;

        let mut tx = self.pool.begin().await?;
        db::require_documentation(&mut tx, new.documentation_id).await?;
        if let Some(parent) = new.parent_id {
            db::check_group_in_documentation(&mut tx, parent, new.documentation_id).await?;
        }

        let order = match new.order {
            Some(order) => order,
            None => db::next_order(&mut tx, new.documentation_id, new.parent_id).await?,
        };

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO page_groups (name, documentation_id, parent_id, sort_order, author_id, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(new.documentation_id)
        .bind(new.parent_id)
        .bind(order)
        .bind(actor)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        db::add_editor(&mut tx, EditorLinks::PageGroup, id, actor).await?;
        let key = db::build_key(&mut tx, new.documentation_id).await?;
        let group = db::fetch_page_group(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(page_group_id = id, documentation_id = new.documentation_id, "Page group created");
        self.emit(BuildTrigger::debounced(key));
        Ok(group)
    }

    /// Rename, reparent or reorder a page group.
    ///
    /// The owning documentation cannot change. Reparenting under itself or
    /// under one of its descendants is rejected.
    pub async fn edit_page_group(
        &self,
        id: PageGroupId,
        edit: PageGroupEdit,
        actor: UserId,
    ) -> Result<PageGroup, TreeError> {
        let name = required(&edit.name, "page group name")?;
        check_order(edit.order)?;

        let mut tx = self.pool.begin().await?;
        let group = db::fetch_page_group(&mut tx, id).await?;

        if edit.documentation_id != group.documentation_id {
            return Err(TreeError::invalid(format!(
                "page group {id} belongs to documentation {}",
                group.documentation_id
            )));
        }

        let parent = edit.parent_id.or(group.parent_id);
        if let Some(new_parent) = edit.parent_id {
            if new_parent == id {
                return Err(TreeError::invalid(format!(
                    "page group {id} cannot be its own parent"
                )));
            }
            db::check_group_in_documentation(&mut tx, new_parent, group.documentation_id).await?;
            let hierarchy = db::group_hierarchy(&mut tx, group.documentation_id).await?;
            if hierarchy.would_cycle(id, Some(new_parent)) {
                return Err(TreeError::invalid(format!(
                    "moving page group {id} under {new_parent} would create a cycle"
                )));
            }
        }

        sqlx::query(
            "UPDATE page_groups SET name = ?, parent_id = ?, sort_order = ?, last_editor_id = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(parent)
        .bind(edit.order.unwrap_or(group.order))
        .bind(actor)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        db::add_editor(&mut tx, EditorLinks::PageGroup, id, actor).await?;
        let key = db::build_key(&mut tx, group.documentation_id).await?;
        let group = db::fetch_page_group(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(page_group_id = id, "Page group edited");
        self.emit(BuildTrigger::debounced(key));
        Ok(group)
    }

    /// Delete an empty page group.
    ///
    /// Fails with `InvalidStructure` while the group still has pages or
    /// sub-groups.
    pub async fn delete_page_group(&self, id: PageGroupId) -> Result<(), TreeError> {
        let mut tx = self.pool.begin().await?;
        let group = db::fetch_page_group(&mut tx, id).await?;

        let children = db::child_count(&mut tx, id).await?;
        if children > 0 {
            return Err(TreeError::invalid(format!(
                "page group {id} still has {children} children"
            )));
        }

        db::clear_editors(&mut tx, EditorLinks::PageGroup, id).await?;
        sqlx::query("DELETE FROM page_groups WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let key = db::build_key(&mut tx, group.documentation_id).await?;
        tx.commit().await?;

        tracing::debug!(page_group_id = id, "Page group deleted");
        self.emit(BuildTrigger::debounced(key));
        Ok(())
    }

    pub async fn get_page_group(&self, id: PageGroupId) -> Result<PageGroup, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::fetch_page_group(&mut conn, id).await
    }

    /// Pages directly inside a group, in sibling order.
    pub async fn get_pages_of_group(&self, id: PageGroupId) -> Result<Vec<Page>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::fetch_page_group(&mut conn, id).await?;
        Ok(db::pages_in_group(&mut conn, id).await?)
    }

    /// All groups of a documentation, in sibling order.
    pub async fn list_page_groups(
        &self,
        documentation_id: DocumentationId,
    ) -> Result<Vec<PageGroup>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::require_documentation(&mut conn, documentation_id).await?;
        Ok(db::list_page_groups(&mut conn, documentation_id).await?)
    }

    // Pages

    pub async fn create_page(&self, new: NewPage, actor: UserId) -> Result<Page, TreeError> {
        let title = required(&new.title, "page title")?;
        let slug = required(&new.slug, "page slug")?;
        check_order(new.order)?;

        let mut tx = self.pool.begin().await?;
        db::require_documentation(&mut tx, new.documentation_id).await?;
        if let Some(group) = new.page_group_id {
            db::check_group_in_documentation(&mut tx, group, new.documentation_id).await?;
        }
        db::ensure_slug_free(&mut tx, new.documentation_id, new.page_group_id, slug, None).await?;

        let order = match new.order {
            Some(order) => order,
            None => db::next_order(&mut tx, new.documentation_id, new.page_group_id).await?,
        };

        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO pages (title, slug, content, documentation_id, page_group_id, sort_order, \
             is_intro_page, is_page, author_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(slug)
        .bind(&new.content)
        .bind(new.documentation_id)
        .bind(new.page_group_id)
        .bind(order)
        .bind(new.is_intro_page)
        .bind(new.is_page)
        .bind(actor)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        db::add_editor(&mut tx, EditorLinks::Page, id, actor).await?;
        let key = db::build_key(&mut tx, new.documentation_id).await?;
        let page = db::fetch_page(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(page_id = id, documentation_id = new.documentation_id, "Page created");
        self.emit(BuildTrigger::debounced(key));
        Ok(page)
    }

    /// Edit a page. Empty `content` keeps the stored content.
    pub async fn edit_page(&self, id: PageId, edit: PageEdit, actor: UserId) -> Result<Page, TreeError> {
        let title = required(&edit.title, "page title")?;
        let slug = required(&edit.slug, "page slug")?;
        check_order(edit.order)?;

        let mut tx = self.pool.begin().await?;
        let page = db::fetch_page(&mut tx, id).await?;

        let group = edit.page_group_id.or(page.page_group_id);
        if let Some(new_group) = edit.page_group_id {
            db::check_group_in_documentation(&mut tx, new_group, page.documentation_id).await?;
        }
        db::ensure_slug_free(&mut tx, page.documentation_id, group, slug, Some(id)).await?;

        let content = if edit.content.is_empty() {
            page.content
        } else {
            edit.content
        };

        sqlx::query(
            "UPDATE pages SET title = ?, slug = ?, content = ?, page_group_id = ?, sort_order = ?, \
             last_editor_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(title)
        .bind(slug)
        .bind(&content)
        .bind(group)
        .bind(edit.order.unwrap_or(page.order))
        .bind(actor)
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        db::add_editor(&mut tx, EditorLinks::Page, id, actor).await?;
        let key = db::build_key(&mut tx, page.documentation_id).await?;
        let page = db::fetch_page(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(page_id = id, "Page edited");
        self.emit(BuildTrigger::debounced(key));
        Ok(page)
    }

    pub async fn delete_page(&self, id: PageId) -> Result<(), TreeError> {
        let mut tx = self.pool.begin().await?;
        let page = db::fetch_page(&mut tx, id).await?;

        db::clear_editors(&mut tx, EditorLinks::Page, id).await?;
        sqlx::query("DELETE FROM pages WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let key = db::build_key(&mut tx, page.documentation_id).await?;
        tx.commit().await?;

        tracing::debug!(page_id = id, "Page deleted");
        self.emit(BuildTrigger::debounced(key));
        Ok(())
    }

    pub async fn get_page(&self, id: PageId) -> Result<Page, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::fetch_page(&mut conn, id).await
    }

    /// All pages of a documentation, in sibling order.
    pub async fn list_pages(&self, documentation_id: DocumentationId) -> Result<Vec<Page>, TreeError> {
        let mut conn = self.pool.acquire().await?;
        db::require_documentation(&mut conn, documentation_id).await?;
        Ok(db::list_pages(&mut conn, documentation_id).await?)
    }
}

/// Normalise a base URL to `/prefix/` form.
///
/// Blank input becomes `/`. Dot segments are rejected.
pub fn normalize_base_url(raw: &str) -> Result<String, TreeError> {
    let inner = raw.trim().trim_matches('/');
    if inner.is_empty() {
        return Ok("/".to_owned());
    }
    if inner
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(TreeError::invalid(format!("invalid base URL '{raw}'")));
    }
    Ok(format!("/{inner}/"))
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, TreeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeError::invalid(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

pub(crate) fn check_order(order: Option<i64>) -> Result<(), TreeError> {
    match order {
        Some(order) if order < 0 => Err(TreeError::invalid(format!(
            "order must not be negative (got {order})"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TreeErrorKind;
    use crate::trigger::RecordingSink;

    pub(crate) async fn setup() -> (TreeStore, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let store = TreeStore::in_memory(Arc::clone(&sink) as Arc<dyn TriggerSink>)
            .await
            .unwrap();
        (store, sink)
    }

    pub(crate) fn fields(name: &str, base_url: &str) -> DocumentationFields {
        DocumentationFields {
            name: name.to_owned(),
            version: "1.0".to_owned(),
            base_url: base_url.to_owned(),
            ..DocumentationFields::default()
        }
    }

    pub(crate) fn new_group(doc: DocumentationId, name: &str, parent: Option<PageGroupId>) -> NewPageGroup {
        NewPageGroup {
            name: name.to_owned(),
            documentation_id: doc,
            parent_id: parent,
            order: None,
        }
    }

    pub(crate) fn new_page(doc: DocumentationId, slug: &str, group: Option<PageGroupId>) -> NewPage {
        NewPage {
            title: slug.to_uppercase(),
            slug: slug.to_owned(),
            content: format!("# {slug}"),
            documentation_id: doc,
            page_group_id: group,
            order: None,
            is_intro_page: false,
            is_page: true,
        }
    }

    fn page_edit(title: &str, slug: &str, content: &str) -> PageEdit {
        PageEdit {
            title: title.to_owned(),
            slug: slug.to_owned(),
            content: content.to_owned(),
            order: None,
            page_group_id: None,
        }
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("docs").unwrap(), "/docs/");
        assert_eq!(normalize_base_url(" /docs/v2 ").unwrap(), "/docs/v2/");
        assert_eq!(normalize_base_url("").unwrap(), "/");
        assert!(normalize_base_url("/docs/../etc/").is_err());
        assert!(normalize_base_url("/a//b/").is_err());
    }

    #[tokio::test]
    async fn test_create_documentation_emits_trigger() {
        let (store, sink) = setup().await;

        let doc = store.create_documentation(fields("Guide", "guide"), 7).await.unwrap();

        assert_eq!(doc.base_url, "/guide/");
        assert_eq!(doc.author_id, 7);
        assert_eq!(doc.editors, vec![7]);
        assert_eq!(doc.build_status, BuildState::Never);
        assert_eq!(sink.keys(), vec![(doc.id, false)]);
    }

    #[tokio::test]
    async fn test_create_documentation_rejects_duplicate_base_url() {
        let (store, sink) = setup().await;
        store.create_documentation(fields("A", "/docs/"), 1).await.unwrap();
        sink.take();

        let err = store
            .create_documentation(fields("B", "docs"), 1)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::Conflict);
        assert!(sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_site_details_are_stored_and_edited() {
        let (store, _sink) = setup().await;
        let mut input = fields("A", "/a/");
        input.site = crate::model::SiteDetails {
            url: "https://docs.acme.dev".to_owned(),
            organization_name: "Acme".to_owned(),
            footer_label_links: r#"[{"label":"Blog"}]"#.to_owned(),
            require_auth: true,
            ..crate::model::SiteDetails::default()
        };
        let doc = store.create_documentation(input.clone(), 1).await.unwrap();
        assert_eq!(doc.site, input.site);

        input.site.require_auth = false;
        input.site.nav_image_dark = "/dark.png".to_owned();
        let edited = store.edit_documentation(doc.id, input.clone(), 1).await.unwrap();

        assert_eq!(edited.site, input.site);
        assert_eq!(store.get_documentation(doc.id).await.unwrap().site, input.site);
    }

    #[tokio::test]
    async fn test_edit_documentation_tracks_editors() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();

        store.edit_documentation(doc.id, fields("A2", "/a/"), 2).await.unwrap();
        let edited = store.edit_documentation(doc.id, fields("A3", "/a/"), 1).await.unwrap();

        assert_eq!(edited.name, "A3");
        assert_eq!(edited.author_id, 1);
        assert_eq!(edited.last_editor_id, Some(1));
        assert_eq!(edited.editors, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_get_missing_entities() {
        let (store, _sink) = setup().await;

        assert_eq!(store.get_documentation(9).await.unwrap_err().code(), "documentation_not_found");
        assert_eq!(store.get_page_group(9).await.unwrap_err().code(), "page_group_not_found");
        assert_eq!(store.get_page(9).await.unwrap_err().code(), "page_not_found");
        assert_eq!(store.root_parent_id(9).await.unwrap_err().kind(), TreeErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_root_parent_id_of_original_is_none() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();

        assert_eq!(store.root_parent_id(doc.id).await.unwrap(), None);
        assert_eq!(store.build_key(doc.id).await.unwrap(), doc.id);
    }

    #[tokio::test]
    async fn test_create_page_group_appends_order() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        sink.take();

        let first = store.create_page_group(new_group(doc.id, "One", None), 1).await.unwrap();
        let page = store.create_page(new_page(doc.id, "intro", None), 1).await.unwrap();
        let second = store.create_page_group(new_group(doc.id, "Two", None), 1).await.unwrap();

        assert_eq!(first.order, 0);
        assert_eq!(page.order, 1);
        assert_eq!(second.order, 2);
        assert_eq!(sink.keys(), vec![(doc.id, false); 3]);
    }

    #[tokio::test]
    async fn test_create_page_group_rejects_cross_documentation_parent() {
        let (store, sink) = setup().await;
        let a = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let b = store.create_documentation(fields("B", "/b/"), 1).await.unwrap();
        let group_a = store.create_page_group(new_group(a.id, "G", None), 1).await.unwrap();
        sink.take();

        let err = store
            .create_page_group(new_group(b.id, "H", Some(group_a.id)), 1)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
        assert!(sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_negative_order_rejected() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();

        let mut group = new_group(doc.id, "G", None);
        group.order = Some(-1);
        let err = store.create_page_group(group, 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_edit_page_group_rejects_cycle() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let outer = store.create_page_group(new_group(doc.id, "Outer", None), 1).await.unwrap();
        let inner = store
            .create_page_group(new_group(doc.id, "Inner", Some(outer.id)), 1)
            .await
            .unwrap();

        let edit = PageGroupEdit {
            name: "Outer".to_owned(),
            documentation_id: doc.id,
            parent_id: Some(inner.id),
            order: None,
        };
        let err = store.edit_page_group(outer.id, edit, 1).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);

        let self_parent = PageGroupEdit {
            name: "Outer".to_owned(),
            documentation_id: doc.id,
            parent_id: Some(outer.id),
            order: None,
        };
        let err = store.edit_page_group(outer.id, self_parent, 1).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_edit_page_group_cannot_change_documentation() {
        let (store, _sink) = setup().await;
        let a = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let b = store.create_documentation(fields("B", "/b/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(a.id, "G", None), 1).await.unwrap();

        let edit = PageGroupEdit {
            name: "G".to_owned(),
            documentation_id: b.id,
            parent_id: None,
            order: None,
        };
        let err = store.edit_page_group(group.id, edit, 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_edit_page_group_keeps_parent_when_absent() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let outer = store.create_page_group(new_group(doc.id, "Outer", None), 1).await.unwrap();
        let inner = store
            .create_page_group(new_group(doc.id, "Inner", Some(outer.id)), 1)
            .await
            .unwrap();

        let edit = PageGroupEdit {
            name: "Renamed".to_owned(),
            documentation_id: doc.id,
            parent_id: None,
            order: Some(4),
        };
        let edited = store.edit_page_group(inner.id, edit, 2).await.unwrap();

        assert_eq!(edited.name, "Renamed");
        assert_eq!(edited.parent_id, Some(outer.id));
        assert_eq!(edited.order, 4);
        assert_eq!(edited.editors, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_delete_page_group_with_children_fails() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        let page = store.create_page(new_page(doc.id, "p", Some(group.id)), 1).await.unwrap();
        sink.take();

        let err = store.delete_page_group(group.id).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
        assert!(sink.keys().is_empty());

        store.delete_page(page.id).await.unwrap();
        store.delete_page_group(group.id).await.unwrap();

        assert_eq!(sink.keys(), vec![(doc.id, false), (doc.id, false)]);
        assert_eq!(store.get_page_group(group.id).await.unwrap_err().kind(), TreeErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_page_group_with_subgroup_fails() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let outer = store.create_page_group(new_group(doc.id, "Outer", None), 1).await.unwrap();
        store
            .create_page_group(new_group(doc.id, "Inner", Some(outer.id)), 1)
            .await
            .unwrap();

        let err = store.delete_page_group(outer.id).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_create_page_rejects_duplicate_sibling_slug() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        store.create_page(new_page(doc.id, "intro", None), 1).await.unwrap();

        let err = store.create_page(new_page(doc.id, "intro", None), 1).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);

        // Same slug in another group is fine.
        store.create_page(new_page(doc.id, "intro", Some(group.id)), 1).await.unwrap();
    }

    #[tokio::test]
    async fn test_edit_page_empty_content_keeps_existing() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let page = store.create_page(new_page(doc.id, "intro", None), 1).await.unwrap();

        let kept = store
            .edit_page(page.id, page_edit("Intro", "intro", ""), 2)
            .await
            .unwrap();
        assert_eq!(kept.content, "# intro");
        assert_eq!(kept.title, "Intro");

        let replaced = store
            .edit_page(page.id, page_edit("Intro", "intro", "new body"), 2)
            .await
            .unwrap();
        assert_eq!(replaced.content, "new body");
        assert_eq!(replaced.editors, vec![1, 2]);
        assert_eq!(replaced.last_editor_id, Some(2));
    }

    #[tokio::test]
    async fn test_edit_page_moves_into_group() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        let page = store.create_page(new_page(doc.id, "p", None), 1).await.unwrap();

        let mut edit = page_edit("P", "p", "");
        edit.page_group_id = Some(group.id);
        store.edit_page(page.id, edit, 1).await.unwrap();

        let pages = store.get_pages_of_group(group.id).await.unwrap();
        assert_eq!(pages.iter().map(|p| p.id).collect::<Vec<_>>(), vec![page.id]);
    }

    #[tokio::test]
    async fn test_list_pages_in_sibling_order() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();

        let mut late = new_page(doc.id, "late", None);
        late.order = Some(5);
        store.create_page(late, 1).await.unwrap();
        let mut early = new_page(doc.id, "early", None);
        early.order = Some(1);
        store.create_page(early, 1).await.unwrap();

        let slugs: Vec<String> = store
            .list_pages(doc.id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["early".to_owned(), "late".to_owned()]);
    }

    #[tokio::test]
    async fn test_delete_documentation_removes_content() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        store
            .create_page_group(new_group(doc.id, "H", Some(group.id)), 1)
            .await
            .unwrap();
        store.create_page(new_page(doc.id, "p", Some(group.id)), 1).await.unwrap();
        sink.take();

        store.delete_documentation(doc.id).await.unwrap();

        assert_eq!(sink.keys(), vec![(doc.id, false)]);
        assert!(store.list_documentations().await.unwrap().is_empty());
        let pages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(pages, 0);
    }

    #[tokio::test]
    async fn test_record_build() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        sink.take();

        let at = Utc::now();
        store.record_build(doc.id, BuildState::Succeeded, at).await.unwrap();

        let doc = store.get_documentation(doc.id).await.unwrap();
        assert_eq!(doc.build_status, BuildState::Succeeded);
        assert!(doc.last_built_at.is_some());
        assert!(sink.keys().is_empty());
        assert_eq!(
            store.record_build(99, BuildState::Failed, at).await.unwrap_err().kind(),
            TreeErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_load_tree() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("A", "/a/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        store.create_page(new_page(doc.id, "a", Some(group.id)), 1).await.unwrap();
        store.create_page(new_page(doc.id, "b", None), 1).await.unwrap();

        let tree = store.load_tree(doc.id).await.unwrap();

        assert_eq!(tree.documentation().id, doc.id);
        assert_eq!(tree.walk().len(), 3);
        assert_eq!(tree.roots().count(), 2);
        assert_eq!(tree.children_of(group.id).len(), 1);
    }
}
