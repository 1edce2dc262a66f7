//! Version cloning.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::{self, EditorLinks};
use crate::error::TreeError;
use crate::model::{Documentation, DocumentationId, PageGroupId, UserId};
use crate::store::TreeStore;
use crate::trigger::BuildTrigger;

/// Turn a version label into a URL path segment.
///
/// Lowercases ASCII letters, keeps digits, `.`, `-` and `_`, and collapses
/// any other run of characters into a single `-`. Returns an empty string
/// for labels with nothing usable (including `.` and `..`).
#[must_use]
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_dash = false;

    for ch in label.trim().chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.chars().all(|c| c == '.') {
        return String::new();
    }
    slug
}

/// Fail with `conflict` if another version of `root` already slugifies to
/// `segment`. Versions of a project share one site, one directory each.
pub(crate) async fn ensure_version_segment_free(
    conn: &mut SqliteConnection,
    root: DocumentationId,
    segment: &str,
    exclude: Option<DocumentationId>,
) -> Result<(), TreeError> {
    let labels = sqlx::query_as::<_, (DocumentationId, String)>(
        "SELECT id, version FROM documentations WHERE version_origin = ? AND id IS NOT ?",
    )
    .bind(root)
    .bind(exclude)
    .fetch_all(&mut *conn)
    .await?;

    if let Some((id, label)) = labels.iter().find(|(_, label)| slugify(label) == segment) {
        return Err(TreeError::Conflict(format!(
            "version '{label}' ({id}) already uses the directory '{segment}'"
        )));
    }
    Ok(())
}

impl TreeStore {
    /// Deep-clone a documentation into a new version of its project.
    ///
    /// The clone's version origin is the project root (cloning a version
    /// clones that version's content but still points at the root). Its base
    /// URL is the root's base URL followed by the slugified label. Groups and
    /// pages get new ids with parent links, sibling orders, flags, authors
    /// and editors preserved. Build status starts over.
    ///
    /// Emits a forced trigger for the new version, scheduled under its
    /// project.
    pub async fn create_version(
        &self,
        original_id: DocumentationId,
        label: &str,
        actor: UserId,
    ) -> Result<Documentation, TreeError> {
        let label = label.trim();
        let slug = slugify(label);
        if slug.is_empty() {
            return Err(TreeError::invalid(format!("invalid version label '{label}'")));
        }

        let mut tx = self.pool().begin().await?;
        let original = db::fetch_documentation(&mut tx, original_id).await?;
        let root_id = db::build_key(&mut tx, original_id).await?;
        let root = db::fetch_documentation(&mut tx, root_id).await?;

        let base_url = format!("{}{slug}/", root.base_url);
        db::ensure_base_url_free(&mut tx, &base_url, None).await?;
        ensure_version_segment_free(&mut tx, root_id, &slug, None).await?;

        let now = Utc::now();
        let new_id = sqlx::query(
            "INSERT INTO documentations (name, description, version, base_url, version_origin, \
             favicon, meta_image, nav_image, custom_css, copyright_text, url, organization_name, \
             project_name, lander_details, nav_image_dark, footer_label_links, more_label_links, \
             require_auth, author_id, last_editor_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&original.name)
        .bind(&original.description)
        .bind(label)
        .bind(&base_url)
        .bind(root_id)
        .bind(&original.favicon)
        .bind(&original.meta_image)
        .bind(&original.nav_image)
        .bind(&original.custom_css)
        .bind(&original.copyright_text)
        .bind(&original.site.url)
        .bind(&original.site.organization_name)
        .bind(&original.site.project_name)
        .bind(&original.site.lander_details)
        .bind(&original.site.nav_image_dark)
        .bind(&original.site.footer_label_links)
        .bind(&original.site.more_label_links)
        .bind(original.site.require_auth)
        .bind(original.author_id)
        .bind(actor)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        db::add_editors(&mut tx, EditorLinks::Documentation, new_id, &original.editors).await?;
        db::add_editor(&mut tx, EditorLinks::Documentation, new_id, actor).await?;

        // Groups, parents before children.
        let mut remaining = db::list_page_groups(&mut tx, original_id).await?;
        let mut mapped: HashMap<PageGroupId, PageGroupId> = HashMap::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|g| g.parent_id.is_none_or(|p| mapped.contains_key(&p)));

            if ready.is_empty() {
                return Err(TreeError::invalid(format!(
                    "page groups of documentation {original_id} do not form a tree"
                )));
            }

            for group in ready {
                let parent = group.parent_id.and_then(|p| mapped.get(&p).copied());
                let id = sqlx::query(
                    "INSERT INTO page_groups (name, documentation_id, parent_id, sort_order, \
                     revision, author_id, last_editor_id, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&group.name)
                .bind(new_id)
                .bind(parent)
                .bind(group.order)
                .bind(group.revision)
                .bind(group.author_id)
                .bind(group.last_editor_id)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?
                .last_insert_rowid();

                db::add_editors(&mut tx, EditorLinks::PageGroup, id, &group.editors).await?;
                mapped.insert(group.id, id);
            }

            remaining = blocked;
        }

        let pages = db::list_pages(&mut tx, original_id).await?;
        for page in &pages {
            let group = match page.page_group_id {
                Some(old) => Some(mapped.get(&old).copied().ok_or_else(|| {
                    TreeError::invalid(format!("page {} references unknown group {old}", page.id))
                })?),
                None => None,
            };

            let id = sqlx::query(
                "INSERT INTO pages (title, slug, content, documentation_id, page_group_id, \
                 sort_order, revision, is_intro_page, is_page, author_id, last_editor_id, \
                 created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&page.title)
            .bind(&page.slug)
            .bind(&page.content)
            .bind(new_id)
            .bind(group)
            .bind(page.order)
            .bind(page.revision)
            .bind(page.is_intro_page)
            .bind(page.is_page)
            .bind(page.author_id)
            .bind(page.last_editor_id)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            db::add_editors(&mut tx, EditorLinks::Page, id, &page.editors).await?;
        }

        let version = db::fetch_documentation(&mut tx, new_id).await?;
        tx.commit().await?;

        tracing::info!(
            documentation_id = new_id,
            origin = root_id,
            version = %label,
            groups = mapped.len(),
            pages = pages.len(),
            "Version created"
        );
        self.emit(BuildTrigger::forced(new_id).in_project(root_id));
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::TreeErrorKind;
    use crate::hierarchy::TreeNode;
    use crate::store::tests::{fields, new_group, new_page, setup};

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("v2"), "v2");
        assert_eq!(slugify("1.0"), "1.0");
        assert_eq!(slugify(" Release Candidate 3 "), "release-candidate-3");
        assert_eq!(slugify("2.x / LTS"), "2.x-lts");
        assert_eq!(slugify(".."), "");
        assert_eq!(slugify("!!!"), "");
    }

    /// Tree shape as `(depth, kind, label, order)` rows, ids erased.
    async fn shape(store: &TreeStore, id: DocumentationId) -> Vec<(usize, &'static str, String, i64)> {
        let tree = store.load_tree(id).await.unwrap();
        tree.walk()
            .into_iter()
            .map(|(depth, node)| match node {
                TreeNode::Group(g) => (depth, "group", g.name.clone(), g.order),
                TreeNode::Page(p) => (depth, "page", p.slug.clone(), p.order),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_create_version_clones_structure() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let outer = store.create_page_group(new_group(doc.id, "Outer", None), 1).await.unwrap();
        let inner = store
            .create_page_group(new_group(doc.id, "Inner", Some(outer.id)), 2)
            .await
            .unwrap();
        store.create_page(new_page(doc.id, "intro", None), 1).await.unwrap();
        store.create_page(new_page(doc.id, "setup", Some(outer.id)), 2).await.unwrap();
        let mut deep = new_page(doc.id, "deep", Some(inner.id));
        deep.order = Some(7);
        deep.is_intro_page = true;
        store.create_page(deep, 3).await.unwrap();
        sink.take();

        let version = store.create_version(doc.id, "v2", 5).await.unwrap();

        assert_eq!(version.version, "v2");
        assert_eq!(version.base_url, "/docs/v2/");
        assert_eq!(version.version_origin, Some(doc.id));
        assert_eq!(version.editors, vec![1, 5]);
        assert_eq!(shape(&store, version.id).await, shape(&store, doc.id).await);

        let cloned = store.list_pages(version.id).await.unwrap();
        let deep = cloned.iter().find(|p| p.slug == "deep").unwrap();
        assert!(deep.is_intro_page);
        assert_eq!(deep.author_id, 3);
        assert!(cloned.iter().all(|p| p.documentation_id == version.id));

        let groups = store.list_page_groups(version.id).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.id != outer.id && g.id != inner.id));

        let triggers = sink.take();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].documentation_id, version.id);
        assert_eq!(triggers[0].project_id, doc.id);
        assert!(triggers[0].force);
        assert_eq!(store.root_parent_id(version.id).await.unwrap(), Some(doc.id));
    }

    #[tokio::test]
    async fn test_version_copies_site_details() {
        let (store, _sink) = setup().await;
        let mut input = fields("Guide", "/docs/");
        input.site.project_name = "Guide".to_owned();
        input.site.require_auth = true;
        let doc = store.create_documentation(input, 1).await.unwrap();

        let version = store.create_version(doc.id, "v2", 1).await.unwrap();

        assert_eq!(version.site, doc.site);
    }

    #[tokio::test]
    async fn test_edit_version_label_clash_is_conflict() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let v2 = store.create_version(doc.id, "v2", 1).await.unwrap();
        let v3 = store.create_version(doc.id, "v3", 1).await.unwrap();

        // Relabel v3 so it would share v2's directory.
        let mut relabel = fields("Guide", &v3.base_url);
        relabel.version = "V2".to_owned();
        let err = store.edit_documentation(v3.id, relabel, 1).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::Conflict);

        // Same label on the version itself is fine.
        let mut same = fields("Guide", &v2.base_url);
        same.version = "v2".to_owned();
        store.edit_documentation(v2.id, same, 1).await.unwrap();

        // A label that slugifies to nothing has no directory.
        let mut blank = fields("Guide", &v3.base_url);
        blank.version = "!!".to_owned();
        let err = store.edit_documentation(v3.id, blank, 1).await.unwrap_err();
        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_create_version_rejects_relabelled_segment() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let v2 = store.create_version(doc.id, "v2", 1).await.unwrap();
        let mut relabel = fields("Guide", &v2.base_url);
        relabel.version = "beta".to_owned();
        store.edit_documentation(v2.id, relabel, 1).await.unwrap();

        // `/docs/beta/` is free as a URL, but the directory is taken.
        let err = store.create_version(doc.id, "Beta", 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_version_of_version_points_at_root() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let v2 = store.create_version(doc.id, "v2", 1).await.unwrap();
        sink.take();

        let v3 = store.create_version(v2.id, "v3", 1).await.unwrap();

        assert_eq!(v3.version_origin, Some(doc.id));
        assert_eq!(v3.base_url, "/docs/v3/");
        assert_eq!(sink.keys(), vec![(doc.id, true)]);
    }

    #[tokio::test]
    async fn test_edits_in_version_trigger_root() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let version = store.create_version(doc.id, "v2", 1).await.unwrap();
        sink.take();

        store.create_page(new_page(version.id, "new", None), 1).await.unwrap();

        assert_eq!(sink.keys(), vec![(doc.id, false)]);
    }

    #[tokio::test]
    async fn test_create_version_label_clash_is_conflict() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        store.create_version(doc.id, "v2", 1).await.unwrap();

        let err = store.create_version(doc.id, "V2", 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_create_version_rejects_blank_label() {
        let (store, _sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();

        let err = store.create_version(doc.id, "  ", 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::InvalidStructure);
    }

    #[tokio::test]
    async fn test_create_version_missing_original() {
        let (store, sink) = setup().await;

        let err = store.create_version(42, "v2", 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::NotFound);
        assert!(sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_create_version_rolls_back_on_failure() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let group = store.create_page_group(new_group(doc.id, "G", None), 1).await.unwrap();
        store.create_page(new_page(doc.id, "p", Some(group.id)), 1).await.unwrap();
        sink.take();

        // Fail the first page insert of the clone, after groups were copied.
        sqlx::raw_sql(
            "CREATE TEMP TRIGGER fail_clone BEFORE INSERT ON pages \
             WHEN NEW.documentation_id <> 1 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .execute(store.pool())
        .await
        .unwrap();

        let err = store.create_version(doc.id, "v2", 1).await.unwrap_err();

        assert_eq!(err.kind(), TreeErrorKind::Conflict);
        assert_eq!(store.list_documentations().await.unwrap().len(), 1);
        let groups: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM page_groups")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(groups, 1);
        assert!(sink.keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_root_removes_versions() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        store.create_page(new_page(doc.id, "p", None), 1).await.unwrap();
        store.create_version(doc.id, "v2", 1).await.unwrap();
        sink.take();

        store.delete_documentation(doc.id).await.unwrap();

        assert!(store.list_documentations().await.unwrap().is_empty());
        assert_eq!(sink.keys(), vec![(doc.id, false)]);
    }

    #[tokio::test]
    async fn test_delete_version_triggers_root() {
        let (store, sink) = setup().await;
        let doc = store.create_documentation(fields("Guide", "/docs/"), 1).await.unwrap();
        let version = store.create_version(doc.id, "v2", 1).await.unwrap();
        sink.take();

        store.delete_documentation(version.id).await.unwrap();

        assert_eq!(store.list_versions(doc.id).await.unwrap().len(), 0);
        assert_eq!(sink.keys(), vec![(doc.id, false)]);
    }
}
