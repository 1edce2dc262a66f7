//! Connection-level queries shared by the store, reorder and version code.
//!
//! Every helper takes a `&mut SqliteConnection` so it can run inside the
//! caller's transaction.

use std::collections::{HashMap, HashSet};

use sqlx::SqliteConnection;

use crate::error::{Entity, TreeError};
use crate::hierarchy::GroupHierarchy;
use crate::model::{Documentation, DocumentationId, Page, PageGroup, PageGroupId, PageId, UserId};

/// Sibling listing order: order, then most recent reorder, then id.
const SIBLING_ORDER: &str = "ORDER BY sort_order, revision DESC, id";

/// Editor join tables.
#[derive(Clone, Copy, Debug)]
pub(crate) enum EditorLinks {
    Documentation,
    PageGroup,
    Page,
}

impl EditorLinks {
    fn select_sql(self) -> &'static str {
        match self {
            Self::Documentation => {
                "SELECT user_id FROM documentation_editors WHERE documentation_id = ? ORDER BY rowid"
            }
            Self::PageGroup => {
                "SELECT user_id FROM page_group_editors WHERE page_group_id = ? ORDER BY rowid"
            }
            Self::Page => "SELECT user_id FROM page_editors WHERE page_id = ? ORDER BY rowid",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            Self::Documentation => {
                "INSERT OR IGNORE INTO documentation_editors (documentation_id, user_id) VALUES (?, ?)"
            }
            Self::PageGroup => {
                "INSERT OR IGNORE INTO page_group_editors (page_group_id, user_id) VALUES (?, ?)"
            }
            Self::Page => "INSERT OR IGNORE INTO page_editors (page_id, user_id) VALUES (?, ?)",
        }
    }

    fn clear_sql(self) -> &'static str {
        match self {
            Self::Documentation => "DELETE FROM documentation_editors WHERE documentation_id = ?",
            Self::PageGroup => "DELETE FROM page_group_editors WHERE page_group_id = ?",
            Self::Page => "DELETE FROM page_editors WHERE page_id = ?",
        }
    }
}

/// Add a user to an entity's editor set. Adding an existing editor is a no-op.
pub(crate) async fn add_editor(
    conn: &mut SqliteConnection,
    links: EditorLinks,
    id: i64,
    user: UserId,
) -> Result<(), sqlx::Error> {
    sqlx::query(links.insert_sql())
        .bind(id)
        .bind(user)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Copy a list of editors onto an entity, keeping their order.
pub(crate) async fn add_editors(
    conn: &mut SqliteConnection,
    links: EditorLinks,
    id: i64,
    users: &[UserId],
) -> Result<(), sqlx::Error> {
    for user in users {
        add_editor(conn, links, id, *user).await?;
    }
    Ok(())
}

/// Editors of an entity in the order they were first added.
pub(crate) async fn editors(
    conn: &mut SqliteConnection,
    links: EditorLinks,
    id: i64,
) -> Result<Vec<UserId>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(links.select_sql())
        .bind(id)
        .fetch_all(&mut *conn)
        .await
}

/// Remove every editor link of an entity.
pub(crate) async fn clear_editors(
    conn: &mut SqliteConnection,
    links: EditorLinks,
    id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(links.clear_sql())
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn editor_map(
    conn: &mut SqliteConnection,
    sql: &str,
    id: i64,
) -> Result<HashMap<i64, Vec<UserId>>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64)>(sql)
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

    let mut map: HashMap<i64, Vec<UserId>> = HashMap::new();
    for (owner, user) in rows {
        map.entry(owner).or_default().push(user);
    }
    Ok(map)
}

pub(crate) async fn fetch_documentation(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<Documentation, TreeError> {
    let mut doc = sqlx::query_as::<_, Documentation>("SELECT * FROM documentations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| TreeError::not_found(Entity::Documentation, id))?;
    doc.editors = editors(conn, EditorLinks::Documentation, id).await?;
    Ok(doc)
}

pub(crate) async fn fetch_page_group(
    conn: &mut SqliteConnection,
    id: PageGroupId,
) -> Result<PageGroup, TreeError> {
    let mut group = sqlx::query_as::<_, PageGroup>("SELECT * FROM page_groups WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| TreeError::not_found(Entity::PageGroup, id))?;
    group.editors = editors(conn, EditorLinks::PageGroup, id).await?;
    Ok(group)
}

pub(crate) async fn fetch_page(conn: &mut SqliteConnection, id: PageId) -> Result<Page, TreeError> {
    let mut page = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| TreeError::not_found(Entity::Page, id))?;
    page.editors = editors(conn, EditorLinks::Page, id).await?;
    Ok(page)
}

/// Fail with `NotFound` unless the documentation exists.
pub(crate) async fn require_documentation(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<(), TreeError> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM documentations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(TreeError::not_found(Entity::Documentation, id)),
    }
}

/// All groups of a documentation, in sibling order, with editors.
pub(crate) async fn list_page_groups(
    conn: &mut SqliteConnection,
    documentation_id: DocumentationId,
) -> Result<Vec<PageGroup>, sqlx::Error> {
    let mut groups = sqlx::query_as::<_, PageGroup>(&format!(
        "SELECT * FROM page_groups WHERE documentation_id = ? {SIBLING_ORDER}"
    ))
    .bind(documentation_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut editors = editor_map(
        conn,
        "SELECT e.page_group_id, e.user_id FROM page_group_editors e \
         JOIN page_groups g ON g.id = e.page_group_id \
         WHERE g.documentation_id = ? ORDER BY e.rowid",
        documentation_id,
    )
    .await?;
    for group in &mut groups {
        group.editors = editors.remove(&group.id).unwrap_or_default();
    }
    Ok(groups)
}

/// All pages of a documentation, in sibling order, with editors.
pub(crate) async fn list_pages(
    conn: &mut SqliteConnection,
    documentation_id: DocumentationId,
) -> Result<Vec<Page>, sqlx::Error> {
    let mut pages = sqlx::query_as::<_, Page>(&format!(
        "SELECT * FROM pages WHERE documentation_id = ? {SIBLING_ORDER}"
    ))
    .bind(documentation_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut editors = editor_map(
        conn,
        "SELECT e.page_id, e.user_id FROM page_editors e \
         JOIN pages p ON p.id = e.page_id \
         WHERE p.documentation_id = ? ORDER BY e.rowid",
        documentation_id,
    )
    .await?;
    for page in &mut pages {
        page.editors = editors.remove(&page.id).unwrap_or_default();
    }
    Ok(pages)
}

/// Pages directly inside a group, in sibling order, with editors.
pub(crate) async fn pages_in_group(
    conn: &mut SqliteConnection,
    group: PageGroupId,
) -> Result<Vec<Page>, sqlx::Error> {
    let mut pages = sqlx::query_as::<_, Page>(&format!(
        "SELECT * FROM pages WHERE page_group_id = ? {SIBLING_ORDER}"
    ))
    .bind(group)
    .fetch_all(&mut *conn)
    .await?;

    let mut editors = editor_map(
        conn,
        "SELECT e.page_id, e.user_id FROM page_editors e \
         JOIN pages p ON p.id = e.page_id \
         WHERE p.page_group_id = ? ORDER BY e.rowid",
        group,
    )
    .await?;
    for page in &mut pages {
        page.editors = editors.remove(&page.id).unwrap_or_default();
    }
    Ok(pages)
}

/// Versions cloned from a root documentation, oldest first.
pub(crate) async fn list_versions(
    conn: &mut SqliteConnection,
    root: DocumentationId,
) -> Result<Vec<Documentation>, TreeError> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM documentations WHERE version_origin = ? ORDER BY created_at, id",
    )
    .bind(root)
    .fetch_all(&mut *conn)
    .await?;

    let mut versions = Vec::with_capacity(ids.len());
    for id in ids {
        versions.push(fetch_documentation(conn, id).await?);
    }
    Ok(versions)
}

/// Walk the version-origin chain of a documentation to its earliest ancestor.
///
/// Returns `None` when the documentation has no origin.
pub(crate) async fn resolve_root(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<Option<DocumentationId>, TreeError> {
    let mut visited = HashSet::from([id]);
    let mut root = None;
    let mut origin = origin_of(conn, id).await?;

    while let Some(next) = origin {
        if !visited.insert(next) {
            return Err(TreeError::invalid(format!(
                "version origin chain of documentation {id} loops"
            )));
        }
        root = Some(next);
        origin = origin_of(conn, next).await?;
    }

    Ok(root)
}

async fn origin_of(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<Option<DocumentationId>, TreeError> {
    sqlx::query_scalar::<_, Option<i64>>("SELECT version_origin FROM documentations WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| TreeError::not_found(Entity::Documentation, id))
}

/// Scheduling key of a documentation: its root when it is a version.
pub(crate) async fn build_key(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<DocumentationId, TreeError> {
    Ok(resolve_root(conn, id).await?.unwrap_or(id))
}

/// Order that appends after the last sibling under `parent`.
pub(crate) async fn next_order(
    conn: &mut SqliteConnection,
    documentation_id: DocumentationId,
    parent: Option<PageGroupId>,
) -> Result<i64, sqlx::Error> {
    let max = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(m) FROM ( \
            SELECT MAX(sort_order) AS m FROM page_groups \
            WHERE documentation_id = ? AND parent_id IS ? \
            UNION ALL \
            SELECT MAX(sort_order) FROM pages \
            WHERE documentation_id = ? AND page_group_id IS ? \
         )",
    )
    .bind(documentation_id)
    .bind(parent)
    .bind(documentation_id)
    .bind(parent)
    .fetch_one(&mut *conn)
    .await?;

    Ok(max.map_or(0, |m| m + 1))
}

/// Fail unless `group` exists and belongs to `documentation_id`.
pub(crate) async fn check_group_in_documentation(
    conn: &mut SqliteConnection,
    group: PageGroupId,
    documentation_id: DocumentationId,
) -> Result<(), TreeError> {
    let owner = sqlx::query_scalar::<_, i64>("SELECT documentation_id FROM page_groups WHERE id = ?")
        .bind(group)
        .fetch_optional(&mut *conn)
        .await?;

    match owner {
        Some(owner) if owner == documentation_id => Ok(()),
        Some(owner) => Err(TreeError::invalid(format!(
            "page group {group} belongs to documentation {owner}, not {documentation_id}"
        ))),
        None => Err(TreeError::invalid(format!(
            "parent page group {group} does not exist"
        ))),
    }
}

/// Fail if a sibling page (other than `exclude`) already uses `slug`.
pub(crate) async fn ensure_slug_free(
    conn: &mut SqliteConnection,
    documentation_id: DocumentationId,
    group: Option<PageGroupId>,
    slug: &str,
    exclude: Option<PageId>,
) -> Result<(), TreeError> {
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM pages \
         WHERE documentation_id = ? AND page_group_id IS ? AND slug = ? AND id IS NOT ?",
    )
    .bind(documentation_id)
    .bind(group)
    .bind(slug)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(TreeError::invalid(format!(
            "slug '{slug}' is already used by a sibling page"
        )));
    }
    Ok(())
}

/// Fail with `Conflict` if another documentation already uses `base_url`.
pub(crate) async fn ensure_base_url_free(
    conn: &mut SqliteConnection,
    base_url: &str,
    exclude: Option<DocumentationId>,
) -> Result<(), TreeError> {
    let taken = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM documentations WHERE base_url = ? AND id IS NOT ?",
    )
    .bind(base_url)
    .bind(exclude)
    .fetch_one(&mut *conn)
    .await?;

    if taken > 0 {
        return Err(TreeError::Conflict(format!(
            "base URL {base_url} is already in use"
        )));
    }
    Ok(())
}

/// Group parent map of a documentation.
pub(crate) async fn group_hierarchy(
    conn: &mut SqliteConnection,
    documentation_id: DocumentationId,
) -> Result<GroupHierarchy, sqlx::Error> {
    let edges = sqlx::query_as::<_, (i64, Option<i64>)>(
        "SELECT id, parent_id FROM page_groups WHERE documentation_id = ?",
    )
    .bind(documentation_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(GroupHierarchy::new(edges))
}

/// Number of direct children (pages and sub-groups) of a group.
pub(crate) async fn child_count(
    conn: &mut SqliteConnection,
    group: PageGroupId,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT (SELECT COUNT(*) FROM pages WHERE page_group_id = ?) \
              + (SELECT COUNT(*) FROM page_groups WHERE parent_id = ?)",
    )
    .bind(group)
    .bind(group)
    .fetch_one(&mut *conn)
    .await
}

/// Highest revision assigned to any group or page.
pub(crate) async fn max_revision(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let max = sqlx::query_scalar::<_, Option<i64>>(
        "SELECT MAX(m) FROM ( \
            SELECT MAX(revision) AS m FROM page_groups \
            UNION ALL \
            SELECT MAX(revision) FROM pages \
         )",
    )
    .fetch_one(&mut *conn)
    .await?;

    Ok(max.unwrap_or(0))
}

/// Delete a documentation with its groups, pages and editor links.
///
/// Editor links go first, then pages, groups and the row itself.
pub(crate) async fn purge_documentation(
    conn: &mut SqliteConnection,
    id: DocumentationId,
) -> Result<(), sqlx::Error> {
    const STATEMENTS: [&str; 6] = [
        "DELETE FROM page_editors WHERE page_id IN (SELECT id FROM pages WHERE documentation_id = ?)",
        "DELETE FROM pages WHERE documentation_id = ?",
        "DELETE FROM page_group_editors \
         WHERE page_group_id IN (SELECT id FROM page_groups WHERE documentation_id = ?)",
        "DELETE FROM page_groups WHERE documentation_id = ?",
        "DELETE FROM documentation_editors WHERE documentation_id = ?",
        "DELETE FROM documentations WHERE id = ?",
    ];

    for sql in STATEMENTS {
        sqlx::query(sql).bind(id).execute(&mut *conn).await?;
    }
    Ok(())
}
