//! SQLite schema.
//!
//! Foreign keys have no `ON DELETE` actions: deletes clear editor links and
//! children explicitly, so a forgotten step fails the statement instead of
//! silently cascading.

use sqlx::SqlitePool;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS documentations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    version TEXT NOT NULL DEFAULT '',
    base_url TEXT NOT NULL UNIQUE,
    version_origin INTEGER REFERENCES documentations(id),
    favicon TEXT NOT NULL DEFAULT '',
    meta_image TEXT NOT NULL DEFAULT '',
    nav_image TEXT NOT NULL DEFAULT '',
    custom_css TEXT NOT NULL DEFAULT '',
    copyright_text TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    organization_name TEXT NOT NULL DEFAULT '',
    project_name TEXT NOT NULL DEFAULT '',
    lander_details TEXT NOT NULL DEFAULT '',
    nav_image_dark TEXT NOT NULL DEFAULT '',
    footer_label_links TEXT NOT NULL DEFAULT '',
    more_label_links TEXT NOT NULL DEFAULT '',
    require_auth INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL,
    last_editor_id INTEGER,
    build_status TEXT NOT NULL DEFAULT 'never',
    last_built_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS page_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    documentation_id INTEGER NOT NULL REFERENCES documentations(id),
    parent_id INTEGER REFERENCES page_groups(id),
    sort_order INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL,
    last_editor_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    slug TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    documentation_id INTEGER NOT NULL REFERENCES documentations(id),
    page_group_id INTEGER REFERENCES page_groups(id),
    sort_order INTEGER NOT NULL DEFAULT 0,
    revision INTEGER NOT NULL DEFAULT 0,
    is_intro_page INTEGER NOT NULL DEFAULT 0,
    is_page INTEGER NOT NULL DEFAULT 0,
    author_id INTEGER NOT NULL,
    last_editor_id INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documentation_editors (
    documentation_id INTEGER NOT NULL REFERENCES documentations(id),
    user_id INTEGER NOT NULL,
    PRIMARY KEY (documentation_id, user_id)
);

CREATE TABLE IF NOT EXISTS page_group_editors (
    page_group_id INTEGER NOT NULL REFERENCES page_groups(id),
    user_id INTEGER NOT NULL,
    PRIMARY KEY (page_group_id, user_id)
);

CREATE TABLE IF NOT EXISTS page_editors (
    page_id INTEGER NOT NULL REFERENCES pages(id),
    user_id INTEGER NOT NULL,
    PRIMARY KEY (page_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_documentations_origin ON documentations(version_origin);
CREATE INDEX IF NOT EXISTS idx_page_groups_parent ON page_groups(documentation_id, parent_id);
CREATE INDEX IF NOT EXISTS idx_pages_group ON pages(documentation_id, page_group_id);
";

/// Create tables and indexes if they do not exist.
pub(crate) async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
