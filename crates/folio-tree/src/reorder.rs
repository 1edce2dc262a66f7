//! Bulk reparent/reorder.
//!
//! A batch is validated in full before anything is written: every item must
//! exist, stay inside its documentation and keep the group hierarchy acyclic
//! once all earlier moves in the batch are applied. The writes then run in
//! one transaction.
//!
//! Sibling orders are never renumbered. When two nodes end up with the same
//! `(parent, order)`, the one placed later in the batch is listed first: each
//! applied item gets a fresh, increasing `revision` and listings sort by
//! `revision DESC` within equal orders.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use serde::Deserialize;

use crate::db::{self, EditorLinks};
use crate::error::TreeError;
use crate::hierarchy::GroupHierarchy;
use crate::model::{DocumentationId, PageGroupId, UserId};
use crate::store::TreeStore;
use crate::trigger::BuildTrigger;

/// One move in a bulk reorder.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "WireItem")]
pub struct ReorderItem {
    /// Page or page group id.
    pub id: i64,
    /// True if `id` names a page group.
    pub is_page_group: bool,
    /// New sibling order.
    pub order: i64,
    /// New parent group, `None` for top level.
    pub parent_id: Option<PageGroupId>,
}

/// Reorder item as clients send it. Page items name their group
/// `pageGroupId`, groups name their parent `parentId`; some clients send
/// both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireItem {
    id: i64,
    #[serde(default)]
    is_page_group: bool,
    order: i64,
    #[serde(default)]
    parent_id: Option<PageGroupId>,
    #[serde(default)]
    page_group_id: Option<PageGroupId>,
}

impl From<WireItem> for ReorderItem {
    fn from(wire: WireItem) -> Self {
        let parent_id = if wire.is_page_group {
            wire.parent_id
        } else {
            wire.page_group_id.or(wire.parent_id)
        };
        Self {
            id: wire.id,
            is_page_group: wire.is_page_group,
            order: wire.order,
            parent_id,
        }
    }
}

/// Item after validation.
struct Move {
    item: ReorderItem,
    documentation_id: DocumentationId,
}

impl TreeStore {
    /// Apply a batch of moves atomically.
    ///
    /// If the same node appears more than once, its last occurrence wins.
    /// On success one trigger is emitted per distinct project touched.
    pub async fn bulk_reorder(&self, items: Vec<ReorderItem>, actor: UserId) -> Result<(), TreeError> {
        let items = last_occurrence_wins(items);
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool().begin().await?;

        // Resolve owners.
        let mut moves = Vec::with_capacity(items.len());
        for item in items {
            if item.order < 0 {
                return Err(TreeError::invalid(format!(
                    "order must not be negative (got {} for {})",
                    item.order, item.id
                )));
            }
            let documentation_id = if item.is_page_group {
                db::fetch_page_group(&mut tx, item.id).await?.documentation_id
            } else {
                db::fetch_page(&mut tx, item.id).await?.documentation_id
            };
            moves.push(Move {
                item,
                documentation_id,
            });
        }

        let touched: BTreeSet<DocumentationId> =
            moves.iter().map(|m| m.documentation_id).collect();

        // Group ownership and parent links of every touched documentation.
        let mut owners: HashMap<PageGroupId, DocumentationId> = HashMap::new();
        let mut edges = Vec::new();
        for documentation_id in &touched {
            let hierarchy = sqlx::query_as::<_, (i64, Option<i64>)>(
                "SELECT id, parent_id FROM page_groups WHERE documentation_id = ?",
            )
            .bind(documentation_id)
            .fetch_all(&mut *tx)
            .await?;
            for (group, parent) in hierarchy {
                owners.insert(group, *documentation_id);
                edges.push((group, parent));
            }
        }
        let mut hierarchy = GroupHierarchy::new(edges);

        // Validate against pending state.
        for mv in &moves {
            let ReorderItem {
                id,
                is_page_group,
                parent_id,
                ..
            } = mv.item;

            if let Some(parent) = parent_id {
                if owners.get(&parent) != Some(&mv.documentation_id) {
                    return Err(TreeError::invalid(format!(
                        "parent page group {parent} is not part of documentation {}",
                        mv.documentation_id
                    )));
                }
            }

            if is_page_group {
                if hierarchy.would_cycle(id, parent_id) {
                    return Err(TreeError::invalid(format!(
                        "moving page group {id} under {parent_id:?} would create a cycle"
                    )));
                }
                hierarchy.assign(id, parent_id);
            }
        }

        // Apply.
        let mut revision = db::max_revision(&mut tx).await?;
        let now = Utc::now();
        for mv in &moves {
            revision += 1;
            let (sql, links) = if mv.item.is_page_group {
                (
                    "UPDATE page_groups SET sort_order = ?, parent_id = ?, revision = ?, \
                     last_editor_id = ?, updated_at = ? WHERE id = ?",
                    EditorLinks::PageGroup,
                )
            } else {
                (
                    "UPDATE pages SET sort_order = ?, page_group_id = ?, revision = ?, \
                     last_editor_id = ?, updated_at = ? WHERE id = ?",
                    EditorLinks::Page,
                )
            };

            sqlx::query(sql)
                .bind(mv.item.order)
                .bind(mv.item.parent_id)
                .bind(revision)
                .bind(actor)
                .bind(now)
                .bind(mv.item.id)
                .execute(&mut *tx)
                .await?;
            db::add_editor(&mut tx, links, mv.item.id, actor).await?;
        }

        // Moved pages must not collide on slug with their new siblings.
        for documentation_id in &touched {
            let clash = sqlx::query_scalar::<_, String>(
                "SELECT slug FROM pages WHERE documentation_id = ? \
                 GROUP BY page_group_id, slug HAVING COUNT(*) > 1 LIMIT 1",
            )
            .bind(documentation_id)
            .fetch_optional(&mut *tx)
            .await?;
            if let Some(slug) = clash {
                return Err(TreeError::invalid(format!(
                    "slug '{slug}' would be used twice under the same parent"
                )));
            }
        }

        let mut keys = BTreeSet::new();
        for documentation_id in &touched {
            keys.insert(db::build_key(&mut tx, *documentation_id).await?);
        }
        tx.commit().await?;

        tracing::debug!(
            moves = moves.len(),
            documentations = touched.len(),
            "Bulk reorder applied"
        );
        for key in keys {
            self.emit(BuildTrigger::debounced(key));
        }
        Ok(())
    }
}

/// Drop every item that is overridden by a later item for the same node,
/// keeping the input order of the survivors.
fn last_occurrence_wins(items: Vec<ReorderItem>) -> Vec<ReorderItem> {
    let mut last: HashMap<(bool, i64), usize> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        last.insert((item.is_page_group, item.id), index);
    }

    items
        .into_iter()
        .enumerate()
        .filter(|(index, item)| last.get(&(item.is_page_group, item.id)) == Some(index))
        .map(|(_, item)| item)
        .collect()
}
