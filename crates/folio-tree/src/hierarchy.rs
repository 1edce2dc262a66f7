//! Page group hierarchy and tree snapshots.
//!
//! # Architecture
//!
//! Groups reference their parent by id. [`GroupHierarchy`] keeps those ids in
//! a flat map so parent chains can be walked without recursion, with the walk
//! bounded by the number of groups. Pending (not yet committed) parent
//! assignments are layered on top with [`GroupHierarchy::assign`], which lets
//! a bulk reorder check every move against the state the whole batch would
//! produce.
//!
//! [`DocumentationTree`] is a read-only snapshot of one documentation: nodes
//! in a flat `Vec` with children tracked by indices and sorted in sibling
//! order.

use std::collections::{HashMap, HashSet};

use crate::model::{Documentation, Page, PageGroup, PageGroupId};

/// Parent map of the page groups of one or more documentations.
#[derive(Clone, Debug, Default)]
pub struct GroupHierarchy {
    parents: HashMap<PageGroupId, Option<PageGroupId>>,
}

impl GroupHierarchy {
    /// Build from `(group, parent)` pairs.
    pub fn new(edges: impl IntoIterator<Item = (PageGroupId, Option<PageGroupId>)>) -> Self {
        Self {
            parents: edges.into_iter().collect(),
        }
    }

    /// Parent of a group. `None` for top-level or unknown groups.
    #[must_use]
    pub fn parent_of(&self, group: PageGroupId) -> Option<PageGroupId> {
        self.parents.get(&group).copied().flatten()
    }

    /// Override the parent of a group.
    pub fn assign(&mut self, group: PageGroupId, parent: Option<PageGroupId>) {
        self.parents.insert(group, parent);
    }

    /// True if making `parent` the parent of `group` would close a cycle.
    ///
    /// Walks up from `parent`; reaching `group` (or revisiting any node)
    /// means a cycle.
    #[must_use]
    pub fn would_cycle(&self, group: PageGroupId, parent: Option<PageGroupId>) -> bool {
        let mut visited = HashSet::new();
        let mut current = parent;

        while let Some(id) = current {
            if id == group || !visited.insert(id) {
                return true;
            }
            // Bounded: every iteration inserts a new id into `visited`.
            if visited.len() > self.parents.len() + 1 {
                return true;
            }
            current = self.parent_of(id);
        }

        false
    }
}

/// Node of a [`DocumentationTree`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeNode {
    Group(PageGroup),
    Page(Page),
}

impl TreeNode {
    fn sort_key(&self) -> (i64, std::cmp::Reverse<i64>, u8, i64) {
        match self {
            Self::Group(g) => (g.order, std::cmp::Reverse(g.revision), 0, g.id),
            Self::Page(p) => (p.order, std::cmp::Reverse(p.revision), 1, p.id),
        }
    }
}

/// Read-only snapshot of a documentation's content tree.
///
/// Siblings are sorted by order; equal orders go to the node placed most
/// recently by a bulk reorder, then groups before pages, then by id.
#[derive(Clone, Debug)]
pub struct DocumentationTree {
    documentation: Documentation,
    nodes: Vec<TreeNode>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl DocumentationTree {
    /// Assemble a snapshot from rows.
    ///
    /// Nodes whose parent group is not part of `groups` are treated as
    /// top-level.
    #[must_use]
    pub fn new(documentation: Documentation, groups: Vec<PageGroup>, pages: Vec<Page>) -> Self {
        let group_index: HashMap<PageGroupId, usize> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.id, i))
            .collect();

        let parents: Vec<Option<usize>> = groups
            .iter()
            .map(|g| g.parent_id.and_then(|p| group_index.get(&p).copied()))
            .chain(
                pages
                    .iter()
                    .map(|p| p.page_group_id.and_then(|g| group_index.get(&g).copied())),
            )
            .collect();

        let nodes: Vec<TreeNode> = groups
            .into_iter()
            .map(TreeNode::Group)
            .chain(pages.into_iter().map(TreeNode::Page))
            .collect();

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        let by_key = |a: &usize, b: &usize| nodes[*a].sort_key().cmp(&nodes[*b].sort_key());
        roots.sort_by(by_key);
        for list in &mut children {
            list.sort_by(by_key);
        }

        Self {
            documentation,
            nodes,
            children,
            roots,
        }
    }

    /// Documentation this tree belongs to.
    #[must_use]
    pub fn documentation(&self) -> &Documentation {
        &self.documentation
    }

    /// Top-level nodes in sibling order.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().map(|&i| &self.nodes[i])
    }

    /// Children of a group in sibling order. Empty for pages and unknown ids.
    #[must_use]
    pub fn children_of(&self, group: PageGroupId) -> Vec<&TreeNode> {
        self.nodes
            .iter()
            .position(|n| matches!(n, TreeNode::Group(g) if g.id == group))
            .map(|idx| self.children[idx].iter().map(|&c| &self.nodes[c]).collect())
            .unwrap_or_default()
    }

    /// Depth-first walk in sibling order, yielding `(depth, node)`.
    #[cfg(test)]
    pub(crate) fn walk(&self) -> Vec<(usize, &TreeNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|&i| (0, i)).collect();

        while let Some((depth, idx)) = stack.pop() {
            out.push((depth, &self.nodes[idx]));
            for &child in self.children[idx].iter().rev() {
                stack.push((depth + 1, child));
            }
        }

        out
    }
}
